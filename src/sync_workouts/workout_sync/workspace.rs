use crate::page_content::Block;
use serde_json::{Value, json};
use strong_notion_sync::common::notion_client::NotionClient;
use strong_notion_sync::common::types::CommonResult;

pub const STRENGTH_ICON: &str =
    "https://img.icons8.com/?size=100&id=107640&format=png&color=000000";

/// Multi-select property holding stable ids in the workout table.
pub const SOURCE_ID_PROPERTY: &str = "Garmin ID";

/// One page of a block's children.
#[derive(Debug, Clone, Default)]
pub struct ChildPage {
    pub block_ids: Vec<String>,
    pub next_cursor: Option<String>,
}

/// Remote operations the sync needs from the document store.
pub trait Workspace {
    /// First page whose source id tag contains `stable_id`, in remote query order.
    async fn find_tagged_page(&self, database_id: &str, stable_id: &str) -> CommonResult<Option<String>>;

    /// First entry whose title equals `exercise` on calendar day `date`.
    async fn find_exercise_entry(
        &self,
        database_id: &str,
        exercise: &str,
        date: &str,
    ) -> CommonResult<Option<String>>;

    /// Id of the plain page containing `database_id`, if its parent is one.
    async fn parent_page(&self, database_id: &str) -> CommonResult<Option<String>>;

    async fn create_database(&self, parent_page_id: &str, title: &str, schema: Value) -> CommonResult<String>;

    async fn create_page(&self, database_id: &str, properties: Value) -> CommonResult<String>;

    async fn update_page(&self, page_id: &str, properties: Value) -> CommonResult<()>;

    async fn list_children(&self, block_id: &str, cursor: Option<&str>) -> CommonResult<ChildPage>;

    async fn delete_block(&self, block_id: &str) -> CommonResult<()>;

    async fn append_children(&self, block_id: &str, children: &[Block]) -> CommonResult<()>;
}

fn icon() -> Value {
    json!({"type": "external", "external": {"url": STRENGTH_ICON}})
}

impl Workspace for NotionClient {
    async fn find_tagged_page(&self, database_id: &str, stable_id: &str) -> CommonResult<Option<String>> {
        let filter = json!({
            "property": SOURCE_ID_PROPERTY,
            "multi_select": {"contains": stable_id},
        });
        let list = self.query_database(database_id, filter).await?;
        Ok(list.results.into_iter().next().map(|page| page.id))
    }

    async fn find_exercise_entry(
        &self,
        database_id: &str,
        exercise: &str,
        date: &str,
    ) -> CommonResult<Option<String>> {
        let filter = json!({
            "and": [
                {"property": "Exercise", "title": {"equals": exercise}},
                {"property": "Date", "date": {"on_or_after": date}},
                {"property": "Date", "date": {"on_or_before": date}},
            ]
        });
        let list = self.query_database(database_id, filter).await?;
        Ok(list.results.into_iter().next().map(|page| page.id))
    }

    async fn parent_page(&self, database_id: &str) -> CommonResult<Option<String>> {
        let database = self.retrieve_database(database_id).await?;
        if database.parent.kind == "page_id" {
            Ok(database.parent.page_id)
        } else {
            Ok(None)
        }
    }

    async fn create_database(&self, parent_page_id: &str, title: &str, schema: Value) -> CommonResult<String> {
        let body = json!({
            "parent": {"type": "page_id", "page_id": parent_page_id},
            "title": [{"type": "text", "text": {"content": title}}],
            "icon": icon(),
            "properties": schema,
        });
        Ok(NotionClient::create_database(self, body).await?.id)
    }

    async fn create_page(&self, database_id: &str, properties: Value) -> CommonResult<String> {
        let body = json!({
            "parent": {"database_id": database_id},
            "properties": properties,
            "icon": icon(),
        });
        Ok(NotionClient::create_page(self, body).await?.id)
    }

    async fn update_page(&self, page_id: &str, properties: Value) -> CommonResult<()> {
        NotionClient::update_page(self, page_id, properties).await?;
        Ok(())
    }

    async fn list_children(&self, block_id: &str, cursor: Option<&str>) -> CommonResult<ChildPage> {
        let list = NotionClient::list_children(self, block_id, cursor).await?;
        Ok(ChildPage {
            block_ids: list.results.into_iter().map(|block| block.id).collect(),
            next_cursor: list.next_cursor.filter(|_| list.has_more),
        })
    }

    async fn delete_block(&self, block_id: &str) -> CommonResult<()> {
        NotionClient::delete_block(self, block_id).await?;
        Ok(())
    }

    async fn append_children(&self, block_id: &str, children: &[Block]) -> CommonResult<()> {
        NotionClient::append_children(self, block_id, children).await
    }
}
