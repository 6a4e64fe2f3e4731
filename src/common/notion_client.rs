use crate::common::types::{CommonError, CommonResult};
use reqwest::Method;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

const ENDPOINT: &str = "https://api.notion.com/v1";
const NOTION_VERSION: &str = "2022-06-28";

/// Maximum number of children accepted by a single append request.
pub const APPEND_BATCH_SIZE: usize = 100;

/// Any Notion object where only the id matters to us (pages, blocks, databases).
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectRef {
    pub id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaginatedList {
    pub results: Vec<ObjectRef>,
    #[serde(default)]
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Parent {
    #[serde(rename = "type")]
    pub kind: String,
    pub page_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Database {
    pub id: String,
    pub parent: Parent,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Serialize)]
struct AppendRequest<'a, T: Serialize> {
    children: &'a [T],
}

pub struct NotionClient {
    /// Retries transient failures. Only used for requests that are safe to repeat.
    reads: ClientWithMiddleware,
    writes: ClientWithMiddleware,
    endpoint: String,
    auth_header: String,
}

impl NotionClient {
    pub fn new(token: &str, max_retries: u32) -> Self {
        Self::with_endpoint(ENDPOINT, token, max_retries)
    }

    pub fn with_endpoint(endpoint: &str, token: &str, max_retries: u32) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let reads = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();
        let writes = ClientBuilder::new(reqwest::Client::new()).build();

        Self {
            reads,
            writes,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_header: format!("Bearer {token}"),
        }
    }

    /// First page of results for `filter`, in the order the API returns them.
    pub async fn query_database(&self, database_id: &str, filter: Value) -> CommonResult<PaginatedList> {
        self.send(
            &self.reads,
            Method::POST,
            &format!("databases/{database_id}/query"),
            &[],
            Some(json!({ "filter": filter })),
        )
        .await
    }

    pub async fn retrieve_database(&self, database_id: &str) -> CommonResult<Database> {
        self.send(
            &self.reads,
            Method::GET,
            &format!("databases/{database_id}"),
            &[],
            None,
        )
        .await
    }

    pub async fn create_database(&self, body: Value) -> CommonResult<ObjectRef> {
        self.send(&self.writes, Method::POST, "databases", &[], Some(body))
            .await
    }

    pub async fn create_page(&self, body: Value) -> CommonResult<ObjectRef> {
        self.send(&self.writes, Method::POST, "pages", &[], Some(body))
            .await
    }

    pub async fn update_page(&self, page_id: &str, properties: Value) -> CommonResult<ObjectRef> {
        self.send(
            &self.writes,
            Method::PATCH,
            &format!("pages/{page_id}"),
            &[],
            Some(json!({ "properties": properties })),
        )
        .await
    }

    pub async fn list_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
    ) -> CommonResult<PaginatedList> {
        let query: Vec<(&str, &str)> = start_cursor
            .map(|cursor| ("start_cursor", cursor))
            .into_iter()
            .collect();
        self.send(
            &self.reads,
            Method::GET,
            &format!("blocks/{block_id}/children"),
            &query,
            None,
        )
        .await
    }

    pub async fn delete_block(&self, block_id: &str) -> CommonResult<ObjectRef> {
        self.send(
            &self.writes,
            Method::DELETE,
            &format!("blocks/{block_id}"),
            &[],
            None,
        )
        .await
    }

    /// Appends `children` in batches of [`APPEND_BATCH_SIZE`], preserving order.
    pub async fn append_children<T: Serialize>(
        &self,
        block_id: &str,
        children: &[T],
    ) -> CommonResult<()> {
        for batch in children.chunks(APPEND_BATCH_SIZE) {
            let body = serde_json::to_value(AppendRequest { children: batch })?;
            let _: PaginatedList = self
                .send(
                    &self.writes,
                    Method::PATCH,
                    &format!("blocks/{block_id}/children"),
                    &[],
                    Some(body),
                )
                .await?;
        }
        Ok(())
    }

    async fn send<T: DeserializeOwned>(
        &self,
        client: &ClientWithMiddleware,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> CommonResult<T> {
        let url = format!("{}/{path}", self.endpoint);
        debug!("Notion {} {}", method, url);

        let mut request = client
            .request(method, url)
            .header("Authorization", &self.auth_header)
            .header("Notion-Version", NOTION_VERSION);

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request
                .header("Content-Type", "application/json")
                .body(serde_json::to_string(&body)?);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiError>(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            return Err(CommonError::Http { status, message });
        }

        Ok(serde_json::from_str(&text)?)
    }
}
