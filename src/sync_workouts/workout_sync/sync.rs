use super::progress::round_to;
use super::{SyncOutcome, SyncStats, Workspace, WorkoutSync};
use crate::page_content::build_page_content;
use crate::strong_export::WorkoutRecord;
use anyhow::{Context, Result};
use chrono::DateTime;
use chrono_tz::Tz;
use serde_json::{Value, json};
use tracing::info;

fn date_range(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Value {
    json!({"date": {"start": start.to_rfc3339(), "end": end.to_rfc3339()}})
}

fn workout_properties(workout: &WorkoutRecord, start: &DateTime<Tz>, end: &DateTime<Tz>) -> Value {
    let unknown = json!({"select": {"name": "Unknown"}});
    json!({
        "Activity Name": {"title": [{"text": {"content": workout.name}}]},
        "Date": date_range(start, end),
        "Activity Type": {"select": {"name": "Strength"}},
        "Subactivity Type": {"select": {"name": "Strength Training"}},
        "Duration (min)": {"number": round_to(workout.duration_secs as f64 / 60.0, 2)},
        "Distance (km)": {"number": 0},
        "Calories": {"number": 0},
        "Avg Pace": {"rich_text": [{"text": {"content": ""}}]},
        "Avg Power": {"number": 0},
        "Max Power": {"number": 0},
        "Training Effect": unknown,
        "Aerobic": {"number": 0},
        "Aerobic Effect": unknown,
        "Anaerobic": {"number": 0},
        "Anaerobic Effect": unknown,
        "PR": {"checkbox": false},
        "Fav": {"checkbox": false},
        "Garmin ID": {"multi_select": [{"name": workout.stable_id()}]},
    })
}

impl<W: Workspace> WorkoutSync<W> {
    /// Syncs every workout in parse order. The first remote failure aborts the run.
    pub async fn sync_workouts(&self, workouts: &[WorkoutRecord]) -> Result<SyncStats> {
        let mut stats = SyncStats::default();

        for workout in workouts {
            let outcome = self.sync_workout(workout).await?;
            let label = match outcome {
                SyncOutcome::Created => "Created",
                SyncOutcome::Rebuilt => "Rebuilt",
                SyncOutcome::Skipped => "Skipped",
            };
            println!("  {label}: {} - {}", workout.name, workout.date);
            stats.record(outcome);

            self.sync_exercise_entries(workout, &mut stats)
                .await
                .with_context(|| format!("Failed to sync exercise progress for {}", workout.date))?;
        }

        Ok(stats)
    }

    pub async fn sync_workout(&self, workout: &WorkoutRecord) -> Result<SyncOutcome> {
        let stable_id = workout.stable_id();
        let existing = self
            .workspace
            .find_tagged_page(&self.database_id, &stable_id)
            .await
            .with_context(|| format!("Failed to check for existing workout {stable_id}"))?;

        match existing {
            None => {
                self.create_workout_page(workout).await?;
                Ok(SyncOutcome::Created)
            }
            Some(page_id) if self.rebuild => {
                self.update_workout(&page_id, workout).await?;
                Ok(SyncOutcome::Rebuilt)
            }
            Some(_) => Ok(SyncOutcome::Skipped),
        }
    }

    async fn create_workout_page(&self, workout: &WorkoutRecord) -> Result<String> {
        let (start, end) = workout.window(self.timezone)?;
        let properties = workout_properties(workout, &start, &end);

        let page_id = self
            .workspace
            .create_page(&self.database_id, properties)
            .await
            .with_context(|| format!("Failed to create page for {}", workout.date))?;

        let blocks = build_page_content(&workout.exercises);
        self.workspace
            .append_children(&page_id, &blocks)
            .await
            .with_context(|| format!("Failed to add content to page {page_id}"))?;

        info!("Created page {} for workout {}", page_id, workout.date);
        Ok(page_id)
    }

    async fn update_workout(&self, page_id: &str, workout: &WorkoutRecord) -> Result<()> {
        let (start, end) = workout.window(self.timezone)?;

        self.workspace
            .update_page(page_id, json!({"Date": date_range(&start, &end)}))
            .await
            .with_context(|| format!("Failed to update date of page {page_id}"))?;

        self.replace_page_content(page_id, workout).await
    }

    /// Deletes every existing child block, then appends a fresh build.
    async fn replace_page_content(&self, page_id: &str, workout: &WorkoutRecord) -> Result<()> {
        let mut cursor: Option<String> = None;
        let mut deleted = 0usize;

        loop {
            let page = self
                .workspace
                .list_children(page_id, cursor.as_deref())
                .await
                .with_context(|| format!("Failed to list content of page {page_id}"))?;

            for block_id in &page.block_ids {
                self.workspace
                    .delete_block(block_id)
                    .await
                    .with_context(|| format!("Failed to delete block {block_id}"))?;
                deleted += 1;
            }

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        let blocks = build_page_content(&workout.exercises);
        self.workspace
            .append_children(page_id, &blocks)
            .await
            .with_context(|| format!("Failed to add content to page {page_id}"))?;

        info!(
            "Replaced {} blocks with {} on page {}",
            deleted,
            blocks.len(),
            page_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page_content::Block;
    use crate::strong_export::{ExerciseRow, SetOrder};
    use crate::workout_sync::workspace::ChildPage;
    use crate::workout_sync::{EXERCISE_DATABASE_TITLE, ExerciseDatabase};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use strong_notion_sync::common::types::{CommonError, CommonResult};

    const CHILD_PAGE_SIZE: usize = 2;

    #[derive(Debug, Clone)]
    struct RemotePage {
        database_id: String,
        properties: Value,
    }

    /// In-memory document store recording every mutation.
    #[derive(Default)]
    struct MemoryWorkspace {
        pages: RefCell<Vec<(String, RemotePage)>>,
        children: RefCell<HashMap<String, Vec<(String, Block)>>>,
        databases: RefCell<Vec<(String, String, Value)>>,
        parent: Option<String>,
        next_id: Cell<usize>,
        creates: Cell<usize>,
        deletes: Cell<usize>,
        fail_lookups: bool,
    }

    impl MemoryWorkspace {
        fn id(&self, prefix: &str) -> String {
            let n = self.next_id.get() + 1;
            self.next_id.set(n);
            format!("{prefix}-{n}")
        }

        fn pages_in(&self, database_id: &str) -> Vec<(String, Value)> {
            self.pages
                .borrow()
                .iter()
                .filter(|(_, page)| page.database_id == database_id)
                .map(|(id, page)| (id.clone(), page.properties.clone()))
                .collect()
        }

        fn blocks_of(&self, page_id: &str) -> Vec<Block> {
            self.children
                .borrow()
                .get(page_id)
                .map(|blocks| blocks.iter().map(|(_, block)| block.clone()).collect())
                .unwrap_or_default()
        }
    }

    impl Workspace for MemoryWorkspace {
        async fn find_tagged_page(&self, database_id: &str, stable_id: &str) -> CommonResult<Option<String>> {
            if self.fail_lookups {
                return Err(CommonError::Network("connection reset".to_string()));
            }
            Ok(self
                .pages_in(database_id)
                .into_iter()
                .find(|(_, props)| {
                    props["Garmin ID"]["multi_select"]
                        .as_array()
                        .is_some_and(|tags| tags.iter().any(|tag| tag["name"] == stable_id))
                })
                .map(|(id, _)| id))
        }

        async fn find_exercise_entry(
            &self,
            database_id: &str,
            exercise: &str,
            date: &str,
        ) -> CommonResult<Option<String>> {
            Ok(self
                .pages_in(database_id)
                .into_iter()
                .find(|(_, props)| {
                    props["Exercise"]["title"][0]["text"]["content"] == exercise
                        && props["Date"]["date"]["start"]
                            .as_str()
                            .is_some_and(|start| start.starts_with(date))
                })
                .map(|(id, _)| id))
        }

        async fn parent_page(&self, _database_id: &str) -> CommonResult<Option<String>> {
            Ok(self.parent.clone())
        }

        async fn create_database(&self, parent_page_id: &str, title: &str, schema: Value) -> CommonResult<String> {
            let id = self.id("db");
            self.databases
                .borrow_mut()
                .push((parent_page_id.to_string(), title.to_string(), schema));
            Ok(id)
        }

        async fn create_page(&self, database_id: &str, properties: Value) -> CommonResult<String> {
            let id = self.id("page");
            self.creates.set(self.creates.get() + 1);
            self.pages.borrow_mut().push((
                id.clone(),
                RemotePage {
                    database_id: database_id.to_string(),
                    properties,
                },
            ));
            Ok(id)
        }

        async fn update_page(&self, page_id: &str, properties: Value) -> CommonResult<()> {
            let mut pages = self.pages.borrow_mut();
            let (_, page) = pages
                .iter_mut()
                .find(|(id, _)| id == page_id)
                .ok_or_else(|| CommonError::Other(format!("no page {page_id}")))?;
            for (key, value) in properties.as_object().into_iter().flatten() {
                page.properties[key] = value.clone();
            }
            Ok(())
        }

        async fn list_children(&self, block_id: &str, cursor: Option<&str>) -> CommonResult<ChildPage> {
            let children = self.children.borrow();
            let ids: Vec<String> = children
                .get(block_id)
                .map(|blocks| blocks.iter().map(|(id, _)| id.clone()).collect())
                .unwrap_or_default();
            let start = match cursor {
                Some(cursor) => ids
                    .iter()
                    .position(|id| id == cursor)
                    .ok_or_else(|| CommonError::Other(format!("bad cursor {cursor}")))?,
                None => 0,
            };
            let end = (start + CHILD_PAGE_SIZE).min(ids.len());
            Ok(ChildPage {
                block_ids: ids[start..end].to_vec(),
                next_cursor: ids.get(end).cloned(),
            })
        }

        async fn delete_block(&self, block_id: &str) -> CommonResult<()> {
            self.deletes.set(self.deletes.get() + 1);
            for blocks in self.children.borrow_mut().values_mut() {
                blocks.retain(|(id, _)| id != block_id);
            }
            Ok(())
        }

        async fn append_children(&self, block_id: &str, children: &[Block]) -> CommonResult<()> {
            let appended: Vec<(String, Block)> = children
                .iter()
                .map(|block| (self.id("block"), block.clone()))
                .collect();
            self.children
                .borrow_mut()
                .entry(block_id.to_string())
                .or_default()
                .extend(appended);
            Ok(())
        }
    }

    fn set(exercise: &str, order: &str, weight: f64, reps: u32) -> ExerciseRow {
        ExerciseRow {
            exercise: exercise.to_string(),
            set_order: SetOrder::from(order.to_string()),
            weight_kg: Some(weight),
            reps: Some(reps),
            reps_text: Some(reps.to_string()),
            distance_m: None,
            seconds: None,
            notes: None,
        }
    }

    fn workout(date: &str, exercises: Vec<ExerciseRow>) -> WorkoutRecord {
        WorkoutRecord {
            date: date.to_string(),
            name: "Full Body".to_string(),
            duration_secs: 3725,
            exercises,
        }
    }

    fn sample_workouts() -> Vec<WorkoutRecord> {
        vec![
            workout(
                "2024-03-01 18:30:00",
                vec![
                    set("Row", "1", 0.0, 500),
                    set("Row", "2", 0.0, 480),
                    set("Squat", "1", 100.0, 5),
                ],
            ),
            workout("2024-03-03 09:00:00", vec![set("Bench", "1", 60.0, 8)]),
        ]
    }

    async fn engine(workspace: MemoryWorkspace, rebuild: bool) -> WorkoutSync<MemoryWorkspace> {
        let mut sync = WorkoutSync::new(workspace, "workouts", chrono_tz::Europe::Zurich, rebuild);
        sync.prepare_exercise_database(Some("progress")).await.unwrap();
        sync
    }

    #[tokio::test]
    async fn creates_pages_with_properties_and_content() {
        let sync = engine(MemoryWorkspace::default(), false).await;
        let workouts = sample_workouts();

        let stats = sync.sync_workouts(&workouts).await.unwrap();

        assert_eq!(stats.created, 2);
        assert_eq!(stats.skipped, 0);
        let pages = sync.workspace.pages_in("workouts");
        assert_eq!(pages.len(), 2);

        let (page_id, props) = &pages[0];
        assert_eq!(props["Activity Name"]["title"][0]["text"]["content"], "Full Body");
        assert_eq!(props["Date"]["date"]["start"], "2024-03-01T18:30:00+01:00");
        assert_eq!(props["Date"]["date"]["end"], "2024-03-01T19:32:05+01:00");
        assert_eq!(props["Duration (min)"]["number"], 62.08);
        assert_eq!(props["Activity Type"]["select"]["name"], "Strength");
        assert_eq!(props["PR"]["checkbox"], false);
        assert_eq!(
            props["Garmin ID"]["multi_select"][0]["name"],
            "strong-2024-03-01 18:30:00"
        );
        assert_eq!(
            sync.workspace.blocks_of(page_id),
            build_page_content(&workouts[0].exercises)
        );
    }

    #[tokio::test]
    async fn second_run_without_rebuild_creates_nothing_new() {
        let sync = engine(MemoryWorkspace::default(), false).await;
        let workouts = sample_workouts();

        sync.sync_workouts(&workouts).await.unwrap();
        let creates_after_first = sync.workspace.creates.get();
        let entries_after_first = sync.workspace.pages_in("progress");

        let stats = sync.sync_workouts(&workouts).await.unwrap();

        assert_eq!(stats.created, 0);
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.entries_created, 0);
        assert_eq!(stats.entries_updated, 3);
        assert_eq!(sync.workspace.creates.get(), creates_after_first);
        assert_eq!(sync.workspace.pages_in("progress"), entries_after_first);
    }

    #[tokio::test]
    async fn rebuild_replaces_content_across_cursor_pages() {
        let workspace = MemoryWorkspace::default();
        let first = engine(workspace, false).await;
        let original = sample_workouts();
        first.sync_workouts(&original).await.unwrap();
        let page_id = first.workspace.pages_in("workouts")[0].0.clone();
        let old_block_count = first.workspace.blocks_of(&page_id).len();
        assert!(old_block_count > CHILD_PAGE_SIZE);

        let mut rebuilt = original.clone();
        rebuilt[0].duration_secs = 60;
        rebuilt[0].exercises.push(set("Deadlift", "1", 140.0, 3));

        let WorkoutSync { workspace, .. } = first;
        let second = engine(workspace, true).await;
        let stats = second.sync_workouts(&rebuilt).await.unwrap();

        assert_eq!(stats.rebuilt, 2);
        assert_eq!(stats.created, 0);
        assert!(second.workspace.deletes.get() >= old_block_count);
        assert_eq!(
            second.workspace.blocks_of(&page_id),
            build_page_content(&rebuilt[0].exercises)
        );
        let props = &second.workspace.pages_in("workouts")[0].1;
        assert_eq!(props["Date"]["date"]["end"], "2024-03-01T18:31:00+01:00");
        assert_eq!(props["Duration (min)"]["number"], 62.08);
    }

    #[tokio::test]
    async fn aggregation_rows_hold_per_exercise_stats() {
        let sync = engine(MemoryWorkspace::default(), false).await;

        let stats = sync.sync_workouts(&sample_workouts()[..1]).await.unwrap();

        assert_eq!(stats.entries_created, 2);
        let entries = sync.workspace.pages_in("progress");
        let (_, row) = entries
            .iter()
            .find(|(_, props)| props["Exercise"]["title"][0]["text"]["content"] == "Row")
            .unwrap();
        assert_eq!(row["Max Weight (kg)"]["number"], 0.0);
        assert_eq!(row["Total Volume (kg)"]["number"], 0.0);
        assert_eq!(row["Total Reps"]["number"], 980);
        assert_eq!(row["Sets"]["number"], 2);
        assert_eq!(row["Date"]["date"]["start"], "2024-03-01T18:30:00+01:00");
    }

    #[tokio::test]
    async fn failed_existence_check_aborts_instead_of_creating() {
        let workspace = MemoryWorkspace {
            fail_lookups: true,
            ..Default::default()
        };
        let sync = engine(workspace, false).await;

        let err = sync.sync_workouts(&sample_workouts()).await.unwrap_err();

        assert!(format!("{err:#}").contains("connection reset"));
        assert_eq!(sync.workspace.creates.get(), 0);
    }

    #[tokio::test]
    async fn provisions_exercise_database_under_parent_page() {
        let workspace = MemoryWorkspace {
            parent: Some("home".to_string()),
            ..Default::default()
        };
        let mut sync = WorkoutSync::new(workspace, "workouts", chrono_tz::Europe::Zurich, false);

        let resolved = sync.prepare_exercise_database(None).await.unwrap();

        let id = match resolved {
            ExerciseDatabase::Created(id) => id,
            other => panic!("expected a created database, got {other:?}"),
        };
        let databases = sync.workspace.databases.borrow();
        assert_eq!(databases.len(), 1);
        assert_eq!(databases[0].0, "home");
        assert_eq!(databases[0].1, EXERCISE_DATABASE_TITLE);
        drop(databases);

        sync.sync_workouts(&sample_workouts()[1..]).await.unwrap();
        assert_eq!(sync.workspace.pages_in(&id).len(), 1);
    }

    #[tokio::test]
    async fn aggregation_disabled_when_parent_is_not_a_page() {
        let mut sync = WorkoutSync::new(
            MemoryWorkspace::default(),
            "workouts",
            chrono_tz::Europe::Zurich,
            false,
        );

        let resolved = sync.prepare_exercise_database(None).await.unwrap();
        let stats = sync.sync_workouts(&sample_workouts()).await.unwrap();

        assert_eq!(resolved, ExerciseDatabase::Unavailable);
        assert!(sync.workspace.databases.borrow().is_empty());
        assert_eq!(stats.created, 2);
        assert_eq!(stats.entries_created + stats.entries_updated, 0);
    }
}
