use super::{EXERCISE_DATABASE_TITLE, ExerciseDatabase, SyncStats, Workspace, WorkoutSync};
use crate::page_content::{ExerciseGroup, group_exercises};
use crate::strong_export::WorkoutRecord;
use anyhow::{Context, Result};
use serde_json::{Value, json};
use tracing::{info, warn};

/// Per-exercise statistics over one workout's sets.
#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseSummary {
    pub exercise: String,
    pub max_weight: f64,
    pub total_volume: f64,
    pub sets: usize,
    pub total_reps: u64,
}

impl ExerciseSummary {
    /// `None` when the group holds only notes.
    pub fn from_group(group: &ExerciseGroup<'_>) -> Option<Self> {
        if group.sets.is_empty() {
            return None;
        }

        let mut max_weight: f64 = 0.0;
        let mut total_volume = 0.0;
        let mut total_reps = 0u64;

        for set in &group.sets {
            let weight = set.weight_kg.unwrap_or(0.0);
            let reps = u64::from(set.reps.unwrap_or(0));
            max_weight = max_weight.max(weight);
            total_volume += weight * reps as f64;
            total_reps += reps;
        }

        Some(Self {
            exercise: group.name.to_string(),
            max_weight,
            total_volume,
            sets: group.sets.len(),
            total_reps,
        })
    }

    fn properties(&self, date: &str, workout_name: &str) -> Value {
        json!({
            "Exercise": {"title": [{"text": {"content": self.exercise}}]},
            "Date": {"date": {"start": date}},
            "Max Weight (kg)": {"number": self.max_weight},
            "Total Volume (kg)": {"number": round_to(self.total_volume, 1)},
            "Sets": {"number": self.sets},
            "Total Reps": {"number": self.total_reps},
            "Workout": {"rich_text": [{"text": {"content": workout_name}}]},
        })
    }
}

pub fn exercise_database_schema() -> Value {
    json!({
        "Exercise": {"title": {}},
        "Date": {"date": {}},
        "Max Weight (kg)": {"number": {"format": "number"}},
        "Total Volume (kg)": {"number": {"format": "number"}},
        "Sets": {"number": {"format": "number"}},
        "Total Reps": {"number": {"format": "number"}},
        "Workout": {"rich_text": {}},
    })
}

pub(super) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

impl<W: Workspace> WorkoutSync<W> {
    /// Uses `configured` when given, otherwise provisions a sibling of the
    /// workout table. Aggregation stays off when neither is possible.
    pub async fn prepare_exercise_database(
        &mut self,
        configured: Option<&str>,
    ) -> Result<ExerciseDatabase> {
        if let Some(id) = configured {
            self.exercise_database_id = Some(id.to_string());
            return Ok(ExerciseDatabase::Configured(id.to_string()));
        }

        let parent = self
            .workspace
            .parent_page(&self.database_id)
            .await
            .context("Failed to inspect workout database parent")?;

        let Some(parent_page_id) = parent else {
            warn!("Workout database parent is not a page, exercise progress disabled");
            self.exercise_database_id = None;
            return Ok(ExerciseDatabase::Unavailable);
        };

        let id = self
            .workspace
            .create_database(&parent_page_id, EXERCISE_DATABASE_TITLE, exercise_database_schema())
            .await
            .context("Failed to create exercise progress database")?;

        info!("Created exercise progress database {}", id);
        self.exercise_database_id = Some(id.clone());
        Ok(ExerciseDatabase::Created(id))
    }

    /// Overwrites one entry per exercise with stats recomputed from `workout`.
    pub(super) async fn sync_exercise_entries(
        &self,
        workout: &WorkoutRecord,
        stats: &mut SyncStats,
    ) -> Result<()> {
        let Some(database_id) = self.exercise_database_id.as_deref() else {
            return Ok(());
        };

        let (start, _) = workout.window(self.timezone)?;
        let date_only = start.format("%Y-%m-%d").to_string();
        let date_iso = start.to_rfc3339();

        for group in group_exercises(&workout.exercises) {
            let Some(summary) = ExerciseSummary::from_group(&group) else {
                continue;
            };
            let properties = summary.properties(&date_iso, &workout.name);

            let existing = self
                .workspace
                .find_exercise_entry(database_id, &summary.exercise, &date_only)
                .await
                .with_context(|| format!("Failed to look up entry for {}", summary.exercise))?;

            match existing {
                Some(entry_id) => {
                    self.workspace
                        .update_page(&entry_id, properties)
                        .await
                        .with_context(|| format!("Failed to update entry for {}", summary.exercise))?;
                    stats.entries_updated += 1;
                }
                None => {
                    self.workspace
                        .create_page(database_id, properties)
                        .await
                        .with_context(|| format!("Failed to create entry for {}", summary.exercise))?;
                    stats.entries_created += 1;
                }
            }
        }

        Ok(())
    }
}
