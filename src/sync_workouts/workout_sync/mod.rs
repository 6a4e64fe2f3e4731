use chrono_tz::Tz;

mod progress;
mod sync;
pub mod workspace;

pub use workspace::Workspace;

pub const EXERCISE_DATABASE_TITLE: &str = "Exercise Progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Rebuilt,
    Skipped,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub created: usize,
    pub rebuilt: usize,
    pub skipped: usize,
    pub entries_created: usize,
    pub entries_updated: usize,
}

impl SyncStats {
    fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Rebuilt => self.rebuilt += 1,
            SyncOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// How the aggregation table was resolved for this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExerciseDatabase {
    Configured(String),
    Created(String),
    Unavailable,
}

pub struct WorkoutSync<W: Workspace> {
    workspace: W,
    database_id: String,
    exercise_database_id: Option<String>,
    timezone: Tz,
    rebuild: bool,
}

impl<W: Workspace> WorkoutSync<W> {
    pub fn new(workspace: W, database_id: &str, timezone: Tz, rebuild: bool) -> Self {
        Self {
            workspace,
            database_id: database_id.to_string(),
            exercise_database_id: None,
            timezone,
            rebuild,
        }
    }
}
