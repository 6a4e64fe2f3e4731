use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Duration, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

pub const STABLE_ID_PREFIX: &str = "strong-";
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const SET_ORDER_COLUMN: &str = "Set Order";

/// Position label of a row within an exercise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOrder {
    Note,
    RestTimer,
    Set(String),
}

impl From<String> for SetOrder {
    fn from(label: String) -> Self {
        match label.as_str() {
            "Note" => SetOrder::Note,
            "Rest Timer" => SetOrder::RestTimer,
            _ => SetOrder::Set(label),
        }
    }
}

impl fmt::Display for SetOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SetOrder::Note => f.write_str("Note"),
            SetOrder::RestTimer => f.write_str("Rest Timer"),
            SetOrder::Set(label) => f.write_str(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExerciseRow {
    pub exercise: String,
    pub set_order: SetOrder,
    pub weight_kg: Option<f64>,
    pub reps: Option<u32>,
    /// Reps cell as it appears in the export.
    pub reps_text: Option<String>,
    pub distance_m: Option<f64>,
    pub seconds: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorkoutRecord {
    pub date: String,
    pub name: String,
    pub duration_secs: u64,
    pub exercises: Vec<ExerciseRow>,
}

impl WorkoutRecord {
    pub fn stable_id(&self) -> String {
        format!("{STABLE_ID_PREFIX}{}", self.date)
    }

    /// Start and end of the workout in `tz`.
    pub fn window(&self, tz: Tz) -> Result<(DateTime<Tz>, DateTime<Tz>)> {
        let naive = NaiveDateTime::parse_from_str(&self.date, DATE_FORMAT)
            .with_context(|| format!("Invalid workout date '{}'", self.date))?;
        let start = tz
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| anyhow!("Workout date '{}' does not exist in {}", self.date, tz))?;
        let seconds = i64::try_from(self.duration_secs)
            .with_context(|| format!("Duration out of range for '{}'", self.date))?;
        Ok((start, start + Duration::seconds(seconds)))
    }
}

#[derive(Debug, Deserialize)]
struct ExportRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Workout Name")]
    workout_name: String,
    #[serde(rename = "Duration (sec)")]
    duration_secs: u64,
    #[serde(rename = "Exercise Name")]
    exercise_name: String,
    #[serde(rename = "Set Order")]
    set_order: String,
    #[serde(rename = "Weight (kg)", default)]
    weight_kg: Option<f64>,
    #[serde(rename = "Reps", default)]
    reps: Option<String>,
    #[serde(rename = "Distance (meters)", default)]
    distance_m: Option<f64>,
    #[serde(rename = "Seconds", default)]
    seconds: Option<f64>,
    #[serde(rename = "Notes", default)]
    notes: Option<String>,
}

pub fn parse_export(path: &Path) -> Result<Vec<WorkoutRecord>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open export {}", path.display()))?;
    parse_reader(file).with_context(|| format!("Failed to parse export {}", path.display()))
}

/// Groups export rows into workouts keyed by date, in first-seen order.
pub fn parse_reader<R: Read>(reader: R) -> Result<Vec<WorkoutRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b';')
        .quote(b'"')
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let set_order_column = headers
        .iter()
        .position(|name| name == SET_ORDER_COLUMN)
        .ok_or_else(|| anyhow!("Export has no '{SET_ORDER_COLUMN}' column"))?;

    let mut workouts: Vec<WorkoutRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        if record.get(set_order_column) == Some("Rest Timer") {
            continue;
        }

        let row: ExportRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Invalid values on row {}", line + 1))?;
        let set_order = SetOrder::from(row.set_order);

        let reps = row
            .reps
            .as_deref()
            .map(|reps| whole_reps(reps).with_context(|| format!("Invalid reps on row {}", line + 1)))
            .transpose()?;

        let slot = *index.entry(row.date.clone()).or_insert_with(|| {
            workouts.push(WorkoutRecord {
                date: row.date.clone(),
                name: row.workout_name.clone(),
                duration_secs: row.duration_secs,
                exercises: Vec::new(),
            });
            workouts.len() - 1
        });

        workouts[slot].exercises.push(ExerciseRow {
            exercise: row.exercise_name,
            set_order,
            weight_kg: row.weight_kg,
            reps,
            reps_text: row.reps,
            distance_m: row.distance_m,
            seconds: row.seconds,
            notes: row.notes,
        });
    }

    Ok(workouts)
}

fn whole_reps(text: &str) -> Result<u32> {
    let value: f64 = text
        .parse()
        .with_context(|| format!("'{text}' is not a number"))?;
    if value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err(anyhow!("{value} is not a whole repetition count"));
    }
    Ok(value as u32)
}
