use crate::strong_export::{ExerciseRow, SetOrder};
use serde::Serialize;
use std::collections::HashMap;

const TABLE_HEADERS: [&str; 3] = ["Set", "Weight (kg)", "Reps"];
const WEIGHT_SIGNIFICANT_DIGITS: i32 = 6;

/// Rows of one exercise within a workout.
#[derive(Debug)]
pub struct ExerciseGroup<'a> {
    pub name: &'a str,
    pub sets: Vec<&'a ExerciseRow>,
    pub notes: Vec<&'a str>,
}

/// Partitions rows by exercise name, keeping first-seen order.
pub fn group_exercises(rows: &[ExerciseRow]) -> Vec<ExerciseGroup<'_>> {
    let mut groups: Vec<ExerciseGroup<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let slot = *index.entry(row.exercise.as_str()).or_insert_with(|| {
            groups.push(ExerciseGroup {
                name: &row.exercise,
                sets: Vec::new(),
                notes: Vec::new(),
            });
            groups.len() - 1
        });

        if row.set_order == SetOrder::Note {
            groups[slot].notes.push(row.notes.as_deref().unwrap_or_default());
        } else {
            groups[slot].sets.push(row);
        }
    }

    groups
}

/// `M:SS` below an hour, `H:MM:SS` from an hour up.
pub fn format_time(total_seconds: f64) -> String {
    let total = total_seconds.max(0.0) as u64;
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Six significant digits with trailing zeros dropped, so converted
/// weights like `102.05828` read `102.058`.
pub fn format_weight(weight: f64) -> String {
    if weight == 0.0 || !weight.is_finite() {
        return weight.to_string();
    }
    let magnitude = weight.abs().log10().floor() as i32;
    let decimals = (WEIGHT_SIGNIFICANT_DIGITS - 1 - magnitude).max(0) as usize;
    let text = format!("{weight:.decimals$}");
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text
    }
}

/// Weight and reps columns for one set.
pub fn format_set(row: &ExerciseRow) -> (String, String) {
    let elapsed = || row.seconds.map(format_time).unwrap_or_default();

    if let Some(distance_m) = row.distance_m {
        (format!("{:.2} km", distance_m / 1000.0), elapsed())
    } else if row.seconds.is_some() && row.weight_kg.is_none() {
        (String::new(), elapsed())
    } else {
        let weight = row.weight_kg.unwrap_or(0.0);
        let weight = if weight == 0.0 {
            "BW".to_string()
        } else {
            format_weight(weight)
        };
        let reps = row.reps_text.clone().unwrap_or_default();
        (weight, reps)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextContent {
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Annotations {
    pub italic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RichText {
    #[serde(rename = "type")]
    kind: &'static str,
    pub text: TextContent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Annotations>,
}

impl RichText {
    pub fn plain(content: &str) -> Self {
        Self {
            kind: "text",
            text: TextContent {
                content: content.to_string(),
            },
            annotations: None,
        }
    }

    pub fn italic(content: &str) -> Self {
        Self {
            annotations: Some(Annotations { italic: true }),
            ..Self::plain(content)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextBody {
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableBody {
    pub table_width: usize,
    pub has_column_header: bool,
    pub has_row_header: bool,
    pub children: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableRowBody {
    pub cells: Vec<Vec<RichText>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmptyBody {}

/// Page content blocks, serialized in the document store's block format.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Block {
    #[serde(rename = "heading_3")]
    Heading3 { heading_3: TextBody },
    #[serde(rename = "paragraph")]
    Paragraph { paragraph: TextBody },
    #[serde(rename = "table")]
    Table { table: TableBody },
    #[serde(rename = "table_row")]
    TableRow { table_row: TableRowBody },
    #[serde(rename = "divider")]
    Divider { divider: EmptyBody },
}

impl Block {
    fn heading(text: &str) -> Self {
        Block::Heading3 {
            heading_3: TextBody {
                rich_text: vec![RichText::plain(text)],
            },
        }
    }

    fn note(text: &str) -> Self {
        Block::Paragraph {
            paragraph: TextBody {
                rich_text: vec![RichText::italic(text)],
            },
        }
    }

    fn table_row<S: AsRef<str>>(cells: &[S]) -> Self {
        Block::TableRow {
            table_row: TableRowBody {
                cells: cells
                    .iter()
                    .map(|cell| vec![RichText::plain(cell.as_ref())])
                    .collect(),
            },
        }
    }

    fn divider() -> Self {
        Block::Divider {
            divider: EmptyBody {},
        }
    }
}

fn sets_table(sets: &[&ExerciseRow]) -> Block {
    let mut rows = Vec::with_capacity(sets.len() + 1);
    rows.push(Block::table_row(&TABLE_HEADERS));

    for set in sets {
        let (weight, reps) = format_set(set);
        rows.push(Block::table_row(&[set.set_order.to_string(), weight, reps]));
    }

    Block::Table {
        table: TableBody {
            table_width: TABLE_HEADERS.len(),
            has_column_header: true,
            has_row_header: false,
            children: rows,
        },
    }
}

/// One heading per exercise, its notes, its sets table, dividers in between.
pub fn build_page_content(rows: &[ExerciseRow]) -> Vec<Block> {
    let groups = group_exercises(rows);
    let mut blocks = Vec::new();

    for (i, group) in groups.iter().enumerate() {
        blocks.push(Block::heading(group.name));
        blocks.extend(group.notes.iter().map(|note| Block::note(note)));

        if !group.sets.is_empty() {
            blocks.push(sets_table(&group.sets));
        }

        if i + 1 < groups.len() {
            blocks.push(Block::divider());
        }
    }

    blocks
}
