use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::filter::EnvFilter;

use strong_notion_sync::common::config::SyncConfig;
use strong_notion_sync::common::notion_client::NotionClient;

mod page_content;
mod strong_export;
mod workout_sync;

use crate::workout_sync::{ExerciseDatabase, WorkoutSync};

/// Sync Strong app CSV exports to Notion
#[derive(Parser)]
struct Cli {
    /// Path to Strong CSV export file (defaults to STRONG_CSV_PATH)
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Rebuild page content for existing workouts
    #[arg(long)]
    rebuild: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_current_span(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

async fn run(config: SyncConfig) -> anyhow::Result<()> {
    let client = NotionClient::new(&config.notion.token, config.notion.max_retries);
    let mut sync = WorkoutSync::new(
        client,
        &config.notion.database_id,
        config.timezone,
        config.rebuild,
    );

    match sync
        .prepare_exercise_database(config.notion.exercise_database_id.as_deref())
        .await?
    {
        ExerciseDatabase::Configured(_) => {}
        ExerciseDatabase::Created(id) => {
            println!("\nCreated 'Exercise Progress' database: {id}");
            println!("Add to .env:  NOTION_EXERCISE_DB_ID={id}\n");
        }
        ExerciseDatabase::Unavailable => {
            println!("Cannot auto-create exercise database (activities DB parent is not a page).");
            println!("Create the database manually and set NOTION_EXERCISE_DB_ID in .env");
        }
    }

    let workouts = strong_export::parse_export(&config.csv_path)?;
    println!("Found {} workouts in CSV", workouts.len());

    let stats = sync.sync_workouts(&workouts).await?;

    println!(
        "\nDone: {} created, {} rebuilt, {} skipped",
        stats.created, stats.rebuilt, stats.skipped
    );
    tracing::info!(
        "Exercise progress: {} entries created, {} updated",
        stats.entries_created,
        stats.entries_updated
    );
    Ok(())
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();
    let args = Cli::parse();

    let config = match SyncConfig::from_env(args.csv, args.rebuild) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(config).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
