use tracing_subscriber::filter::EnvFilter;

use strong_notion_sync::common::config::DriveConfig;
use strong_notion_sync::common::drive_client::{DriveClient, ServiceAccountKey};

const EXPORT_MARKER: &str = ".csv";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Downloads the newest export in the configured folder. `Ok(false)` when
/// the folder holds no export.
async fn download_latest_export(config: &DriveConfig) -> anyhow::Result<bool> {
    let key = ServiceAccountKey::from_json(&config.credentials.load()?)?;

    let mut client = DriveClient::new(config.max_retries);
    client.authorize(&key).await?;

    let Some(latest) = client.latest_file(&config.folder_id, EXPORT_MARKER).await? else {
        return Ok(false);
    };

    println!(
        "Downloading: {} (modified: {})",
        latest.name,
        latest.modified_time.to_rfc3339()
    );
    client.download(&latest.id, &config.output_path).await?;
    println!("Saved to: {}", config.output_path.display());

    Ok(true)
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    init_tracing();

    let config = match DriveConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    match download_latest_export(&config).await {
        Ok(true) => {}
        Ok(false) => {
            eprintln!("No CSV files found in the Google Drive folder");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
