use crate::common::types::{CommonError, CommonResult};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;

pub const DEFAULT_EXPORT_PATH: &str = "strong_export.csv";
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Zurich;
pub const DEFAULT_MAX_RETRIES: u32 = 0;

/// Where the storage service account key comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceAccountSource {
    File(PathBuf),
    Inline(String),
}

impl ServiceAccountSource {
    pub fn load(&self) -> CommonResult<String> {
        match self {
            ServiceAccountSource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                CommonError::Configuration(format!(
                    "Failed to read service account file {}: {e}",
                    path.display()
                ))
            }),
            ServiceAccountSource::Inline(json) => Ok(json.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    pub credentials: ServiceAccountSource,
    pub folder_id: String,
    pub output_path: PathBuf,
    pub max_retries: u32,
}

impl DriveConfig {
    pub fn from_env() -> CommonResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> CommonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = non_empty(lookup);

        let credentials = if let Some(path) = lookup("GOOGLE_SERVICE_ACCOUNT_FILE") {
            ServiceAccountSource::File(PathBuf::from(path))
        } else if let Some(json) = lookup("GOOGLE_SERVICE_ACCOUNT_JSON") {
            ServiceAccountSource::Inline(json)
        } else {
            return Err(CommonError::Configuration(
                "Set GOOGLE_SERVICE_ACCOUNT_FILE or GOOGLE_SERVICE_ACCOUNT_JSON".to_string(),
            ));
        };

        let folder_id = lookup("GOOGLE_DRIVE_FOLDER_ID").ok_or_else(|| {
            CommonError::Configuration(
                "GOOGLE_DRIVE_FOLDER_ID environment variable not set".to_string(),
            )
        })?;

        let output_path = lookup("STRONG_CSV_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_PATH));

        Ok(Self {
            credentials,
            folder_id,
            output_path,
            max_retries: parse_retries(lookup("HTTP_MAX_RETRIES"))?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NotionConfig {
    pub token: String,
    pub database_id: String,
    pub exercise_database_id: Option<String>,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub csv_path: PathBuf,
    pub rebuild: bool,
    pub timezone: Tz,
    pub notion: NotionConfig,
}

impl SyncConfig {
    pub fn from_env(csv_arg: Option<PathBuf>, rebuild: bool) -> CommonResult<Self> {
        Self::from_lookup(csv_arg, rebuild, |key| env::var(key).ok())
    }

    /// An explicit `csv_arg` wins over `STRONG_CSV_PATH`.
    pub fn from_lookup<F>(csv_arg: Option<PathBuf>, rebuild: bool, lookup: F) -> CommonResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = non_empty(lookup);

        let csv_path = csv_arg
            .or_else(|| lookup("STRONG_CSV_PATH").map(PathBuf::from))
            .ok_or_else(|| {
                CommonError::Configuration(
                    "Provide CSV path via --csv argument or STRONG_CSV_PATH env var".to_string(),
                )
            })?;

        let (token, database_id) = match (lookup("NOTION_TOKEN"), lookup("NOTION_DB_ID")) {
            (Some(token), Some(database_id)) => (token, database_id),
            _ => {
                return Err(CommonError::Configuration(
                    "NOTION_TOKEN and NOTION_DB_ID environment variables required".to_string(),
                ));
            }
        };

        let timezone = match lookup("STRONG_TIMEZONE") {
            Some(name) => name.parse::<Tz>().map_err(|e| {
                CommonError::Configuration(format!("Invalid STRONG_TIMEZONE '{name}': {e}"))
            })?,
            None => DEFAULT_TIMEZONE,
        };

        Ok(Self {
            csv_path,
            rebuild,
            timezone,
            notion: NotionConfig {
                token,
                database_id,
                exercise_database_id: lookup("NOTION_EXERCISE_DB_ID"),
                max_retries: parse_retries(lookup("HTTP_MAX_RETRIES"))?,
            },
        })
    }
}

fn non_empty<F>(lookup: F) -> impl Fn(&str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    move |key: &str| lookup(key).filter(|value| !value.trim().is_empty())
}

fn parse_retries(value: Option<String>) -> CommonResult<u32> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| {
            CommonError::Configuration(format!("HTTP_MAX_RETRIES must be a number, got '{raw}'"))
        }),
        None => Ok(DEFAULT_MAX_RETRIES),
    }
}
