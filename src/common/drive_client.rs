use crate::common::jwt::{AssertionClaims, sign_assertion};
use crate::common::types::{CommonError, CommonResult};
use chrono::{DateTime, Utc};
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

const ENDPOINT: &str = "https://www.googleapis.com";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The subset of a service account key file needed for the token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub private_key_id: Option<String>,
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_json(json: &str) -> CommonResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            CommonError::Configuration(format!("Invalid service account credentials: {e}"))
        })
    }
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    assertion: &'a str,
}

#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub modified_time: DateTime<Utc>,
}

#[derive(Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

pub struct DriveClient {
    client: ClientWithMiddleware,
    endpoint: String,
    auth_header: Option<String>,
}

impl DriveClient {
    pub fn new(max_retries: u32) -> Self {
        Self::with_endpoint(ENDPOINT, max_retries)
    }

    pub fn with_endpoint(endpoint: &str, max_retries: u32) -> Self {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
        let client = ClientBuilder::new(reqwest::Client::new())
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            auth_header: None,
        }
    }

    pub fn set_access_token(&mut self, access_token: &str) {
        self.auth_header = Some(format!("Bearer {access_token}"));
    }

    /// Exchanges a signed service account assertion for a read-only access token.
    pub async fn authorize(&mut self, key: &ServiceAccountKey) -> CommonResult<()> {
        let token_uri = key.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI);
        let claims = AssertionClaims::new(
            &key.client_email,
            DRIVE_READONLY_SCOPE,
            token_uri,
            Utc::now().timestamp(),
        );
        let assertion = sign_assertion(&claims, &key.private_key, key.private_key_id.as_deref())?;

        let response = self
            .client
            .post(token_uri)
            .form(&TokenRequest {
                grant_type: JWT_BEARER_GRANT,
                assertion: &assertion,
            })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CommonError::Authentication(format!(
                "Token exchange failed with status {status}: {body}"
            )));
        }

        let token: TokenResponse = serde_json::from_str(&body)?;
        debug!("Obtained access token valid for {:?}s", token.expires_in);
        self.set_access_token(&token.access_token);
        Ok(())
    }

    /// Newest non-trashed file in `folder_id` whose name contains `marker`.
    pub async fn latest_file(&self, folder_id: &str, marker: &str) -> CommonResult<Option<DriveFile>> {
        let auth_header = self.auth_header()?;
        let query = format!(
            "'{}' in parents and name contains '{}' and trashed=false",
            escape_query(folder_id),
            escape_query(marker)
        );

        let response = self
            .client
            .get(format!("{}/drive/v3/files", self.endpoint))
            .header("Authorization", auth_header)
            .query(&[
                ("q", query.as_str()),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", "10"),
                ("fields", "files(id, name, modifiedTime)"),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(CommonError::Http {
                status,
                message: body,
            });
        }

        let list: FileList = serde_json::from_str(&body)?;
        Ok(list.files.into_iter().max_by_key(|file| file.modified_time))
    }

    /// Streams the file contents to `output_path`, returning the byte count.
    pub async fn download(&self, file_id: &str, output_path: &Path) -> CommonResult<u64> {
        let auth_header = self.auth_header()?;

        let mut response = self
            .client
            .get(format!("{}/drive/v3/files/{file_id}", self.endpoint))
            .header("Authorization", auth_header)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CommonError::Http { status, message });
        }

        let mut file = tokio::fs::File::create(output_path).await?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        info!("Wrote {} bytes to {}", written, output_path.display());
        Ok(written)
    }

    fn auth_header(&self) -> CommonResult<&str> {
        self.auth_header
            .as_deref()
            .ok_or_else(|| CommonError::Authentication("No access token set".to_string()))
    }
}

fn escape_query(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
