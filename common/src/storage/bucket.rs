use reqwest::StatusCode;
use serde_json::json;
use tracing::info;

use crate::{
    error::AppError,
    utils::{
        config::AppConfig,
        gcp_auth::{TokenProvider, CREDENTIALS_HINT},
    },
};

const GCS_JSON_API: &str = "https://storage.googleapis.com/storage/v1";

/// Bucket-level calls against the GCS JSON API. Object reads and writes go
/// through `object_store` instead.
#[derive(Clone)]
pub struct GcsBucketAdmin {
    http: reqwest::Client,
    tokens: TokenProvider,
    project_id: Option<String>,
    location: String,
    base_url: String,
}

impl GcsBucketAdmin {
    pub fn new(config: &AppConfig, http: reqwest::Client, tokens: TokenProvider) -> Self {
        Self {
            http,
            tokens,
            project_id: config.project_id().map(String::from),
            location: config.location.clone(),
            base_url: GCS_JSON_API.to_string(),
        }
    }

    pub async fn exists(&self, bucket: &str) -> Result<bool, AppError> {
        let token = self.tokens.access_token().await?;
        let response = self
            .http
            .get(format!("{}/b/{bucket}", self.base_url))
            .bearer_auth(token)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(classify_failure(
                status,
                format!("bucket lookup for {bucket} failed with {status}"),
            )),
        }
    }

    /// Creates the bucket in the configured location. Returns `false` when it
    /// already existed.
    pub async fn create(&self, bucket: &str) -> Result<bool, AppError> {
        let project = self
            .project_id
            .as_deref()
            .ok_or_else(|| AppError::Credentials(CREDENTIALS_HINT.to_string()))?;
        let token = self.tokens.access_token().await?;

        let response = self
            .http
            .post(format!("{}/b", self.base_url))
            .query(&[("project", project)])
            .bearer_auth(token)
            .json(&json!({ "name": bucket, "location": self.location }))
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => {
                info!(bucket, location = %self.location, "Created bucket");
                Ok(true)
            }
            StatusCode::CONFLICT => {
                info!(bucket, "Bucket already exists");
                Ok(false)
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(classify_failure(
                    status,
                    format!("failed to create bucket {bucket} ({status}): {body}"),
                ))
            }
        }
    }
}

/// 401 and 403 mean the credential is missing or lacks access, anything else
/// is a failure on the storage side.
fn classify_failure(status: StatusCode, detail: String) -> AppError {
    match status {
        StatusCode::UNAUTHORIZED => AppError::Credentials(CREDENTIALS_HINT.to_string()),
        StatusCode::FORBIDDEN => {
            AppError::Credentials(format!("Permission denied: {detail}. {CREDENTIALS_HINT}"))
        }
        _ => AppError::Upstream(detail),
    }
}
