use std::{path::PathBuf, sync::Arc};

use ::gcp_auth::{CustomServiceAccount, TokenProvider as GoogleTokenProvider};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{error::AppError, utils::config::AppConfig};

const CLOUD_PLATFORM_SCOPES: &[&str] = &["https://www.googleapis.com/auth/cloud-platform"];

pub const CREDENTIALS_HINT: &str = "Set PROJECT_ID and configure Google Cloud credentials \
(point GOOGLE_APPLICATION_CREDENTIALS at a service account key, run \
`gcloud auth application-default login`, or set GCP_ACCESS_TOKEN).";

fn credentials_error() -> AppError {
    AppError::Credentials(CREDENTIALS_HINT.to_string())
}

#[derive(Clone, Debug)]
pub enum TokenSource {
    /// A bearer token handed in through configuration. Never refreshed.
    Static(String),
    /// A service account key file.
    KeyFile(PathBuf),
    /// Application default credentials: `GOOGLE_APPLICATION_CREDENTIALS`, the
    /// gcloud ADC file, the metadata server, then the gcloud CLI.
    Auto,
}

/// Hands out OAuth bearer tokens for Google REST APIs.
///
/// The underlying credential is resolved once and reused; it caches tokens
/// until shortly before they expire.
#[derive(Clone)]
pub struct TokenProvider {
    source: TokenSource,
    resolved: Arc<Mutex<Option<Arc<dyn GoogleTokenProvider>>>>,
}

impl TokenProvider {
    pub fn new(source: TokenSource) -> Self {
        Self {
            source,
            resolved: Arc::new(Mutex::new(None)),
        }
    }

    /// `GCP_ACCESS_TOKEN` wins, then `GOOGLE_APPLICATION_CREDENTIALS`, then
    /// the default chain.
    pub fn from_config(config: &AppConfig) -> Self {
        let non_empty = |value: Option<&str>| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let source = if let Some(token) = non_empty(config.gcp_access_token.as_deref()) {
            TokenSource::Static(token)
        } else if let Some(path) = non_empty(config.google_application_credentials.as_deref()) {
            TokenSource::KeyFile(PathBuf::from(path))
        } else {
            TokenSource::Auto
        };
        Self::new(source)
    }

    pub const fn source(&self) -> &TokenSource {
        &self.source
    }

    pub async fn access_token(&self) -> Result<String, AppError> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        let provider = self.resolve().await?;
        let token = provider.token(CLOUD_PLATFORM_SCOPES).await.map_err(|e| {
            warn!("Could not obtain a Google access token: {}", e);
            credentials_error()
        })?;
        Ok(token.as_str().to_string())
    }

    /// Drops the resolved credential so the next call starts over with an
    /// empty token cache.
    pub async fn invalidate(&self) {
        self.resolved.lock().await.take();
    }

    async fn resolve(&self) -> Result<Arc<dyn GoogleTokenProvider>, AppError> {
        let mut resolved = self.resolved.lock().await;
        if let Some(provider) = resolved.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let provider: Arc<dyn GoogleTokenProvider> = match &self.source {
            TokenSource::KeyFile(path) => {
                let account = CustomServiceAccount::from_file(path).map_err(|e| {
                    warn!(path = %path.display(), "Could not load service account key: {}", e);
                    credentials_error()
                })?;
                debug!(path = %path.display(), "Using service account key file");
                Arc::new(account)
            }
            TokenSource::Auto => ::gcp_auth::provider().await.map_err(|e| {
                warn!("No Google Cloud credentials available: {}", e);
                credentials_error()
            })?,
            TokenSource::Static(_) => {
                return Err(AppError::InternalError(
                    "static tokens are not resolved through a credential".to_string(),
                ))
            }
        };

        *resolved = Some(Arc::clone(&provider));
        Ok(provider)
    }
}
