use thiserror::Error;
use tokio::task::JoinError;

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Storage error: {0}")]
    Storage(#[from] object_store::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    /// Missing project id or Google credentials.
    #[error("Credentials error: {0}")]
    Credentials(String),
    /// The managed RAG, model or storage API answered with a failure.
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Internal service error: {0}")]
    InternalError(String),
}

impl AppError {
    /// Whether the failure happened on the other side of a network call.
    pub const fn is_upstream(&self) -> bool {
        matches!(self, Self::Upstream(_) | Self::Storage(_) | Self::Reqwest(_))
    }
}
