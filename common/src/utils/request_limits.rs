use super::config::AppConfig;
use crate::storage::types::document::DocumentKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestValidationError {
    PayloadTooLarge(String),
    BadRequest(String),
}

impl RequestValidationError {
    pub fn message(&self) -> &str {
        match self {
            Self::PayloadTooLarge(msg) | Self::BadRequest(msg) => msg,
        }
    }
}

/// Checks the shape of an upload request before anything is sent anywhere.
pub fn validate_upload_request(
    config: &AppConfig,
    file_count: usize,
    chunk_size: u32,
    chunk_overlap: u32,
) -> Result<(), RequestValidationError> {
    if file_count == 0 {
        return Err(RequestValidationError::BadRequest(
            "At least one file is required".to_string(),
        ));
    }

    if file_count > config.upload_max_files {
        return Err(RequestValidationError::BadRequest(format!(
            "Too many files. Maximum allowed is {}",
            config.upload_max_files
        )));
    }

    if chunk_size == 0 {
        return Err(RequestValidationError::BadRequest(
            "chunk_size must be greater than 0".to_string(),
        ));
    }

    if chunk_overlap >= chunk_size {
        return Err(RequestValidationError::BadRequest(format!(
            "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
        )));
    }

    Ok(())
}

/// Validates one uploaded file and resolves its kind from the extension.
pub fn validate_upload_file(
    config: &AppConfig,
    file_name: &str,
    size: usize,
) -> Result<DocumentKind, RequestValidationError> {
    let kind = DocumentKind::from_file_name(file_name).ok_or_else(|| {
        let ext = file_name
            .rsplit_once('.')
            .map_or_else(|| "(none)".to_string(), |(_, ext)| format!(".{ext}"));
        RequestValidationError::BadRequest(format!(
            "Unsupported file type: {ext}. Supported types: {}",
            DocumentKind::supported_list()
        ))
    })?;

    if size == 0 {
        return Err(RequestValidationError::BadRequest(format!(
            "File {file_name} is empty"
        )));
    }

    if size > config.upload_max_file_bytes {
        return Err(RequestValidationError::PayloadTooLarge(format!(
            "File {file_name} is too large. Maximum allowed is {} bytes",
            config.upload_max_file_bytes
        )));
    }

    Ok(kind)
}

/// Retrieval parameters after validation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub top_k: u32,
    pub distance_threshold: f64,
}

pub fn validate_query(
    query: &str,
    top_k: i64,
    distance_threshold: f64,
) -> Result<RetrievalParams, RequestValidationError> {
    if query.trim().is_empty() {
        return Err(RequestValidationError::BadRequest(
            "Query must not be empty".to_string(),
        ));
    }

    if top_k < 1 {
        return Err(RequestValidationError::BadRequest(format!(
            "top_k must be at least 1, got {top_k}"
        )));
    }
    let top_k = u32::try_from(top_k).map_err(|_| {
        RequestValidationError::BadRequest(format!(
            "top_k must be at most {}, got {top_k}",
            u32::MAX
        ))
    })?;

    if !distance_threshold.is_finite() || distance_threshold < 0.0 {
        return Err(RequestValidationError::BadRequest(format!(
            "distance_threshold must be a non-negative number, got {distance_threshold}"
        )));
    }

    Ok(RetrievalParams {
        top_k,
        distance_threshold,
    })
}
