use axum::{extract::State, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use common::protocol::UploadResponse;
use futures::future::try_join_all;
use tempfile::NamedTempFile;

use crate::{
    api_state::ApiState,
    error::ApiError,
    service::{IncomingFile, UploadOptions},
};

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    // Size limits come from config and are checked per file.
    #[form_data(limit = "unlimited")]
    #[form_data(default)]
    pub files: Vec<FieldData<NamedTempFile>>,
    pub description: Option<String>,
    pub chunk_size: Option<u32>,
    pub chunk_overlap: Option<u32>,
}

pub async fn upload_documents(
    State(state): State<ApiState>,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<Json<UploadResponse>, ApiError> {
    let files = try_join_all(input.files.into_iter().map(read_field)).await?;

    let response = state
        .upload_documents(
            files,
            UploadOptions {
                description: input.description,
                chunk_size: input.chunk_size,
                chunk_overlap: input.chunk_overlap,
            },
        )
        .await?;

    Ok(Json(response))
}

async fn read_field(field: FieldData<NamedTempFile>) -> Result<IncomingFile, ApiError> {
    let file_name = field
        .metadata
        .file_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::ValidationError("Every file needs a file name".to_string()))?;

    let data = tokio::fs::read(field.contents.path()).await.map_err(|e| {
        tracing::error!("Could not read uploaded file {}: {}", file_name, e);
        ApiError::InternalError("Failed to read uploaded file".to_string())
    })?;

    Ok(IncomingFile {
        file_name,
        data: Bytes::from(data),
    })
}
