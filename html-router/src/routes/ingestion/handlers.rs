use axum::{extract::State, response::IntoResponse};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use common::{error::AppError, protocol::UploadResponse, storage::types::document::DocumentKind};
use futures::future::try_join_all;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{
    backend::{UploadForm, UploadPart},
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::Sidebar,
};

#[derive(Serialize)]
pub struct UploadPageData {
    sidebar: Sidebar,
    accept: String,
    chunk_size: u32,
    chunk_overlap: u32,
    max_files: usize,
    result: Option<UploadResponse>,
    error: Option<String>,
    notice: Option<String>,
}

impl UploadPageData {
    pub fn new(state: &HtmlState, sidebar: Sidebar) -> Self {
        Self {
            sidebar,
            accept: DocumentKind::supported_list().replace(' ', ""),
            chunk_size: state.config.chunk_size,
            chunk_overlap: state.config.chunk_overlap,
            max_files: state.config.upload_max_files,
            result: None,
            error: None,
            notice: None,
        }
    }
}

#[derive(Debug, TryFromMultipart)]
pub struct UploadFormParams {
    #[form_data(limit = "unlimited")]
    #[form_data(default)]
    pub files: Vec<FieldData<NamedTempFile>>,
    pub description: Option<String>,
    pub chunk_size: Option<String>,
    pub chunk_overlap: Option<String>,
}

fn parse_number(value: Option<String>) -> Option<u32> {
    value.and_then(|v| v.trim().parse().ok())
}

async fn read_part(field: FieldData<NamedTempFile>) -> Result<Option<UploadPart>, AppError> {
    // Browsers send an empty, unnamed part when no file was picked.
    let Some(file_name) = field.metadata.file_name.filter(|n| !n.trim().is_empty()) else {
        return Ok(None);
    };
    let data = tokio::fs::read(field.contents.path()).await?;
    Ok(Some(UploadPart { file_name, data }))
}

pub async fn process_upload_form(
    State(state): State<HtmlState>,
    TypedMultipart(input): TypedMultipart<UploadFormParams>,
) -> Result<impl IntoResponse, HtmlError> {
    let files: Vec<UploadPart> = try_join_all(input.files.into_iter().map(read_part))
        .await?
        .into_iter()
        .flatten()
        .collect();

    info!(file_count = files.len(), "Forwarding upload form");

    let form = UploadForm {
        files,
        description: input.description.filter(|d| !d.trim().is_empty()),
        chunk_size: parse_number(input.chunk_size),
        chunk_overlap: parse_number(input.chunk_overlap),
    };
    let outcome = state.backend.upload(form).await;

    let sidebar = Sidebar::load(&state).await;
    let mut page = UploadPageData::new(&state, sidebar);
    match outcome {
        Ok(result) => page.result = Some(result),
        Err(AppError::Validation(msg) | AppError::Credentials(msg) | AppError::Upstream(msg)) => {
            page.error = Some(msg);
        }
        Err(e) => return Err(e.into()),
    }

    Ok(TemplateResponse::new_template("index/index.html", page))
}

pub async fn create_bucket(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let outcome = state.backend.create_bucket().await;

    let sidebar = Sidebar::load(&state).await;
    let mut page = UploadPageData::new(&state, sidebar);
    match outcome {
        Ok(bucket) => page.notice = Some(bucket.message),
        Err(AppError::Credentials(msg) | AppError::Upstream(msg)) => page.error = Some(msg),
        Err(e) => return Err(e.into()),
    }

    Ok(TemplateResponse::new_template("index/index.html", page))
}
