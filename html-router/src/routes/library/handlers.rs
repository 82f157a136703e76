use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use common::{error::AppError, storage::types::document::DocumentRecord};
use serde::Serialize;
use tracing::info;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::Sidebar,
};

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    pub total_bytes: u64,
    pub indexed: usize,
    pub total: usize,
    pub average_bytes: u64,
}

impl LibraryStats {
    pub fn from_documents(documents: &[DocumentRecord]) -> Self {
        let total_bytes: u64 = documents.iter().map(|d| d.file_size).sum();
        let total = documents.len();

        Self {
            total_bytes,
            indexed: documents.iter().filter(|d| d.corpus_updated).count(),
            total,
            average_bytes: total_bytes
                .checked_div(total as u64)
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize)]
struct LibraryPageData {
    sidebar: Sidebar,
    documents: Vec<DocumentRecord>,
    stats: LibraryStats,
    error: Option<String>,
}

pub async fn show_library(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let (sidebar, listing) = tokio::join!(Sidebar::load(&state), state.backend.documents());

    let (documents, error) = match listing {
        Ok(listing) => (listing.documents, None),
        Err(AppError::Upstream(msg)) => (Vec::new(), Some(msg)),
        Err(e) => return Err(e.into()),
    };

    Ok(TemplateResponse::new_template(
        "library/library.html",
        LibraryPageData {
            sidebar,
            stats: LibraryStats::from_documents(&documents),
            documents,
            error,
        },
    ))
}

pub async fn delete_document(
    State(state): State<HtmlState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HtmlError> {
    let deleted = state.backend.delete_document(&id).await?;
    info!(document = %deleted.deleted_document, "Deleted document from library");

    Ok(TemplateResponse::redirect("/library"))
}

pub async fn clear_documents(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let cleared = state.backend.clear().await?;
    info!(documents_removed = cleared.documents_removed, "Cleared library");

    Ok(TemplateResponse::redirect("/library"))
}
