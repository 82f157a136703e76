use axum::{extract::State, response::IntoResponse};
use common::storage::types::document::DocumentKind;
use serde::Serialize;

use crate::{
    html_state::HtmlState,
    middlewares::response_middleware::{HtmlError, TemplateResponse},
    routes::{ingestion::handlers::UploadPageData, Sidebar},
};

pub async fn index_handler(State(state): State<HtmlState>) -> Result<impl IntoResponse, HtmlError> {
    let sidebar = Sidebar::load(&state).await;

    Ok(TemplateResponse::new_template(
        "index/index.html",
        UploadPageData::new(&state, sidebar),
    ))
}

#[derive(Serialize)]
struct SupportedType {
    label: &'static str,
    extension: &'static str,
    best_for: &'static str,
}

#[derive(Serialize)]
struct SettingsPageData {
    sidebar: Sidebar,
    supported_types: Vec<SupportedType>,
    chunk_size: u32,
    chunk_overlap: u32,
    top_k: u32,
    distance_threshold: f64,
}

const fn best_for(kind: DocumentKind) -> &'static str {
    match kind {
        DocumentKind::Pdf => "Research papers, reports, manuals",
        DocumentKind::Docx => "Business documents, proposals",
        DocumentKind::Txt => "Plain text content",
        DocumentKind::Md => "Documentation, notes",
    }
}

pub async fn settings_handler(
    State(state): State<HtmlState>,
) -> Result<impl IntoResponse, HtmlError> {
    let sidebar = Sidebar::load(&state).await;

    Ok(TemplateResponse::new_template(
        "settings/settings.html",
        SettingsPageData {
            sidebar,
            supported_types: DocumentKind::ALL
                .into_iter()
                .map(|kind| SupportedType {
                    label: kind.label(),
                    extension: kind.extension(),
                    best_for: best_for(kind),
                })
                .collect(),
            chunk_size: state.config.chunk_size,
            chunk_overlap: state.config.chunk_overlap,
            top_k: state.config.top_k,
            distance_threshold: state.config.distance_threshold,
        },
    ))
}
