use axum::{
    extract::{Path, State},
    Json,
};
use common::protocol::{ClearResponse, CorpusResponse, DeleteResponse, DocumentListResponse};

use crate::{api_state::ApiState, error::ApiError};

pub async fn list_documents(State(state): State<ApiState>) -> Json<DocumentListResponse> {
    let documents = state.registry.list().await;
    Json(DocumentListResponse {
        total_count: documents.len(),
        documents,
    })
}

pub async fn get_corpus(State(state): State<ApiState>) -> Json<CorpusResponse> {
    Json(state.registry.corpus().await.map_or_else(
        || CorpusResponse::Inactive {
            message: "No active corpus".to_string(),
        },
        CorpusResponse::Active,
    ))
}

pub async fn delete_document(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    Ok(Json(state.delete_document(&id).await?))
}

pub async fn clear_documents(State(state): State<ApiState>) -> Json<ClearResponse> {
    Json(state.clear_documents().await)
}
