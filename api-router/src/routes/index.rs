use axum::{extract::State, Json};
use common::protocol::{ServiceInfo, StatusResponse};

use crate::api_state::ApiState;

pub async fn service_info() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        message: "Vertex AI RAG API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        description: "Upload documents to Cloud Storage, import them into a Vertex AI RAG corpus and query them with Gemini".to_string(),
        features: [
            "Document upload (PDF, DOCX, TXT, MD)",
            "Vertex AI RAG corpus import",
            "Retrieval-augmented answers",
            "Document management",
        ]
        .into_iter()
        .map(String::from)
        .collect(),
    })
}

pub async fn status(State(state): State<ApiState>) -> Json<StatusResponse> {
    Json(state.status().await)
}
