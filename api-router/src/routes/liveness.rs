use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Answers 200 while the process is up, without touching Google Cloud.
pub async fn live() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
