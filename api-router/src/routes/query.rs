use axum::{extract::rejection::JsonRejection, extract::State, Json};
use common::protocol::{QueryRequest, QueryResponse};

use crate::{api_state::ApiState, error::ApiError};

pub async fn query_documents(
    State(state): State<ApiState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.query(request).await?))
}
