use axum::{extract::State, Json};
use common::protocol::BucketResponse;

use crate::{api_state::ApiState, error::ApiError};

pub async fn create_bucket(State(state): State<ApiState>) -> Result<Json<BucketResponse>, ApiError> {
    Ok(Json(state.ensure_bucket().await?))
}
