pub mod handlers;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::post,
    Router,
};
use handlers::{create_bucket, process_upload_form};

use crate::html_state::HtmlState;

pub fn router<S>(max_body_bytes: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route(
            "/upload",
            post(process_upload_form).layer(DefaultBodyLimit::max(max_body_bytes)),
        )
        .route("/bucket/create", post(create_bucket))
}
