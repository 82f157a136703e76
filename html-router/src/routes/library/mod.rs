pub mod handlers;

use axum::{
    extract::FromRef,
    routing::{get, post},
    Router,
};
use handlers::{clear_documents, delete_document, show_library};

use crate::html_state::HtmlState;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new()
        .route("/library", get(show_library))
        .route("/documents/{id}/delete", post(delete_document))
        .route("/clear", post(clear_documents))
}
