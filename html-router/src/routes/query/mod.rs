pub mod handlers;

use axum::{extract::FromRef, routing::get, Router};
use handlers::{process_query_form, show_query_page};

use crate::html_state::HtmlState;

pub fn router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    Router::new().route("/query", get(show_query_page).post(process_query_form))
}
