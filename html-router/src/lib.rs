pub mod backend;
pub mod html_state;
pub mod middlewares;
pub mod router_factory;
pub mod routes;
pub mod template_engine;

use axum::{extract::FromRef, Router};
use html_state::HtmlState;
use router_factory::RouterFactory;

/// Html routes
pub fn html_routes<S>(app_state: &HtmlState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    HtmlState: FromRef<S>,
{
    RouterFactory::new(app_state)
        .add_routes(routes::index::router())
        .add_routes(routes::ingestion::router(
            app_state.config.upload_max_body_bytes,
        ))
        .add_routes(routes::query::router())
        .add_routes(routes::library::router())
        .with_public_assets("/assets", "assets/")
        .with_compression()
        .build()
}
