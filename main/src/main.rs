use std::future::IntoFuture;

use anyhow::Context;
use api_router::{api_routes, api_state::ApiState};
use axum::Router;
use common::utils::config::get_config;
use html_router::{html_routes, html_state::HtmlState};
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Runs the API and the web UI in one process, each on its own port.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config().context("loading configuration")?;

    let api_state = ApiState::new(&config)
        .await
        .context("building API state")?;
    let html_state = HtmlState::new(config.clone()).context("building UI state")?;

    let (api, ui) = build_apps(api_state, html_state);

    info!("Starting API listening on 0.0.0.0:{}", config.http_port);
    let api_listener = TcpListener::bind(format!("0.0.0.0:{}", config.http_port))
        .await
        .with_context(|| format!("binding API port {}", config.http_port))?;

    info!("Starting UI listening on 0.0.0.0:{}", config.ui_port);
    let ui_listener = TcpListener::bind(format!("0.0.0.0:{}", config.ui_port))
        .await
        .with_context(|| format!("binding UI port {}", config.ui_port))?;

    let result = tokio::try_join!(
        axum::serve(api_listener, api).into_future(),
        axum::serve(ui_listener, ui).into_future(),
    );
    if let Err(e) = &result {
        error!("Server error: {}", e);
    }
    result?;

    Ok(())
}

fn build_apps(api_state: ApiState, html_state: HtmlState) -> (Router, Router) {
    let api = api_routes(&api_state).with_state(api_state);
    let ui = html_routes(&html_state).with_state(html_state);
    (api, ui)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use common::{
        storage::store::StorageManager,
        utils::config::{AppConfig, StorageKind},
    };
    use html_router::backend::BackendClient;
    use tower::ServiceExt;
    use vertex_rag::testing::MockRagEngine;

    use super::*;

    /// UI config pointing at an API listening on `api_addr`.
    fn ui_config_for(config: &AppConfig, api_addr: std::net::SocketAddr) -> AppConfig {
        AppConfig {
            api_base_url: format!("http://{api_addr}"),
            ..config.clone()
        }
    }

    fn smoke_test_config() -> AppConfig {
        AppConfig {
            project_id: Some("smoke-project".into()),
            storage: StorageKind::Memory,
            http_port: 0,
            ui_port: 0,
            ..Default::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn smoke_ui_reaches_live_api() {
        let config = smoke_test_config();
        let api_state = ApiState::with_components(
            &config,
            StorageManager::memory("smoke-bucket"),
            Arc::new(MockRagEngine::new()),
        );

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind api listener");
        let api_addr = listener.local_addr().expect("api address");

        let ui_config = ui_config_for(&config, api_addr);
        let backend = BackendClient::new(&ui_config.api_base_url, reqwest::Client::new());
        let html_state = HtmlState::new_with_resources(ui_config, backend, None);

        let (api, ui) = build_apps(api_state, html_state);

        let live = api
            .clone()
            .oneshot(Request::builder().uri("/live").body(Body::empty()).expect("request"))
            .await
            .expect("live response");
        assert_eq!(live.status(), StatusCode::OK);

        tokio::spawn(async move {
            axum::serve(listener, api).await.ok();
        });

        let response = ui
            .oneshot(Request::builder().uri("/").body(Body::empty()).expect("request"))
            .await
            .expect("ui response");
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let html = String::from_utf8_lossy(&bytes);
        assert!(html.contains("API Connected"));
        assert!(html.contains("smoke-project"));
    }
}
