use api_router::{api_routes, api_state::ApiState};
use common::utils::config::get_config;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    let config = get_config()?;
    let api_state = ApiState::new(&config).await?;
    let app = api_routes(&api_state).with_state(api_state);

    info!("Starting API listening on 0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
