use std::env;
use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;

use campus_backend::core::config::access::{config_str, config_u64};
use campus_backend::core::config::AppPaths;
use campus_backend::server;
use campus_backend::state::AppState;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let paths = Arc::new(AppPaths::new());
    campus_backend::core::logging::init(&paths);

    let (state, jobs) = AppState::initialize(paths).await?;
    let _worker = state.rag.spawn_worker(jobs);
    state.rag.schedule_startup_rebuild();

    let config = state.config.load_config()?;
    let host = config_str(&config, &["server", "host"]).unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|val| val.parse::<u16>().ok())
        .or_else(|| config_u64(&config, &["server", "port"]).and_then(|p| u16::try_from(p).ok()))
        .unwrap_or(DEFAULT_PORT);
    let bind_addr = format!("{}:{}", host, port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_addr))?;
    let addr = listener.local_addr()?;
    tracing::info!("Listening on {}", addr);

    let app: Router = server::router::router(state.clone());
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
