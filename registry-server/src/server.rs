//! HTTP server setup and service routes.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, State},
    response::Json,
    routing::{delete, get, post},
    Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::AppResult;
use crate::{config::Config, cost, ingest, state::AppState, validation};

/// Headroom on top of the archive limit for base64 expansion and the JSON
/// envelope.
fn body_limit(config: &Config) -> usize {
    config.max_upload_size_bytes() / 3 * 4 + 64 * 1024
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let limit = body_limit(&state.config);
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/package", post(ingest::upload_package))
        .route("/package/{id}", get(ingest::download_package))
        .route("/reset", delete(ingest::reset_registry))
        .route("/package/{id}/cost", get(cost::package_cost))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

/// Resolve `data_dir` to an absolute path, creating it when missing.
fn prepare_data_dir(data_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
    std::fs::canonicalize(data_dir)
        .with_context(|| format!("Failed to resolve data directory {}", data_dir.display()))
}

/// Serve the registry until the process is stopped.
pub async fn run_server(config: Config, host: String, port: u16, data_dir: PathBuf) -> Result<()> {
    info!("Starting package registry server");

    validation::validate_hostname(&host).map_err(|e| {
        error!(host = %host, error = %e, "Invalid host parameter");
        anyhow::anyhow!("Invalid host parameter {host}: {e}")
    })?;

    let abs_data_dir = prepare_data_dir(&data_dir)?;
    info!(data_dir = %abs_data_dir.display(), "Using data directory");

    let server_addr = format!("http://{host}:{port}");
    let state = AppState::from_config(config, abs_data_dir, server_addr)?;
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = format!("{host}:{port}").parse().map_err(|e| {
        error!(host = %host, port = %port, error = %e, "Invalid socket address");
        anyhow::anyhow!("Invalid socket address {host}:{port}: {e}")
    })?;

    let listener = TcpListener::bind(&addr).await.map_err(|e| {
        error!(addr = %addr, error = %e, "Failed to bind to address");
        anyhow::anyhow!("Failed to bind to {host}:{port}: {e}")
    })?;

    println!("✅ Server is running on http://{host}:{port}");
    println!("   Cost:       curl http://localhost:{port}/package/<id>/cost?dependency=true");
    println!("   Health:     curl http://localhost:{port}/health");

    info!("Server listening on {}", addr);
    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server error: {e}")
    })?;

    Ok(())
}

async fn health_handler() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn status_handler(State(state): State<Arc<AppState>>) -> AppResult<Json<Value>> {
    let packages = state.store.list().await?;
    Ok(Json(json!({
        "status": "ok",
        "service": "registry-server",
        "version": env!("CARGO_PKG_VERSION"),
        "server": state.server_addr,
        "data_directory": state.store.data_dir().display().to_string(),
        "packages": packages.len(),
        "upstream": {
            "npm_url": state.config.upstream.npm_url,
            "enabled": state.config.upstream.enabled,
        },
    })))
}
