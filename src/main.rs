//! Push-up counter server: receives base64-encoded camera frames over HTTP,
//! runs pose estimation, and keeps a running repetition count.

use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pushup_tracker::config::Config;
use pushup_tracker::counter::RepCounter;
use pushup_tracker::pose::PoseEstimator;
use pushup_tracker::server::{self, AppState};

const CONFIG_PATH: &str = "pushup_server.toml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| CONFIG_PATH.to_string());
    let config = if Path::new(&config_path).exists() {
        Config::load(&config_path).with_context(|| format!("failed to load {config_path}"))?
    } else {
        info!("{config_path} not found, using defaults");
        Config::default()
    };

    info!(version = env!("GIT_VERSION"), "push-up counter server starting");

    let estimator = build_estimator(&config)?;
    let counter = RepCounter::new(config.counter.to_counter_config());
    let state = Arc::new(AppState {
        counter: Mutex::new(counter),
        estimator: Mutex::new(estimator),
        visibility_threshold: config.server.visibility_threshold,
    });

    let app = server::router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

#[cfg(feature = "onnx")]
fn build_estimator(config: &Config) -> Result<Box<dyn PoseEstimator>> {
    use pushup_tracker::pose::MoveNetEstimator;

    info!(model = %config.server.model_path, "loading MoveNet model");
    let estimator = MoveNetEstimator::new(&config.server.model_path)?;
    Ok(Box::new(estimator))
}

#[cfg(not(feature = "onnx"))]
fn build_estimator(_config: &Config) -> Result<Box<dyn PoseEstimator>> {
    anyhow::bail!(
        "no pose estimation backend compiled in; rebuild with `--features onnx` \
         and point model_path at a MoveNet ONNX file"
    )
}
