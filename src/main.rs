use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod extractor;
mod video;

pub use error::{Error, Result};

use crate::{extractor::Ytdlp, video::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let addr: SocketAddr = config::LISTEN_ADDR
    .parse()
    .with_context(|| format!("invalid LISTEN_ADDR: {}", *config::LISTEN_ADDR))?;

  let state = AppState {
    extractor: Arc::new(Ytdlp::new()),
  };

  info!("Listening on {}", addr);

  axum::Server::try_bind(&addr)
    .with_context(|| format!("failed to bind {addr}"))?
    .serve(router(state).into_make_service())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(homepage))
    .route("/health", get(health))
    .route("/api/video/info", get(video::get_video_info))
    .route("/api/video/download", get(video::download_video))
    .with_state(state)
}

async fn homepage() -> impl IntoResponse {
  Json(json!({
    "message": "Welcome to the YouTube Video Download Microservice!"
  }))
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!("failed to listen for shutdown signal: {}", e);
    std::future::pending::<()>().await;
  }
  info!("shutting down");
}
