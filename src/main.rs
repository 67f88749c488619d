//! Lesson Author · authoring service
//!
//! - Axum HTTP API hosting in-memory lesson editing sessions
//! - Asset uploads forwarded to the configured upload endpoint
//! - Submissions forwarded to the lesson API
//!
//! Important env variables:
//!   PORT                : u16 (default 3000)
//!   AUTHOR_CONFIG_PATH  : path to TOML config (collaborator endpoints, upload limits)
//!   LESSON_API_BASE_URL : lesson/course/remedy API base URL
//!   LESSON_API_TOKEN    : bearer token for the collaborators
//!   UPLOAD_ENDPOINT     : image/PDF upload endpoint
//!   LOG_LEVEL           : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT          : "pretty" (default) or "json"

use std::{net::SocketAddr, sync::Arc};

use tokio::net::TcpListener;
use tracing::info;

use lesson_author::routes::build_router;
use lesson_author::state::{sweep_idle_sessions, AppState};
use lesson_author::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (session store, collaborator clients).
  let state = Arc::new(AppState::from_env()?);
  let addr = SocketAddr::from(([0, 0, 0, 0], state.config.server.port));

  if let Some(max_idle) = state.config.server.session_idle() {
    tokio::spawn(sweep_idle_sessions(state.clone(), max_idle));
  }

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state);

  let listener = TcpListener::bind(addr).await?;
  info!(target: "lesson_author", %addr, "HTTP server listening");
  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!(target: "lesson_author", error = %e, "Failed to listen for shutdown signal");
  }
  info!(target: "lesson_author", "Shutting down");
}
