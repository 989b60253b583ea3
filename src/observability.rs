// Tracing initialization and the per-request log line.
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::Environment;
use crate::middleware::AppState;

pub fn init_tracing() {
    init_tracing_with_level("info");
}

pub fn init_tracing_with_level(level: &str) {
    // Prefer RUST_LOG from env, otherwise use provided level string.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

/// Logs `METHOD /path` for each request; silent in the test environment.
pub async fn log_request(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if state.config.environment() != Environment::Test {
        tracing::info!("{} {}", request.method(), request.uri().path());
    }
    next.run(request).await
}
