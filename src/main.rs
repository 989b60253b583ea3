use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use mailsort_gate::{AppConfig, AppState, MemorySessionStore, SubjectAccountResolver};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    mailsort_gate::observability::init_tracing();

    let config = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        environment = ?config.environment(),
        cookie_policy = ?config.cookie_policy(),
        allowed_origins = ?config.allowed_origins(),
        "Configuration loaded"
    );

    let store = Arc::new(MemorySessionStore::new());
    spawn_purge(store.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port()));
    let state = AppState::new(config, store, SubjectAccountResolver);
    // Category, email and processing routes are mounted by the deployment that owns them.
    let app = mailsort_gate::build_router(state, Router::new());

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn spawn_purge(store: Arc<MemorySessionStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(15 * 60));
        loop {
            interval.tick().await;
            let removed = store.purge_expired();
            if removed > 0 {
                tracing::debug!(removed, "Purged expired sessions");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => tracing::error!(error = %e, "Failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
