use anyhow::Context;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use tenant_todo_api::config::AppConfig;
use tenant_todo_api::database::DatabaseManager;
use tenant_todo_api::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,tower_http=info")),
        )
        .init();

    let config = AppConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        environment = ?config.environment,
        backend = ?config.database.backend,
        main_domain = %config.server.main_domain,
        "Starting tenant to-do API"
    );

    let store = DatabaseManager::open_store(&config.database)
        .await
        .context("failed to open store")?;
    let port = config.server.port;
    let state = AppState::new(config, store.clone()).context("failed to build application state")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    tracing::info!("shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
