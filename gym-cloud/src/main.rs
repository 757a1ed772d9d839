//! gym-cloud: member retention service
//!
//! Long-running service that:
//! - Serves the retention dashboard API (JWT authenticated)
//! - Re-evaluates every tenant's members on a fixed interval

use gym_cloud::BoxError;
use gym_cloud::api;
use gym_cloud::config::Config;
use gym_cloud::retention::sweep::spawn_sweep;
use gym_cloud::state::AppState;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gym_cloud=info,tower_http=info".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Starting gym-cloud (env: {})", config.environment);

    // Initialize application state
    let state = AppState::new(&config).await?;

    // Periodic retention sweep
    let shutdown = CancellationToken::new();
    let sweep = match config.sweep_interval {
        Some(every) => Some(spawn_sweep(
            state.store.clone(),
            state.rules.clone(),
            every,
            shutdown.clone(),
        )),
        None => {
            tracing::warn!("Retention sweep disabled (RETENTION_SWEEP_INTERVAL_SECS=0)");
            None
        }
    };

    let app = api::create_router(state);

    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("gym-cloud HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let an in-flight sweep finish its batch
    shutdown.cancel();
    if let Some(handle) = sweep
        && let Err(e) = handle.await
    {
        tracing::error!("Retention sweep task failed: {e}");
    }
    tracing::info!("gym-cloud stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
