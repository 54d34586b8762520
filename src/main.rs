use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use pickup_tracker::api;
use pickup_tracker::config::Config;
use pickup_tracker::error::AppError;
use pickup_tracker::simulation;
use pickup_tracker::state::AppState;
use pickup_tracker::store::JsonStore;

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store = JsonStore::open(&config.db_path).await?;
    let locations = simulation::build(config.location_strategy);
    let shared_state = Arc::new(AppState::new(store, locations, config.event_buffer_size));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(
        port = config.port,
        db_path = %config.db_path.display(),
        strategy = %config.location_strategy,
        "mock api server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
