use dotenvy::dotenv;
use std::process::ExitCode;

use claimflow::{config::Config, create_router, open_store, AppState};

#[tokio::main]
async fn main() -> ExitCode {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = match open_store(&config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("Failed to open store: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let app = create_router(AppState::new(store.clone(), &config));
    let addr = config.bind_address();

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            log::error!("Failed to bind {}: {}", addr, e);
            store.close().await;
            return ExitCode::FAILURE;
        }
    };

    log::info!("claimflow listening on http://{}", addr);

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    store.close().await;

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("Server error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
    }
    log::info!("Shutting down");
}
