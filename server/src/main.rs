//! wadev Server - Main Entry Point

use anyhow::{Context, Result};
use tracing::{info, warn};

use wadev_server::{api, config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wadev_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting wadev server"
    );

    // Values a bot needs to talk to this mock
    let platform = &config.platform;
    info!(
        graph_token = %platform.graph_token,
        app_secret = %platform.app_secret,
        phone_number = %platform.phone_number,
        phone_number_id = %platform.phone_number_id,
        webhook_url = %platform.webhook_url,
        webhook_verify_token = %platform.webhook_verify_token,
        "Platform settings"
    );

    // Build application state
    let state = api::AppState::new(config.clone()).context("Failed to build HTTP client")?;

    if state.store.seed_default_template().await {
        info!("Default template created");
    }

    // Check the webhook endpoint without delaying startup
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.validate_on_startup().await;
    });

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install CTRL+C signal handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, cleaning up...");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("Server shutdown complete");

    Ok(())
}
