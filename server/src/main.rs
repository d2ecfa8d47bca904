//! Slack Events Server - Main Entry Point
//!
//! Reference integration: mounts the events endpoint on a small host
//! application and logs the emoji of every `reaction_added` event.

use std::sync::Arc;

use anyhow::Result;
use axum::{routing::get, Router};
use serde_json::Value;
use tracing::{info, warn};

use se_server::config;
use se_server::slack::{ErrorKind, HandlerError, SlackEventManager};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "se_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting Slack Events Server"
    );

    let manager = SlackEventManager::from_config(&config);

    manager
        .on("reaction_added")
        .handle(|payload: Arc<Value>| async move {
            let Some(emoji) = payload["event"]["reaction"].as_str() else {
                return Err(HandlerError::InvalidPayload(
                    "missing `event.reaction`".into(),
                ));
            };
            info!(emoji, "Reaction added");
            Ok(())
        });

    manager
        .on_exception(ErrorKind::InvalidPayload)
        .handle(|error| async move {
            warn!(error = %error, "Dropped malformed event");
            Ok(())
        });

    // Host application the endpoint is mounted onto
    let app = manager.mount(Router::new().route("/health", get(|| async { "ok" })));

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(
        address = %config.bind_address,
        endpoint = %manager.endpoint(),
        "Server listening"
    );

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install CTRL+C signal handler");
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
