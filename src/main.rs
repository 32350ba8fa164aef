//! # Chatapp Server
//!
//! Real-time chat backend entry point. Initializes:
//! - Configuration loading
//! - Tracing/logging subsystem
//! - Message store and broadcast bus backends
//! - HTTP/WebSocket server

use anyhow::Result;
use tracing::info;

use chatapp_server::config::Settings;
use chatapp_server::startup::Application;

#[tokio::main]
async fn main() -> Result<()> {
    // Settings come first: they pick the log format
    let settings = Settings::load()?;

    chatapp_server::telemetry::init_tracing(settings.telemetry.log_format);

    info!(
        host = %settings.server.host,
        port = %settings.server.port,
        environment = %settings.environment,
        storage = ?settings.storage.backend,
        bus = ?settings.bus.backend,
        "Configuration loaded"
    );

    let application = Application::build(settings).await?;

    info!("Server ready to accept connections");
    application.run_until_stopped().await?;

    Ok(())
}
