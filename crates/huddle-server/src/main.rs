//! # Huddle Server
//!
//! Realtime room-scoped chat broadcast server.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! huddle
//!
//! # Run with a config file in one of the default locations
//! cp huddle.toml /etc/huddle/huddle.toml && huddle
//!
//! # Run with environment variables
//! HUDDLE_PORT=3000 HUDDLE_HOST=0.0.0.0 HUDDLE_CLIENT__MAILBOX_CAPACITY=32 huddle
//! ```

use anyhow::Result;
use huddle_server::{handlers, metrics, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "huddle=debug,huddle_server=debug,huddle_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;

    tracing::info!("Starting Huddle server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
