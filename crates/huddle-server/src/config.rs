//! Server configuration.
//!
//! Configuration is layered, later sources winning:
//! - Built-in defaults
//! - The first TOML file found in [`CONFIG_PATHS`]
//! - Environment variables (`HUDDLE_PORT`, `HUDDLE_CLIENT__MAILBOX_CAPACITY`, ...)

use anyhow::{bail, Context, Result};
use huddle_core::{ClientConfig, HubConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Locations searched for a configuration file, in order.
pub const CONFIG_PATHS: [&str; 3] = [
    "huddle.toml",
    "/etc/huddle/huddle.toml",
    "~/.config/huddle/huddle.toml",
];

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Hub configuration.
    #[serde(default)]
    pub hub: HubSettings,

    /// Per-connection limits and timers.
    #[serde(default)]
    pub client: ClientSettings,

    /// Cross-origin policy for the HTTP routes.
    #[serde(default)]
    pub cors: CorsConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubSettings {
    /// Capacity of the hub's event queue.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Broadcast a notice to the room when a member joins.
    #[serde(default)]
    pub announce_joins: bool,
}

/// Per-connection configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Outbound mailbox capacity. A member whose mailbox fills is evicted.
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,

    /// Deadline for a single outbound write in milliseconds.
    #[serde(default = "default_write_wait")]
    pub write_wait_ms: u64,

    /// Read idle timeout in milliseconds.
    #[serde(default = "default_pong_wait")]
    pub pong_wait_ms: u64,

    /// Keepalive ping interval in milliseconds.
    #[serde(default = "default_ping_period")]
    pub ping_period_ms: u64,

    /// Largest accepted inbound frame in bytes.
    #[serde(default = "default_max_message_size")]
    pub max_message_size: usize,
}

/// CORS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    /// Origins allowed to call the HTTP routes. `"*"` allows any origin.
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_true() -> bool {
    true
}

fn default_event_capacity() -> usize {
    1024
}

fn default_mailbox_capacity() -> usize {
    10
}

fn default_write_wait() -> u64 {
    10_000 // 10 seconds
}

fn default_pong_wait() -> u64 {
    60_000 // 60 seconds
}

fn default_ping_period() -> u64 {
    default_pong_wait() * 9 / 10
}

fn default_max_message_size() -> usize {
    huddle_protocol::DEFAULT_MAX_MESSAGE_SIZE
}

fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:5173".to_string()]
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            hub: HubSettings::default(),
            client: ClientSettings::default(),
            cors: CorsConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            announce_joins: false,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            mailbox_capacity: default_mailbox_capacity(),
            write_wait_ms: default_write_wait(),
            pong_wait_ms: default_pong_wait(),
            ping_period_ms: default_ping_period(),
            max_message_size: default_max_message_size(),
        }
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from the first file in [`CONFIG_PATHS`], then
    /// apply `HUDDLE_*` environment overrides.
    ///
    /// Nested keys use a double underscore: `HUDDLE_HUB__EVENT_CAPACITY`.
    ///
    /// # Errors
    ///
    /// Returns an error if a source cannot be parsed or the result is invalid.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder();

        for path in &CONFIG_PATHS {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                tracing::debug!(path = %expanded, "Loading config file");
                builder = builder.add_source(config::File::new(
                    expanded.as_ref(),
                    config::FileFormat::Toml,
                ));
                break;
            }
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("HUDDLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to assemble configuration")?;

        let config: Config = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML or fails validation.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let client = &self.client;
        if self.hub.event_capacity == 0 {
            bail!("hub.event_capacity must be greater than zero");
        }
        if client.mailbox_capacity == 0 {
            bail!("client.mailbox_capacity must be greater than zero");
        }
        if client.max_message_size == 0 {
            bail!("client.max_message_size must be greater than zero");
        }
        if client.write_wait_ms == 0 || client.ping_period_ms == 0 {
            bail!("client.write_wait_ms and client.ping_period_ms must be greater than zero");
        }
        if client.ping_period_ms >= client.pong_wait_ms {
            bail!(
                "client.ping_period_ms ({}) must be shorter than client.pong_wait_ms ({})",
                client.ping_period_ms,
                client.pong_wait_ms
            );
        }
        Ok(())
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if `host:port` is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Hub settings in the form the core expects.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            event_capacity: self.hub.event_capacity,
            announce_joins: self.hub.announce_joins,
        }
    }

    /// Per-connection settings in the form the core expects.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            mailbox_capacity: self.client.mailbox_capacity,
            write_wait: Duration::from_millis(self.client.write_wait_ms),
            pong_wait: Duration::from_millis(self.client.pong_wait_ms),
            ping_period: Duration::from_millis(self.client.ping_period_ms),
            max_message_size: self.client.max_message_size,
        }
    }
}
