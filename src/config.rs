//! Hub configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), with defaults for everything.
//!
//! | Variable               | Default                  |
//! |------------------------|--------------------------|
//! | `LISTEN_ADDR`          | `0.0.0.0:3000`           |
//! | `WS_OUTBOUND_CAPACITY` | `256`                    |
//! | `HUB_INTAKE_CAPACITY`  | `1024`                   |
//! | `BUS_CAPACITY`         | `1024`                   |
//! | `BRIDGE_CHANNELS`      | `disaster:create_report` |
//! | `LOG_JSON`             | `false`                  |
//! | `REDIS_URL`            | unset (in-process bus)   |

use std::net::SocketAddr;

use crate::service::disaster::CREATE_REPORT;

/// Top-level hub configuration.
///
/// Loaded once at startup via [`HubConfig::from_env`].
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Socket address to bind the HTTP server to (e.g. `0.0.0.0:3000`).
    pub listen_addr: SocketAddr,

    /// Capacity of each connection's outbound queue.
    pub outbound_capacity: usize,

    /// Capacity of the hub's intake queue.
    pub intake_capacity: usize,

    /// Capacity of the in-process message bus.
    pub bus_capacity: usize,

    /// Bus channels relayed to every client.
    pub bridge_channels: Vec<String>,

    /// Emit logs as JSON lines instead of human-readable text.
    pub log_json: bool,

    /// Redis server to relay from. `None` runs the in-process bus.
    pub redis_url: Option<String>,
}

impl HubConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, std::net::AddrParseError> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string())
            .parse()?;

        let bridge_channels = std::env::var("BRIDGE_CHANNELS")
            .map(|raw| parse_channels(&raw))
            .unwrap_or_else(|_| vec![CREATE_REPORT.to_string()]);

        Ok(Self {
            listen_addr,
            outbound_capacity: parse_env("WS_OUTBOUND_CAPACITY", 256),
            intake_capacity: parse_env("HUB_INTAKE_CAPACITY", 1024),
            bus_capacity: parse_env("BUS_CAPACITY", 1024),
            bridge_channels,
            log_json: parse_env_bool("LOG_JSON", false),
            redis_url: std::env::var("REDIS_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
        })
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            outbound_capacity: 256,
            intake_capacity: 1024,
            bus_capacity: 1024,
            bridge_channels: vec![CREATE_REPORT.to_string()],
            log_json: false,
            redis_url: None,
        }
    }
}

/// Splits a comma-separated channel list, dropping blanks.
fn parse_channels(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
