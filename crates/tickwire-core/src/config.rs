//! Configuration parsing for the Tickwire adapter.
//!
//! All settings come from a single JSON config file. The top-level structure
//! holds logging metadata and a `connections` array where each entry
//! describes one exchange adapter instance.
//!
//! # Example config
//!
//! ```json
//! {
//!   "log": { "level": "info", "dir": "/var/log/tickwire" },
//!   "connections": [{
//!     "exchange": "poloniex",
//!     "address": "wss://api.poloniex.com",
//!     "ticker_topic": "ticker",
//!     "instruments": ["BTC_ETH", "BTC_XMR"],
//!     "start_timeout_ms": 5000,
//!     "reconnect": { "initial_delay_ms": 100, "max_delay_ms": 30000 }
//!   }]
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::FeedError;
use crate::types::CurrencyPair;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Logging settings.
    pub log: Option<LogConfig>,

    /// One entry per exchange adapter instance.
    pub connections: Vec<ConnectionConfig>,
}

/// Logging settings block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    pub level: Option<String>,
    pub dir: Option<String>,
}

/// Configuration for a single adapter instance.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Upstream exchange identifier (e.g. `"poloniex"`). Fixed for the
    /// lifetime of the adapter instance.
    pub exchange: String,

    /// Service address the transport connects to.
    pub address: String,

    /// Name of the ticker topic on the pub/sub service.
    pub ticker_topic: Option<String>,

    /// Recognized instrument universe, in wire form (`"BTC_ETH"`). Ticks for
    /// pairs outside this set are skipped.
    pub instruments: Vec<String>,

    /// Upper bound on how long `start()` blocks waiting for the session.
    pub start_timeout_ms: Option<u64>,

    /// Reconnect backoff parameters.
    pub reconnect: Option<ReconnectConfig>,
}

/// Backoff parameters for automatic session recovery.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconnectConfig {
    pub initial_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
}

impl ConnectionConfig {
    pub const DEFAULT_TICKER_TOPIC: &'static str = "ticker";

    pub fn ticker_topic(&self) -> &str {
        self.ticker_topic.as_deref().unwrap_or(Self::DEFAULT_TICKER_TOPIC)
    }

    pub fn start_timeout(&self) -> Duration {
        Duration::from_millis(self.start_timeout_ms.unwrap_or(5_000))
    }

    /// Parse the configured instrument universe, rejecting malformed entries.
    pub fn parsed_instruments(&self) -> Result<Vec<CurrencyPair>, FeedError> {
        self.instruments
            .iter()
            .map(|s| {
                CurrencyPair::parse(s)
                    .map_err(|e| FeedError::Config(format!("bad instrument `{s}`: {e}")))
            })
            .collect()
    }
}

impl ReconnectConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms.unwrap_or(100))
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms.unwrap_or(30_000))
    }
}

/// Load and parse a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
