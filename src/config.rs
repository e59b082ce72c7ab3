//! Application configuration loaded from environment variables.

use std::num::NonZeroUsize;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ArbError, Result};
use crate::market::PairSymbol;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Exchange Endpoints ===
    /// REST base URL for exchange metadata and 24h tickers.
    #[serde(default = "default_rest_url")]
    pub exchange_rest_url: String,

    /// WebSocket base URL for combined bookTicker streams.
    #[serde(default = "default_ws_url")]
    pub exchange_ws_url: String,

    /// Timeout for metadata requests in milliseconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    // === Ingestion ===
    /// Symbols per streaming connection.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Capacity of the relay queue between stream tasks and the publisher.
    #[serde(default = "default_relay_capacity")]
    pub relay_capacity: usize,

    /// Broker queue the publisher writes to and the cache writer reads from.
    #[serde(default = "default_relay_topic")]
    pub relay_topic: String,

    /// How many of the lowest-volume pairs to stream.
    #[serde(default = "default_symbol_limit")]
    pub symbol_limit: usize,

    /// Comma separated pairs always streamed in addition to the selection.
    #[serde(default = "default_extra_symbols")]
    pub extra_symbols: String,

    // === Cache / Detection ===
    /// Price cache time-to-live in milliseconds.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_ms: u64,

    /// Detector polling interval in milliseconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Precomputed `Start,Middle,End` file. Paths are enumerated when unset.
    #[serde(default)]
    pub paths_file: Option<String>,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Emit logs as JSON lines.
    #[serde(default)]
    pub log_json: bool,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_http_timeout() -> u64 {
    10_000
}

fn default_chunk_size() -> usize {
    10
}

fn default_relay_capacity() -> usize {
    10_000
}

fn default_relay_topic() -> String {
    "market_data".to_string()
}

fn default_symbol_limit() -> usize {
    497
}

fn default_extra_symbols() -> String {
    "BTCUSDT,ETHBTC,BNBUSDT".to_string()
}

fn default_cache_ttl() -> u64 {
    1_000
}

fn default_poll_interval() -> u64 {
    1_000
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange_rest_url: default_rest_url(),
            exchange_ws_url: default_ws_url(),
            http_timeout_ms: default_http_timeout(),
            chunk_size: default_chunk_size(),
            relay_capacity: default_relay_capacity(),
            relay_topic: default_relay_topic(),
            symbol_limit: default_symbol_limit(),
            extra_symbols: default_extra_symbols(),
            cache_ttl_ms: default_cache_ttl(),
            poll_interval_ms: default_poll_interval(),
            paths_file: None,
            port: default_port(),
            rust_log: default_log_level(),
            log_json: false,
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> std::result::Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.chunk_size == 0 {
            return Err("CHUNK_SIZE must be at least 1".to_string());
        }

        if self.relay_capacity == 0 {
            return Err("RELAY_CAPACITY must be at least 1".to_string());
        }

        if self.cache_ttl_ms == 0 {
            return Err("CACHE_TTL_MS must be greater than 0".to_string());
        }

        if self.poll_interval_ms == 0 {
            return Err("POLL_INTERVAL_MS must be greater than 0".to_string());
        }

        if !(self.exchange_ws_url.starts_with("ws://") || self.exchange_ws_url.starts_with("wss://")) {
            return Err("EXCHANGE_WS_URL must start with ws:// or wss://".to_string());
        }

        if self.relay_topic.trim().is_empty() {
            return Err("RELAY_TOPIC must not be empty".to_string());
        }

        Ok(())
    }

    /// Validate, turning a failure into [`ArbError::InvalidConfig`].
    pub fn validated(self) -> Result<Self> {
        self.validate().map_err(ArbError::InvalidConfig)?;
        Ok(self)
    }

    /// Chunk size as a non-zero count.
    pub fn chunk_size(&self) -> Option<NonZeroUsize> {
        NonZeroUsize::new(self.chunk_size)
    }

    /// Price cache time-to-live.
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    /// Detector polling interval.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Metadata request timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Parsed list of pairs that are always streamed.
    pub fn extra_symbols(&self) -> Vec<PairSymbol> {
        self.extra_symbols
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| PairSymbol::new(s.to_uppercase()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 10);
        assert_eq!(config.cache_ttl(), Duration::from_secs(1));
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.relay_topic, "market_data");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_chunk_size() {
        let config = Config {
            chunk_size: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
        assert!(config.chunk_size().is_none());
    }

    #[test]
    fn validate_rejects_http_stream_url() {
        let config = Config {
            exchange_ws_url: "https://stream.binance.com".to_string(),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validated_wraps_error() {
        let config = Config {
            relay_capacity: 0,
            ..Config::default()
        };

        assert!(matches!(config.validated(), Err(ArbError::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_zero_ttl() {
        let config = Config {
            cache_ttl_ms: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn extra_symbols_are_split_and_uppercased() {
        let config = Config {
            extra_symbols: " btcusdt, ETHBTC,,".to_string(),
            ..Config::default()
        };

        let extra: Vec<String> = config
            .extra_symbols()
            .into_iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(extra, vec!["BTCUSDT", "ETHBTC"]);
    }
}
