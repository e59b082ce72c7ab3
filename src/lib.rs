//! Live best-bid/ask ingestion and triangular arbitrage detection.
//!
//! Quotes for many pairs are streamed over chunked websocket connections,
//! relayed through a bounded queue to a broker, and written by a consumer
//! into a short-lived price cache together with a synthesized inverse quote.
//! A polling detector reads that cache for every precomputed currency cycle:
//!
//! ```text
//! p1 = start·middle   p2 = middle·end   p3 = start·end
//!
//! ask(p1) * ask(p2) / ask(p3) < 1   -> opportunity
//! bid(p1) * bid(p2) / bid(p3) > 1   -> opportunity
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`market`]: Currencies, pair symbols, universe discovery, inverses
//! - [`feed`]: Stream ingestion, relay queue and publisher
//! - [`broker`]: Broker interface and in-process broker
//! - [`cache`]: Expiring price cache and cache writer
//! - [`arbitrage`]: Path enumeration and detection
//! - [`api`]: HTTP API for health/metrics
//! - [`metrics`]: Prometheus metric names and helpers
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod market;
pub mod metrics;
pub mod utils;

pub use config::Config;
pub use error::{ArbError, Result};
