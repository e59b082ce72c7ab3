//! Expiring price cache shared by the cache writer and the detector.
//!
//! This module handles:
//! - The store interface and its entry type
//! - An in-process TTL store
//! - The cache writer that stores direct and inverse quotes per tick

pub mod memory;
pub mod writer;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::CacheError;
use crate::market::{PairSymbol, Side, Tick};

pub use memory::MemoryPriceCache;
pub use writer::{CacheWriter, CacheWriterReport, WriteOutcome};

/// Cached quote for one symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheEntry {
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// Tick arrival time in unix seconds.
    pub timestamp: i64,
}

impl CacheEntry {
    /// Price for one side.
    pub fn price(&self, side: Side) -> f64 {
        match side {
            Side::Bid => self.bid,
            Side::Ask => self.ask,
        }
    }
}

impl From<&Tick> for CacheEntry {
    fn from(tick: &Tick) -> Self {
        Self {
            bid: tick.bid,
            ask: tick.ask,
            timestamp: tick.timestamp,
        }
    }
}

/// Key-value price store with per-entry expiry.
///
/// Implementations must never return an entry older than its TTL.
#[async_trait]
pub trait PriceCache: Send + Sync {
    /// Store `entry` under `symbol`, replacing any previous value.
    async fn put(&self, symbol: &PairSymbol, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError>;

    /// Live entry for `symbol`, or `None` if missing or expired.
    async fn get(&self, symbol: &str) -> Result<Option<CacheEntry>, CacheError>;
}
