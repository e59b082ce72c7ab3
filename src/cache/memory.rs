//! In-process TTL price store.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{CacheEntry, PriceCache};
use crate::error::CacheError;
use crate::market::PairSymbol;

#[derive(Debug, Clone, Copy)]
struct Stored {
    entry: CacheEntry,
    expires_at: Instant,
}

impl Stored {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Concurrent map of quotes with per-entry deadlines.
///
/// Expiry is checked on every read, so an entry is absent as soon as its TTL
/// has elapsed whether or not it has been purged yet.
#[derive(Debug, Default)]
pub struct MemoryPriceCache {
    entries: DashMap<PairSymbol, Stored>,
}

impl MemoryPriceCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, stored| stored.is_live(now));
        before - self.entries.len()
    }

    /// Stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl PriceCache for MemoryPriceCache {
    async fn put(&self, symbol: &PairSymbol, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError> {
        let stored = Stored {
            entry,
            expires_at: Instant::now() + ttl,
        };
        self.entries.insert(symbol.clone(), stored);
        Ok(())
    }

    async fn get(&self, symbol: &str) -> Result<Option<CacheEntry>, CacheError> {
        let now = Instant::now();

        // Copy out before touching the map again; holding the read guard
        // across remove_if would deadlock the shard.
        let stored = match self.entries.get(symbol) {
            Some(guard) => *guard,
            None => return Ok(None),
        };

        if stored.is_live(now) {
            return Ok(Some(stored.entry));
        }

        self.entries.remove_if(symbol, |_, s| !s.is_live(now));
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_millis(1000);
    const EPS: Duration = Duration::from_millis(1);

    fn entry(bid: f64) -> CacheEntry {
        CacheEntry {
            bid,
            ask: bid + 0.1,
            timestamp: 1_700_000_000,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_present_until_ttl_elapses() {
        let cache = MemoryPriceCache::new();
        let symbol = PairSymbol::new("ETHBTC");
        cache.put(&symbol, entry(0.05), TTL).await.unwrap();

        tokio::time::advance(TTL - EPS).await;
        assert_eq!(cache.get("ETHBTC").await.unwrap(), Some(entry(0.05)));

        tokio::time::advance(EPS * 2).await;
        assert_eq!(cache.get("ETHBTC").await.unwrap(), None);
        assert!(cache.is_empty(), "expired read removes the entry");
    }

    #[tokio::test(start_paused = true)]
    async fn last_write_wins_and_refreshes_ttl() {
        let cache = MemoryPriceCache::new();
        let symbol = PairSymbol::new("ETHBTC");

        cache.put(&symbol, entry(0.05), TTL).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;
        cache.put(&symbol, entry(0.06), TTL).await.unwrap();
        tokio::time::advance(Duration::from_millis(600)).await;

        assert_eq!(cache.get("ETHBTC").await.unwrap(), Some(entry(0.06)));
    }

    #[tokio::test]
    async fn missing_symbol_is_absent() {
        let cache = MemoryPriceCache::new();
        assert_eq!(cache.get("BTCETH").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn purge_removes_only_expired_entries() {
        let cache = MemoryPriceCache::new();
        cache.put(&PairSymbol::new("ETHBTC"), entry(0.05), TTL).await.unwrap();
        tokio::time::advance(Duration::from_millis(700)).await;
        cache.put(&PairSymbol::new("BNBBTC"), entry(0.01), TTL).await.unwrap();
        tokio::time::advance(Duration::from_millis(400)).await;

        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.get("BNBBTC").await.unwrap().is_some());
    }
}
