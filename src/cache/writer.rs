//! Broker consumer that writes each tick and its inverse into the price cache.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, instrument, warn};

use super::{CacheEntry, PriceCache};
use crate::broker::Consumer;
use crate::error::ParseError;
use crate::market::{invert_quote, InverseResolver, Tick};
use crate::metrics;

/// Result of one tick's two cache writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteOutcome {
    /// Direct entry stored.
    pub direct: bool,
    /// Inverse entry stored.
    pub inverse: bool,
}

/// Counters returned when the consumer loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheWriterReport {
    /// Messages delivered by the broker.
    pub delivered: u64,
    /// Deliveries that were not valid ticks.
    pub malformed: u64,
    /// Cache entries written, direct and inverse.
    pub writes: u64,
    /// Writes that failed or were skipped.
    pub failed: u64,
}

/// Writes direct and inverse quotes with a fixed TTL.
pub struct CacheWriter<C> {
    cache: Arc<C>,
    resolver: InverseResolver,
    ttl: Duration,
}

impl<C: PriceCache> CacheWriter<C> {
    /// Create a writer.
    pub fn new(cache: Arc<C>, resolver: InverseResolver, ttl: Duration) -> Self {
        Self { cache, resolver, ttl }
    }

    /// Store `tick` and its inverse. The two writes are independent: an
    /// unresolvable inverse or a failed write never undoes the other.
    pub async fn on_tick(&self, tick: &Tick) -> WriteOutcome {
        let mut outcome = WriteOutcome::default();

        match self.cache.put(&tick.symbol, CacheEntry::from(tick), self.ttl).await {
            Ok(()) => {
                metrics::inc_cache_writes("direct");
                outcome.direct = true;
            }
            Err(e) => {
                metrics::inc_cache_write_failures("direct");
                warn!(symbol = %tick.symbol, error = %e, "Cache write failed, dropping tick");
            }
        }

        let inverse = match self.resolver.invert(&tick.symbol) {
            Ok(symbol) => symbol,
            Err(e) => {
                metrics::inc_inverse_unresolved();
                debug!(error = %e, "Skipping inverse write");
                return outcome;
            }
        };

        let (bid, ask) = invert_quote(tick.bid, tick.ask);
        let entry = CacheEntry {
            bid,
            ask,
            timestamp: tick.timestamp,
        };

        match self.cache.put(&inverse, entry, self.ttl).await {
            Ok(()) => {
                metrics::inc_cache_writes("inverse");
                outcome.inverse = true;
            }
            Err(e) => {
                metrics::inc_cache_write_failures("inverse");
                warn!(symbol = %inverse, error = %e, "Inverse cache write failed");
            }
        }

        outcome
    }

    /// Decode one broker delivery, check its prices and store it.
    pub async fn handle_delivery(&self, body: &[u8]) -> Result<WriteOutcome, ParseError> {
        let tick: Tick = serde_json::from_slice(body)?;
        tick.validate()?;
        Ok(self.on_tick(&tick).await)
    }

    /// Consume until the broker closes the subscription.
    #[instrument(skip_all, fields(ttl_ms = self.ttl.as_millis() as u64))]
    pub async fn run<R: Consumer>(&self, mut consumer: R) -> CacheWriterReport {
        let mut report = CacheWriterReport::default();

        while let Some(body) = consumer.next_delivery().await {
            report.delivered += 1;

            match self.handle_delivery(&body).await {
                Ok(outcome) => {
                    for written in [outcome.direct, outcome.inverse] {
                        if written {
                            report.writes += 1;
                        } else {
                            report.failed += 1;
                        }
                    }
                }
                Err(e) => {
                    metrics::inc_parse_errors("relay");
                    report.malformed += 1;
                    warn!(error = %e, "Dropping malformed relay message");
                }
            }
        }

        info!(
            delivered = report.delivered,
            writes = report.writes,
            "Broker subscription closed, cache writer stopped"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::{Broker, MemoryBroker};
    use crate::cache::MemoryPriceCache;
    use crate::error::CacheError;
    use crate::market::{Currency, PairSymbol};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    const TTL: Duration = Duration::from_secs(1);

    fn resolver() -> InverseResolver {
        let currencies: HashSet<Currency> = ["BTC", "ETH", "USDT", "BNB"].into_iter().map(Currency::from).collect();
        InverseResolver::new(Arc::new(currencies))
    }

    fn writer() -> (Arc<MemoryPriceCache>, CacheWriter<MemoryPriceCache>) {
        let cache = Arc::new(MemoryPriceCache::new());
        (cache.clone(), CacheWriter::new(cache, resolver(), TTL))
    }

    #[tokio::test]
    async fn writes_direct_and_side_preserving_inverse() {
        let (cache, writer) = writer();
        let tick = Tick::new(PairSymbol::new("ETHBTC"), 0.05, 0.04, 7);

        let outcome = writer.on_tick(&tick).await;
        assert_eq!(outcome, WriteOutcome { direct: true, inverse: true });

        let direct = cache.get("ETHBTC").await.unwrap().unwrap();
        assert_eq!(direct, CacheEntry { bid: 0.05, ask: 0.04, timestamp: 7 });

        let inverse = cache.get("BTCETH").await.unwrap().unwrap();
        assert_eq!(inverse, CacheEntry { bid: 20.0, ask: 25.0, timestamp: 7 });
    }

    #[tokio::test]
    async fn unresolvable_inverse_keeps_direct_write() {
        let (cache, writer) = writer();
        let tick = Tick::new(PairSymbol::new("XRPEUR"), 0.5, 0.6, 1);

        let outcome = writer.on_tick(&tick).await;

        assert_eq!(outcome, WriteOutcome { direct: true, inverse: false });
        assert!(cache.get("XRPEUR").await.unwrap().is_some());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn failed_direct_write_does_not_block_inverse() {
        struct RejectEthBtc(MemoryPriceCache);

        #[async_trait]
        impl PriceCache for RejectEthBtc {
            async fn put(&self, symbol: &PairSymbol, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError> {
                if symbol.as_str() == "ETHBTC" {
                    return Err(CacheError::Unavailable("read-only replica".to_string()));
                }
                self.0.put(symbol, entry, ttl).await
            }

            async fn get(&self, symbol: &str) -> Result<Option<CacheEntry>, CacheError> {
                self.0.get(symbol).await
            }
        }

        let cache = Arc::new(RejectEthBtc(MemoryPriceCache::new()));
        let writer = CacheWriter::new(cache.clone(), resolver(), TTL);

        let outcome = writer
            .on_tick(&Tick::new(PairSymbol::new("ETHBTC"), 0.05, 0.04, 1))
            .await;

        assert_eq!(outcome, WriteOutcome { direct: false, inverse: true });
        assert!(cache.get("BTCETH").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn zero_ask_delivery_is_rejected_before_any_write() {
        let (cache, writer) = writer();

        let err = writer
            .handle_delivery(br#"{"symbol":"ETHBTC","bid":0.05,"ask":0.0,"timestamp":1}"#)
            .await
            .unwrap_err();

        assert!(matches!(err, ParseError::NonPositivePrice { field: "ask", .. }));
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn fractional_timestamp_delivery_is_floored() {
        let (cache, writer) = writer();

        let outcome = writer
            .handle_delivery(br#"{"symbol":"ETHBTC","bid":0.05,"ask":0.04,"timestamp":1700000000.123}"#)
            .await
            .unwrap();

        assert_eq!(outcome, WriteOutcome { direct: true, inverse: true });
        assert_eq!(cache.get("ETHBTC").await.unwrap().unwrap().timestamp, 1_700_000_000);
        assert_eq!(cache.get("BTCETH").await.unwrap().unwrap().timestamp, 1_700_000_000);
    }

    #[tokio::test]
    async fn consumes_until_broker_closes_and_skips_malformed() {
        let (cache, writer) = writer();
        let (broker, consumer) = MemoryBroker::channel("market_data");

        let tick = Tick::new(PairSymbol::new("BNBUSDT"), 300.0, 300.5, 3);
        broker.publish("market_data", b"{oops".to_vec()).await.unwrap();
        broker
            .publish("market_data", serde_json::to_vec(&tick).unwrap())
            .await
            .unwrap();
        broker.close().await.unwrap();

        let report = writer.run(consumer).await;

        assert_eq!(
            report,
            CacheWriterReport {
                delivered: 2,
                malformed: 1,
                writes: 2,
                failed: 0,
            }
        );
        assert!(cache.get("USDTBNB").await.unwrap().is_some());
    }
}
