//! Polling detector: scans every path against the live price cache.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, instrument};

use super::calculator::{evaluate, ArbitrageOpportunity, PathPrices};
use super::paths::{SharedPaths, TriangularPath};
use crate::cache::{CacheEntry, PriceCache};
use crate::error::MissingDataError;
use crate::market::PairSymbol;
use crate::metrics;

async fn lookup<C: PriceCache>(cache: &C, symbol: &PairSymbol) -> Result<CacheEntry, MissingDataError> {
    match cache.get(symbol.as_str()).await {
        Ok(Some(entry)) => Ok(entry),
        Ok(None) => Err(MissingDataError::Absent {
            symbol: symbol.to_string(),
        }),
        Err(source) => Err(MissingDataError::Store {
            symbol: symbol.to_string(),
            source,
        }),
    }
}

/// Read bid and ask for all three lookup symbols of `path`.
///
/// Fails on the first symbol with no live entry; nothing partial is returned.
pub async fn fetch_path_prices<C: PriceCache>(
    cache: &C,
    path: &TriangularPath,
) -> Result<PathPrices, MissingDataError> {
    let [s1, s2, s3] = path.lookup_symbols();

    Ok(PathPrices {
        p1: lookup(cache, &s1).await?,
        p2: lookup(cache, &s2).await?,
        p3: lookup(cache, &s3).await?,
    })
}

/// Outcome of one pass over all paths.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Paths with all six prices present.
    pub evaluated: usize,
    /// Paths skipped for missing or stale prices.
    pub skipped: usize,
    /// Every flagged opportunity.
    pub opportunities: Vec<ArbitrageOpportunity>,
}

impl ScanReport {
    /// Whether at least one path was flagged.
    pub fn found(&self) -> bool {
        !self.opportunities.is_empty()
    }
}

/// Periodically evaluates a fixed set of paths.
pub struct ArbitrageDetector<C> {
    cache: Arc<C>,
    paths: SharedPaths,
    interval: Duration,
}

impl<C: PriceCache> ArbitrageDetector<C> {
    /// Create a detector polling every `interval`.
    pub fn new(cache: Arc<C>, paths: SharedPaths, interval: Duration) -> Self {
        Self { cache, paths, interval }
    }

    /// Evaluate every path once.
    pub async fn scan(&self) -> ScanReport {
        let _timer = metrics::timer_detector_pass();
        let mut report = ScanReport::default();

        for path in self.paths.iter() {
            let prices = match fetch_path_prices(self.cache.as_ref(), path).await {
                Ok(prices) => prices,
                Err(e) => {
                    debug!(path = %path, reason = %e, "Skipping path");
                    report.skipped += 1;
                    continue;
                }
            };

            report.evaluated += 1;
            for opp in evaluate(path, &prices) {
                metrics::inc_opportunities_detected(opp.side.as_label());
                info!(
                    path = %opp.path,
                    side = %opp.side,
                    p1 = opp.prices[0],
                    p2 = opp.prices[1],
                    p3 = opp.prices[2],
                    product = opp.product,
                    edge = opp.edge(),
                    "Arbitrage opportunity detected"
                );
                report.opportunities.push(opp);
            }
        }

        metrics::add_paths_skipped(report.skipped as u64);
        report
    }

    /// Scan every `interval` until `stop` is raised, handing each report to
    /// `on_pass`. The stop flag is checked before each pass and interrupts
    /// the sleep between passes.
    #[instrument(skip_all, fields(paths = self.paths.len()))]
    pub async fn run<F, Fut>(&self, mut stop: watch::Receiver<bool>, mut on_pass: F) -> u64
    where
        F: FnMut(ScanReport) -> Fut,
        Fut: Future<Output = ()>,
    {
        let mut passes = 0u64;

        loop {
            if *stop.borrow_and_update() {
                break;
            }

            let report = self.scan().await;
            passes += 1;

            if report.found() {
                info!(
                    opportunities = report.opportunities.len(),
                    evaluated = report.evaluated,
                    skipped = report.skipped,
                    "Arbitrage detected"
                );
            } else {
                info!(
                    evaluated = report.evaluated,
                    skipped = report.skipped,
                    "No arbitrage opportunity at this time"
                );
            }
            on_pass(report).await;

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(passes, "Stopping arbitrage detection");
        passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryPriceCache;
    use crate::market::Currency;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const TTL: Duration = Duration::from_secs(1);

    async fn put(cache: &MemoryPriceCache, symbol: &str, bid: f64, ask: f64) {
        let entry = CacheEntry { bid, ask, timestamp: 0 };
        cache.put(&PairSymbol::new(symbol), entry, TTL).await.unwrap();
    }

    fn path(s: &str, m: &str, e: &str) -> TriangularPath {
        TriangularPath::new(Currency::new(s), Currency::new(m), Currency::new(e))
    }

    #[tokio::test]
    async fn missing_price_skips_only_that_path() {
        let cache = Arc::new(MemoryPriceCache::new());
        // A->B->C is complete and profitable on the ask side.
        put(&cache, "AB", 0.80, 0.90).await;
        put(&cache, "BC", 150.0, 160.0).await;
        put(&cache, "AC", 140.0, 145.0).await;
        // A->B->D lacks AD.
        put(&cache, "BD", 1.0, 1.0).await;

        let paths: SharedPaths = vec![path("A", "B", "C"), path("A", "B", "D")].into();
        let detector = ArbitrageDetector::new(cache, paths, Duration::from_secs(1));

        let report = detector.scan().await;

        assert_eq!(report.evaluated, 1);
        assert_eq!(report.skipped, 1);
        assert!(report.found());
        assert_eq!(report.opportunities[0].path, path("A", "B", "C"));
    }

    #[tokio::test]
    async fn fetch_reports_first_missing_symbol() {
        let cache = MemoryPriceCache::new();
        put(&cache, "AB", 1.0, 1.0).await;

        let err = fetch_path_prices(&cache, &path("A", "B", "C")).await.unwrap_err();
        assert!(matches!(err, MissingDataError::Absent { symbol } if symbol == "BC"));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_prices_are_treated_as_absent() {
        let cache = Arc::new(MemoryPriceCache::new());
        put(&cache, "AB", 1.0, 1.0).await;
        put(&cache, "BC", 1.0, 1.0).await;
        put(&cache, "AC", 1.0, 1.0).await;

        let paths: SharedPaths = vec![path("A", "B", "C")].into();
        let detector = ArbitrageDetector::new(cache, paths, Duration::from_secs(1));
        assert_eq!(detector.scan().await.evaluated, 1);

        tokio::time::advance(TTL + Duration::from_millis(1)).await;
        let report = detector.scan().await;
        assert_eq!(report.evaluated, 0);
        assert_eq!(report.skipped, 1);
        assert!(!report.found());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_sleep_between_passes() {
        let cache = Arc::new(MemoryPriceCache::new());
        let paths: SharedPaths = Vec::new().into();
        let detector = ArbitrageDetector::new(cache, paths, Duration::from_secs(3600));
        let (stop_tx, stop_rx) = watch::channel(false);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handle = tokio::spawn(async move {
            detector
                .run(stop_rx, |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async {}
                })
                .await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        stop_tx.send(true).unwrap();

        let passes = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("detector stops within one interval")
            .unwrap();
        assert_eq!(passes, 1);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_exits_immediately_when_already_stopped() {
        let cache = Arc::new(MemoryPriceCache::new());
        let detector = ArbitrageDetector::new(cache, Vec::new().into(), Duration::from_secs(1));
        let (_stop_tx, stop_rx) = watch::channel(true);

        assert_eq!(detector.run(stop_rx, |_| async {}).await, 0);
    }
}
