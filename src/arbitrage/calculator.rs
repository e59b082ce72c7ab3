//! Compounded-rate calculations for one triangular path.

use serde::Serialize;
use time::OffsetDateTime;

use super::paths::TriangularPath;
use crate::cache::CacheEntry;
use crate::market::Side;

/// Live quotes for a path's three lookup symbols `p1`, `p2`, `p3`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPrices {
    /// Quote for `start·middle`.
    pub p1: CacheEntry,
    /// Quote for `middle·end`.
    pub p2: CacheEntry,
    /// Quote for `start·end`.
    pub p3: CacheEntry,
}

impl PathPrices {
    /// The three prices used for one side, in `p1, p2, p3` order.
    pub fn side(&self, side: Side) -> [f64; 3] {
        [self.p1.price(side), self.p2.price(side), self.p3.price(side)]
    }

    /// `p1 * p2 / p3` for one side.
    pub fn product(&self, side: Side) -> f64 {
        let [p1, p2, p3] = self.side(side);
        p1 * p2 * (1.0 / p3)
    }

    /// Compounded ask rate; an opportunity when strictly below 1.
    pub fn ask_product(&self) -> f64 {
        self.product(Side::Ask)
    }

    /// Compounded bid rate; an opportunity when strictly above 1.
    pub fn bid_product(&self) -> f64 {
        self.product(Side::Bid)
    }
}

/// A flagged path for one side.
#[derive(Debug, Clone, Serialize)]
pub struct ArbitrageOpportunity {
    /// Path that was flagged.
    pub path: TriangularPath,
    /// Side whose inequality held.
    pub side: Side,
    /// Prices of `p1`, `p2`, `p3` on that side.
    pub prices: [f64; 3],
    /// Compounded product.
    pub product: f64,
    /// When the opportunity was detected.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

impl ArbitrageOpportunity {
    /// Distance of the product from 1 in the profitable direction.
    pub fn edge(&self) -> f64 {
        match self.side {
            Side::Ask => 1.0 - self.product,
            Side::Bid => self.product - 1.0,
        }
    }
}

/// Apply both inequalities to one path. Each side is checked on its own, so
/// a path can yield zero, one or two opportunities.
pub fn evaluate(path: &TriangularPath, prices: &PathPrices) -> Vec<ArbitrageOpportunity> {
    let mut found = Vec::new();

    let ask = prices.ask_product();
    if ask < 1.0 {
        found.push(opportunity(path, Side::Ask, prices, ask));
    }

    let bid = prices.bid_product();
    if bid > 1.0 {
        found.push(opportunity(path, Side::Bid, prices, bid));
    }

    found
}

fn opportunity(path: &TriangularPath, side: Side, prices: &PathPrices, product: f64) -> ArbitrageOpportunity {
    ArbitrageOpportunity {
        path: path.clone(),
        side,
        prices: prices.side(side),
        product,
        detected_at: OffsetDateTime::now_utc(),
    }
}
