//! Economic inverse of a pair symbol and of its quote.

use std::collections::HashSet;
use std::sync::Arc;

use super::types::{Currency, PairSymbol};
use crate::error::UnresolvableSymbolError;

/// Invert `symbol` (`AB` -> `BA`) using the known currency set.
///
/// The quote currency is the longest known currency that is a proper suffix
/// of the symbol; whatever precedes it is the base. Two distinct codes of
/// equal length cannot both be suffixes of one string, so the match is unique.
pub fn invert(
    symbol: &PairSymbol,
    currencies: &HashSet<Currency>,
) -> Result<PairSymbol, UnresolvableSymbolError> {
    let text = symbol.as_str();

    // Walk split points left to right: the first hit is the longest suffix.
    for (split, _) in text.char_indices().skip(1) {
        let quote = &text[split..];
        if currencies.contains(quote) {
            let base = &text[..split];
            let mut inverted = String::with_capacity(text.len());
            inverted.push_str(quote);
            inverted.push_str(base);
            return Ok(PairSymbol::new(inverted));
        }
    }

    Err(UnresolvableSymbolError {
        symbol: text.to_string(),
    })
}

/// Quote for the inverse pair, side-preserving: `(1/bid, 1/ask)`.
///
/// This keeps each side's reciprocal rather than swapping sides
/// (`bid' = 1/ask`, `ask' = 1/bid`); the detector's inequalities assume it.
pub fn invert_quote(bid: f64, ask: f64) -> (f64, f64) {
    (1.0 / bid, 1.0 / ask)
}

/// Inverse resolver bound to one currency universe.
#[derive(Debug, Clone)]
pub struct InverseResolver {
    currencies: Arc<HashSet<Currency>>,
}

impl InverseResolver {
    /// Create a resolver over a shared currency set.
    pub fn new(currencies: Arc<HashSet<Currency>>) -> Self {
        Self { currencies }
    }

    /// Invert a symbol.
    pub fn invert(&self, symbol: &PairSymbol) -> Result<PairSymbol, UnresolvableSymbolError> {
        invert(symbol, &self.currencies)
    }

    /// Number of known currencies.
    pub fn currency_count(&self) -> usize {
        self.currencies.len()
    }
}
