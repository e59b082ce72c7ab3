//! Currency, pair symbol and tick types.

use std::borrow::Borrow;
use std::fmt;

use serde::{de, Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

use crate::error::ParseError;

/// Tradable asset code (e.g. "BTC", "USDT").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(String);

impl Currency {
    /// Create a currency from its code.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// The currency code.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for Currency {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Currency {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

/// Market identifier formed by concatenating base and quote currency codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairSymbol(String);

impl PairSymbol {
    /// Create a symbol from its full text (e.g. "ETHBTC").
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    /// Concatenate base and quote.
    pub fn from_parts(base: &Currency, quote: &Currency) -> Self {
        let mut s = String::with_capacity(base.0.len() + quote.0.len());
        s.push_str(&base.0);
        s.push_str(&quote.0);
        Self(s)
    }

    /// The symbol text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for PairSymbol {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PairSymbol {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

/// Quote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Side {
    /// Best bid.
    Bid,
    /// Best ask.
    Ask,
}

impl Side {
    /// Static label for metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Side::Bid => "bid",
            Side::Ask => "ask",
        }
    }
}

/// One timestamped best bid/ask observation.
///
/// Serialized as the relay wire message `{symbol, bid, ask, timestamp}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    /// Market the quote is for.
    pub symbol: PairSymbol,
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
    /// Arrival time in unix seconds. Fractional seconds on the wire are floored.
    #[serde(deserialize_with = "floor_unix_seconds")]
    pub timestamp: i64,
}

fn floor_unix_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let secs = f64::deserialize(deserializer)?.floor();
    if !secs.is_finite() || secs < i64::MIN as f64 || secs >= i64::MAX as f64 {
        return Err(de::Error::custom(format!("timestamp out of range: {secs}")));
    }
    Ok(secs as i64)
}

/// Reject prices that are not strictly positive and finite.
pub(crate) fn check_price(symbol: &str, field: &'static str, value: f64) -> Result<f64, ParseError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ParseError::NonPositivePrice {
            symbol: symbol.to_string(),
            field,
            value,
        });
    }
    Ok(value)
}

impl Tick {
    /// Create a tick with an explicit timestamp.
    pub fn new(symbol: PairSymbol, bid: f64, ask: f64, timestamp: i64) -> Self {
        Self {
            symbol,
            bid,
            ask,
            timestamp,
        }
    }

    /// Check both prices are positive and finite.
    pub fn validate(&self) -> Result<(), ParseError> {
        check_price(self.symbol.as_str(), "bid", self.bid)?;
        check_price(self.symbol.as_str(), "ask", self.ask)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::str::FromStr;

    #[test]
    fn pair_symbol_from_parts_concatenates() {
        let symbol = PairSymbol::from_parts(&Currency::new("ETH"), &Currency::new("BTC"));
        assert_eq!(symbol.as_str(), "ETHBTC");
    }

    #[test]
    fn symbols_are_found_by_str_in_sets() {
        let set: HashSet<PairSymbol> = ["ETHBTC", "BNBUSDT"].into_iter().map(PairSymbol::from).collect();
        assert!(set.contains("ETHBTC"));
        assert!(!set.contains("BTCETH"));
    }

    #[test]
    fn tick_serializes_as_wire_message() {
        let tick = Tick::new(PairSymbol::new("ETHBTC"), 0.05, 0.051, 1_700_000_000);
        let json = serde_json::to_value(&tick).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"symbol": "ETHBTC", "bid": 0.05, "ask": 0.051, "timestamp": 1_700_000_000})
        );
    }

    #[test]
    fn fractional_wire_timestamp_is_floored() {
        let tick: Tick =
            serde_json::from_str(r#"{"symbol":"ETHBTC","bid":0.05,"ask":0.051,"timestamp":1700000000.987}"#).unwrap();
        assert_eq!(tick.timestamp, 1_700_000_000);

        let tick: Tick =
            serde_json::from_str(r#"{"symbol":"ETHBTC","bid":0.05,"ask":0.051,"timestamp":1700000000}"#).unwrap();
        assert_eq!(tick.timestamp, 1_700_000_000);
    }

    #[test]
    fn validate_rejects_zero_and_non_finite_prices() {
        assert!(Tick::new(PairSymbol::new("ETHBTC"), 0.05, 0.051, 0).validate().is_ok());

        let err = Tick::new(PairSymbol::new("ETHBTC"), 0.05, 0.0, 0).validate().unwrap_err();
        assert!(matches!(err, ParseError::NonPositivePrice { field: "ask", .. }));

        let err = Tick::new(PairSymbol::new("ETHBTC"), -1.0, 0.051, 0).validate().unwrap_err();
        assert!(matches!(err, ParseError::NonPositivePrice { field: "bid", .. }));

        let err = Tick::new(PairSymbol::new("ETHBTC"), f64::NAN, 0.051, 0).validate().unwrap_err();
        assert!(matches!(err, ParseError::NonPositivePrice { field: "bid", .. }));
    }

    #[test]
    fn side_display_and_parse() {
        assert_eq!(Side::Ask.to_string(), "ask");
        assert_eq!(Side::from_str("bid").unwrap(), Side::Bid);
    }
}
