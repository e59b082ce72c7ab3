//! Combined-stream bookTicker parsing and stream URL construction.

use serde::Deserialize;
use url::Url;

use crate::error::{ParseError, WsError};
use crate::market::types::check_price;
use crate::market::{PairSymbol, Tick};

/// Combined stream envelope: `{"stream": "...", "data": {...}}`.
#[derive(Debug, Deserialize)]
struct CombinedStreamMessage {
    data: BookTickerData,
}

/// bookTicker payload; quantities and update id are ignored.
#[derive(Debug, Deserialize)]
struct BookTickerData {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "b")]
    bid: String,
    #[serde(rename = "a")]
    ask: String,
}

/// Parsed best bid/ask update, not yet stamped.
#[derive(Debug, Clone, PartialEq)]
pub struct BookTicker {
    /// Market symbol.
    pub symbol: PairSymbol,
    /// Best bid price.
    pub bid: f64,
    /// Best ask price.
    pub ask: f64,
}

impl BookTicker {
    /// Stamp with an arrival time.
    pub fn into_tick(self, timestamp: i64) -> Tick {
        Tick::new(self.symbol, self.bid, self.ask, timestamp)
    }
}

/// Parse one combined-stream text frame.
pub fn parse_book_ticker(text: &str) -> Result<BookTicker, ParseError> {
    let msg: CombinedStreamMessage = serde_json::from_str(text)?;
    let data = msg.data;

    let bid = parse_price(&data.symbol, "bid", &data.bid)?;
    let ask = parse_price(&data.symbol, "ask", &data.ask)?;

    Ok(BookTicker {
        symbol: PairSymbol::new(data.symbol),
        bid,
        ask,
    })
}

fn parse_price(symbol: &str, field: &'static str, raw: &str) -> Result<f64, ParseError> {
    let value: f64 = raw.trim().parse().map_err(|_| ParseError::InvalidPrice {
        symbol: symbol.to_string(),
        field,
        value: raw.to_string(),
    })?;

    check_price(symbol, field, value)
}

/// Combined bookTicker stream URL for one chunk of symbols.
pub fn stream_url(ws_base: &str, symbols: &[PairSymbol]) -> Result<Url, WsError> {
    let streams: Vec<String> = symbols
        .iter()
        .map(|s| format!("{}@bookTicker", s.as_str().to_lowercase()))
        .collect();

    let raw = format!(
        "{}/stream?streams={}",
        ws_base.trim_end_matches('/'),
        streams.join("/")
    );

    Ok(Url::parse(&raw)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{"stream":"bnbusdt@bookTicker","data":{"u":400900217,"s":"BNBUSDT","b":"25.35190000","B":"31.21000000","a":"25.36520000","A":"40.66000000"}}"#;

    #[test]
    fn parses_combined_book_ticker() {
        let ticker = parse_book_ticker(SAMPLE).unwrap();
        assert_eq!(ticker.symbol.as_str(), "BNBUSDT");
        assert_eq!(ticker.bid, 25.3519);
        assert_eq!(ticker.ask, 25.3652);
    }

    #[test]
    fn into_tick_keeps_prices() {
        let tick = parse_book_ticker(SAMPLE).unwrap().into_tick(42);
        assert_eq!(tick.timestamp, 42);
        assert_eq!(tick.symbol.as_str(), "BNBUSDT");
    }

    #[test]
    fn rejects_missing_data() {
        let err = parse_book_ticker(r#"{"result":null,"id":1}"#).unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn rejects_non_numeric_price() {
        let err = parse_book_ticker(r#"{"data":{"s":"ETHBTC","b":"abc","a":"0.05"}}"#).unwrap_err();
        assert!(matches!(err, ParseError::InvalidPrice { field: "bid", .. }));
    }

    #[test]
    fn rejects_zero_price() {
        let err = parse_book_ticker(r#"{"data":{"s":"ETHBTC","b":"0.05","a":"0.00000000"}}"#).unwrap_err();
        assert!(matches!(err, ParseError::NonPositivePrice { field: "ask", .. }));
    }

    #[test]
    fn builds_combined_stream_url() {
        let url = stream_url(
            "wss://stream.binance.com:9443/",
            &[PairSymbol::new("ETHBTC"), PairSymbol::new("BNBUSDT")],
        )
        .unwrap();

        assert_eq!(
            url.as_str(),
            "wss://stream.binance.com:9443/stream?streams=ethbtc@bookTicker/bnbusdt@bookTicker"
        );
    }
}
