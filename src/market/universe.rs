//! Symbol universe and stream-symbol selection from exchange REST metadata.

use std::collections::HashSet;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, instrument};

use super::types::{Currency, PairSymbol};
use crate::config::Config;
use crate::error::BootstrapError;

/// Exchange metadata path listing every symbol.
const EXCHANGE_INFO_PATH: &str = "/api/v1/exchangeInfo";

/// 24h rolling ticker statistics path.
const TICKER_24H_PATH: &str = "/api/v3/ticker/24hr";

/// Exchange metadata response.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInfo {
    /// Listed symbols.
    pub symbols: Vec<SymbolInfo>,
}

/// One listed symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolInfo {
    /// Base asset code.
    #[serde(rename = "baseAsset")]
    pub base_asset: String,
    /// Quote asset code.
    #[serde(rename = "quoteAsset")]
    pub quote_asset: String,
}

/// 24h ticker statistics for one symbol.
#[derive(Debug, Clone, Deserialize)]
pub struct Ticker24h {
    /// Symbol text.
    pub symbol: String,
    /// Quote asset volume as a decimal string.
    #[serde(rename = "quoteVolume")]
    pub quote_volume: String,
}

/// Every tradable currency and every listed pair.
#[derive(Debug, Clone, Default)]
pub struct SymbolUniverse {
    /// Currencies seen as either base or quote.
    pub currencies: HashSet<Currency>,
    /// Known pair symbols (`base + quote`).
    pub pairs: HashSet<PairSymbol>,
}

impl SymbolUniverse {
    /// Build from exchange metadata.
    pub fn from_exchange_info(info: &ExchangeInfo) -> Result<Self, BootstrapError> {
        let mut universe = SymbolUniverse::default();

        for symbol in &info.symbols {
            if symbol.base_asset.is_empty() || symbol.quote_asset.is_empty() {
                return Err(BootstrapError::Malformed(format!(
                    "symbol with empty asset: base={:?} quote={:?}",
                    symbol.base_asset, symbol.quote_asset
                )));
            }
            let base = Currency::new(&symbol.base_asset);
            let quote = Currency::new(&symbol.quote_asset);
            universe.pairs.insert(PairSymbol::from_parts(&base, &quote));
            universe.currencies.insert(base);
            universe.currencies.insert(quote);
        }

        if universe.pairs.is_empty() {
            return Err(BootstrapError::EmptyUniverse);
        }

        Ok(universe)
    }

    /// Currencies in lexical order.
    pub fn sorted_currencies(&self) -> Vec<Currency> {
        let mut currencies: Vec<Currency> = self.currencies.iter().cloned().collect();
        currencies.sort();
        currencies
    }
}

/// Pick the pairs to stream: the `limit` lowest positive quote-volume pairs
/// in ascending volume order, followed by each extra pair not already chosen.
pub fn select_stream_symbols(
    tickers: &[Ticker24h],
    limit: usize,
    extra: &[PairSymbol],
) -> Vec<PairSymbol> {
    let mut liquid: Vec<(f64, &str)> = tickers
        .iter()
        .filter_map(|t| {
            let volume: f64 = t.quote_volume.parse().ok()?;
            (volume > 0.0).then_some((volume, t.symbol.as_str()))
        })
        .collect();

    // Stable sort keeps exchange order among equal volumes.
    liquid.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut selected: Vec<PairSymbol> = liquid
        .into_iter()
        .take(limit)
        .map(|(_, symbol)| PairSymbol::new(symbol))
        .collect();

    for pair in extra {
        if !selected.contains(pair) {
            selected.push(pair.clone());
        }
    }

    selected
}

/// Client for the exchange REST metadata endpoints.
#[derive(Debug, Clone)]
pub struct ExchangeClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// REST base URL.
    base_url: String,
}

impl ExchangeClient {
    /// Create a client from config.
    pub fn new(config: &Config) -> Result<Self, BootstrapError> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()?;

        Ok(Self::with_http(http, &config.exchange_rest_url))
    }

    /// Create a client around an existing HTTP client.
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch metadata and derive the symbol universe.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_universe(&self) -> Result<SymbolUniverse, BootstrapError> {
        let info: ExchangeInfo = self.get_json(EXCHANGE_INFO_PATH).await?;
        let universe = SymbolUniverse::from_exchange_info(&info)?;

        info!(
            currencies = universe.currencies.len(),
            pairs = universe.pairs.len(),
            "Loaded symbol universe"
        );

        Ok(universe)
    }

    /// Fetch 24h ticker statistics for every symbol.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn fetch_tickers_24h(&self) -> Result<Vec<Ticker24h>, BootstrapError> {
        self.get_json(TICKER_24H_PATH).await
    }

    /// Fetch tickers and select the ordered stream-symbol list.
    pub async fn stream_symbols(
        &self,
        limit: usize,
        extra: &[PairSymbol],
    ) -> Result<Vec<PairSymbol>, BootstrapError> {
        let tickers = self.fetch_tickers_24h().await?;
        let symbols = select_stream_symbols(&tickers, limit, extra);

        debug!(tickers = tickers.len(), selected = symbols.len(), "Selected stream symbols");

        Ok(symbols)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, BootstrapError> {
        let url = format!("{}{}", self.base_url, path);

        let response = self.http.get(&url).send().await?;

        if !response.status().is_success() {
            return Err(BootstrapError::Status {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| BootstrapError::Malformed(format!("{}: {}", path, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn info(pairs: &[(&str, &str)]) -> ExchangeInfo {
        ExchangeInfo {
            symbols: pairs
                .iter()
                .map(|(b, q)| SymbolInfo {
                    base_asset: b.to_string(),
                    quote_asset: q.to_string(),
                })
                .collect(),
        }
    }

    fn ticker(symbol: &str, volume: &str) -> Ticker24h {
        Ticker24h {
            symbol: symbol.to_string(),
            quote_volume: volume.to_string(),
        }
    }

    #[test]
    fn universe_deduplicates_currencies() {
        let universe =
            SymbolUniverse::from_exchange_info(&info(&[("ETH", "BTC"), ("BNB", "BTC"), ("BNB", "ETH")]))
                .unwrap();

        let codes: Vec<String> = universe
            .sorted_currencies()
            .into_iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(codes, vec!["BNB", "BTC", "ETH"]);
        assert_eq!(universe.pairs.len(), 3);
        assert!(universe.pairs.contains("BNBETH"));
    }

    #[test]
    fn universe_rejects_empty_metadata() {
        let err = SymbolUniverse::from_exchange_info(&info(&[])).unwrap_err();
        assert!(matches!(err, BootstrapError::EmptyUniverse));
    }

    #[test]
    fn universe_rejects_blank_assets() {
        let err = SymbolUniverse::from_exchange_info(&info(&[("", "BTC")])).unwrap_err();
        assert!(matches!(err, BootstrapError::Malformed(_)));
    }

    #[test]
    fn exchange_info_parses_extra_fields() {
        let json = r#"{"timezone":"UTC","symbols":[{"symbol":"ETHBTC","status":"TRADING","baseAsset":"ETH","quoteAsset":"BTC"}]}"#;
        let parsed: ExchangeInfo = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.symbols[0].base_asset, "ETH");
    }

    #[test]
    fn select_takes_lowest_volume_first() {
        let tickers = vec![
            ticker("AAA", "300.0"),
            ticker("BBB", "0"),
            ticker("CCC", "10.5"),
            ticker("DDD", "not-a-number"),
            ticker("EEE", "50"),
        ];

        let selected = select_stream_symbols(&tickers, 2, &[]);

        assert_eq!(selected, vec![PairSymbol::new("CCC"), PairSymbol::new("EEE")]);
    }

    #[test]
    fn select_appends_missing_extras_only() {
        let tickers = vec![ticker("ETHBTC", "5"), ticker("XRPBTC", "1")];
        let extra = vec![PairSymbol::new("ETHBTC"), PairSymbol::new("BTCUSDT")];

        let selected = select_stream_symbols(&tickers, 10, &extra);

        assert_eq!(
            selected,
            vec![
                PairSymbol::new("XRPBTC"),
                PairSymbol::new("ETHBTC"),
                PairSymbol::new("BTCUSDT"),
            ]
        );
    }
}
