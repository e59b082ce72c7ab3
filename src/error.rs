//! Unified error types for the ingestion and detection pipeline.

use thiserror::Error;

/// Unified error type for the arbitrage pipeline.
#[derive(Error, Debug)]
pub enum ArbError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration loaded but failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Exchange metadata could not be fetched at startup.
    #[error("bootstrap error: {0}")]
    Bootstrap(#[from] BootstrapError),

    /// Streaming connection error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Broker publish/consume error.
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    /// Price cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// Path file error.
    #[error("path file error: {0}")]
    PathFile(#[from] PathFileError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while building the symbol universe. Fatal at startup.
#[derive(Error, Debug)]
pub enum BootstrapError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// Payload did not have the expected shape.
    #[error("malformed exchange payload: {0}")]
    Malformed(String),

    /// Metadata listed no usable symbols.
    #[error("exchange metadata contained no symbols")]
    EmptyUniverse,
}

/// A stream or relay message that could not be turned into a tick.
#[derive(Error, Debug)]
pub enum ParseError {
    /// Not valid JSON or missing fields.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Price field is not a number.
    #[error("{symbol}: {field} price {value:?} is not a number")]
    InvalidPrice {
        /// Symbol the message was for.
        symbol: String,
        /// "bid" or "ask".
        field: &'static str,
        /// Raw value.
        value: String,
    },

    /// Price parsed but is zero, negative or not finite.
    #[error("{symbol}: {field} price {value} must be positive")]
    NonPositivePrice {
        /// Symbol the message was for.
        symbol: String,
        /// "bid" or "ask".
        field: &'static str,
        /// Parsed value.
        value: f64,
    },
}

/// No known currency is a proper suffix of the symbol.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot resolve inverse of {symbol}: no known currency is a proper suffix")]
pub struct UnresolvableSymbolError {
    /// The symbol that could not be inverted.
    pub symbol: String,
}

/// WebSocket connection and message errors.
#[derive(Error, Debug)]
pub enum WsError {
    /// Connection failed.
    #[error("websocket connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed by the remote end.
    #[error("websocket connection closed: code={code:?}, reason={reason}")]
    ConnectionClosed {
        /// Close code.
        code: Option<u16>,
        /// Close reason.
        reason: String,
    },

    /// Stream URL could not be built.
    #[error("invalid stream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Tungstenite error.
    #[error("tungstenite error: {0}")]
    Tungstenite(#[from] tokio_tungstenite::tungstenite::Error),

    /// A stream task panicked or was aborted.
    #[error("stream task failed: {0}")]
    TaskFailed(String),
}

/// The relay queue's reader has gone away.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("relay queue is closed")]
pub struct RelayClosed;

/// Message broker errors.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Publish to a queue that was never declared.
    #[error("unknown topic {0}")]
    UnknownTopic(String),

    /// Broker connection has been closed.
    #[error("broker connection closed")]
    Closed,

    /// Tick could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Price cache store errors.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Store is unreachable or rejected the command.
    #[error("price store unavailable: {0}")]
    Unavailable(String),
}

/// Why a path was skipped for one detector pass. Returned as data, never fatal.
#[derive(Error, Debug)]
pub enum MissingDataError {
    /// No live entry for the symbol (never written, or older than the TTL).
    #[error("no live quote for {symbol}")]
    Absent {
        /// Missing symbol.
        symbol: String,
    },

    /// The store failed while reading the symbol.
    #[error("cache read failed for {symbol}: {source}")]
    Store {
        /// Symbol being read.
        symbol: String,
        /// Underlying error.
        source: CacheError,
    },
}

/// Path file read/write errors.
#[derive(Error, Debug)]
pub enum PathFileError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// First line is not the `Start,Middle,End` header.
    #[error("unexpected header {found:?}, expected \"Start,Middle,End\"")]
    Header {
        /// Header that was found.
        found: String,
    },

    /// A data row is malformed.
    #[error("line {line}: {reason}")]
    Row {
        /// 1-based line number.
        line: usize,
        /// What is wrong with it.
        reason: String,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ArbError>;
