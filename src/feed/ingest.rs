//! Chunked bookTicker ingestion: one streaming connection per group of
//! symbols, all feeding one relay queue.
//!
//! A supervisor spawns one task per chunk into a `JoinSet`, fans the single
//! cancel signal out to every task through its own `watch` channel, and joins
//! them all before returning. Dropped connections are not retried: a chunk
//! that loses its socket stops every other chunk and the error is returned.

use std::num::NonZeroUsize;
use std::sync::Arc;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use super::message::{parse_book_ticker, stream_url};
use super::relay::RelaySender;
use crate::error::WsError;
use crate::market::PairSymbol;
use crate::metrics;
use crate::utils::{stopped, unix_now};

/// Opens one streaming connection.
#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    /// Inbound frame stream for one connection.
    type Stream: Stream<Item = Result<Message, tungstenite::Error>> + Send + Unpin + 'static;

    /// Connect to `url`.
    async fn connect(&self, url: &Url) -> Result<Self::Stream, WsError>;

    /// Close a connection. Dropping the stream is enough by default.
    async fn close(&self, _stream: &mut Self::Stream) {}
}

/// Connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl FeedConnector for TungsteniteConnector {
    type Stream = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn connect(&self, url: &Url) -> Result<Self::Stream, WsError> {
        let (ws_stream, _) = connect_async(url.as_str())
            .await
            .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;
        Ok(ws_stream)
    }

    async fn close(&self, stream: &mut Self::Stream) {
        if let Err(e) = stream.close(None).await {
            debug!(error = %e, "Error while closing websocket");
        }
    }
}

/// Split `items` into consecutive groups of at most `size`, order preserved.
pub fn chunk_symbols<T: Clone>(items: &[T], size: NonZeroUsize) -> Vec<Vec<T>> {
    items.chunks(size.get()).map(<[T]>::to_vec).collect()
}

/// Why a chunk task stopped without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkExit {
    /// Stop signal observed.
    Cancelled,
    /// Publisher side of the relay is gone.
    RelayClosed,
}

/// Per-chunk counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkReport {
    /// Chunk index.
    pub chunk: usize,
    /// Ticks enqueued.
    pub ticks: u64,
    /// Messages dropped as unparseable.
    pub dropped: u64,
    /// How the task ended.
    pub exit: ChunkExit,
}

impl ChunkReport {
    fn new(chunk: usize) -> Self {
        Self {
            chunk,
            ticks: 0,
            dropped: 0,
            exit: ChunkExit::Cancelled,
        }
    }
}

/// Totals across all chunk tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunk tasks that finished cleanly.
    pub chunks: usize,
    /// Ticks enqueued.
    pub ticks: u64,
    /// Messages dropped as unparseable.
    pub dropped: u64,
}

impl IngestReport {
    fn record(&mut self, chunk: &ChunkReport) {
        self.chunks += 1;
        self.ticks += chunk.ticks;
        self.dropped += chunk.dropped;
    }
}

/// Read frames from one connection into the relay until stopped.
///
/// Unparseable frames are dropped and counted. A close frame, read error or
/// end of stream is returned as a connection error.
pub async fn pump_messages<S>(
    chunk: usize,
    stream: &mut S,
    relay: &RelaySender,
    stop: &mut watch::Receiver<bool>,
) -> Result<ChunkReport, WsError>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    let mut report = ChunkReport::new(chunk);

    loop {
        if *stop.borrow_and_update() {
            return Ok(report);
        }

        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() {
                    return Ok(report);
                }
            }

            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match parse_book_ticker(&text) {
                    Ok(ticker) => {
                        metrics::inc_ticks_received();
                        let tick = ticker.into_tick(unix_now());
                        if relay.enqueue(tick).await.is_err() {
                            warn!(chunk, "Relay closed, stopping stream");
                            report.exit = ChunkExit::RelayClosed;
                            return Ok(report);
                        }
                        report.ticks += 1;
                    }
                    Err(e) => {
                        metrics::inc_parse_errors("stream");
                        report.dropped += 1;
                        debug!(chunk, error = %e, "Dropping unparseable stream message");
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    warn!(chunk, frame = ?frame, "Stream closed by server");
                    return Err(WsError::ConnectionClosed {
                        code: frame.as_ref().map(|f| u16::from(f.code)),
                        reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
                    });
                }
                // tungstenite answers pings itself
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    error!(chunk, error = %e, "Stream read error");
                    return Err(e.into());
                }
                None => {
                    return Err(WsError::ConnectionClosed {
                        code: None,
                        reason: "stream ended".to_string(),
                    });
                }
            }
        }
    }
}

#[instrument(skip(connector, symbols, url, relay, stop), fields(symbols = symbols.len()))]
async fn run_chunk<K: FeedConnector>(
    connector: Arc<K>,
    chunk: usize,
    symbols: Vec<PairSymbol>,
    url: Url,
    relay: RelaySender,
    mut stop: watch::Receiver<bool>,
) -> Result<ChunkReport, WsError> {
    let mut stream = tokio::select! {
        conn = connector.connect(&url) => conn?,
        _ = stopped(stop.clone()) => return Ok(ChunkReport::new(chunk)),
    };

    metrics::inc_stream_connections();
    info!(chunk, first = ?symbols.first(), "Stream connected");

    let result = pump_messages(chunk, &mut stream, &relay, &mut stop).await;
    connector.close(&mut stream).await;

    if let Ok(report) = &result {
        info!(chunk, ticks = report.ticks, dropped = report.dropped, "Stream closed");
    }

    result
}

/// Supervises one streaming connection per symbol chunk.
pub struct StreamIngestor<K> {
    connector: Arc<K>,
    ws_url: String,
    relay: RelaySender,
}

impl<K: FeedConnector> StreamIngestor<K> {
    /// Create an ingestor that feeds `relay`.
    pub fn new(connector: K, ws_url: impl Into<String>, relay: RelaySender) -> Self {
        Self {
            connector: Arc::new(connector),
            ws_url: ws_url.into(),
            relay,
        }
    }

    /// Stream `symbols` until `cancel` is raised or a connection fails.
    ///
    /// Returns after every chunk task has finished. The ingestor's relay
    /// handle is consumed, so once this returns no producer can enqueue.
    pub async fn run(
        self,
        symbols: &[PairSymbol],
        chunk_size: NonZeroUsize,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<IngestReport, WsError> {
        let StreamIngestor {
            connector,
            ws_url,
            relay,
        } = self;

        let chunks = chunk_symbols(symbols, chunk_size);
        let urls = chunks
            .iter()
            .map(|chunk| stream_url(&ws_url, chunk))
            .collect::<Result<Vec<_>, _>>()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut tasks = JoinSet::new();

        for (id, (chunk, url)) in chunks.into_iter().zip(urls).enumerate() {
            tasks.spawn(run_chunk(
                connector.clone(),
                id,
                chunk,
                url,
                relay.clone(),
                stop_rx.clone(),
            ));
        }
        relay.close();

        info!(chunks = tasks.len(), symbols = symbols.len(), "Started stream tasks");

        let mut report = IngestReport::default();
        let mut failure: Option<WsError> = None;
        let mut stopping = *cancel.borrow_and_update();
        if stopping {
            let _ = stop_tx.send(true);
        }

        loop {
            tokio::select! {
                changed = cancel.changed(), if !stopping => {
                    if changed.is_err() || *cancel.borrow_and_update() {
                        info!("Stop requested, closing streams");
                        stopping = true;
                        let _ = stop_tx.send(true);
                    }
                }

                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };

                    match joined {
                        Ok(Ok(chunk)) => {
                            debug!(chunk = chunk.chunk, ticks = chunk.ticks, "Stream task finished");
                            report.record(&chunk);
                            if chunk.exit == ChunkExit::RelayClosed && !stopping {
                                stopping = true;
                                let _ = stop_tx.send(true);
                            }
                        }
                        Ok(Err(e)) => {
                            error!(error = %e, "Stream task failed, stopping remaining streams");
                            failure.get_or_insert(e);
                            stopping = true;
                            let _ = stop_tx.send(true);
                        }
                        Err(e) => {
                            error!(error = %e, "Stream task panicked");
                            failure.get_or_insert(WsError::TaskFailed(e.to_string()));
                            stopping = true;
                            let _ = stop_tx.send(true);
                        }
                    }
                }
            }
        }

        info!(
            chunks = report.chunks,
            ticks = report.ticks,
            dropped = report.dropped,
            "All stream tasks stopped"
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}
