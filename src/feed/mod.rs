//! Live quote feed: streaming ingestion, relay queue and broker publisher.
//!
//! This module handles:
//! - Combined-stream message parsing and stream URL construction
//! - Chunked streaming connections feeding one relay queue
//! - The single publisher draining the relay into the broker

pub mod ingest;
pub mod message;
pub mod publisher;
pub mod relay;

pub use ingest::{chunk_symbols, FeedConnector, IngestReport, StreamIngestor, TungsteniteConnector};
pub use message::{parse_book_ticker, stream_url, BookTicker};
pub use publisher::{Publisher, PublisherReport};
pub use relay::{relay_queue, RelayReceiver, RelaySender};
