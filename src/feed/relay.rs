//! Bounded relay queue between stream tasks (many writers) and the publisher
//! (one reader).
//!
//! Closing is explicit and structural: the queue closes once every
//! [`RelaySender`] has been dropped, so it cannot close while a producer can
//! still enqueue. The reader sees every queued tick before it sees the close.

use tokio::sync::mpsc;

use crate::error::RelayClosed;
use crate::market::Tick;

/// Create a relay queue holding at most `capacity` pending ticks.
pub fn relay_queue(capacity: usize) -> (RelaySender, RelayReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (RelaySender { tx }, RelayReceiver { rx })
}

/// Producer handle. Clone one per stream task.
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::Sender<Tick>,
}

impl RelaySender {
    /// Enqueue a tick, waiting for space when the queue is full.
    pub async fn enqueue(&self, tick: Tick) -> Result<(), RelayClosed> {
        self.tx.send(tick).await.map_err(|_| RelayClosed)
    }

    /// Give up this producer's handle.
    pub fn close(self) {
        drop(self);
    }

    /// Whether the reader has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer handle owned by the publisher.
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::Receiver<Tick>,
}

impl RelayReceiver {
    /// Next tick in FIFO order; `None` once closed and drained.
    pub async fn dequeue(&mut self) -> Option<Tick> {
        self.rx.recv().await
    }

    /// Ticks currently waiting.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether no ticks are waiting.
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}
