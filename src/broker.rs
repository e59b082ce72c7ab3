//! Message broker seam between the publisher and the cache writer.
//!
//! The wire client for a real broker lives outside this crate; anything that
//! implements [`Broker`] (publish side) and [`Consumer`] (delivery side) can
//! carry the relay messages. [`MemoryBroker`] is a single-queue in-process
//! broker used when both halves run in one process and in tests.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::error::BrokerError;

/// Publish side of a broker connection.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Publish one message atomically to `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Release the connection. Consumers see end-of-stream after draining.
    async fn close(&self) -> Result<(), BrokerError>;
}

/// Delivery side of a broker subscription.
#[async_trait]
pub trait Consumer: Send {
    /// Next delivered message body, or `None` once the broker is closed.
    async fn next_delivery(&mut self) -> Option<Vec<u8>>;
}

/// In-process broker with one declared queue.
#[derive(Debug, Clone)]
pub struct MemoryBroker {
    topic: Arc<str>,
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>>,
}

/// Subscription to a [`MemoryBroker`] queue.
#[derive(Debug)]
pub struct MemoryConsumer {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MemoryBroker {
    /// Declare `topic` and return the broker handle and its only consumer.
    pub fn channel(topic: &str) -> (Self, MemoryConsumer) {
        let (tx, rx) = mpsc::unbounded_channel();
        let broker = Self {
            topic: Arc::from(topic),
            tx: Arc::new(Mutex::new(Some(tx))),
        };
        (broker, MemoryConsumer { rx })
    }

    /// Declared queue name.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<Vec<u8>>> {
        self.tx.lock().ok().and_then(|guard| guard.clone())
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if topic != &*self.topic {
            return Err(BrokerError::UnknownTopic(topic.to_string()));
        }

        let tx = self.sender().ok_or(BrokerError::Closed)?;
        tx.send(payload).map_err(|_| BrokerError::Closed)
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if let Ok(mut guard) = self.tx.lock() {
            if guard.take().is_some() {
                debug!(topic = %self.topic, "Broker connection closed");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer for MemoryConsumer {
    async fn next_delivery(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}
