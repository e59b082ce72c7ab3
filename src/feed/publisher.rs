//! Single publisher draining the relay queue into the broker.

use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use super::relay::RelayReceiver;
use crate::broker::Broker;
use crate::error::BrokerError;
use crate::metrics;

/// Summary returned when the publisher stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublisherReport {
    /// Ticks handed to the broker.
    pub published: u64,
}

/// Forwards relay ticks to one broker topic in dequeue order.
pub struct Publisher<B> {
    broker: B,
    topic: String,
}

impl<B: Broker> Publisher<B> {
    /// Create a publisher for `topic`.
    pub fn new(broker: B, topic: impl Into<String>) -> Self {
        Self {
            broker,
            topic: topic.into(),
        }
    }

    /// Publish until the relay closes, then release the broker connection.
    ///
    /// A broker failure ends the publisher; there is no retry.
    #[instrument(skip(self, relay), fields(topic = %self.topic))]
    pub async fn run(self, mut relay: RelayReceiver) -> Result<PublisherReport, BrokerError> {
        let mut report = PublisherReport::default();

        while let Some(tick) = relay.dequeue().await {
            let payload = serde_json::to_vec(&tick)?;

            let start = Instant::now();
            if let Err(e) = self.broker.publish(&self.topic, payload).await {
                warn!(error = %e, symbol = %tick.symbol, "Publish failed, stopping publisher");
                let _ = self.broker.close().await;
                return Err(e);
            }
            metrics::record_publish_latency(start);
            metrics::inc_ticks_published();

            report.published += 1;
            debug!(symbol = %tick.symbol, bid = tick.bid, ask = tick.ask, "Published tick");
        }

        self.broker.close().await?;
        info!(published = report.published, "Relay closed, publisher stopped");

        Ok(report)
    }
}
