//! Event publisher - hands committed ledger events to observers
//!
//! Publication is best-effort. The ledger logs a failed publish and carries
//! on; the state machine never depends on an observer receiving anything.

use crate::{error::LedgerError, models::LedgerEvent, LedgerResult};
use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Event-emission channel consumed by the ledger
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn publish(&self, event: &LedgerEvent) -> LedgerResult<()>;
}

/// Fans events out to every live subscriber over a broadcast channel
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<LedgerEvent>,
}

impl BroadcastPublisher {
    /// Create a publisher buffering up to `capacity` events per lagging subscriber
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LedgerEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventSink for BroadcastPublisher {
    async fn publish(&self, event: &LedgerEvent) -> LedgerResult<()> {
        info!(
            "Published ledger event: kind={}, content={}",
            event.kind.as_str(),
            event.payload()
        );

        if self.sender.receiver_count() == 0 {
            debug!("No subscribers for {}", event.kind.as_str());
            return Ok(());
        }

        self.sender
            .send(event.clone())
            .map(|_| ())
            .map_err(|e| LedgerError::publish(e.to_string()))
    }
}
