//! Per-consumer subscription to live events.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use crate::domain::ChatEvent;

/// One consumer's view of the live event stream.
///
/// Wraps a broadcast receiver. Every `LiveFeed` sees every event published
/// after it was created; a consumer that falls more than the bus capacity
/// behind skips the overflowed events and logs how many were lost.
#[derive(Debug)]
pub struct LiveFeed {
    rx: broadcast::Receiver<ChatEvent>,
    lagged_total: u64,
}

impl LiveFeed {
    /// Wraps a receiver obtained from [`crate::domain::EventBus::subscribe`].
    #[must_use]
    pub fn new(rx: broadcast::Receiver<ChatEvent>) -> Self {
        Self { rx, lagged_total: 0 }
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the bus has been dropped.
    pub async fn next(&mut self) -> Option<ChatEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(n)) => self.record_lag(n),
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next already-queued event without waiting.
    pub fn try_next(&mut self) -> Option<ChatEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(n)) => self.record_lag(n),
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Total number of events this feed skipped because it lagged.
    #[must_use]
    pub const fn lagged_total(&self) -> u64 {
        self.lagged_total
    }

    fn record_lag(&mut self, n: u64) {
        self.lagged_total = self.lagged_total.saturating_add(n);
        tracing::warn!(lagged = n, "live feed lagged behind event bus");
    }
}
