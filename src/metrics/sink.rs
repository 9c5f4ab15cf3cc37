use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use super::{AggregateStats, RequestEvent};

/// Shared ingestion point for every session's [`RequestEvent`]s.
///
/// Aggregation happens under a single mutex held only for the fold of one
/// event, so a snapshot never observes half of an update. Raw events can be
/// forwarded to an external consumer through an unbounded channel.
#[derive(Debug, Default)]
pub struct EventSink {
    stats: Mutex<AggregateStats>,
    forward_tx: Option<mpsc::UnboundedSender<RequestEvent>>,
}

impl EventSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that also forwards every raw event to the returned
    /// receiver after it has been aggregated.
    #[must_use]
    pub fn with_forwarder() -> (Self, mpsc::UnboundedReceiver<RequestEvent>) {
        let (forward_tx, forward_rx) = mpsc::unbounded_channel();
        let sink = Self {
            stats: Mutex::new(AggregateStats::default()),
            forward_tx: Some(forward_tx),
        };
        (sink, forward_rx)
    }

    pub fn record(&self, event: RequestEvent) {
        self.lock_stats().record(&event);

        if let Some(forward_tx) = self.forward_tx.as_ref()
            && forward_tx.send(event).is_err()
        {
            tracing::trace!("Event forwarder closed; keeping aggregate only");
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> AggregateStats {
        self.lock_stats().clone()
    }

    // Poisoning is ignored; a partial stats update is preferable to losing
    // the whole aggregate at report time.
    fn lock_stats(&self) -> MutexGuard<'_, AggregateStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
