//! In-process room actor counters.
//!
//! Lightweight atomics read by tests and logged at shutdown; there is no
//! exporter surface in this crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters for one room actor.
#[derive(Debug, Default)]
pub struct RoomMetrics {
    /// Transport events processed.
    events_processed: AtomicU64,
    /// Chat messages appended (sent and received).
    chat_messages: AtomicU64,
    /// Roster refetches triggered by unresolved attendees.
    roster_refetches: AtomicU64,
    /// Cleanup passes actually executed (idempotence keeps this at 1).
    cleanup_runs: AtomicU64,
}

impl RoomMetrics {
    /// Create shared metrics for one room entry.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_event_processed(&self) {
        self.events_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_chat_message(&self) {
        self.chat_messages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_roster_refetch(&self) {
        self.roster_refetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cleanup_run(&self) {
        self.cleanup_runs.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn events_processed(&self) -> u64 {
        self.events_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn chat_messages(&self) -> u64 {
        self.chat_messages.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn roster_refetches(&self) -> u64 {
        self.roster_refetches.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn cleanup_runs(&self) -> u64 {
        self.cleanup_runs.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let metrics = RoomMetrics::new();
        metrics.record_event_processed();
        metrics.record_event_processed();
        metrics.record_chat_message();
        metrics.record_cleanup_run();

        assert_eq!(metrics.events_processed(), 2);
        assert_eq!(metrics.chat_messages(), 1);
        assert_eq!(metrics.roster_refetches(), 0);
        assert_eq!(metrics.cleanup_runs(), 1);
    }
}
