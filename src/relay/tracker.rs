//! Relay instance lifecycle tracking.
//!
//! # Responsibilities
//! - Generate unique relay IDs for tracing
//! - Count live relay instances until every pump task has exited
//! - Publish the live count as a metric

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::observability::metrics;

/// Global atomic counter for relay IDs.
static RELAY_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a relay instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RelayId(u64);

impl RelayId {
    /// Generate a new unique relay ID.
    pub fn new() -> Self {
        Self(RELAY_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RelayId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelayId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "relay-{}", self.0)
    }
}

/// Counts relay instances that still own at least one running task.
#[derive(Debug, Clone, Default)]
pub struct RelayTracker {
    active_count: Arc<AtomicU64>,
}

impl RelayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new relay. Returns a guard that decrements on drop.
    pub fn track(&self) -> RelayGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        metrics::relay_opened();
        RelayGuard {
            active_count: Arc::clone(&self.active_count),
            id: RelayId::new(),
        }
    }

    /// Get current live relay count.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until no relay is live. Returns false if `timeout` lapses first.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.active_count() > 0 {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        true
    }
}

/// Guard that tracks a relay's lifetime.
/// Shared by the pump's tasks; the count drops when the last one releases it.
#[derive(Debug)]
pub struct RelayGuard {
    active_count: Arc<AtomicU64>,
    id: RelayId,
}

impl RelayGuard {
    pub fn id(&self) -> RelayId {
        self.id
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        metrics::relay_closed();
        tracing::trace!(relay_id = %self.id, "Relay released");
    }
}
