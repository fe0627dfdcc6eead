use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters for monitoring ring activity.
///
/// This is the crate's only observability surface: the hot `Put`/`Get` path
/// never formats a log line, so the counters here are the cheap, always-on
/// alternative. Read with `snapshot()` from any thread at any time; updates
/// use `Relaxed` ordering since these are monitoring counters, not part of
/// the synchronization protocol.
#[derive(Debug, Default)]
pub struct Metrics {
    enqueued: AtomicU64,
    dequeued: AtomicU64,
    spin_iterations: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dequeued(&self) {
        self.dequeued.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_spin(&self) {
        self.spin_iterations.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot of the current counter values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dequeued: self.dequeued.load(Ordering::Relaxed),
            spin_iterations: self.spin_iterations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of a ring's [`Metrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub enqueued: u64,
    pub dequeued: u64,
    pub spin_iterations: u64,
}
