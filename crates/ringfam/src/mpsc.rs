use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::capacity;
use crate::error::ConstructError;
use crate::handle::Handle;
use crate::invariants::{
    debug_assert_close_monotonic, debug_assert_initialized_read, debug_assert_stamp_round,
};
use crate::iter::{Iter, DEFAULT_CONSUME_BATCH_CAP};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::slot::Slot;

/// Multi-producer single-consumer bounded ring (spec.md §4.3).
///
/// Producers claim a logical position with a plain `fetch_add` on a shared
/// enqueue cursor (spec.md §4.5 explains why no CAS is needed: the claim
/// itself can never fail, only the wait for the claimed slot to become
/// writable can). The single consumer walks `tail` exactly like
/// [`crate::spsc::SpscRing`] does, since there is only ever one reader.
pub struct MpscRing<H: Handle> {
    /// Shared producer claim cursor; every `Put` does exactly one
    /// `fetch_add(1, Relaxed)` against this.
    enqueue_pos: CachePadded<AtomicU64>,
    /// Single-consumer cursor; owned outright by the one reader thread.
    tail: CachePadded<AtomicU64>,
    closed: AtomicBool,
    metrics: Metrics,
    mask: usize,
    buffer: Box<[Slot<H>]>,
}

unsafe impl<H: Handle> Send for MpscRing<H> {}
unsafe impl<H: Handle> Sync for MpscRing<H> {}

impl<H: Handle> MpscRing<H> {
    /// # Errors
    /// Returns [`ConstructError::InvalidCapacity`] if `capacity` is not a
    /// power of two, or is smaller than 2.
    pub fn new(capacity: usize) -> Result<Self, ConstructError> {
        let mask = capacity::validate(capacity)?;
        let buffer: Box<[Slot<H>]> = (0..capacity).map(Slot::new).collect();

        Ok(Self {
            enqueue_pos: CachePadded::new(AtomicU64::new(0)),
            tail: CachePadded::new(AtomicU64::new(0)),
            closed: AtomicBool::new(false),
            metrics: Metrics::new(),
            mask,
            buffer,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the queue closed. Idempotent, safe to call from any thread.
    pub fn close(&self) {
        debug_assert_close_monotonic!(self.is_closed(), true);
        self.closed.store(true, Ordering::Release);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Enqueues `h` from any producer thread, spinning until a slot frees up.
    ///
    /// A no-op if the queue was already closed at the time this call
    /// started (spec.md §7). A `Put` racing a concurrent `Close` may still
    /// complete; spec.md §4.6 only guarantees that handles enqueued *before*
    /// `Close` are eventually delivered, not that every racing `Put` is
    /// rejected.
    pub fn put(&self, h: H) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let pos = self.enqueue_pos.fetch_add(1, Ordering::Relaxed);
        let idx = (pos as usize) & self.mask;
        let slot = &self.buffer[idx];

        let mut backoff = Backoff::new();
        loop {
            let stamp = slot.stamp.load(Ordering::Acquire);
            let diff = stamp.wrapping_sub(pos) as i64;

            if diff == 0 {
                unsafe { slot.write(h) };
                slot.stamp.store(pos.wrapping_add(1), Ordering::Release);
                self.metrics.record_enqueued();
                return;
            }

            // diff < 0: slot still belongs to a previous round, the consumer
            // hasn't caught up yet. Spin; the consumer is single-threaded and
            // always makes progress.
            self.metrics.record_spin();
            backoff.snooze();
        }
    }

    fn try_get(&self) -> Option<H> {
        let tail = self.tail.load(Ordering::Relaxed);
        let idx = (tail as usize) & self.mask;
        let slot = &self.buffer[idx];
        let expected_full = tail.wrapping_add(1);

        let mut backoff = Backoff::new();
        loop {
            let stamp = slot.stamp.load(Ordering::Acquire);
            if stamp == expected_full {
                debug_assert_initialized_read!(stamp, expected_full);
                let h = unsafe { slot.read() };
                let next_stamp = tail.wrapping_add(self.capacity() as u64);
                debug_assert_stamp_round!(stamp, next_stamp, self.capacity());
                slot.stamp.store(next_stamp, Ordering::Release);
                self.tail.store(tail.wrapping_add(1), Ordering::Relaxed);
                self.metrics.record_dequeued();
                return Some(h);
            }

            if self.is_closed() {
                let claimed = self.enqueue_pos.load(Ordering::Acquire);
                if tail >= claimed {
                    // No producer will ever claim this exact position: every
                    // claim increments `enqueue_pos` monotonically and the
                    // queue is terminal once closed, so this slot's stamp can
                    // be left untouched while we report end-of-stream. A
                    // producer that claimed `tail` before we observed `closed`
                    // but hasn't published its write yet is still mid-flight
                    // (`claimed > tail`), so we keep spinning for it instead.
                    return None;
                }
            }

            self.metrics.record_spin();
            backoff.snooze();
        }
    }

    /// Dequeues one handle into `out` from the single consumer thread,
    /// spinning until one is available.
    ///
    /// Returns `false` only once the queue is closed and every handle
    /// enqueued before the close has been delivered.
    pub fn get(&self, out: &mut H) -> bool {
        match self.try_get() {
            Some(h) => {
                *out = h;
                true
            }
            None => false,
        }
    }

    /// See [`crate::spsc::SpscRing::consume`].
    pub fn consume<F>(&self, mut f: F)
    where
        F: FnMut(&mut Iter, H),
    {
        for remaining in (0..DEFAULT_CONSUME_BATCH_CAP).rev() {
            let Some(h) = self.try_get() else {
                return;
            };

            let position = self.tail.load(Ordering::Relaxed).wrapping_sub(1);
            let mut iter = Iter::new(position, remaining);
            f(&mut iter, h);
            if iter.is_stopped() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn single_producer_roundtrip() {
        let ring: MpscRing<u64> = MpscRing::new(8).unwrap();
        ring.put(7);
        let mut out = 0u64;
        assert!(ring.get(&mut out));
        assert_eq!(out, 7);
    }

    #[test]
    fn many_producers_no_loss_no_duplication() {
        // spec.md §8 S4, scaled down
        let ring = Arc::new(MpscRing::<u64>::new(1024).unwrap());
        let producers = 8u64;
        let per_producer = 2000u64;

        let handles: Vec<_> = (0..producers)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        ring.put(p * per_producer + i);
                    }
                })
            })
            .collect();

        let total = producers * per_producer;
        let consumer_ring = Arc::clone(&ring);
        let consumer = thread::spawn(move || {
            let mut seen = Vec::with_capacity(total as usize);
            let mut out = 0u64;
            while (seen.len() as u64) < total {
                if consumer_ring.get(&mut out) {
                    seen.push(out);
                }
            }
            seen
        });

        for h in handles {
            h.join().unwrap();
        }
        let mut seen = consumer.join().unwrap();
        seen.sort_unstable();
        let expected: Vec<u64> = (0..total).collect();
        assert_eq!(seen, expected);
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        assert!(MpscRing::<u64>::new(6).is_err());
    }
}
