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

/// Single-producer multi-consumer bounded ring (spec.md §4.4).
///
/// The producer side is a plain single-writer cursor, same technique as
/// [`crate::spsc::SpscRing`]. The consumer side claims a logical position
/// with `fetch_add` on a shared dequeue cursor, same technique as the
/// producer side of [`crate::mpsc::MpscRing`], just applied to reads instead
/// of writes.
pub struct SpmcRing<H: Handle> {
    /// Single-producer cursor; owned outright by the one writer thread.
    head: CachePadded<AtomicU64>,
    /// Shared consumer claim cursor; every `Get`/`Consume` step does exactly
    /// one `fetch_add(1, Relaxed)` against this.
    dequeue_pos: CachePadded<AtomicU64>,
    closed: AtomicBool,
    metrics: Metrics,
    mask: usize,
    buffer: Box<[Slot<H>]>,
}

unsafe impl<H: Handle> Send for SpmcRing<H> {}
unsafe impl<H: Handle> Sync for SpmcRing<H> {}

impl<H: Handle> SpmcRing<H> {
    /// # Errors
    /// Returns [`ConstructError::InvalidCapacity`] if `capacity` is not a
    /// power of two, or is smaller than 2.
    pub fn new(capacity: usize) -> Result<Self, ConstructError> {
        let mask = capacity::validate(capacity)?;
        let buffer: Box<[Slot<H>]> = (0..capacity).map(Slot::new).collect();

        Ok(Self {
            head: CachePadded::new(AtomicU64::new(0)),
            dequeue_pos: CachePadded::new(AtomicU64::new(0)),
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
    ///
    /// A `Put` that has already claimed a position before this call is
    /// observed is still written through; spec.md only guarantees delivery
    /// for handles enqueued strictly before `Close`, so a `Put` racing
    /// concurrently with `Close` has unspecified (but never unsafe) fate.
    pub fn close(&self) {
        debug_assert_close_monotonic!(self.is_closed(), true);
        self.closed.store(true, Ordering::Release);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Enqueues `h` from the single producer thread, spinning until the next
    /// slot frees up.
    pub fn put(&self, h: H) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let pos = self.head.load(Ordering::Relaxed);
        let idx = (pos as usize) & self.mask;
        let slot = &self.buffer[idx];

        let mut backoff = Backoff::new();
        loop {
            let stamp = slot.stamp.load(Ordering::Acquire);
            if stamp == pos {
                unsafe { slot.write(h) };
                slot.stamp.store(pos.wrapping_add(1), Ordering::Release);
                self.head.store(pos.wrapping_add(1), Ordering::Release);
                self.metrics.record_enqueued();
                return;
            }
            self.metrics.record_spin();
            backoff.snooze();
        }
    }

    fn try_get(&self) -> Option<H> {
        let pos = self.dequeue_pos.fetch_add(1, Ordering::Relaxed);
        let idx = (pos as usize) & self.mask;
        let slot = &self.buffer[idx];
        let expected_full = pos.wrapping_add(1);

        let mut backoff = Backoff::new();
        loop {
            let stamp = slot.stamp.load(Ordering::Acquire);
            if stamp == expected_full {
                debug_assert_initialized_read!(stamp, expected_full);
                let h = unsafe { slot.read() };
                let next_stamp = pos.wrapping_add(self.capacity() as u64);
                debug_assert_stamp_round!(stamp, next_stamp, self.capacity());
                slot.stamp.store(next_stamp, Ordering::Release);
                self.metrics.record_dequeued();
                return Some(h);
            }

            if self.is_closed() {
                let head = self.head.load(Ordering::Acquire);
                if pos >= head {
                    // This claimed position will never be filled: the
                    // producer has published its final handle and this
                    // consumer arrived too late. The ring is terminal once
                    // closed, so no future round will ever revisit this
                    // slot; leave its stamp untouched and report
                    // end-of-stream instead of blocking forever.
                    return None;
                }
            }

            self.metrics.record_spin();
            backoff.snooze();
        }
    }

    /// Dequeues one handle into `out` from any consumer thread, spinning
    /// until one is available.
    ///
    /// Returns `false` only once the queue is closed and this consumer's
    /// claimed position is beyond the last handle the producer published.
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
    ///
    /// Each claimed handle advances this consumer's share of the shared
    /// dequeue cursor exactly once; concurrent `Consume`/`Get` calls from
    /// other threads never see the same handle twice.
    pub fn consume<F>(&self, mut f: F)
    where
        F: FnMut(&mut Iter, H),
    {
        for remaining in (0..DEFAULT_CONSUME_BATCH_CAP).rev() {
            let Some(h) = self.try_get() else {
                return;
            };

            let position = self.dequeue_pos.load(Ordering::Relaxed).wrapping_sub(1);
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
    fn single_consumer_roundtrip() {
        let ring: SpmcRing<u64> = SpmcRing::new(8).unwrap();
        ring.put(11);
        let mut out = 0u64;
        assert!(ring.get(&mut out));
        assert_eq!(out, 11);
    }

    #[test]
    fn many_consumers_no_loss_no_duplication() {
        let ring = Arc::new(SpmcRing::<u64>::new(1024).unwrap());
        let total = 20_000u64;

        let producer_ring = Arc::clone(&ring);
        let producer = thread::spawn(move || {
            for i in 0..total {
                producer_ring.put(i);
            }
            producer_ring.close();
        });

        let consumers: Vec<_> = (0..8)
            .map(|_| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    let mut seen = vec![];
                    let mut out = 0u64;
                    while ring.get(&mut out) {
                        seen.push(out);
                    }
                    seen
                })
            })
            .collect();

        producer.join().unwrap();
        let mut all = vec![];
        for c in consumers {
            all.extend(c.join().unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        assert!(SpmcRing::<u64>::new(5).is_err());
    }
}
