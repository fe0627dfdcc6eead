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

/// Multi-producer multi-consumer bounded ring (spec.md §4.5).
///
/// Both sides claim a logical position with `fetch_add` against their own
/// shared cursor and then wait on the claimed slot's stamp — the union of
/// [`crate::mpsc::MpscRing`]'s producer side and [`crate::spmc::SpmcRing`]'s
/// consumer side over one shared slot array. No compare-and-swap anywhere:
/// a claim can never fail, it can only have to wait.
pub struct MpmcRing<H: Handle> {
    /// Shared producer claim cursor.
    enqueue_pos: CachePadded<AtomicU64>,
    /// Shared consumer claim cursor.
    dequeue_pos: CachePadded<AtomicU64>,
    closed: AtomicBool,
    metrics: Metrics,
    mask: usize,
    buffer: Box<[Slot<H>]>,
}

unsafe impl<H: Handle> Send for MpmcRing<H> {}
unsafe impl<H: Handle> Sync for MpmcRing<H> {}

impl<H: Handle> MpmcRing<H> {
    /// # Errors
    /// Returns [`ConstructError::InvalidCapacity`] if `capacity` is not a
    /// power of two, or is smaller than 2.
    pub fn new(capacity: usize) -> Result<Self, ConstructError> {
        let mask = capacity::validate(capacity)?;
        let buffer: Box<[Slot<H>]> = (0..capacity).map(Slot::new).collect();

        Ok(Self {
            enqueue_pos: CachePadded::new(AtomicU64::new(0)),
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
    /// A `Put` that claims its position strictly before this call is
    /// observed elsewhere is always delivered. A `Put` racing concurrently
    /// with `Close` has unspecified (but never unsafe) fate, same as
    /// [`crate::spmc::SpmcRing::close`].
    pub fn close(&self) {
        debug_assert_close_monotonic!(self.is_closed(), true);
        self.closed.store(true, Ordering::Release);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Enqueues `h` from any producer thread, spinning until its claimed
    /// slot frees up.
    ///
    /// A no-op if the queue was already closed at the time this call
    /// checked (spec.md §7).
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
            if stamp == pos {
                unsafe { slot.write(h) };
                slot.stamp.store(pos.wrapping_add(1), Ordering::Release);
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
                let claimed = self.enqueue_pos.load(Ordering::Acquire);
                if pos >= claimed {
                    // No producer will ever claim this exact position again
                    // (every claim increments `enqueue_pos` monotonically),
                    // so this slot's stamp can be left untouched.
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
    /// claimed position is beyond every handle any producer has claimed.
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
    fn roundtrip() {
        let ring: MpmcRing<u64> = MpmcRing::new(8).unwrap();
        ring.put(3);
        let mut out = 0u64;
        assert!(ring.get(&mut out));
        assert_eq!(out, 3);
    }

    #[test]
    fn many_producers_many_consumers_no_loss_no_duplication() {
        // spec.md §8 S4/S5, scaled down
        let ring = Arc::new(MpmcRing::<u64>::new(1024).unwrap());
        let producers = 6u64;
        let per_producer = 3000u64;
        let total = producers * per_producer;

        let producer_handles: Vec<_> = (0..producers)
            .map(|p| {
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for i in 0..per_producer {
                        ring.put(p * per_producer + i);
                    }
                })
            })
            .collect();

        let closer_ring = Arc::clone(&ring);
        let closer = thread::spawn(move || {
            for h in producer_handles {
                h.join().unwrap();
            }
            closer_ring.close();
        });

        let consumers: Vec<_> = (0..6)
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

        closer.join().unwrap();
        let mut all = vec![];
        for c in consumers {
            all.extend(c.join().unwrap());
        }
        all.sort_unstable();
        assert_eq!(all, (0..total).collect::<Vec<_>>());
    }

    #[test]
    fn rejects_non_power_of_two_capacity() {
        assert!(MpmcRing::<u64>::new(9).is_err());
    }
}
