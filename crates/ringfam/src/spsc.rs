use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

use crate::backoff::Backoff;
use crate::capacity;
use crate::error::ConstructError;
use crate::handle::Handle;
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_close_monotonic, debug_assert_monotonic,
    debug_assert_tail_not_past_head,
};
use crate::iter::{Iter, DEFAULT_CONSUME_BATCH_CAP};
use crate::metrics::{Metrics, MetricsSnapshot};

/// Single-producer single-consumer bounded ring (spec.md §4.2).
///
/// The two sides never contend on each other's cursor directly: the producer
/// owns `head` outright, the consumer owns `tail` outright, and each side
/// keeps an unsynchronized cached view of the peer's cursor to avoid a
/// cross-core atomic load on every operation, refreshing it only when its
/// own cached view says the ring is full (producer) or empty (consumer).
/// This mirrors the teacher's `Ring<T>` reserve/commit cache, retargeted from
/// a zero-copy slice API to single-handle `Put`/`Get`.
pub struct SpscRing<H: Handle> {
    /// Producer cursor: next logical position a `Put` will claim.
    head: CachePadded<AtomicU64>,
    /// Producer's cached view of `tail`, refreshed only on a cache miss.
    cached_tail: UnsafeCell<u64>,
    /// Consumer cursor: next logical position a `Get`/`Consume` will claim.
    tail: CachePadded<AtomicU64>,
    /// Consumer's cached view of `head`, refreshed only on a cache miss.
    cached_head: UnsafeCell<u64>,
    closed: AtomicBool,
    metrics: Metrics,
    mask: usize,
    buffer: Box<[UnsafeCell<MaybeUninit<H>>]>,
}

// Safety: producer-only fields (`head`, `cached_tail`) are written exclusively
// by the single producer thread, consumer-only fields symmetrically by the
// single consumer thread; `buffer` slots are written by the producer and read
// by the consumer under the disjoint `[tail, head)` ranges the cursors
// enforce. Handle's own contract (handle.rs) covers whether H itself is safe
// to move across the producer/consumer thread boundary.
unsafe impl<H: Handle> Send for SpscRing<H> {}
unsafe impl<H: Handle> Sync for SpscRing<H> {}

impl<H: Handle> SpscRing<H> {
    /// Creates a new ring with room for `capacity` handles.
    ///
    /// # Errors
    /// Returns [`ConstructError::InvalidCapacity`] if `capacity` is not a
    /// power of two, or is smaller than 2.
    pub fn new(capacity: usize) -> Result<Self, ConstructError> {
        let mask = capacity::validate(capacity)?;
        let mut buffer = Vec::with_capacity(capacity);
        buffer.resize_with(capacity, || UnsafeCell::new(MaybeUninit::uninit()));

        Ok(Self {
            head: CachePadded::new(AtomicU64::new(0)),
            cached_tail: UnsafeCell::new(0),
            tail: CachePadded::new(AtomicU64::new(0)),
            cached_head: UnsafeCell::new(0),
            closed: AtomicBool::new(false),
            metrics: Metrics::new(),
            mask,
            buffer: buffer.into_boxed_slice(),
        })
    }

    /// Ring capacity (power of two, fixed at construction).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Approximate number of live (enqueued, undequeued) handles.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Relaxed);
        head.wrapping_sub(tail) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Marks the queue closed. Idempotent.
    pub fn close(&self) {
        debug_assert_close_monotonic!(self.is_closed(), true);
        self.closed.store(true, Ordering::Release);
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Enqueues `h`, spinning until a slot is free.
    ///
    /// A no-op if the queue has already been closed (spec.md §7: "a `Put`
    /// after `Close` is silently dropped").
    pub fn put(&self, h: H) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let mut backoff = Backoff::new();
        loop {
            if self.try_put(h) {
                return;
            }
            if self.closed.load(Ordering::Acquire) {
                return;
            }
            self.metrics.record_spin();
            backoff.snooze();
        }
    }

    fn try_put(&self, h: H) -> bool {
        let head = self.head.load(Ordering::Relaxed);
        let mut cached_tail = unsafe { *self.cached_tail.get() };

        if head.wrapping_sub(cached_tail) as usize >= self.capacity() {
            cached_tail = self.tail.load(Ordering::Acquire);
            unsafe {
                *self.cached_tail.get() = cached_tail;
            }
            if head.wrapping_sub(cached_tail) as usize >= self.capacity() {
                return false;
            }
        }
        debug_assert_bounded_count!(head.wrapping_sub(cached_tail) as usize, self.capacity());

        let idx = (head as usize) & self.mask;
        unsafe {
            (*self.buffer[idx].get()).write(h);
        }
        let next_head = head.wrapping_add(1);
        debug_assert_monotonic!("head", head, next_head);
        self.head.store(next_head, Ordering::Release);
        self.metrics.record_enqueued();
        true
    }

    fn try_get(&self) -> Option<H> {
        let tail = self.tail.load(Ordering::Relaxed);
        let mut cached_head = unsafe { *self.cached_head.get() };

        if tail == cached_head {
            cached_head = self.head.load(Ordering::Acquire);
            unsafe {
                *self.cached_head.get() = cached_head;
            }
            if tail == cached_head {
                return None;
            }
        }
        debug_assert_tail_not_past_head!(tail, cached_head);

        let idx = (tail as usize) & self.mask;
        let h = unsafe { (*self.buffer[idx].get()).assume_init() };
        let next_tail = tail.wrapping_add(1);
        debug_assert_monotonic!("tail", tail, next_tail);
        self.tail.store(next_tail, Ordering::Release);
        self.metrics.record_dequeued();
        Some(h)
    }

    /// Dequeues one handle into `out`, spinning until one is available.
    ///
    /// Returns `false` only once the queue is closed and fully drained.
    pub fn get(&self, out: &mut H) -> bool {
        let mut backoff = Backoff::new();
        loop {
            if let Some(h) = self.try_get() {
                *out = h;
                return true;
            }
            if self.closed.load(Ordering::Acquire) {
                // A last producer `Put` may have landed between our failed
                // `try_get` and observing `closed`; give it one more look.
                if let Some(h) = self.try_get() {
                    *out = h;
                    return true;
                }
                return false;
            }
            self.metrics.record_spin();
            backoff.snooze();
        }
    }

    /// Invokes `f(iter, handle)` once per dequeued handle, in FIFO order,
    /// until `iter.stop()` is called, the queue is closed and drained, or an
    /// internal batch cap (see [`crate::iter::DEFAULT_CONSUME_BATCH_CAP`]) is
    /// reached.
    ///
    /// `Get` and `Consume` may be interleaved freely on the same queue: both
    /// advance the same `tail` cursor through the same slot protocol.
    pub fn consume<F>(&self, mut f: F)
    where
        F: FnMut(&mut Iter, H),
    {
        for remaining in (0..DEFAULT_CONSUME_BATCH_CAP).rev() {
            let mut backoff = Backoff::new();
            let handle = loop {
                if let Some(h) = self.try_get() {
                    break Some(h);
                }
                if self.closed.load(Ordering::Acquire) {
                    if let Some(h) = self.try_get() {
                        break Some(h);
                    }
                    break None;
                }
                self.metrics.record_spin();
                backoff.snooze();
            };

            let Some(h) = handle else {
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

impl<H: Handle> Drop for SpscRing<H> {
    fn drop(&mut self) {
        // H: Copy has no drop glue, so unconsumed handles need no cleanup
        // beyond letting the buffer deallocate.
    }
}
