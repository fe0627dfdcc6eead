//! ringfam - bounded, lock-free, wait-free ring-buffer channels
//!
//! Four cardinalities of the same underlying idea, picked to match how many
//! threads sit on each end of a fixed-capacity ring:
//!
//! - [`SpscRing`] - one producer, one consumer
//! - [`MpscRing`] - many producers, one consumer
//! - [`SpmcRing`] - one producer, many consumers
//! - [`MpmcRing`] - many producers, many consumers
//!
//! All four move a [`Handle`]: a plain, `Copy`, machine-word-sized value the
//! ring never interprets or drops. There is no generic payload type and no
//! boxing - the caller owns whatever the handle refers to, and is
//! responsible for that referent's thread-safety and lifetime.
//!
//! Every operation is either wait-free (the multi-sided claim operations,
//! one `fetch_add`, no retry) or lock-free (the wait for a claimed slot to
//! become readable/writable, which always completes because the peer side
//! makes unconditional progress). None of the four rings ever takes a lock,
//! parks a thread, or allocates after construction.
//!
//! `Put` on a closed ring is a silent no-op; `Get`/`Consume` keep delivering
//! whatever was already in the ring and only report end-of-stream once it is
//! closed and drained. See each ring type's docs for the precise close/drain
//! contract, which differs slightly between the single- and multi-consumer
//! cases.
//!
//! # Example
//!
//! ```
//! use ringfam_rs::MpscRing;
//!
//! let ring: MpscRing<u64> = MpscRing::new(1024).unwrap();
//! ring.put(42);
//! ring.close();
//!
//! let mut out = 0u64;
//! assert!(ring.get(&mut out));
//! assert_eq!(out, 42);
//! assert!(!ring.get(&mut out));
//! ```

mod backoff;
mod capacity;
mod error;
mod handle;
pub(crate) mod invariants;
mod iter;
mod metrics;
mod mpmc;
mod mpsc;
mod slot;
mod spmc;
mod spsc;

pub use backoff::Backoff;
pub use error::ConstructError;
pub use handle::Handle;
pub use iter::{Iter, DEFAULT_CONSUME_BATCH_CAP};
pub use metrics::{Metrics, MetricsSnapshot};
pub use mpmc::MpmcRing;
pub use mpsc::MpscRing;
pub use spmc::SpmcRing;
pub use spsc::SpscRing;
