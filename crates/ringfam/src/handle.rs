//! The opaque, pointer-sized payload every ring moves.
//!
//! Letting a ring carry an arbitrary owned value would force either boxing
//! (an allocation per send) or a lot of unsafe `MaybeUninit` bookkeeping to
//! make drop semantics correct under a lock-free slot protocol. Instead, a
//! payload is a `Handle` — a plain, `Copy`, machine-word-sized reference to
//! caller-owned memory (an index into a table the caller owns, a raw pointer,
//! or a bare integer). The ring never interprets, copies beyond a bitwise
//! copy, or drops the referent; ownership of *what the handle points to*
//! transfers from producer to consumer, but the handle value itself needs no
//! destructor.

/// Marker trait for payloads a ring may carry.
///
/// # Safety
///
/// Implementors must be `Copy` and no larger than a machine word, so that a
/// slot can be written and read with a single non-atomic memory copy once the
/// surrounding stamp protocol has granted exclusive access. Implementing this
/// for a type that owns a destructor-bearing resource (anything that isn't
/// plain data) defeats the point of the contract: the ring will never run
/// that destructor.
///
/// Deliberately not bounded by `Send`: raw pointer handles (`*const T`,
/// `*mut T`) are never `Send`, yet moving the pointer *value* itself across
/// threads is exactly what this crate exists to do. Each ring type asserts
/// `Send`/`Sync` itself (see `spsc.rs` et al.) on the strength of this
/// contract — the caller is responsible for the referent being safe to
/// access from whichever thread ends up dequeuing the handle.
pub unsafe trait Handle: Copy + 'static {}

unsafe impl Handle for () {}
unsafe impl Handle for bool {}
unsafe impl Handle for u8 {}
unsafe impl Handle for u16 {}
unsafe impl Handle for u32 {}
unsafe impl Handle for u64 {}
unsafe impl Handle for usize {}
unsafe impl Handle for i8 {}
unsafe impl Handle for i16 {}
unsafe impl Handle for i32 {}
unsafe impl Handle for i64 {}
unsafe impl Handle for isize {}
unsafe impl Handle for std::num::NonZeroUsize {}
unsafe impl Handle for std::num::NonZeroU64 {}

unsafe impl<T: 'static> Handle for *const T {}
unsafe impl<T: 'static> Handle for *mut T {}
unsafe impl<T: 'static> Handle for std::ptr::NonNull<T> {}
