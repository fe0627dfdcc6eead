//! Debug assertion macros for the ring invariants documented in the crate's
//! top-level docs (`spec.md` §3 "Invariants (must always hold)").
//!
//! Only active in debug builds (`debug_assert!`), so there is zero overhead
//! in release builds. Shared by `SpscRing`, `MpscRing`, `SpmcRing` and
//! `MpmcRing`.

// =============================================================================
// INV-SEQ-01: Bounded live count — 0 <= tail <= head, head - tail <= capacity
// =============================================================================

macro_rules! debug_assert_bounded_count {
    ($count:expr, $capacity:expr) => {
        debug_assert!(
            $count <= $capacity,
            "INV-SEQ-01 violated: live count {} exceeds capacity {}",
            $count,
            $capacity
        )
    };
}

macro_rules! debug_assert_tail_not_past_head {
    ($tail:expr, $head:expr) => {
        debug_assert!(
            $tail <= $head,
            "INV-SEQ-01 violated: tail {} advanced past head {}",
            $tail,
            $head
        )
    };
}

// =============================================================================
// INV-SEQ-02: Monotonic progress of a cursor or a per-slot stamp
// =============================================================================

macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-02 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-SEQ-03: per-slot stamp advances by exactly 1 (producer publishing a
// write) or by exactly capacity - 1 (consumer retiring a slot into the next
// round), and never any other delta
// =============================================================================

macro_rules! debug_assert_stamp_round {
    ($old_stamp:expr, $new_stamp:expr, $capacity:expr) => {
        debug_assert!(
            $new_stamp.wrapping_sub($old_stamp) == ($capacity as u64 - 1)
                || $new_stamp.wrapping_sub($old_stamp) == 1,
            "INV-SEQ-03 violated: stamp moved from {} to {} (capacity {})",
            $old_stamp,
            $new_stamp,
            $capacity
        )
    };
}

// =============================================================================
// INV-INIT-01: only read a slot once its stamp has signalled "full"
// =============================================================================

macro_rules! debug_assert_initialized_read {
    ($stamp:expr, $expected_full:expr) => {
        debug_assert!(
            $stamp == $expected_full,
            "INV-INIT-01 violated: reading slot with stamp {} (expected {})",
            $stamp,
            $expected_full
        )
    };
}

// =============================================================================
// INV-CLOSE-01: once closed is observed true it is never observed false again
// =============================================================================

macro_rules! debug_assert_close_monotonic {
    ($was_closed:expr, $is_closed:expr) => {
        debug_assert!(
            !$was_closed || $is_closed,
            "INV-CLOSE-01 violated: closed flag flipped back to false"
        )
    };
}

pub(crate) use debug_assert_bounded_count;
pub(crate) use debug_assert_close_monotonic;
pub(crate) use debug_assert_initialized_read;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_stamp_round;
pub(crate) use debug_assert_tail_not_past_head;
