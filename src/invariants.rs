//! Debug assertion macros for the coalescing ring buffer's invariants.
//!
//! These mirror the invariants documented in the data model section of the
//! design notes. They are only active in debug builds (`debug_assert!`), so
//! there is zero overhead in release builds.

// =============================================================================
// INV-SEQ-01: Ordering of the three sequence counters
// =============================================================================

/// Assert `lastRead < firstWrite <= nextWrite`.
///
/// Used after every mutation of `first_write` or `last_read`.
macro_rules! debug_assert_sequence_order {
    ($last_read:expr, $first_write:expr, $next_write:expr) => {
        debug_assert!(
            $last_read < $first_write && $first_write <= $next_write,
            "INV-SEQ-01 violated: last_read {} < first_write {} <= next_write {} does not hold",
            $last_read,
            $first_write,
            $next_write
        )
    };
}

// =============================================================================
// INV-SEQ-02: Bounded occupancy
// =============================================================================

/// Assert that occupancy (`next_write - last_read - 1`) never exceeds capacity.
macro_rules! debug_assert_bounded_occupancy {
    ($next_write:expr, $last_read:expr, $capacity:expr) => {
        debug_assert!(
            $next_write.wrapping_sub($last_read).wrapping_sub(1) <= $capacity as u64,
            "INV-SEQ-02 violated: occupancy {} exceeds capacity {}",
            $next_write.wrapping_sub($last_read).wrapping_sub(1),
            $capacity
        )
    };
}

// =============================================================================
// INV-SEQ-03: Monotonic progress
// =============================================================================

/// Assert that a sequence counter only increases.
macro_rules! debug_assert_monotonic {
    ($name:literal, $old:expr, $new:expr) => {
        debug_assert!(
            $new >= $old,
            "INV-SEQ-03 violated: {} decreased from {} to {}",
            $name,
            $old,
            $new
        )
    };
}

// =============================================================================
// INV-CLEAN-01: Cleanup never runs ahead of the consumer
// =============================================================================

/// Assert `lastCleaned <= lastRead`: the producer never nulls a key the
/// consumer has not yet read past.
macro_rules! debug_assert_cleanup_behind_read {
    ($last_cleaned:expr, $last_read:expr) => {
        debug_assert!(
            $last_cleaned <= $last_read,
            "INV-CLEAN-01 violated: last_cleaned {} is ahead of last_read {}",
            $last_cleaned,
            $last_read
        )
    };
}

pub(crate) use debug_assert_bounded_occupancy;
pub(crate) use debug_assert_cleanup_behind_read;
pub(crate) use debug_assert_monotonic;
pub(crate) use debug_assert_sequence_order;
