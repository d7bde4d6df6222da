use crate::invariants::{
    debug_assert_bounded_occupancy, debug_assert_cleanup_behind_read, debug_assert_monotonic,
    debug_assert_sequence_order,
};
use crate::Config;
use crossbeam_utils::atomic::AtomicCell;
use std::cell::{Cell, UnsafeCell};
use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// MEMORY ORDERING & SYNCHRONIZATION STRATEGY
// =============================================================================
//
// This SPSC ring buffer adds an in-place coalescing path on top of the usual
// producer/consumer handoff, so it needs two ordering regimes:
//
// ## One-directional publications (plain release/acquire)
//
// `next_write` is written only by the producer and read only by the
// consumer; `last_read` is written only by the consumer and read only by
// the producer. Each pair only ever needs to synchronize in one direction,
// so a release-store paired with an acquire-load is enough:
// - Producer: write K[.], store V[.] (release-via-AtomicCell), then
//   `next_write.store(.., Release)`.
// - Consumer: `next_write.load(Acquire)`, read V[.], then
//   `last_read.store(.., Release)`.
//
// ## The coalesce race (sequentially consistent)
//
// `offer`'s coalesce path stores a new value into an existing slot and then
// re-reads `first_write` to check whether the consumer has already advanced
// past that slot. `poll` does the mirror image: it stores `first_write`
// before reading the slot's value. This is the classic message-passing
// (store-buffering) pattern — release/acquire on two *different* atomics
// does not prevent both sides from observing stale data on a weak memory
// model. Both sides of this exchange therefore use sequentially consistent
// ordering: `first_write` is a plain `AtomicU64` always accessed with
// `Ordering::SeqCst`, and the value cells are `AtomicCell<Option<V>>`, whose
// `load`/`store` are always sequentially consistent (falling back to a
// per-cell spinlock for types too large to move atomically) — exactly the
// "if only sequentially consistent atomics are available, use them" fallback
// this design allows.
//
// =============================================================================

/// Wrapper type that pads a field to 128 bytes, keeping producer-hot and
/// consumer-hot counters on separate cache lines so cross-core traffic from
/// one side doesn't stall the other.
#[repr(align(128))]
struct CacheAligned<T> {
    value: T,
}

impl<T> CacheAligned<T> {
    const fn new(value: T) -> Self {
        Self { value }
    }
}

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

/// A bounded SPSC ring buffer that coalesces pending updates per key.
///
/// Exactly one thread may call [`offer`](Self::offer); exactly one
/// (possibly different) thread may call [`poll`](Self::poll). Calling either
/// from more than one thread at a time is undefined behavior that this type
/// does not detect — callers are responsible for upholding the
/// single-producer/single-consumer contract themselves.
pub struct CoalescingRingBuffer<K, V> {
    // === PRODUCER-OWNED, CONSUMER-OBSERVED ===
    next_write: CacheAligned<AtomicU64>,

    // === CONSUMER-OWNED, PRODUCER-OBSERVED (racy exchange, see module docs) ===
    first_write: CacheAligned<AtomicU64>,

    // === CONSUMER-OWNED, PRODUCER-OBSERVED ===
    last_read: CacheAligned<AtomicU64>,

    // === PRODUCER-PRIVATE ===
    last_cleaned: Cell<u64>,

    // === OBSERVABILITY ===
    rejection_count: AtomicU64,

    config: Config,

    /// Non-atomic; written and read only by the producer.
    keys: UnsafeCell<Box<[Option<K>]>>,
    /// Atomic cells; written by the producer, read by the consumer.
    values: Box<[AtomicCell<Option<V>>]>,
}

// Safety: the single-producer/single-consumer protocol ensures `keys` is
// only ever touched from the producer thread, and `values` is only shared
// through atomic operations.
unsafe impl<K: Send, V: Send> Send for CoalescingRingBuffer<K, V> {}
unsafe impl<K: Send, V: Send> Sync for CoalescingRingBuffer<K, V> {}

impl<K, V> CoalescingRingBuffer<K, V> {
    /// Creates a new buffer sized to the next power of two `>= requested_capacity`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CapacityError`] if `requested_capacity` is `0` or
    /// larger than the crate's upper bound.
    pub fn new(requested_capacity: usize) -> Result<Self, crate::CapacityError> {
        let config = Config::new(requested_capacity)?;
        let capacity = config.capacity();

        let keys = std::iter::repeat_with(|| None)
            .take(capacity)
            .collect::<Vec<Option<K>>>()
            .into_boxed_slice();
        let values = (0..capacity)
            .map(|_| AtomicCell::new(None))
            .collect::<Vec<AtomicCell<Option<V>>>>()
            .into_boxed_slice();

        Ok(Self {
            next_write: CacheAligned::new(AtomicU64::new(1)),
            first_write: CacheAligned::new(AtomicU64::new(1)),
            last_read: CacheAligned::new(AtomicU64::new(0)),
            last_cleaned: Cell::new(0),
            rejection_count: AtomicU64::new(0),
            config,
            keys: UnsafeCell::new(keys),
            values,
        })
    }

    // ---------------------------------------------------------------------
    // OBSERVABILITY
    // ---------------------------------------------------------------------

    /// Returns the rounded-up capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.config.capacity()
    }

    #[inline]
    fn mask(&self) -> u64 {
        self.config.mask()
    }

    /// Returns a snapshot of the current occupancy. May be stale the moment
    /// it returns if the other thread is concurrently active.
    #[inline]
    pub fn size(&self) -> u64 {
        let next_write = self.next_write.load(Ordering::Relaxed);
        let last_read = self.last_read.load(Ordering::Relaxed);
        next_write.wrapping_sub(last_read).wrapping_sub(1)
    }

    /// Returns true if [`size`](Self::size) equals [`capacity`](Self::capacity).
    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity() as u64
    }

    /// Returns the cumulative count of `offer` calls that returned `false`.
    #[inline]
    pub fn rejection_count(&self) -> u64 {
        self.rejection_count.load(Ordering::Relaxed)
    }
}

// `AtomicCell::load`/`store` require `T: Copy`, so every method that touches
// the value array lives in a block bounded on `V: Copy`.
impl<K, V: Copy> CoalescingRingBuffer<K, V> {
    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Offers `value` under `key`.
    ///
    /// If an unread slot already holds `key`, its value is replaced in
    /// place (coalesced) and `true` is returned. Otherwise, if there is
    /// room, a new slot is appended and `true` is returned. If the buffer
    /// is full and no coalescing was possible, the rejection counter is
    /// incremented, neither array is mutated, and `false` is returned.
    ///
    /// A `key` of `None` never coalesces — it always appends (or is
    /// rejected when full).
    ///
    /// Never blocks. Must only be called by the single producer.
    pub fn offer(&self, key: Option<K>, value: V) -> bool
    where
        K: PartialEq,
    {
        let next_write = self.next_write.load(Ordering::Relaxed);

        if let Some(ref k) = key {
            if let Some(outcome) = self.try_coalesce(k, value, next_write) {
                return outcome;
            }
        }

        self.append(next_write, key, value)
    }

    /// Scans `[first_write, next_write)` for a slot whose key matches `k`.
    ///
    /// Returns `Some(true)`/`Some(false)` if a coalesce attempt was made
    /// and resolved (accepted, or the consumer raced past and it must fall
    /// through to append is signaled by returning `None` instead). Returns
    /// `None` if no matching key was found, in which case the caller should
    /// fall through to [`append`](Self::append).
    fn try_coalesce(&self, k: &K, value: V, next_write: u64) -> Option<bool>
    where
        K: PartialEq,
    {
        let mask = self.mask();
        let mut s = self.first_write.load(Ordering::SeqCst);

        while s < next_write {
            let idx = (s & mask) as usize;

            // SAFETY: the key array is written and read only by the
            // producer; no concurrent access is possible.
            let matches = unsafe { (*self.keys.get())[idx].as_ref() } == Some(k);

            if matches {
                self.values[idx].store(Some(value));

                // Re-read first_write: if the consumer has not advanced
                // past `s`, the coalesce lands cleanly. Otherwise the
                // consumer raced ahead between the key match and the value
                // store, so abandon the scan and append instead.
                if self.first_write.load(Ordering::SeqCst) <= s {
                    return Some(true);
                }
                return None;
            }

            s += 1;
        }

        None
    }

    /// Appends a fresh entry at `next_write`, rejecting if the buffer is full.
    fn append(&self, next_write: u64, key: Option<K>, value: V) -> bool {
        let last_read = self.last_read.load(Ordering::Acquire);
        let occupancy = next_write.wrapping_sub(last_read).wrapping_sub(1);

        if occupancy == self.capacity() as u64 {
            self.rejection_count.fetch_add(1, Ordering::Release);
            return false;
        }

        self.cleanup(last_read);

        let idx = (next_write & self.mask()) as usize;
        // SAFETY: single-producer access to the key array.
        unsafe {
            (*self.keys.get())[idx] = key;
        }
        self.values[idx].store(Some(value));

        let new_next_write = next_write + 1;
        debug_assert_monotonic!("next_write", next_write, new_next_write);
        debug_assert_bounded_occupancy!(new_next_write, last_read, self.capacity());
        self.next_write.store(new_next_write, Ordering::Release);

        true
    }

    /// Clears keys and values for slots the consumer has already read,
    /// from `last_cleaned` up to `last_read`.
    fn cleanup(&self, last_read: u64) {
        let last_cleaned = self.last_cleaned.get();
        debug_assert_cleanup_behind_read!(last_cleaned, last_read);

        if last_cleaned == last_read {
            return;
        }

        let mask = self.mask();
        let mut s = last_cleaned;
        while s < last_read {
            let idx = (s & mask) as usize;
            // SAFETY: single-producer access to the key array.
            unsafe {
                (*self.keys.get())[idx] = None;
            }
            self.values[idx].store(None);
            s += 1;
        }

        self.last_cleaned.set(last_read);
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Drains every currently visible entry into `sink`, in ascending
    /// sequence order, and returns the count moved.
    ///
    /// Never blocks. Must only be called by the single consumer.
    pub fn poll<S>(&self, sink: &mut S) -> usize
    where
        S: Extend<V>,
    {
        let last_read = self.last_read.load(Ordering::Relaxed);
        let next_write = self.next_write.load(Ordering::Acquire);

        // Publish the new floor before reading any value, so a concurrent
        // coalesce either lands before this store or sees it on re-read
        // and diverts to append.
        self.first_write.store(next_write, Ordering::SeqCst);

        let mask = self.mask();
        let mut drained = Vec::with_capacity(next_write.wrapping_sub(last_read).saturating_sub(1) as usize);
        let mut s = last_read + 1;
        while s < next_write {
            let idx = (s & mask) as usize;
            let value = self.values[idx].load();
            debug_assert!(
                value.is_some(),
                "live slot at sequence {s} unexpectedly had no value"
            );
            if let Some(v) = value {
                drained.push(v);
            }
            s += 1;
        }
        let count = drained.len();
        sink.extend(drained);

        let new_last_read = next_write - 1;
        debug_assert_monotonic!("last_read", last_read, new_last_read);
        debug_assert_sequence_order!(new_last_read, self.first_write.load(Ordering::Relaxed), next_write);
        self.last_read.store(new_last_read, Ordering::Release);

        count
    }
}
