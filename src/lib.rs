//! Coalescing Ring Buffer — a lock-free SPSC queue that collapses pending
//! updates per key when the consumer falls behind.
//!
//! This is a from-scratch Rust take on the coalescing ring buffer pattern
//! used in latency-sensitive pipelines (e.g. streaming market data), where
//! intermediate values for a key may be discarded but the *latest* value
//! for each key must eventually be delivered, and the producer/consumer
//! handoff must never block.
//!
//! # Key Features
//!
//! - Bounded capacity, rounded up to a power of two for mask-based indexing
//! - In-place coalescing: a pending, unread entry for the same key is
//!   overwritten rather than enqueued a second time
//! - Never blocks: `offer` returns `false` instead of waiting when full
//!
//! # Example
//!
//! ```
//! use coalescing_ring::CoalescingRingBuffer;
//!
//! let buffer = CoalescingRingBuffer::<&str, f64>::new(16).unwrap();
//!
//! buffer.offer(Some("AAPL"), 189.12);
//! buffer.offer(Some("MSFT"), 402.55);
//! buffer.offer(Some("AAPL"), 189.40); // coalesces with the pending AAPL entry
//!
//! let mut sink = Vec::new();
//! let delivered = buffer.poll(&mut sink);
//! assert_eq!(delivered, 2);
//! assert_eq!(sink, vec![189.40, 402.55]);
//! ```

mod buffer;
mod config;
mod invariants;

pub use buffer::CoalescingRingBuffer;
pub use config::{CapacityError, Config};
