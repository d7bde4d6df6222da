//! Miri-compatible tests exercising the buffer's unsafe cell accesses.
//!
//! Run with: `cargo +nightly miri test --test miri_tests`
//!
//! These are deliberately small (capacity 2-4) since miri's interpreter is
//! orders of magnitude slower than native execution.

use coalescing_ring::CoalescingRingBuffer;

#[test]
fn miri_basic_offer_and_poll() {
    let buf = CoalescingRingBuffer::<u64, u64>::new(4).unwrap();
    assert!(buf.offer(Some(1), 100));
    assert!(buf.offer(Some(2), 200));

    let mut sink = Vec::new();
    let n = buf.poll(&mut sink);
    assert_eq!(n, 2);
    assert_eq!(sink, vec![100, 200]);
}

#[test]
fn miri_coalesce_reuses_slot() {
    let buf = CoalescingRingBuffer::<u64, u64>::new(2).unwrap();
    assert!(buf.offer(Some(1), 100));
    assert!(buf.offer(Some(1), 200));
    assert!(buf.offer(Some(1), 300));

    let mut sink = Vec::new();
    buf.poll(&mut sink);
    assert_eq!(sink, vec![300]);
}

#[test]
fn miri_wraparound_reclaims_cells() {
    let buf = CoalescingRingBuffer::<u64, u64>::new(2).unwrap();
    for round in 0..8u64 {
        assert!(buf.offer(Some(round), round));
        let mut sink = Vec::new();
        buf.poll(&mut sink);
        assert_eq!(sink, vec![round]);
    }
}

#[test]
fn miri_drop_releases_non_copy_keys() {
    // Keys are dropped through an ordinary `Box<[Option<K>]>`, so a
    // heap-allocated key type exercises the buffer's teardown path under
    // miri's leak/UB checks.
    let buf = CoalescingRingBuffer::<String, u64>::new(4).unwrap();
    assert!(buf.offer(Some("AAPL".to_string()), 1));
    assert!(buf.offer(Some("MSFT".to_string()), 2));
    drop(buf);
}
