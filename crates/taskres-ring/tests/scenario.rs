//! End-to-end allocate/recycle sequences through the public API.

use taskres_core::{AllocError, TaskId};
use taskres_ring::{Diagnostics, FifoAllocator, PoolConfig, RingAllocator};
use taskres_test_utils::init_tracing;

#[test]
fn capacity_four_walkthrough() {
    init_tracing();
    let ring: RingAllocator<u64> = RingAllocator::with_capacity(4).unwrap();

    let (a, _) = ring.alloc_run(1).unwrap();
    let (b, _) = ring.alloc_run(1).unwrap();
    let (c, _) = ring.alloc_run(1).unwrap();
    assert_eq!((a, b, c), (0, 1, 2));
    assert_eq!(ring.pending(), 3);

    assert!(matches!(ring.alloc_run(1), Err(AllocError::Full { .. })));
    assert_eq!(ring.pending(), 3);

    assert!(ring.recycle_run(0, 1));
    assert_eq!(ring.pending(), 2);
    assert_eq!(ring.head(), 1);

    let (d, _) = ring.alloc_run(1).unwrap();
    assert_eq!(d, 3);
    assert_eq!(ring.pending(), 3);
    assert_eq!(ring.tail(), 0);
}

#[test]
fn failed_submission_rolls_back() {
    init_tracing();
    let ring: RingAllocator<u64> = RingAllocator::with_capacity(16).unwrap();
    ring.alloc_run(2).unwrap();
    let before = ring.pending();

    let submit = |payload: &mut u64| -> Result<(), &'static str> {
        *payload = 0xdead;
        Err("queue rejected command")
    };
    let reservation = ring.reserve_run(4).unwrap();
    let pos = reservation.pos();
    let outcome = reservation.with_payload(submit).unwrap();
    if outcome.is_ok() {
        reservation.commit();
    } else {
        drop(reservation);
    }

    assert_eq!(ring.pending(), before);
    assert_eq!(ring.get(pos), None);
    assert_eq!(ring.stats().rollbacks, 1);
}

#[test]
fn fifo_in_order_and_lazy_completion() {
    init_tracing();
    let fifo: FifoAllocator<u32> = FifoAllocator::with_capacity(8).unwrap();
    for id in 10..15 {
        let handle = fifo.alloc(TaskId(id)).unwrap();
        fifo.with_payload(handle, |p| *p = id * 2).unwrap();
    }
    // Task 10 maps to position 2, so positions 0 and 1 were skipped.
    assert_eq!(fifo.head(), 0);
    assert_eq!(fifo.pending(), 7);

    let handle = fifo.lookup(TaskId(12)).unwrap();
    assert_eq!(fifo.with_payload(handle, |p| *p), Some(24));

    assert!(fifo.recycle_through(TaskId(10)));
    assert_eq!(fifo.head(), 3);
    assert!(fifo.recycle_lazy(TaskId(13)));
    assert_eq!(fifo.head(), 3);
    assert!(fifo.recycle_lazy(TaskId(11)));
    // 11 is gone, 12 still blocks head.
    assert_eq!(fifo.head(), 4);
    assert!(fifo.recycle_through(TaskId(12)));
    assert_eq!(fifo.head(), 5);
    assert!(fifo.recycle_lazy(TaskId(14)));
    assert_eq!(fifo.pending(), 0);
}

#[test]
fn dump_renders_both_windows() {
    init_tracing();
    let config = PoolConfig::new(8);
    let ring: RingAllocator<u64> = RingAllocator::new(config).unwrap();
    ring.alloc_run(2).unwrap();
    let snapshot = ring.dump();
    snapshot.log();
    let text = snapshot.to_string();
    assert!(text.starts_with("capacity=8 head=0 tail=2 pending=2"));
    assert!(text.contains("head window:"));
    assert!(text.contains("tail window:"));
    assert!(text.contains("0:0:v"));
}
