//! Benchmark fixtures for the taskres slot allocators.
//!
//! - [`filled_ring`]: a run allocator with a steady backlog at head
//! - [`filled_fifo`]: a FIFO allocator with a steady backlog at head

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::VecDeque;

use taskres_core::TaskId;
use taskres_ring::{FifoAllocator, RingAllocator};

/// Ring of `capacity` slots with `backlog` runs of `run_len` outstanding.
///
/// Returns the allocator together with the first positions of the
/// outstanding runs, oldest first.
pub fn filled_ring(
    capacity: u32,
    backlog: u32,
    run_len: u32,
) -> (RingAllocator<u64>, VecDeque<u32>) {
    let ring = RingAllocator::with_capacity(capacity).unwrap();
    let positions = (0..backlog)
        .map(|_| ring.alloc_run(run_len).unwrap().0)
        .collect();
    (ring, positions)
}

/// FIFO of `capacity` slots holding tasks `0..backlog`.
pub fn filled_fifo(capacity: u32, backlog: u32) -> FifoAllocator<u64> {
    let fifo = FifoAllocator::with_capacity(capacity).unwrap();
    for id in 0..backlog {
        fifo.alloc(TaskId(id)).unwrap();
    }
    fifo
}
