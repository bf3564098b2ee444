//! Cumulative allocator counters.
//!
//! [`AllocStats`] is a plain snapshot; the live counters are atomics so the
//! allocate and recycle paths can bump them without sharing a lock.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters accumulated since construction (or the last reset).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AllocStats {
    /// Successful allocations minus rollbacks.
    pub allocations: u64,
    /// Allocation attempts rejected with `Full`.
    pub full_rejections: u64,
    /// Allocations undone by a rollback.
    pub rollbacks: u64,
    /// Slots returned to the pool by a recycle call.
    pub recycled: u64,
    /// Lookups that found nothing: stale id, recycled slot, empty pool, or
    /// a position outside the occupied window.
    pub stale_reads: u64,
}

#[derive(Default)]
pub(crate) struct Counters {
    allocations: AtomicU64,
    full_rejections: AtomicU64,
    rollbacks: AtomicU64,
    recycled: AtomicU64,
    stale_reads: AtomicU64,
}

impl Counters {
    pub(crate) fn allocation(&self) {
        self.allocations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn full_rejection(&self) {
        self.full_rejections.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn rollback(&self) {
        // Only ever follows an allocation, but never wrap below zero.
        let _ = self
            .allocations
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| {
                Some(n.saturating_sub(1))
            });
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn recycled(&self, slots: u32) {
        self.recycled.fetch_add(u64::from(slots), Ordering::Relaxed);
    }

    pub(crate) fn stale_read(&self) {
        self.stale_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn allocations(&self) -> u64 {
        self.allocations.load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> AllocStats {
        AllocStats {
            allocations: self.allocations.load(Ordering::Relaxed),
            full_rejections: self.full_rejections.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
            stale_reads: self.stale_reads.load(Ordering::Relaxed),
        }
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }
}
