//! Strict in-order slot ring keyed by task id.
//!
//! [`FifoAllocator`] hands out one slot per task at position
//! `task_id % N`. Completions normally release from the oldest slot
//! forward ([`recycle_head`](FifoAllocator::recycle_head),
//! [`recycle_through`](FifoAllocator::recycle_through)); out-of-order
//! completions go through [`recycle_lazy`](FifoAllocator::recycle_lazy),
//! which marks the slot and lets head catch up once everything in front of
//! it is released.

use taskres_core::{AllocError, OwnerId, PoolError, TaskId};
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::cursor::{advance, distance, CursorSnapshot, Cursors};
use crate::diagnostics::{DiagnosticSnapshot, Diagnostics};
use crate::handle::SlotHandle;
use crate::pool::SlotPool;
use crate::stats::{AllocStats, Counters};

/// Single-slot allocator with strict in-order release.
///
/// Allocation runs under the tail lock, recycling under the head lock, and
/// [`lookup`](Self::lookup) takes neither: it snapshots the cursors and
/// then validates the slot tag, so a concurrent recycle can make it miss
/// (false negative) but never return another task's slot.
pub struct FifoAllocator<T> {
    pool: SlotPool<T>,
    cursors: Cursors,
    counters: Counters,
    owner: OwnerId,
    diagnostic_window: u32,
}

// Compile-time assertion: FifoAllocator must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<FifoAllocator<u64>>();
};

impl<T> FifoAllocator<T> {
    /// Build an allocator from a validated config.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let pool = SlotPool::create(config.capacity)?;
        Ok(Self {
            cursors: Cursors::new(pool.capacity()),
            pool,
            counters: Counters::default(),
            owner: config.owner,
            diagnostic_window: config.diagnostic_window,
        })
    }

    /// Build an allocator with `capacity` slots and default settings.
    pub fn with_capacity(capacity: u32) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new(capacity))
    }

    /// Look up the slot holding `task_id`.
    ///
    /// Returns `None` if the pool is empty, the mapped position lies outside
    /// `[head, tail)`, or the slot now holds a different task.
    pub fn lookup(&self, task_id: TaskId) -> Option<SlotHandle> {
        let capacity = self.capacity();
        let pos = task_id.position(capacity);
        let cur = self.cursors.snapshot();
        if cur.is_empty() {
            self.counters.stale_read();
            warn!(
                owner = %self.owner,
                %task_id,
                pos,
                head = cur.head,
                tail = cur.tail,
                "lookup on empty pool"
            );
            return None;
        }
        if !cur.contains(pos) {
            self.counters.stale_read();
            warn!(
                owner = %self.owner,
                %task_id,
                pos,
                head = cur.head,
                tail = cur.tail,
                "lookup outside occupied window"
            );
            return None;
        }
        let slot = self.pool.at(pos);
        match slot.tag() {
            Some(tag) if tag == task_id.0 => Some(SlotHandle::new(pos, tag, slot.generation())),
            stored => {
                self.counters.stale_read();
                warn!(
                    owner = %self.owner,
                    %task_id,
                    pos,
                    head = cur.head,
                    tail = cur.tail,
                    stored_tag = ?stored,
                    "lookup found recycled slot"
                );
                None
            }
        }
    }

    /// Release the oldest outstanding slot.
    ///
    /// Head always moves by one, even if the slot there was already released
    /// by [`recycle_lazy`](Self::recycle_lazy) or skipped by
    /// [`alloc_at`](Self::alloc_at); only live slots count as recycled.
    /// Returns `false` without touching anything if the pool is empty.
    pub fn recycle_head(&self) -> bool {
        let _head_guard = self.cursors.lock_head();
        let cur = self.cursors.snapshot();
        if cur.is_empty() {
            debug!(owner = %self.owner, head = cur.head, "recycle_head on empty pool");
            return false;
        }
        let freed = u32::from(self.pool.at(cur.head).release());
        let head = advance(cur.head, 1, cur.capacity);
        self.cursors.store_head(head);
        self.counters.recycled(freed);
        trace!(owner = %self.owner, pos = cur.head, head, tail = cur.tail, "recycled head");
        true
    }

    /// Release every slot from head up to and including the one holding
    /// `task_id`.
    ///
    /// Returns `false` without touching anything if that position is not in
    /// `[head, tail)`.
    pub fn recycle_through(&self, task_id: TaskId) -> bool {
        let _head_guard = self.cursors.lock_head();
        let cur = self.cursors.snapshot();
        let pos = task_id.position(cur.capacity);
        if !cur.contains(pos) {
            warn!(
                owner = %self.owner,
                %task_id,
                pos,
                head = cur.head,
                tail = cur.tail,
                "recycle_through outside occupied window"
            );
            return false;
        }
        let count = distance(cur.head, pos, cur.capacity) + 1;
        let freed = (0..count)
            .filter(|&i| self.pool.at(advance(cur.head, i, cur.capacity)).release())
            .count() as u32;
        let head = advance(pos, 1, cur.capacity);
        self.cursors.store_head(head);
        self.counters.recycled(freed);
        trace!(
            owner = %self.owner,
            %task_id,
            count,
            freed,
            head,
            tail = cur.tail,
            "recycled through"
        );
        true
    }

    /// Release the slot holding `task_id` regardless of its age, then move
    /// head past every released slot.
    ///
    /// A slot whose tag no longer matches is logged as already recycled but
    /// still counts as handled. Returns `false` only if the position is not
    /// in `[head, tail)`.
    pub fn recycle_lazy(&self, task_id: TaskId) -> bool {
        let _head_guard = self.cursors.lock_head();
        let cur = self.cursors.snapshot();
        let pos = task_id.position(cur.capacity);
        if !cur.contains(pos) {
            warn!(
                owner = %self.owner,
                %task_id,
                pos,
                head = cur.head,
                tail = cur.tail,
                "recycle_lazy outside occupied window"
            );
            return false;
        }

        let slot = self.pool.at(pos);
        match slot.tag() {
            Some(tag) if tag == task_id.0 => {
                if slot.release() {
                    self.counters.recycled(1);
                }
            }
            stored => warn!(
                owner = %self.owner,
                %task_id,
                pos,
                head = cur.head,
                tail = cur.tail,
                stored_tag = ?stored,
                "slot already recycled"
            ),
        }

        let head = self.skip_released(cur);
        self.cursors.store_head(head);
        trace!(owner = %self.owner, %task_id, pos, head, tail = cur.tail, "recycled lazily");
        true
    }

    /// Handle to the oldest outstanding slot.
    pub fn head_handle(&self) -> Option<SlotHandle> {
        let cur = self.cursors.snapshot();
        if cur.is_empty() {
            return None;
        }
        self.pool.handle_at(cur.head)
    }

    /// Run `f` on the payload behind `handle`, if it is still current.
    pub fn with_payload<R>(&self, handle: SlotHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.pool.with_payload(handle, f)
    }

    /// Occupied slot count, read without locks.
    pub fn pending(&self) -> u32 {
        self.cursors.snapshot().pending()
    }

    /// Current cursors, read without locks.
    pub fn cursors(&self) -> CursorSnapshot {
        self.cursors.snapshot()
    }

    /// Oldest occupied position.
    pub fn head(&self) -> u32 {
        self.cursors.head()
    }

    /// Next position to allocate.
    pub fn tail(&self) -> u32 {
        self.cursors.tail()
    }

    /// Ring size N.
    pub fn capacity(&self) -> u32 {
        self.pool.capacity()
    }

    /// Owner recorded in allocated slots.
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    /// Cumulative counters.
    pub fn stats(&self) -> AllocStats {
        self.counters.snapshot()
    }

    /// Empty the ring: head and tail back to 0, every slot free.
    pub fn reset(&mut self) {
        self.pool.reset_all();
        self.cursors.reset();
        self.counters.reset();
    }

    /// Walk head forward over released slots, stopping at the first live
    /// one or at the snapshot tail. Caller holds the head lock.
    fn skip_released(&self, cur: CursorSnapshot) -> u32 {
        let mut head = cur.head;
        while head != cur.tail && !self.pool.at(head).is_valid() {
            head = advance(head, 1, cur.capacity);
        }
        head
    }
}

impl<T: Default> FifoAllocator<T> {
    /// Allocate the slot at `pos` for `task_id`.
    ///
    /// `pos` must lie in the free region reachable from tail. Any positions
    /// between the current tail and `pos` are invalidated and skipped; they
    /// count as occupied until head passes them.
    ///
    /// A full pool is reported as [`AllocError::Full`] whatever `pos` is.
    /// Otherwise a `pos` inside `[head, tail)` is [`AllocError::OutOfRange`]
    /// and a `pos` too far past tail is [`AllocError::Full`].
    pub fn alloc_at(&self, pos: u32, task_id: TaskId) -> Result<SlotHandle, AllocError> {
        let capacity = self.capacity();
        if pos >= capacity || task_id.is_sentinel() {
            warn!(owner = %self.owner, pos, %task_id, capacity, "alloc_at rejected");
            return Err(AllocError::OutOfRange { pos, capacity });
        }

        let _tail_guard = self.cursors.lock_tail();
        let cur = self.cursors.snapshot();
        let available = cur.free();
        let skip = distance(cur.tail, pos, capacity);
        if skip >= available {
            if available > 0 && cur.contains(pos) {
                warn!(
                    owner = %self.owner,
                    pos,
                    %task_id,
                    head = cur.head,
                    tail = cur.tail,
                    "alloc_at inside occupied window"
                );
                return Err(AllocError::OutOfRange { pos, capacity });
            }
            self.counters.full_rejection();
            debug!(
                owner = %self.owner,
                pos,
                %task_id,
                head = cur.head,
                tail = cur.tail,
                "pool full"
            );
            return Err(AllocError::Full {
                requested: skip + 1,
                available,
            });
        }

        let mut skipped = cur.tail;
        while skipped != pos {
            self.pool.at(skipped).release();
            skipped = advance(skipped, 1, capacity);
        }
        if skip > 0 {
            debug!(
                owner = %self.owner,
                from = cur.tail,
                to = pos,
                skip,
                "invalidated positions skipped by alloc_at"
            );
        }

        let generation = self.pool.at(pos).occupy_primary(task_id.0, 1, self.owner);
        let tail = advance(pos, 1, capacity);
        self.cursors.store_tail(tail);
        self.counters.allocation();
        trace!(owner = %self.owner, pos, %task_id, head = cur.head, tail, "allocated");
        Ok(SlotHandle::new(pos, task_id.0, generation))
    }

    /// Allocate at the position `task_id` maps to.
    pub fn alloc(&self, task_id: TaskId) -> Result<SlotHandle, AllocError> {
        self.alloc_at(task_id.position(self.capacity()), task_id)
    }
}

impl<T> Diagnostics for FifoAllocator<T> {
    fn dump(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot::capture(&self.pool, self.cursors.snapshot(), self.diagnostic_window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fifo(capacity: u32) -> FifoAllocator<u64> {
        FifoAllocator::with_capacity(capacity).unwrap()
    }

    #[test]
    fn zero_capacity_rejected() {
        assert!(matches!(
            FifoAllocator::<u64>::with_capacity(0),
            Err(PoolError::InvalidCapacity { capacity: 0 })
        ));
    }

    #[test]
    fn alloc_and_lookup() {
        let ring = fifo(8);
        let handle = ring.alloc(TaskId(0)).unwrap();
        assert_eq!(handle.pos(), 0);
        assert_eq!(handle.tag(), 0);
        assert_eq!(ring.lookup(TaskId(0)), Some(handle));
        assert_eq!(ring.pending(), 1);
        assert_eq!(ring.tail(), 1);
    }

    #[test]
    fn lookup_on_empty_pool_is_none() {
        let ring = fifo(8);
        assert_eq!(ring.lookup(TaskId(3)), None);
        assert_eq!(ring.stats().stale_reads, 1);
    }

    #[test]
    fn lookup_outside_window_is_none() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(1)).unwrap();
        assert_eq!(ring.lookup(TaskId(5)), None);
    }

    #[test]
    fn lookup_with_aliased_id_is_none() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        // Task 8 maps to position 0 but the slot holds task 0.
        assert_eq!(ring.lookup(TaskId(8)), None);
    }

    #[test]
    fn full_at_capacity_minus_one() {
        let ring = fifo(4);
        for id in 0..3 {
            ring.alloc(TaskId(id)).unwrap();
        }
        let before = ring.cursors();
        assert_eq!(
            ring.alloc(TaskId(3)),
            Err(AllocError::Full {
                requested: 1,
                available: 0
            })
        );
        assert_eq!(ring.cursors(), before);
        assert_eq!(ring.stats().full_rejections, 1);
    }

    #[test]
    fn alloc_at_out_of_range_position() {
        let ring = fifo(4);
        assert_eq!(
            ring.alloc_at(4, TaskId(4)),
            Err(AllocError::OutOfRange {
                pos: 4,
                capacity: 4
            })
        );
    }

    #[test]
    fn alloc_at_sentinel_task_rejected() {
        let ring = fifo(4);
        assert!(matches!(
            ring.alloc_at(0, TaskId(u32::MAX)),
            Err(AllocError::OutOfRange { .. })
        ));
        assert_eq!(ring.pending(), 0);
    }

    #[test]
    fn alloc_at_inside_occupied_window_rejected() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(1)).unwrap();
        ring.alloc(TaskId(2)).unwrap();
        assert!(matches!(
            ring.alloc_at(1, TaskId(9)),
            Err(AllocError::OutOfRange { pos: 1, .. })
        ));
        assert_eq!(ring.lookup(TaskId(1)).map(|h| h.tag()), Some(1));
    }

    #[test]
    fn alloc_at_skips_and_invalidates_gap() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        let handle = ring.alloc(TaskId(4)).unwrap();
        assert_eq!(handle.pos(), 4);
        assert_eq!(ring.tail(), 5);
        assert_eq!(ring.pending(), 5);
        for pos in 1..4 {
            assert_eq!(ring.lookup(TaskId(pos)), None);
        }
    }

    #[test]
    fn alloc_at_reserved_slot_is_full() {
        let ring = fifo(4);
        // Empty pool, head = 0: position 3 would make tail == head.
        assert!(matches!(
            ring.alloc_at(3, TaskId(3)),
            Err(AllocError::Full { .. })
        ));
        assert_eq!(ring.pending(), 0);
    }

    #[test]
    fn recycle_head_in_order() {
        let ring = fifo(8);
        for id in 0..3 {
            ring.alloc(TaskId(id)).unwrap();
        }
        assert!(ring.recycle_head());
        assert_eq!(ring.head(), 1);
        assert_eq!(ring.lookup(TaskId(0)), None);
        assert!(ring.lookup(TaskId(1)).is_some());
        assert_eq!(ring.pending(), 2);
    }

    #[test]
    fn alloc_at_on_full_pool_reports_full() {
        let ring = fifo(4);
        for id in 0..3 {
            ring.alloc(TaskId(id)).unwrap();
        }
        // Position 1 is occupied, but fullness is checked first.
        assert_eq!(
            ring.alloc_at(1, TaskId(9)),
            Err(AllocError::Full {
                requested: 3,
                available: 0
            })
        );
        assert_eq!(ring.stats().full_rejections, 1);
        assert_eq!(ring.lookup(TaskId(1)).map(|h| h.tag()), Some(1));
    }

    #[test]
    fn recycle_head_after_lazy_counts_each_slot_once() {
        let ring = fifo(8);
        for id in 0..3 {
            ring.alloc(TaskId(id)).unwrap();
        }
        assert!(ring.recycle_lazy(TaskId(2)));
        for _ in 0..3 {
            assert!(ring.recycle_head());
        }
        assert_eq!(ring.pending(), 0);
        assert_eq!(ring.stats().recycled, 3);
    }

    #[test]
    fn recycle_through_skips_lazily_released_slots_in_count() {
        let ring = fifo(8);
        for id in 0..4 {
            ring.alloc(TaskId(id)).unwrap();
        }
        assert!(ring.recycle_lazy(TaskId(1)));
        assert!(ring.recycle_lazy(TaskId(2)));
        assert!(ring.recycle_through(TaskId(3)));
        assert_eq!(ring.pending(), 0);
        assert_eq!(ring.stats().recycled, 4);
    }

    #[test]
    fn gap_slots_not_counted_as_recycled() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(3)).unwrap();
        assert!(ring.recycle_through(TaskId(3)));
        assert_eq!(ring.pending(), 0);
        assert_eq!(ring.stats().recycled, 2);
    }

    #[test]
    fn recycle_head_on_empty_pool_fails() {
        let ring = fifo(8);
        assert!(!ring.recycle_head());
        assert_eq!(ring.head(), 0);
    }

    #[test]
    fn recycle_through_releases_prefix() {
        let ring = fifo(8);
        for id in 0..5 {
            ring.alloc(TaskId(id)).unwrap();
        }
        assert!(ring.recycle_through(TaskId(2)));
        assert_eq!(ring.head(), 3);
        assert_eq!(ring.pending(), 2);
        for id in 0..3 {
            assert_eq!(ring.lookup(TaskId(id)), None);
        }
        assert!(ring.lookup(TaskId(3)).is_some());
        assert_eq!(ring.stats().recycled, 3);
    }

    #[test]
    fn recycle_through_outside_window_fails_without_mutation() {
        let ring = fifo(8);
        for id in 0..3 {
            ring.alloc(TaskId(id)).unwrap();
        }
        let before = ring.cursors();
        assert!(!ring.recycle_through(TaskId(6)));
        assert_eq!(ring.cursors(), before);
    }

    #[test]
    fn recycle_lazy_out_of_order() {
        let ring = fifo(8);
        for id in 0..4 {
            ring.alloc(TaskId(id)).unwrap();
        }
        // Completions arrive 2, 1, 0.
        assert!(ring.recycle_lazy(TaskId(2)));
        assert_eq!(ring.head(), 0);
        assert!(ring.recycle_lazy(TaskId(1)));
        assert_eq!(ring.head(), 0);
        assert!(ring.recycle_lazy(TaskId(0)));
        // Head jumps over 0, 1, 2 and stops at live task 3.
        assert_eq!(ring.head(), 3);
        assert_eq!(ring.pending(), 1);
    }

    #[test]
    fn recycle_lazy_passes_skipped_gap() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(3)).unwrap();
        assert!(ring.recycle_lazy(TaskId(0)));
        // Positions 1 and 2 were invalidated by the skip.
        assert_eq!(ring.head(), 3);
    }

    #[test]
    fn recycle_lazy_twice_is_tolerated() {
        let ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(1)).unwrap();
        assert!(ring.recycle_lazy(TaskId(1)));
        assert!(ring.recycle_lazy(TaskId(1)));
        assert_eq!(ring.stats().recycled, 1);
    }

    #[test]
    fn recycle_lazy_outside_window_fails() {
        let ring = fifo(8);
        assert!(!ring.recycle_lazy(TaskId(0)));
    }

    #[test]
    fn head_handle_tracks_oldest() {
        let ring = fifo(8);
        assert_eq!(ring.head_handle(), None);
        let first = ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(1)).unwrap();
        assert_eq!(ring.head_handle(), Some(first));
        ring.recycle_head();
        assert_eq!(ring.head_handle().map(|h| h.tag()), Some(1));
    }

    #[test]
    fn payload_cleared_on_reuse() {
        let ring = fifo(4);
        let h = ring.alloc(TaskId(0)).unwrap();
        ring.with_payload(h, |p| *p = 77).unwrap();
        assert!(ring.recycle_head());
        assert_eq!(ring.with_payload(h, |p| *p), None);

        ring.alloc(TaskId(1)).unwrap();
        ring.alloc(TaskId(2)).unwrap();
        ring.alloc(TaskId(3)).unwrap();
        ring.recycle_head();
        let again = ring.alloc(TaskId(4)).unwrap();
        assert_eq!(again.pos(), 0);
        assert_eq!(ring.with_payload(again, |p| *p), Some(0));
    }

    #[test]
    fn wraps_around_many_times() {
        let ring = fifo(4);
        for id in 0..100u32 {
            let h = ring.alloc(TaskId(id)).unwrap();
            assert_eq!(h.pos(), id % 4);
            assert!(ring.recycle_through(TaskId(id)));
            assert_eq!(ring.pending(), 0);
        }
        assert_eq!(ring.stats().allocations, 100);
    }

    #[test]
    fn owner_recorded_in_slots() {
        let ring: FifoAllocator<u64> =
            FifoAllocator::new(PoolConfig::new(8).with_owner(OwnerId(12))).unwrap();
        ring.alloc(TaskId(0)).unwrap();
        let dump = ring.dump();
        let head = dump.head_window.last().unwrap();
        assert_eq!(head.pos, 0);
        assert_eq!(head.owner, OwnerId(12));
    }

    #[test]
    fn reset_empties_ring() {
        let mut ring = fifo(8);
        ring.alloc(TaskId(0)).unwrap();
        ring.alloc(TaskId(1)).unwrap();
        ring.reset();
        assert_eq!(ring.pending(), 0);
        assert_eq!(ring.head(), 0);
        assert_eq!(ring.tail(), 0);
        assert_eq!(ring.lookup(TaskId(0)), None);
        assert!(ring.alloc(TaskId(0)).is_ok());
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn pending_tracks_alloc_minus_recycle(
                ops in proptest::collection::vec(any::<bool>(), 1..200),
            ) {
                let ring = fifo(16);
                let mut next_id = 0u32;
                let mut outstanding = 0u32;
                for alloc in ops {
                    if alloc {
                        if ring.alloc(TaskId(next_id)).is_ok() {
                            next_id += 1;
                            outstanding += 1;
                        }
                    } else if ring.recycle_head() {
                        outstanding -= 1;
                    }
                    prop_assert_eq!(ring.pending(), outstanding);
                    prop_assert!(ring.pending() <= 15);
                }
            }

            #[test]
            fn lookup_never_returns_wrong_task(
                ids in proptest::collection::vec(0u32..64, 1..40),
            ) {
                let ring = fifo(8);
                let mut next_id = 0u32;
                for probe in ids {
                    if ring.alloc(TaskId(next_id)).is_ok() {
                        next_id += 1;
                    } else {
                        ring.recycle_head();
                    }
                    if let Some(h) = ring.lookup(TaskId(probe)) {
                        prop_assert_eq!(h.tag(), probe);
                    }
                }
            }
        }
    }
}
