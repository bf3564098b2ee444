//! Variable-length run allocator with lazy out-of-order recycling.
//!
//! A task that needs several consecutive command entries takes a *run* of
//! slots starting at tail. Every slot in the run stores the run's starting
//! position as its tag, so [`get`](RingAllocator::get) can be pointed at any
//! member and still resolve to the canonical first slot.
//!
//! Runs may complete in any order. Recycling a run that is not at head only
//! marks its slots invalid; when the run at head is recycled, head jumps
//! past it and then past every run that was already recycled behind it.
//!
//! # Lock discipline
//!
//! | Operation | Locks |
//! |-----------|-------|
//! | `alloc_run`, `reserve_run` | tail |
//! | `recycle_run` | head |
//! | `rollback_tail` | tail, then head |
//! | `get`, `pending`, `dump` | none |

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::MutexGuard;
use taskres_core::{AllocError, OwnerId, PoolError, SENTINEL_TAG};
use tracing::{debug, trace, warn};

use crate::config::PoolConfig;
use crate::cursor::{advance, CursorSnapshot, Cursors};
use crate::diagnostics::{DiagnosticSnapshot, Diagnostics};
use crate::handle::SlotHandle;
use crate::pool::SlotPool;
use crate::stats::{AllocStats, Counters};

/// Run allocator over a fixed ring of `N` slots (usable `N - 1`).
pub struct RingAllocator<T> {
    pool: SlotPool<T>,
    cursors: Cursors,
    counters: Counters,
    owner: OwnerId,
    max_run: u32,
    diagnostic_window: u32,
    /// First position of the newest run still eligible for rollback, or
    /// [`SENTINEL_TAG`]. Read and written only under the tail lock.
    last_alloc: AtomicU32,
}

// Compile-time assertion: RingAllocator must be Send + Sync.
const _: fn() = || {
    fn assert<T: Send + Sync>() {}
    assert::<RingAllocator<u64>>();
};

impl<T> RingAllocator<T> {
    /// Build an allocator from a validated config.
    pub fn new(config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        let pool = SlotPool::create(config.capacity)?;
        Ok(Self {
            cursors: Cursors::new(pool.capacity()),
            pool,
            counters: Counters::default(),
            owner: config.owner,
            max_run: config.max_run,
            diagnostic_window: config.diagnostic_window,
            last_alloc: AtomicU32::new(SENTINEL_TAG),
        })
    }

    /// Build an allocator with `capacity` slots and default settings.
    pub fn with_capacity(capacity: u32) -> Result<Self, PoolError> {
        Self::new(PoolConfig::new(capacity))
    }

    /// Resolve `addr`, which may be any member of a live run, to the run's
    /// first slot.
    ///
    /// Lock-free. Returns `None` if `addr` is out of range, the pool is
    /// empty, the slot has been recycled, or the run it points at is no
    /// longer inside `[head, tail)`.
    pub fn get(&self, addr: u32) -> Option<SlotHandle> {
        let cur = self.cursors.snapshot();
        if addr >= cur.capacity {
            return self.stale(cur, addr, "get position out of range");
        }
        if cur.is_empty() {
            return self.stale(cur, addr, "get on empty pool");
        }
        let Some(real_pos) = self.pool.at(addr).tag() else {
            return self.stale(cur, addr, "get on recycled slot");
        };
        if !cur.contains(real_pos) {
            return self.stale(cur, addr, "get resolved outside occupied window");
        }
        let primary = self.pool.at(real_pos);
        if primary.tag() != Some(real_pos) {
            return self.stale(cur, addr, "get resolved to recycled run");
        }
        Some(SlotHandle::new(real_pos, real_pos, primary.generation()))
    }

    /// Recycle the run of `run_len` slots starting at `pos`.
    ///
    /// The run must lie inside `[head, tail)` and `pos` must be the live
    /// first slot of a run of exactly `run_len`. Returns `false` with no
    /// mutation otherwise, including when the run was already recycled.
    pub fn recycle_run(&self, pos: u32, run_len: u32) -> bool {
        let _head_guard = self.cursors.lock_head();
        let cur = self.cursors.snapshot();
        if cur.is_empty() {
            debug!(owner = %self.owner, pos, run_len, head = cur.head, "recycle_run on empty pool");
            return false;
        }
        if !cur.contains_run(pos, run_len) {
            warn!(
                owner = %self.owner,
                pos,
                run_len,
                head = cur.head,
                tail = cur.tail,
                "recycle_run outside occupied window"
            );
            return false;
        }

        let first = self.pool.at(pos);
        let aligned =
            first.is_valid() && first.tag() == Some(pos) && first.run_len() == Some(run_len);
        if !aligned {
            warn!(
                owner = %self.owner,
                pos,
                run_len,
                head = cur.head,
                tail = cur.tail,
                stored_tag = ?first.tag(),
                stored_run_len = ?first.run_len(),
                "recycle_run misaligned or already recycled"
            );
            return false;
        }

        let freed = (0..run_len)
            .filter(|&i| self.pool.at(advance(pos, i, cur.capacity)).release())
            .count() as u32;
        self.counters.recycled(freed);

        if pos == cur.head {
            let head = self.skip_released(advance(pos, run_len, cur.capacity), cur.tail);
            self.cursors.store_head(head);
            trace!(owner = %self.owner, pos, run_len, head, tail = cur.tail, "recycled run at head");
        } else {
            trace!(
                owner = %self.owner,
                pos,
                run_len,
                head = cur.head,
                tail = cur.tail,
                "recycled run out of order"
            );
        }
        true
    }

    /// Undo the most recent allocation back to `pos`.
    ///
    /// Only meaningful straight after the [`alloc_run`](Self::alloc_run)
    /// that returned `pos`, before any other allocation on this instance;
    /// [`reserve_run`](Self::reserve_run) enforces that pairing. Every slot
    /// from `pos` to tail is invalidated and tail moves back to `pos`.
    ///
    /// Returns `false` with no mutation unless `pos` is the first position
    /// of the newest allocation, that allocation has not been rolled back
    /// already, and `pos` is still inside `[head, tail)`.
    pub fn rollback_tail(&self, pos: u32) -> bool {
        let _tail_guard = self.cursors.lock_tail();
        self.rollback_locked(pos)
    }

    /// Run `f` on the payload behind `handle`, if it is still current.
    pub fn with_payload<R>(&self, handle: SlotHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.pool.with_payload(handle, f)
    }

    /// Occupied slot count, read without locks.
    pub fn pending(&self) -> u32 {
        self.cursors.snapshot().pending()
    }

    /// Successful allocations minus rollbacks.
    pub fn allocations(&self) -> u64 {
        self.counters.allocations()
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

    /// Longest run `alloc_run` accepts.
    pub fn max_run(&self) -> u32 {
        self.max_run
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
        *self.last_alloc.get_mut() = SENTINEL_TAG;
    }

    fn check_run_len(&self, run_len: u32) -> Result<(), AllocError> {
        if run_len == 0 || run_len > self.max_run {
            warn!(owner = %self.owner, run_len, max_run = self.max_run, "invalid run length");
            return Err(AllocError::InvalidRunLength {
                run_len,
                max_run: self.max_run,
            });
        }
        Ok(())
    }

    /// Caller holds the tail lock.
    fn rollback_locked(&self, pos: u32) -> bool {
        let _head_guard = self.cursors.lock_head();
        let cur = self.cursors.snapshot();
        let last = self.last_alloc.load(Ordering::Relaxed);
        if pos != last {
            warn!(
                owner = %self.owner,
                pos,
                last_alloc = ?(last != SENTINEL_TAG).then_some(last),
                head = cur.head,
                tail = cur.tail,
                "rollback not at newest allocation"
            );
            return false;
        }
        if !cur.contains(pos) {
            warn!(
                owner = %self.owner,
                pos,
                head = cur.head,
                tail = cur.tail,
                "rollback outside occupied window"
            );
            return false;
        }
        let mut released = pos;
        while released != cur.tail {
            self.pool.at(released).release();
            released = advance(released, 1, cur.capacity);
        }
        self.cursors.store_tail(pos);
        self.last_alloc.store(SENTINEL_TAG, Ordering::Relaxed);
        self.counters.rollback();
        debug!(owner = %self.owner, pos, head = cur.head, old_tail = cur.tail, "rolled back tail");
        true
    }

    /// Walk forward from `head` over released slots, stopping at the first
    /// live one or at `tail`. Caller holds the head lock.
    fn skip_released(&self, mut head: u32, tail: u32) -> u32 {
        let capacity = self.capacity();
        while head != tail && !self.pool.at(head).is_valid() {
            head = advance(head, 1, capacity);
        }
        head
    }

    fn stale(&self, cur: CursorSnapshot, addr: u32, reason: &'static str) -> Option<SlotHandle> {
        self.counters.stale_read();
        warn!(
            owner = %self.owner,
            addr,
            head = cur.head,
            tail = cur.tail,
            reason,
            "stale slot reference"
        );
        None
    }
}

impl<T: Default> RingAllocator<T> {
    /// Allocate `run_len` consecutive slots at tail.
    ///
    /// Returns the run's first position and a handle to its first slot.
    /// Fails with [`AllocError::InvalidRunLength`] if `run_len` is outside
    /// `1..=max_run`, and with [`AllocError::Full`] if the run would reach
    /// head. Neither failure mutates anything.
    pub fn alloc_run(&self, run_len: u32) -> Result<(u32, SlotHandle), AllocError> {
        self.check_run_len(run_len)?;
        let _tail_guard = self.cursors.lock_tail();
        self.alloc_run_locked(run_len)
    }

    /// Allocate a run and keep the tail lock until the caller decides.
    ///
    /// [`RunReservation::commit`] keeps the allocation; dropping the
    /// reservation rolls it back. No other allocation or rollback can run
    /// on this instance while the reservation is alive, so allocating again
    /// from the thread holding it deadlocks.
    pub fn reserve_run(&self, run_len: u32) -> Result<RunReservation<'_, T>, AllocError> {
        self.check_run_len(run_len)?;
        let tail_guard = self.cursors.lock_tail();
        let (pos, handle) = self.alloc_run_locked(run_len)?;
        Ok(RunReservation {
            ring: self,
            _tail_guard: tail_guard,
            pos,
            run_len,
            handle,
            committed: false,
        })
    }

    /// Caller holds the tail lock and has validated `run_len`.
    fn alloc_run_locked(&self, run_len: u32) -> Result<(u32, SlotHandle), AllocError> {
        let cur = self.cursors.snapshot();
        let available = cur.free();
        if run_len > available {
            self.counters.full_rejection();
            debug!(
                owner = %self.owner,
                run_len,
                available,
                head = cur.head,
                tail = cur.tail,
                "pool full"
            );
            return Err(AllocError::Full {
                requested: run_len,
                available,
            });
        }

        let pos = cur.tail;
        for i in 1..run_len {
            self.pool
                .at(advance(pos, i, cur.capacity))
                .occupy_member(pos, self.owner);
        }
        let generation = self.pool.at(pos).occupy_primary(pos, run_len, self.owner);
        let tail = advance(pos, run_len, cur.capacity);
        self.cursors.store_tail(tail);
        self.last_alloc.store(pos, Ordering::Relaxed);
        self.counters.allocation();
        trace!(owner = %self.owner, pos, run_len, head = cur.head, tail, "allocated run");
        Ok((pos, SlotHandle::new(pos, pos, generation)))
    }
}

impl<T> Diagnostics for RingAllocator<T> {
    fn dump(&self) -> DiagnosticSnapshot {
        DiagnosticSnapshot::capture(&self.pool, self.cursors.snapshot(), self.diagnostic_window)
    }
}

/// A run allocated under a held tail lock, awaiting commit.
///
/// Dropping the reservation without calling [`commit`](Self::commit)
/// rolls the allocation back.
#[must_use = "dropping a reservation rolls the allocation back"]
pub struct RunReservation<'a, T> {
    ring: &'a RingAllocator<T>,
    _tail_guard: MutexGuard<'a, ()>,
    pos: u32,
    run_len: u32,
    handle: SlotHandle,
    committed: bool,
}

impl<T> RunReservation<'_, T> {
    /// First position of the reserved run.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Number of reserved slots.
    pub fn run_len(&self) -> u32 {
        self.run_len
    }

    /// Handle to the run's first slot.
    pub fn handle(&self) -> SlotHandle {
        self.handle
    }

    /// Fill in the run's payload before committing.
    pub fn with_payload<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.ring.with_payload(self.handle, f)
    }

    /// Keep the allocation and release the tail lock.
    pub fn commit(mut self) -> (u32, SlotHandle) {
        self.committed = true;
        (self.pos, self.handle)
    }
}

impl<T> Drop for RunReservation<'_, T> {
    fn drop(&mut self) {
        if !self.committed {
            self.ring.rollback_locked(self.pos);
        }
    }
}

impl<T> std::fmt::Debug for RunReservation<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunReservation")
            .field("pos", &self.pos)
            .field("run_len", &self.run_len)
            .field("handle", &self.handle)
            .field("committed", &self.committed)
            .finish()
    }
}
