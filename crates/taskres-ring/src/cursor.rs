//! Head/tail cursors and cyclic position arithmetic.
//!
//! The occupied region is `[head, tail)` modulo capacity. `head == tail`
//! means empty and `tail + 1 == head` means full, so one slot is always
//! unused.
//!
//! [`Cursors`] pairs each cursor with its own lock: the allocate path holds
//! the tail lock, the recycle path holds the head lock, and both cursors are
//! mirrored in atomics so readers can take a [`CursorSnapshot`] without
//! either lock.

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};

/// `pos + by` modulo `capacity`, without overflow for any `u32` inputs.
pub(crate) fn advance(pos: u32, by: u32, capacity: u32) -> u32 {
    ((u64::from(pos) + u64::from(by)) % u64::from(capacity)) as u32
}

/// Steps needed to walk forward from `from` to `to`.
pub(crate) fn distance(from: u32, to: u32, capacity: u32) -> u32 {
    if to >= from {
        to - from
    } else {
        capacity - from + to
    }
}

/// Point-in-time view of the cursors.
///
/// Taken without locks, so it may already be out of date. Every decision
/// made from a snapshot is re-validated against slot tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CursorSnapshot {
    /// Oldest occupied position.
    pub head: u32,
    /// Next position to allocate.
    pub tail: u32,
    /// Ring size N.
    pub capacity: u32,
}

impl CursorSnapshot {
    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    /// Occupied slot count, `(tail - head) mod N`.
    pub fn pending(&self) -> u32 {
        distance(self.head, self.tail, self.capacity)
    }

    /// Slots still allocatable, `N - 1 - pending`.
    pub fn free(&self) -> u32 {
        self.capacity - 1 - self.pending()
    }

    /// Whether every usable slot is occupied.
    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Whether `pos` lies inside `[head, tail)`.
    pub fn contains(&self, pos: u32) -> bool {
        pos < self.capacity && distance(self.head, pos, self.capacity) < self.pending()
    }

    /// Whether the whole run `[pos, pos + len)` lies inside `[head, tail)`.
    pub fn contains_run(&self, pos: u32, len: u32) -> bool {
        len > 0
            && pos < self.capacity
            && u64::from(distance(self.head, pos, self.capacity)) + u64::from(len)
                <= u64::from(self.pending())
    }
}

/// Head and tail with independent locks plus lock-free mirrors.
pub(crate) struct Cursors {
    head: AtomicU32,
    tail: AtomicU32,
    head_lock: Mutex<()>,
    tail_lock: Mutex<()>,
    capacity: u32,
}

impl Cursors {
    pub(crate) fn new(capacity: u32) -> Self {
        Self {
            head: AtomicU32::new(0),
            tail: AtomicU32::new(0),
            head_lock: Mutex::new(()),
            tail_lock: Mutex::new(()),
            capacity,
        }
    }

    pub(crate) fn snapshot(&self) -> CursorSnapshot {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        CursorSnapshot {
            head,
            tail,
            capacity: self.capacity,
        }
    }

    pub(crate) fn head(&self) -> u32 {
        self.head.load(Ordering::Acquire)
    }

    pub(crate) fn tail(&self) -> u32 {
        self.tail.load(Ordering::Acquire)
    }

    /// Caller must hold the head lock.
    pub(crate) fn store_head(&self, head: u32) {
        debug_assert!(head < self.capacity);
        self.head.store(head, Ordering::Release);
    }

    /// Caller must hold the tail lock.
    pub(crate) fn store_tail(&self, tail: u32) {
        debug_assert!(tail < self.capacity);
        self.tail.store(tail, Ordering::Release);
    }

    pub(crate) fn lock_head(&self) -> MutexGuard<'_, ()> {
        self.head_lock.lock()
    }

    pub(crate) fn lock_tail(&self) -> MutexGuard<'_, ()> {
        self.tail_lock.lock()
    }

    pub(crate) fn reset(&mut self) {
        *self.head.get_mut() = 0;
        *self.tail.get_mut() = 0;
    }
}
