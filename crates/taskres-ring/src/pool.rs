//! Fixed array of slots addressed by ring position.
//!
//! [`SlotPool`] owns storage only. It has no notion of head or tail and
//! performs no synchronisation of its own beyond what each [`Slot`]
//! provides; the allocators layer cursors and locks on top.

use taskres_core::PoolError;

use crate::handle::SlotHandle;
use crate::slot::{Slot, SlotEntry};

/// N slots allocated once at construction and reused forever.
pub struct SlotPool<T> {
    slots: Box<[Slot<T>]>,
}

impl<T> SlotPool<T> {
    /// Allocate `capacity` free slots.
    ///
    /// Fails with [`PoolError::InvalidCapacity`] if `capacity` is zero or
    /// the backing array cannot be allocated.
    pub fn create(capacity: u32) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::InvalidCapacity { capacity });
        }
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity as usize)
            .map_err(|_| PoolError::InvalidCapacity { capacity })?;
        slots.extend((0..capacity).map(|_| Slot::new()));
        Ok(Self {
            slots: slots.into_boxed_slice(),
        })
    }

    /// Number of slots N.
    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Slot at `pos`.
    ///
    /// `pos` must be `< capacity`; callers validate positions before
    /// indexing.
    pub fn at(&self, pos: u32) -> &Slot<T> {
        debug_assert!(
            pos < self.capacity(),
            "slot position {pos} out of range for capacity {}",
            self.capacity()
        );
        &self.slots[pos as usize]
    }

    /// Exclusive access to the slot at `pos`.
    pub fn at_mut(&mut self, pos: u32) -> &mut Slot<T> {
        debug_assert!(
            pos < self.capacity(),
            "slot position {pos} out of range for capacity {}",
            self.capacity()
        );
        &mut self.slots[pos as usize]
    }

    /// Handle describing the current occupant of `pos`.
    pub(crate) fn handle_at(&self, pos: u32) -> Option<SlotHandle> {
        let slot = self.at(pos);
        let tag = slot.tag()?;
        Some(SlotHandle::new(pos, tag, slot.generation()))
    }

    /// Run `f` on the payload behind `handle`.
    ///
    /// Returns `None` if the handle is stale: the slot has been recycled,
    /// reallocated (generation moved on), or is not a primary.
    pub fn with_payload<R>(&self, handle: SlotHandle, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        if handle.pos >= self.capacity() {
            return None;
        }
        let slot = self.at(handle.pos);
        let mut entry = slot.lock();
        if slot.raw_tag() != handle.tag || slot.generation() != handle.generation {
            return None;
        }
        match &mut *entry {
            SlotEntry::Primary { payload, .. } => Some(f(payload)),
            SlotEntry::Free | SlotEntry::MemberOf(_) => None,
        }
    }

    /// Return every slot to `Free`.
    pub fn reset_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.reset();
        }
    }

    /// Number of slots currently holding live data.
    ///
    /// O(N); intended for tests and diagnostics.
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_valid()).count()
    }
}
