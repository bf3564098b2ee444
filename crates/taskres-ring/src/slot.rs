//! Per-position slot state.
//!
//! A [`Slot`] splits into two halves. The atomics (`tag`, `valid`, `owner`,
//! `generation`) are what lookups and diagnostics read without taking any
//! lock. The [`SlotEntry`] body sits behind a per-slot lock and is only
//! touched to initialise an allocation or to access its payload.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};
use taskres_core::{OwnerId, SENTINEL_TAG};

/// Body of a slot.
///
/// A run of `n` slots is stored as one `Primary` followed by `n - 1`
/// `MemberOf(primary_pos)` entries, so any member resolves to the run's
/// canonical metadata.
#[derive(Debug, PartialEq, Eq)]
pub enum SlotEntry<T> {
    /// Never allocated since construction or the last reset.
    Free,
    /// Canonical slot of an allocation.
    Primary {
        /// Number of slots in the allocation, including this one.
        run_len: u32,
        /// Caller-owned task metadata.
        payload: T,
    },
    /// Secondary slot of a run whose primary sits at the given position.
    MemberOf(u32),
}

impl<T> Default for SlotEntry<T> {
    fn default() -> Self {
        Self::Free
    }
}

/// One ring position.
pub struct Slot<T> {
    /// Task id, run position, or [`SENTINEL_TAG`] when not occupied.
    tag: AtomicU32,
    /// Set on allocation, cleared on recycle. Head only advances across
    /// invalid slots during lazy recycling.
    valid: AtomicBool,
    owner: AtomicU32,
    /// Bumped each time the slot becomes a primary.
    generation: AtomicU32,
    entry: Mutex<SlotEntry<T>>,
}

impl<T> Slot<T> {
    /// Create a free slot.
    pub fn new() -> Self {
        Self {
            tag: AtomicU32::new(SENTINEL_TAG),
            valid: AtomicBool::new(false),
            owner: AtomicU32::new(0),
            generation: AtomicU32::new(0),
            entry: Mutex::new(SlotEntry::Free),
        }
    }

    /// The stored tag, or `None` if the slot is free or recycled.
    pub fn tag(&self) -> Option<u32> {
        let tag = self.raw_tag();
        (tag != SENTINEL_TAG).then_some(tag)
    }

    /// The stored tag including the sentinel value.
    pub fn raw_tag(&self) -> u32 {
        self.tag.load(Ordering::Acquire)
    }

    /// Whether the slot holds live data.
    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    /// Owner recorded by the last allocation.
    pub fn owner(&self) -> OwnerId {
        OwnerId(self.owner.load(Ordering::Relaxed))
    }

    /// Current generation.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Run length recorded in a primary slot.
    pub fn run_len(&self) -> Option<u32> {
        match &*self.entry.lock() {
            SlotEntry::Primary { run_len, .. } => Some(*run_len),
            _ => None,
        }
    }

    /// Lock the slot body.
    pub fn lock(&self) -> MutexGuard<'_, SlotEntry<T>> {
        self.entry.lock()
    }

    /// Exclusive access to the slot body.
    pub fn entry_mut(&mut self) -> &mut SlotEntry<T> {
        self.entry.get_mut()
    }

    /// Initialise as the primary of an allocation; returns the new generation.
    ///
    /// The tag is published last so a reader that observes it also observes
    /// the generation and the body.
    pub(crate) fn occupy_primary(&self, tag: u32, run_len: u32, owner: OwnerId) -> u32
    where
        T: Default,
    {
        let mut entry = self.entry.lock();
        *entry = SlotEntry::Primary {
            run_len,
            payload: T::default(),
        };
        let generation = self.generation.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        self.owner.store(owner.0, Ordering::Relaxed);
        self.valid.store(true, Ordering::Release);
        self.tag.store(tag, Ordering::Release);
        generation
    }

    /// Initialise as a secondary member of the run starting at `primary`.
    pub(crate) fn occupy_member(&self, primary: u32, owner: OwnerId) {
        let mut entry = self.entry.lock();
        *entry = SlotEntry::MemberOf(primary);
        self.owner.store(owner.0, Ordering::Relaxed);
        self.valid.store(true, Ordering::Release);
        self.tag.store(primary, Ordering::Release);
    }

    /// Mark as sentinel/invalid. The body is left in place; the next
    /// allocation overwrites it.
    ///
    /// Returns `true` if the slot held live data before the call.
    pub(crate) fn release(&self) -> bool {
        let was_valid = self.valid.swap(false, Ordering::AcqRel);
        self.tag.store(SENTINEL_TAG, Ordering::Release);
        was_valid
    }

    /// Return to `Free`. The generation is kept so handles issued before
    /// the reset stay stale.
    pub(crate) fn reset(&mut self) {
        *self.entry.get_mut() = SlotEntry::Free;
        *self.tag.get_mut() = SENTINEL_TAG;
        *self.valid.get_mut() = false;
        *self.owner.get_mut() = 0;
    }
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("tag", &self.tag())
            .field("valid", &self.is_valid())
            .field("owner", &self.owner())
            .field("generation", &self.generation())
            .finish_non_exhaustive()
    }
}
