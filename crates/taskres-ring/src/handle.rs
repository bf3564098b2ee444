//! Slot handles.
//!
//! A [`SlotHandle`] names a slot by ring position. It is generation-scoped:
//! the `generation` field lets payload access reject a handle whose slot has
//! since been recycled and reallocated, even when the new occupant carries
//! the same tag.

use std::fmt;

/// Reference to the canonical (primary) slot of an allocation.
///
/// Handles are plain values; they borrow nothing from the pool. Resolve
/// them with `with_payload` on the allocator that issued them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct SlotHandle {
    /// Ring position of the primary slot.
    pub(crate) pos: u32,
    /// Tag the slot carried when the handle was issued.
    pub(crate) tag: u32,
    /// Slot generation when the handle was issued.
    pub(crate) generation: u32,
}

impl SlotHandle {
    pub(crate) fn new(pos: u32, tag: u32, generation: u32) -> Self {
        Self {
            pos,
            tag,
            generation,
        }
    }

    /// Ring position of the primary slot.
    pub fn pos(&self) -> u32 {
        self.pos
    }

    /// Tag stored in the slot: a task id for the strict in-order allocator,
    /// the run's own position for the run allocator.
    pub fn tag(&self) -> u32 {
        self.tag
    }

    /// Slot generation at issue time.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SlotHandle(pos={}, tag={}, gen={})",
            self.pos, self.tag, self.generation
        )
    }
}
