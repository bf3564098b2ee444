//! Strongly-typed identifiers and the sentinel tag.

use std::fmt;

/// Tag value marking a slot as not holding live data.
///
/// Never a valid task id and never a valid ring position (positions are
/// always `< capacity <= u32::MAX`).
pub const SENTINEL_TAG: u32 = u32::MAX;

/// Identifies a unit of hardware work submitted on a queue.
///
/// Task ids are chosen by the submitter. The strict in-order allocator maps
/// a task id to its ring position with `id % capacity`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u32);

impl TaskId {
    /// Whether this id collides with [`SENTINEL_TAG`] and therefore cannot
    /// be stored in a slot.
    pub fn is_sentinel(self) -> bool {
        self.0 == SENTINEL_TAG
    }

    /// Ring position this id maps to in a pool of `capacity` slots.
    pub fn position(self, capacity: u32) -> u32 {
        debug_assert!(capacity > 0);
        self.0 % capacity
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for TaskId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Diagnostic owner recorded in every allocated slot.
///
/// Typically the id of the device queue (stream) the pool serves. It is
/// never interpreted by the allocator; it only shows up in logs and
/// diagnostic snapshots.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(pub u32);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for OwnerId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}
