//! Pool configuration parameters.

use taskres_core::{OwnerId, PoolError};

/// Configuration for a slot ring.
///
/// One pool serves one hardware queue; the owner id identifies that queue
/// in logs and diagnostics. Validated at construction; all values are
/// immutable after creation.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Number of slots N. One slot is always kept free to tell "full" from
    /// "empty", so at most N−1 are occupied.
    pub capacity: u32,

    /// Longest run `alloc_run` accepts.
    ///
    /// Default: 8, the most command entries a single task occupies.
    pub max_run: u32,

    /// Owner recorded in every allocated slot.
    pub owner: OwnerId,

    /// Slots shown around head and tail in a diagnostic snapshot.
    ///
    /// Default: 6.
    pub diagnostic_window: u32,
}

impl PoolConfig {
    /// Default maximum run length.
    pub const DEFAULT_MAX_RUN: u32 = 8;

    /// Default diagnostic window size.
    pub const DEFAULT_DIAGNOSTIC_WINDOW: u32 = 6;

    /// Create a config for `capacity` slots with default values for
    /// everything else.
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            max_run: Self::DEFAULT_MAX_RUN,
            owner: OwnerId::default(),
            diagnostic_window: Self::DEFAULT_DIAGNOSTIC_WINDOW,
        }
    }

    /// Set the owner id.
    pub fn with_owner(mut self, owner: OwnerId) -> Self {
        self.owner = owner;
        self
    }

    /// Set the maximum run length.
    pub fn with_max_run(mut self, max_run: u32) -> Self {
        self.max_run = max_run;
        self
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), PoolError> {
        if self.capacity == 0 {
            return Err(PoolError::InvalidCapacity {
                capacity: self.capacity,
            });
        }
        if self.max_run == 0 {
            return Err(PoolError::InvalidMaxRun {
                max_run: self.max_run,
            });
        }
        if self.diagnostic_window == 0 {
            return Err(PoolError::InvalidDiagnosticWindow);
        }
        Ok(())
    }

    /// Slots that can be occupied at once.
    pub fn usable_capacity(&self) -> u32 {
        self.capacity.saturating_sub(1)
    }
}
