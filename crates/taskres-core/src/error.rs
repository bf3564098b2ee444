//! Error types for the task resource allocators.
//!
//! Only construction and allocation return errors. Lookups and recycles
//! report consistency anomalies as `None`/`false` plus a log line, since
//! their callers (completion handlers) cannot retry a specific report.

use thiserror::Error;

/// Errors returned by the allocation path.
///
/// None of these mutate the pool. `Full` is a capacity condition the caller
/// backs off from; the other two are caller misuse.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Not enough free slots for the request.
    #[error("pool full: requested {requested} slots, {available} available")]
    Full {
        /// Number of slots the request needed.
        requested: u32,
        /// Free slots at the time of the check.
        available: u32,
    },
    /// Run length is zero or above the configured maximum.
    #[error("invalid run length {run_len}, must be in 1..={max_run}")]
    InvalidRunLength {
        /// The rejected run length.
        run_len: u32,
        /// Configured maximum run length.
        max_run: u32,
    },
    /// Position is not allocatable: beyond capacity, inside the occupied
    /// window, or addressed by a task id equal to the sentinel tag.
    #[error("position {pos} out of range for capacity {capacity}")]
    OutOfRange {
        /// The rejected position.
        pos: u32,
        /// Pool capacity.
        capacity: u32,
    },
}

/// Errors detected while constructing a pool.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Capacity is zero or the backing slot array could not be allocated.
    #[error("invalid pool capacity {capacity}")]
    InvalidCapacity {
        /// The rejected capacity.
        capacity: u32,
    },
    /// Maximum run length is zero.
    #[error("invalid max run length {max_run}")]
    InvalidMaxRun {
        /// The rejected maximum.
        max_run: u32,
    },
    /// Diagnostic window size is zero.
    #[error("diagnostic window must hold at least one slot")]
    InvalidDiagnosticWindow,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_message_carries_counts() {
        let e = AllocError::Full {
            requested: 3,
            available: 1,
        };
        assert_eq!(e.to_string(), "pool full: requested 3 slots, 1 available");
    }

    #[test]
    fn run_length_message_shows_bound() {
        let e = AllocError::InvalidRunLength {
            run_len: 9,
            max_run: 8,
        };
        assert_eq!(e.to_string(), "invalid run length 9, must be in 1..=8");
    }

    #[test]
    fn errors_are_std_errors() {
        fn takes_error(_: &dyn std::error::Error) {}
        takes_error(&AllocError::OutOfRange {
            pos: 10,
            capacity: 4,
        });
        takes_error(&PoolError::InvalidCapacity { capacity: 0 });
    }
}
