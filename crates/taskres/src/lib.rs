//! Taskres: bounded slot rings for tracking in-flight hardware tasks.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the taskres sub-crates. For most users, adding `taskres` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use taskres::prelude::*;
//!
//! // One ring per device queue; payload holds per-task metadata.
//! let ring: RingAllocator<u64> = RingAllocator::with_capacity(64).unwrap();
//!
//! // Submission side: reserve a run, fill it in, commit.
//! let reservation = ring.reserve_run(3).unwrap();
//! reservation.with_payload(|meta| *meta = 0xfeed).unwrap();
//! let (pos, _) = reservation.commit();
//!
//! // Completion side: any member of the run resolves to its first slot.
//! let handle = ring.get(pos + 2).unwrap();
//! assert_eq!(ring.with_payload(handle, |meta| *meta), Some(0xfeed));
//! assert!(ring.recycle_run(pos, 3));
//! assert_eq!(ring.pending(), 0);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `taskres-core` | Task and owner IDs, sentinel tag, error enums |
//! | [`ring`] | `taskres-ring` | Slot pool, FIFO and run allocators, diagnostics |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers and error types (`taskres-core`).
pub use taskres_core as types;

/// Allocators, slot storage, and diagnostics (`taskres-ring`).
///
/// [`ring::FifoAllocator`] for one-slot-per-task queues recycled in order,
/// [`ring::RingAllocator`] for multi-slot runs recycled in any order.
pub use taskres_ring as ring;

/// Common imports for typical taskres usage.
///
/// ```rust
/// use taskres::prelude::*;
/// ```
pub mod prelude {
    pub use taskres_core::{AllocError, OwnerId, PoolError, TaskId, SENTINEL_TAG};
    pub use taskres_ring::{
        AllocStats, DiagnosticSnapshot, Diagnostics, FifoAllocator, PoolConfig, RingAllocator,
        RunReservation, SlotHandle,
    };
}
