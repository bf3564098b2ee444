//! Bounded slot rings that track in-flight hardware tasks.
//!
//! One ring exists per device queue. A producer reserves slots as it
//! submits commands; a consumer on another thread releases them as
//! completion reports arrive. The two sides contend on separate locks, and
//! lookups take no lock at all.
//!
//! # Architecture
//!
//! ```text
//! FifoAllocator / RingAllocator
//! ├── Cursors (head + head lock, tail + tail lock, atomic mirrors)
//! ├── Counters → AllocStats
//! └── SlotPool
//!     └── Slot × N
//!         ├── tag / valid / owner / generation (atomics)
//!         └── Mutex<SlotEntry<T>> (Free | Primary | MemberOf)
//! ```
//!
//! # Variants
//!
//! - **[`FifoAllocator`]:** one slot per task at `task_id % N`, recycled in
//!   order from head, or lazily out of order.
//! - **[`RingAllocator`]:** runs of up to `max_run` consecutive slots,
//!   recycled in any order; head advances once the run in front of it is
//!   released.
//!
//! # Staleness
//!
//! Lock-free reads work on a [`CursorSnapshot`] and then re-check the slot
//! tag. A racing recycle can make a read return `None`; it can never make
//! it return another task's slot. [`SlotHandle`] additionally carries the
//! slot generation, so payload access through an old handle fails even
//! after the position is reused with the same tag.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod cursor;
pub mod diagnostics;
pub mod fifo;
pub mod handle;
pub mod pool;
pub mod ring;
pub mod slot;
pub mod stats;

// Public re-exports for the primary API surface.
pub use config::PoolConfig;
pub use cursor::CursorSnapshot;
pub use diagnostics::{DiagnosticSnapshot, Diagnostics, SlotSummary, SlotWindow};
pub use fifo::FifoAllocator;
pub use handle::SlotHandle;
pub use pool::SlotPool;
pub use ring::{RingAllocator, RunReservation};
pub use slot::{Slot, SlotEntry};
pub use stats::AllocStats;
