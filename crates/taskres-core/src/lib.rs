//! Core types for the task resource ring allocator.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! identifiers and error enums shared by the allocator crates: task and
//! owner IDs, the sentinel tag, and the allocation/construction errors.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod id;

pub use error::{AllocError, PoolError};
pub use id::{OwnerId, TaskId, SENTINEL_TAG};
