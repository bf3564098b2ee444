//! Test utilities for taskres development.
//!
//! Provides [`ReferenceRing`], a sequential model of the run allocator's
//! head/tail bookkeeping, and [`init_tracing`] for routing allocator logs
//! into test output.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::collections::VecDeque;

use tracing_subscriber::EnvFilter;

/// Install a fmt subscriber writing through the test harness.
///
/// Honours `RUST_LOG`, defaulting to `warn`. Safe to call from every test;
/// only the first call installs anything.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelRun {
    pub pos: u32,
    pub len: u32,
    pub released: bool,
}

/// Sequential model of a run ring with one reserved slot.
///
/// Runs are kept in allocation order. Releasing the front run pops it and
/// every released run behind it; releasing any other run only marks it.
#[derive(Clone, Debug)]
pub struct ReferenceRing {
    capacity: u32,
    head: u32,
    tail: u32,
    runs: VecDeque<ModelRun>,
    last_alloc: Option<u32>,
    allocations: u64,
}

impl ReferenceRing {
    pub fn new(capacity: u32) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");
        Self {
            capacity,
            head: 0,
            tail: 0,
            runs: VecDeque::new(),
            last_alloc: None,
            allocations: 0,
        }
    }

    pub fn head(&self) -> u32 {
        self.head
    }

    pub fn tail(&self) -> u32 {
        self.tail
    }

    pub fn pending(&self) -> u32 {
        (self.tail + self.capacity - self.head) % self.capacity
    }

    /// Allocations minus rollbacks.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn free(&self) -> u32 {
        self.capacity - 1 - self.pending()
    }

    /// Allocate `len` slots at tail, or `None` if they do not fit.
    pub fn alloc(&mut self, len: u32) -> Option<u32> {
        if len == 0 || len > self.free() {
            return None;
        }
        let pos = self.tail;
        self.runs.push_back(ModelRun {
            pos,
            len,
            released: false,
        });
        self.tail = (self.tail + len) % self.capacity;
        self.last_alloc = Some(pos);
        self.allocations += 1;
        Some(pos)
    }

    /// Release the live run starting at `pos`.
    pub fn release(&mut self, pos: u32) -> bool {
        let Some(run) = self.runs.iter_mut().find(|r| r.pos == pos && !r.released) else {
            return false;
        };
        run.released = true;
        while self.runs.front().is_some_and(|r| r.released) {
            self.runs.pop_front();
        }
        self.head = self.runs.front().map_or(self.tail, |r| r.pos);
        true
    }

    /// Start of the newest run if it can still be rolled back: it has not
    /// been rolled back already and head has not passed it.
    pub fn rollback_target(&self) -> Option<u32> {
        let pos = self.last_alloc?;
        (self.runs.back().map(|r| r.pos) == Some(pos)).then_some(pos)
    }

    /// Drop the newest run, moving tail back to its start.
    pub fn rollback_last(&mut self) -> Option<(u32, u32)> {
        self.rollback_target()?;
        let run = self.runs.pop_back()?;
        self.last_alloc = None;
        self.allocations -= 1;
        self.tail = run.pos;
        if self.runs.is_empty() {
            self.head = self.tail;
        }
        Some((run.pos, run.len))
    }

    /// `(pos, len)` of every run not yet released, oldest first.
    pub fn live_runs(&self) -> Vec<(u32, u32)> {
        self.runs
            .iter()
            .filter(|r| !r.released)
            .map(|r| (r.pos, r.len))
            .collect()
    }
}
