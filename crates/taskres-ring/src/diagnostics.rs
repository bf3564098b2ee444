//! Read-only state dumps for failure triage.
//!
//! A [`DiagnosticSnapshot`] records head, tail, and a short window of slots
//! ending at each cursor. It is captured without taking either cursor lock,
//! so under concurrent traffic the windows may straddle an in-flight update.

use std::fmt;

use smallvec::SmallVec;
use taskres_core::OwnerId;
use tracing::info;

use crate::cursor::{advance, CursorSnapshot};
use crate::pool::SlotPool;

/// State of one slot at capture time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlotSummary {
    /// Ring position.
    pub pos: u32,
    /// Stored tag, `None` if free or recycled.
    pub tag: Option<u32>,
    /// Whether the slot held live data.
    pub valid: bool,
    /// Owner recorded by the last allocation.
    pub owner: OwnerId,
}

/// Consecutive slots around a cursor. Inline for the default window of 6.
pub type SlotWindow = SmallVec<[SlotSummary; 6]>;

/// Head/tail plus the slots leading up to each.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiagnosticSnapshot {
    /// Ring size N.
    pub capacity: u32,
    /// Head at capture time.
    pub head: u32,
    /// Tail at capture time.
    pub tail: u32,
    /// `(tail - head) mod N` at capture time.
    pub pending: u32,
    /// Slots ending at (and including) head.
    pub head_window: SlotWindow,
    /// Slots ending at (and including) tail.
    pub tail_window: SlotWindow,
}

impl DiagnosticSnapshot {
    pub(crate) fn capture<T>(pool: &SlotPool<T>, cursors: CursorSnapshot, window: u32) -> Self {
        Self {
            capacity: cursors.capacity,
            head: cursors.head,
            tail: cursors.tail,
            pending: cursors.pending(),
            head_window: window_ending_at(pool, cursors.head, window),
            tail_window: window_ending_at(pool, cursors.tail, window),
        }
    }

    /// Emit the snapshot as `info` events.
    pub fn log(&self) {
        info!(
            capacity = self.capacity,
            head = self.head,
            tail = self.tail,
            pending = self.pending,
            "slot ring state"
        );
        info!(
            start = window_start(&self.head_window),
            slots = %WindowDisplay(&self.head_window),
            "head window"
        );
        info!(
            start = window_start(&self.tail_window),
            slots = %WindowDisplay(&self.tail_window),
            "tail window"
        );
    }
}

impl fmt::Display for DiagnosticSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "capacity={} head={} tail={} pending={}",
            self.capacity, self.head, self.tail, self.pending
        )?;
        writeln!(f, "head window: {}", WindowDisplay(&self.head_window))?;
        write!(f, "tail window: {}", WindowDisplay(&self.tail_window))
    }
}

/// Renders a window as `pos:tag:v` entries (`-` for no tag, `x` for invalid).
struct WindowDisplay<'a>(&'a [SlotSummary]);

impl fmt::Display for WindowDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match s.tag {
                Some(tag) => write!(f, "{}:{}", s.pos, tag)?,
                None => write!(f, "{}:-", s.pos)?,
            }
            f.write_str(if s.valid { ":v" } else { ":x" })?;
        }
        Ok(())
    }
}

fn window_start(window: &[SlotSummary]) -> u32 {
    window.first().map_or(0, |s| s.pos)
}

fn window_ending_at<T>(pool: &SlotPool<T>, cursor: u32, window: u32) -> SlotWindow {
    let capacity = pool.capacity();
    let len = window.min(capacity);
    if len == 0 {
        return SlotWindow::new();
    }
    let start = advance(cursor, capacity - (len - 1), capacity);
    (0..len)
        .map(|i| {
            let pos = advance(start, i, capacity);
            let slot = pool.at(pos);
            SlotSummary {
                pos,
                tag: slot.tag(),
                valid: slot.is_valid(),
                owner: slot.owner(),
            }
        })
        .collect()
}

/// Allocators that can dump their state for triage.
pub trait Diagnostics {
    /// Capture head, tail, and the slot windows around them.
    fn dump(&self) -> DiagnosticSnapshot;

    /// Capture and log in one call.
    fn log_state(&self) {
        self.dump().log();
    }
}
