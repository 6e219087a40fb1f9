//! A pair of plain latches used to coalesce writes during an inbound read
//! turn (spec §4.4: "During an inbound read turn (`read` latch set), writes
//! are accumulated and flushed at the end of the read turn").
//!
//! These are not cross-task synchronization primitives — a connection is
//! pinned to a single event-loop worker (spec §5), so a `Cell<bool>`
//! suffices; writes from other tasks hop onto the connection's worker via
//! [`crate::common::exec::Exec`] before touching these latches.

use std::cell::Cell;

/// Tracks whether the connection is currently inside an inbound read turn,
/// and whether a flush has been requested for when that turn ends.
#[derive(Debug, Default)]
pub(crate) struct Coalesce {
    reading: Cell<bool>,
    flush_pending: Cell<bool>,
}

impl Coalesce {
    pub(crate) fn enter_read(&self) {
        self.reading.set(true);
    }

    pub(crate) fn exit_read(&self) -> bool {
        self.reading.set(false);
        self.flush_pending.replace(false)
    }

    pub(crate) fn is_reading(&self) -> bool {
        self.reading.get()
    }

    /// Request a flush. Returns `true` if the caller should flush
    /// immediately (no read turn in progress), `false` if the flush will
    /// happen automatically at the end of the current read turn.
    pub(crate) fn request_flush(&self) -> bool {
        if self.reading.get() {
            self.flush_pending.set(true);
            false
        } else {
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_during_read_is_deferred() {
        let c = Coalesce::default();
        c.enter_read();
        assert!(!c.request_flush());
        assert!(c.exit_read(), "flush should fire at end of read turn");
    }

    #[test]
    fn flush_outside_read_is_immediate() {
        let c = Coalesce::default();
        assert!(c.request_flush());
    }
}
