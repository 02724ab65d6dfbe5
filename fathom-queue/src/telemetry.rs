// fathom-queue/src/telemetry.rs
// ============================================================================
// Module: Fathom Queue Telemetry
// Description: Drop counters and batch outcomes, no logging crate involved.
// Purpose: Give operators visibility into queue overflow and export
//          failures without depending on `log`/`tracing` (`spec.md` §4.13).
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every counter here is a plain [`std::sync::atomic::AtomicU64`];
//! snapshots are cheap and lock-free. [`BatchOutcome`] is a
//! `Serialize`-able enum rather than a log line, so a caller that does
//! wire up a logging framework can record it in whatever shape it wants.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Serialize;

/// Per-event-type drop counters, incremented when the bounded queue is
/// full (`spec.md` §4.5) or the retained batch is ultimately dropped
/// (`spec.md` §4.8).
#[derive(Debug, Default)]
pub struct DropCounters {
    run_start: AtomicU64,
    run_end: AtomicU64,
    llm_call: AtomicU64,
    tool_call: AtomicU64,
    memory_read: AtomicU64,
    memory_write: AtomicU64,
    error: AtomicU64,
    final_answer: AtomicU64,
    custom: AtomicU64,
}

impl DropCounters {
    /// Increments the counter for `tag` (an [`fathom_core::core::event::Event::tag`]
    /// value). Unknown tags are folded into `custom`.
    pub fn increment(&self, tag: &str) {
        let counter = match tag {
            "run_start" => &self.run_start,
            "run_end" => &self.run_end,
            "llm_call" => &self.llm_call,
            "tool_call" => &self.tool_call,
            "memory_read" => &self.memory_read,
            "memory_write" => &self.memory_write,
            "error" => &self.error,
            "final_answer" => &self.final_answer,
            _ => &self.custom,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns a consistent-enough snapshot of every counter, keyed by
    /// tag. Individual reads are atomic; the set as a whole is not.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        BTreeMap::from([
            ("run_start", self.run_start.load(Ordering::Relaxed)),
            ("run_end", self.run_end.load(Ordering::Relaxed)),
            ("llm_call", self.llm_call.load(Ordering::Relaxed)),
            ("tool_call", self.tool_call.load(Ordering::Relaxed)),
            ("memory_read", self.memory_read.load(Ordering::Relaxed)),
            ("memory_write", self.memory_write.load(Ordering::Relaxed)),
            ("error", self.error.load(Ordering::Relaxed)),
            ("final_answer", self.final_answer.load(Ordering::Relaxed)),
            ("custom", self.custom.load(Ordering::Relaxed)),
        ])
    }

    /// Total drops across every tag.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.snapshot().values().sum()
    }
}

/// Outcome of one worker batch delivery, recorded for introspection
/// rather than printed as a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOutcome {
    /// The exporter accepted the batch.
    Exported,
    /// The exporter rejected the batch; it was dropped without retry
    /// (the worker itself does not retry, that is the storage
    /// exporter's responsibility per `spec.md` §4.8).
    Dropped,
}

impl BatchOutcome {
    /// Returns the wire form of this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exported => "exported",
            Self::Dropped => "dropped",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::DropCounters;

    #[test]
    fn unknown_tags_fold_into_custom() {
        let counters = DropCounters::default();
        counters.increment("tool_call");
        counters.increment("something_else");
        let snapshot = counters.snapshot();
        assert_eq!(snapshot["tool_call"], 1);
        assert_eq!(snapshot["custom"], 1);
        assert_eq!(counters.total(), 2);
    }
}
