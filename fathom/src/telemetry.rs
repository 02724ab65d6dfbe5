// fathom/src/telemetry.rs
// ============================================================================
// Module: Fathom Facade Telemetry
// Description: Emission-side outcome reporting, no logging crate involved.
// Purpose: Give operators visibility into post-run-end drops and queue
//          overflow at the emission call site (`spec.md` §4.12, §4.13).
// Dependencies: fathom-core
// ============================================================================

//! ## Overview
//! Mirrors `fathom-queue`'s dependency-light telemetry: plain enums and a
//! pluggable [`Reporter`] trait rather than a `log`/`tracing` call. The
//! worker already counts exporter-side drops in its own
//! [`fathom_queue::DropCounters`]; this module covers the drops that can
//! only be observed at the point of emission, before an event ever reaches
//! the queue.

use std::io::Write as _;

use fathom_core::RunId;

/// Outcome of attempting to emit one event from an active run context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOutcome {
    /// The bounded queue was full or closed when the event was submitted.
    DroppedQueueFull,
    /// The owning run had already ended; the event was never submitted
    /// (`spec.md` §4.12: "any emission after `run_end` is dropped with a
    /// warning").
    DroppedAfterRunEnd,
}

impl EmitOutcome {
    /// Returns the wire form of this outcome.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DroppedQueueFull => "dropped_queue_full",
            Self::DroppedAfterRunEnd => "dropped_after_run_end",
        }
    }
}

/// Sink for notable emission outcomes. Swappable for a real logging
/// backend without redesigning the facade.
pub trait Reporter: Send + Sync {
    /// Records one outcome for `run_id`/`event_type`.
    fn report(&self, outcome: EmitOutcome, run_id: &RunId, event_type: &str);
}

/// Default reporter: one line per outcome, written to stderr.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&self, outcome: EmitOutcome, run_id: &RunId, event_type: &str) {
        let line = format!("fathom: {} run={run_id} event={event_type}\n", outcome.as_str());
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::EmitOutcome;
    use super::Reporter;
    use fathom_core::RunId;

    #[derive(Default)]
    struct RecordingReporter(Mutex<Vec<(EmitOutcome, String)>>);

    impl Reporter for RecordingReporter {
        fn report(&self, outcome: EmitOutcome, _run_id: &RunId, event_type: &str) {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((outcome, event_type.to_owned()));
        }
    }

    #[test]
    fn recording_reporter_observes_outcome() {
        let reporter = RecordingReporter::default();
        reporter.report(EmitOutcome::DroppedQueueFull, &RunId::new(), "tool_call");
        let recorded = reporter.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].1, "tool_call");
    }

    #[test]
    fn as_str_matches_expected_wire_form() {
        assert_eq!(EmitOutcome::DroppedQueueFull.as_str(), "dropped_queue_full");
        assert_eq!(
            EmitOutcome::DroppedAfterRunEnd.as_str(),
            "dropped_after_run_end"
        );
    }
}
