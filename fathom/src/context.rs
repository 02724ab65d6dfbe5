// fathom/src/context.rs
// ============================================================================
// Module: Fathom Run Context
// Description: Per-run state shared between a `RunGuard` and the active
//              context stack: the event sequence, the sampling decision,
//              the only-on-error buffer, and run-end idempotence.
// Purpose: `spec.md` §4.3, §4.11, §4.12 (sampler caching, only-on-error
//          state machine, run-end-is-terminal).
// Dependencies: fathom-core
// ============================================================================

//! ## Overview
//! [`RunState`] is the object a [`crate::scope::RunGuard`] wraps and the
//! active-context stack holds `Arc` handles to. Every event constructed
//! during a run, including `run_start`/`run_end` themselves, flows through
//! [`RunState::record`], which is the single place that applies the
//! only-on-error buffer and the post-`run_end` drop rule.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use fathom_core::Envelope;
use fathom_core::Event;
use fathom_core::EventIdSequence;
use fathom_core::EventPayload;
use fathom_core::EventStatus;
use fathom_core::FinalStatus;
use fathom_core::MetadataMap;
use fathom_core::RunId;

use crate::telemetry::EmitOutcome;
use crate::trace::Trace;

/// Per-run state owned jointly by a [`crate::scope::RunGuard`] and the
/// active-context stack.
pub(crate) struct RunState {
    run_id: RunId,
    parent_run_id: Option<RunId>,
    sampled: bool,
    only_on_error: bool,
    sequence: EventIdSequence,
    last_event_id: AtomicU64,
    ended: AtomicBool,
    critical_error: AtomicBool,
    buffer: Mutex<Vec<Event>>,
    trace: Trace,
}

impl RunState {
    pub(crate) fn new(
        run_id: RunId,
        parent_run_id: Option<RunId>,
        sampled: bool,
        only_on_error: bool,
        trace: Trace,
    ) -> Arc<Self> {
        Arc::new(Self {
            run_id,
            parent_run_id,
            sampled,
            only_on_error,
            sequence: EventIdSequence::new(),
            last_event_id: AtomicU64::new(0),
            ended: AtomicBool::new(false),
            critical_error: AtomicBool::new(false),
            buffer: Mutex::new(Vec::new()),
            trace,
        })
    }

    pub(crate) fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub(crate) fn parent_run_id(&self) -> Option<&RunId> {
        self.parent_run_id.as_ref()
    }

    pub(crate) fn sampled(&self) -> bool {
        self.sampled
    }

    /// Event id of the most recently constructed event in this run, used
    /// to anchor a nested run's `run_start.parent_event_id` to the exact
    /// point in the enclosing run's timeline where the child run began.
    pub(crate) fn last_event_id(&self) -> u64 {
        self.last_event_id.load(Ordering::Relaxed)
    }

    /// Marks the run as having observed a critical error without ending
    /// it; a normal (non-panicking) scope exit after this promotes the
    /// run's terminal status from `completed` to `failed`.
    pub(crate) fn mark_critical(&self) {
        self.critical_error.store(true, Ordering::Release);
    }

    fn next_envelope(&self, parent_event_id: Option<u64>, status: EventStatus) -> Envelope {
        let event_id = self.sequence.next();
        self.last_event_id.store(event_id, Ordering::Relaxed);
        Envelope {
            event_id,
            run_id: self.run_id.clone(),
            parent_event_id,
            timestamp_ms: now_ms(),
            duration_ms: None,
            status,
            metadata: MetadataMap::new(),
        }
    }

    /// Constructs and records the `run_start` event that opens this run.
    /// `parent_event_id` anchors a nested run to the enclosing run's
    /// current position; `metadata` carries the caller-supplied run
    /// metadata, including the well-known `user_id`/`session_id` keys the
    /// storage exporter extracts.
    pub(crate) fn start(self: &Arc<Self>, name: String, parent_event_id: Option<u64>, metadata: MetadataMap) {
        let mut envelope = self.next_envelope(parent_event_id, EventStatus::Ok);
        envelope.metadata = metadata;
        self.record(Event {
            envelope,
            payload: EventPayload::RunStart { name },
        });
    }

    /// Constructs and records one of the leaf emitter payloads.
    pub(crate) fn emit(self: &Arc<Self>, payload: EventPayload, status: EventStatus) {
        let event = Event {
            envelope: self.next_envelope(None, status),
            payload,
        };
        self.record(event);
    }

    fn record(&self, event: Event) {
        if !self.sampled {
            return;
        }
        if self.ended.load(Ordering::Acquire) {
            self.trace.report(EmitOutcome::DroppedAfterRunEnd, &self.run_id, event.tag());
            return;
        }
        if self.only_on_error {
            self.buffer.lock().unwrap_or_else(std::sync::PoisonError::into_inner).push(event);
            return;
        }
        self.submit(event);
    }

    fn submit(&self, event: Event) {
        let tag = event.tag();
        let accepted = if tag == "run_end" && self.trace.config().block_on_run_end {
            self.trace.producer().submit_bounded_wait(
                event,
                std::time::Duration::from_millis(self.trace.config().run_end_block_timeout_ms),
            )
        } else {
            self.trace.producer().try_submit(event)
        };
        if !accepted {
            self.trace.emit_drops().increment(tag);
            self.trace.report(EmitOutcome::DroppedQueueFull, &self.run_id, tag);
        }
    }

    /// Resolves this run's terminal status (`spec.md` §4.12) and either
    /// submits or discards the only-on-error buffer. Idempotent: a second
    /// call is a no-op, matching "left exactly once on `run_end`".
    pub(crate) fn finish(&self, panicked: bool) {
        if self.ended.swap(true, Ordering::AcqRel) {
            return;
        }
        if !self.sampled {
            return;
        }
        let final_status = if panicked || self.critical_error.load(Ordering::Acquire) {
            FinalStatus::Failed
        } else {
            FinalStatus::Completed
        };
        let run_end = Event {
            envelope: self.next_envelope(None, EventStatus::Ok),
            payload: EventPayload::RunEnd { final_status },
        };
        if self.only_on_error {
            let mut buffer = self.buffer.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            match final_status {
                FinalStatus::Failed => {
                    let buffered = std::mem::take(&mut *buffer);
                    drop(buffer);
                    for event in buffered {
                        self.submit(event);
                    }
                    self.submit(run_end);
                }
                FinalStatus::Completed => buffer.clear(),
            }
        } else {
            self.submit(run_end);
        }
    }
}

fn now_ms() -> i64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    i64::try_from(millis).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::Mutex;

    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use fathom_core::Event;
    use fathom_core::EventPayload;
    use fathom_core::EventStatus;
    use fathom_core::RunId;
    use fathom_export::Exporter;
    use fathom_export::ExportError;

    use super::RunState;
    use crate::trace::Trace;

    #[derive(Clone, Default)]
    struct CollectingExporter(Arc<Mutex<Vec<Event>>>);

    impl CollectingExporter {
        fn events(&self) -> Vec<Event> {
            self.0.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
        }
    }

    impl Exporter for CollectingExporter {
        fn initialize(&self, _config: &Config) -> Result<(), ExportError> {
            Ok(())
        }

        fn export_batch(&self, events: &[Event]) -> Result<(), ExportError> {
            self.0
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .extend_from_slice(events);
            Ok(())
        }

        fn shutdown(&self) -> Result<(), ExportError> {
            Ok(())
        }
    }

    fn debug_trace() -> (Trace, CollectingExporter) {
        let config = Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load");
        let exporter = CollectingExporter::default();
        let trace = Trace::new(config, exporter.clone()).expect("build");
        (trace, exporter)
    }

    #[test]
    fn only_on_error_buffer_is_discarded_on_completed_run() {
        let (trace, exporter) = debug_trace();
        let state = RunState::new(RunId::new(), None, true, true, trace.clone());
        state.start("t".to_owned(), None, super::MetadataMap::new());
        state.emit(
            EventPayload::FinalAnswer { answer: "x".to_owned() },
            EventStatus::Ok,
        );
        state.finish(false);
        trace.shutdown();
        assert!(exporter.events().is_empty());
    }

    #[test]
    fn only_on_error_buffer_flushes_in_order_on_failed_run() {
        let (trace, exporter) = debug_trace();
        let state = RunState::new(RunId::new(), None, true, true, trace.clone());
        state.start("t".to_owned(), None, super::MetadataMap::new());
        state.emit(
            EventPayload::FinalAnswer { answer: "x".to_owned() },
            EventStatus::Ok,
        );
        state.finish(true);
        trace.shutdown();
        let tags: Vec<&str> = exporter.events().iter().map(Event::tag).collect();
        assert_eq!(tags, vec!["run_start", "final_answer", "run_end"]);
    }

    #[test]
    fn events_after_run_end_are_dropped() {
        let (trace, exporter) = debug_trace();
        let state = RunState::new(RunId::new(), None, true, false, trace.clone());
        state.start("t".to_owned(), None, super::MetadataMap::new());
        state.finish(false);
        state.emit(
            EventPayload::FinalAnswer { answer: "late".to_owned() },
            EventStatus::Ok,
        );
        trace.shutdown();
        let tags: Vec<&str> = exporter.events().iter().map(Event::tag).collect();
        assert_eq!(tags, vec!["run_start", "run_end"]);
    }

    #[test]
    fn finish_is_idempotent() {
        let (trace, exporter) = debug_trace();
        let state = RunState::new(RunId::new(), None, true, false, trace.clone());
        state.start("t".to_owned(), None, super::MetadataMap::new());
        state.finish(false);
        state.finish(true);
        trace.shutdown();
        let run_end_count = exporter.events().iter().filter(|e| e.tag() == "run_end").count();
        assert_eq!(run_end_count, 1);
    }

    #[test]
    fn unsampled_run_records_nothing() {
        let (trace, exporter) = debug_trace();
        let state = RunState::new(RunId::new(), None, false, false, trace.clone());
        state.start("t".to_owned(), None, super::MetadataMap::new());
        state.finish(false);
        trace.shutdown();
        assert!(exporter.events().is_empty());
    }
}
