// fathom/src/scope.rs
// ============================================================================
// Module: Fathom Run Guard
// Description: Scoped run acquisition with guaranteed `run_end` emission
//              on every exit path, and the event emitter surface.
// Purpose: `spec.md` §4.11 `run(...)`; §9 "scoped resource acquisition".
// Dependencies: fathom-core, std::thread::panicking
// ============================================================================

//! ## Overview
//! A [`RunGuard`] is what [`crate::Trace::run`] returns. Its [`Drop`] impl
//! is the only place `run_end` is guaranteed to be emitted: normal scope
//! exit emits `run_end(status=completed)` (or `failed`, if a critical
//! [`RunGuard::error`] was recorded first); an unwinding drop — detected
//! via [`std::thread::panicking`], since `Drop` has no other way to see
//! *why* a scope is being torn down — emits a synthetic `error` event
//! before `run_end(status=failed)`.

use fathom_core::EventPayload;
use fathom_core::EventStatus;
use fathom_core::MetadataMap;
use fathom_core::PromptValue;
use fathom_core::RunId;

use crate::active;
use crate::context::RunState;
use crate::trace::Trace;

/// A single scoped run, acquired via [`crate::Trace::run`]. Dropping it
/// — on any exit path — emits the run's terminating `run_end` event
/// exactly once.
pub struct RunGuard {
    state: std::sync::Arc<RunState>,
    used_task_local: bool,
}

impl RunGuard {
    pub(crate) fn enter(trace: &Trace, name: impl Into<String>, metadata: MetadataMap) -> Self {
        let parent = active::current_state();
        let run_id = RunId::new();
        let name = name.into();
        let sampled = trace
            .sampler()
            .should_sample(&run_id, &name, trace.config().sample_rate);
        let parent_run_id = parent.as_ref().map(|p| p.run_id().clone());
        let parent_event_id = parent.as_ref().map(|p| p.last_event_id());

        let state = RunState::new(
            run_id,
            parent_run_id,
            sampled,
            trace.config().only_on_error,
            trace.clone(),
        );
        state.start(name, parent_event_id, metadata);

        let used_task_local = active::push(std::sync::Arc::clone(&state));
        Self {
            state,
            used_task_local,
        }
    }

    /// This run's identifier.
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        self.state.run_id()
    }

    /// Whether this run's sampling decision traces it. Callers may use
    /// this to skip expensive payload construction for an untraced run.
    #[must_use]
    pub fn sampled(&self) -> bool {
        self.state.sampled()
    }

    /// Records a single language-model call.
    pub fn llm(
        &self,
        model: impl Into<String>,
        prompt: PromptValue,
        response: impl Into<String>,
        total_tokens: Option<u64>,
        latency_ms: Option<i64>,
    ) {
        self.state.emit(
            EventPayload::LlmCall {
                model: model.into(),
                prompt,
                response: response.into(),
                total_tokens,
                latency_ms,
            },
            EventStatus::Ok,
        );
    }

    /// Records a single tool invocation.
    pub fn tool(
        &self,
        tool_name: impl Into<String>,
        tool_args: serde_json::Value,
        tool_result: serde_json::Value,
    ) {
        self.state.emit(
            EventPayload::ToolCall {
                tool_name: tool_name.into(),
                tool_args,
                tool_result,
            },
            EventStatus::Ok,
        );
    }

    /// Records a read from the agent's memory store.
    pub fn memory_read(
        &self,
        memory_key: impl Into<String>,
        memory_value: serde_json::Value,
        memory_type: impl Into<String>,
    ) {
        self.state.emit(
            EventPayload::MemoryRead {
                memory_key: memory_key.into(),
                memory_value,
                memory_type: memory_type.into(),
            },
            EventStatus::Ok,
        );
    }

    /// Records a write to the agent's memory store.
    pub fn memory_write(
        &self,
        memory_key: impl Into<String>,
        memory_value: serde_json::Value,
        memory_type: impl Into<String>,
        overwrite: bool,
    ) {
        self.state.emit(
            EventPayload::MemoryWrite {
                memory_key: memory_key.into(),
                memory_value,
                memory_type: memory_type.into(),
                overwrite,
            },
            EventStatus::Ok,
        );
    }

    /// Records an error observed during the run. A `critical` error
    /// promotes the run's terminal status to `failed` even if the scope
    /// otherwise exits normally.
    pub fn error(
        &self,
        error_type: impl Into<String>,
        error_message: impl Into<String>,
        critical: bool,
        stack: Option<String>,
    ) {
        if critical {
            self.state.mark_critical();
        }
        self.state.emit(
            EventPayload::Error {
                error_type: error_type.into(),
                error_message: error_message.into(),
                critical,
                stack,
            },
            EventStatus::Error,
        );
    }

    /// Records the agent's final answer for the run.
    pub fn final_answer(&self, answer: impl Into<String>) {
        self.state.emit(
            EventPayload::FinalAnswer {
                answer: answer.into(),
            },
            EventStatus::Ok,
        );
    }

    /// Escape hatch for caller-defined event kinds. Still goes through the
    /// full pipeline.
    pub fn emit(&self, name: impl Into<String>, payload: serde_json::Value) {
        self.state.emit(
            EventPayload::Custom {
                name: name.into(),
                payload,
            },
            EventStatus::Info,
        );
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        active::pop(self.used_task_local);
        let panicked = std::thread::panicking();
        if panicked {
            self.state.emit(
                EventPayload::Error {
                    error_type: "panic".to_owned(),
                    error_message: "run scope exited via unwind".to_owned(),
                    critical: true,
                    stack: None,
                },
                EventStatus::Error,
            );
        }
        self.state.finish(panicked);
    }
}
