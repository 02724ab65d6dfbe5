// fathom-core/src/core/event.rs
// ============================================================================
// Module: Fathom Event Model
// Description: Tagged-variant event records with a common envelope.
// Purpose: Provide the in-memory representation that flows from emission
//          through the queue, the pipeline, and into storage.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! An [`Event`] pairs a common [`Envelope`] (ids, timestamp, status,
//! metadata) with a tag-specific [`EventPayload`] variant. The envelope and
//! payload are kept as separate types rather than one flat struct because
//! the pipeline's redaction stage only traverses the payload (`spec.md`
//! §4.4): envelope fields are structural and are never redacted.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::RunId;

/// A mapping from string keys to JSON scalars or nested objects/arrays.
///
/// Used for both run metadata and per-event metadata. A `BTreeMap` is used
/// (rather than a `HashMap`) so that serialized metadata has a stable key
/// order even before canonical-JSON encoding.
pub type MetadataMap = BTreeMap<String, serde_json::Value>;

/// Re-exported alias kept for callers that want to name a single metadata
/// entry's value type explicitly.
pub type MetadataValue = serde_json::Value;

/// Outcome recorded on an individual event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// The observation completed without error.
    Ok,
    /// The observation represents or carries an error.
    Error,
    /// Informational event with no success/failure meaning.
    Info,
}

/// Terminal status recorded on a `run_end` event and on the owning run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// The run finished without a critical error.
    Completed,
    /// The run finished with a critical error.
    Failed,
}

/// Fields shared by every event, regardless of its payload tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Monotonic id of this event within its run, assigned by the run
    /// context (not by the store).
    pub event_id: u64,
    /// Owning run.
    pub run_id: RunId,
    /// Id of the enclosing scope's event, if any.
    pub parent_event_id: Option<u64>,
    /// Wall-clock milliseconds since the Unix epoch when the event was
    /// constructed.
    pub timestamp_ms: i64,
    /// Duration of the observation, when known at construction time.
    pub duration_ms: Option<i64>,
    /// Outcome of the observation.
    pub status: EventStatus,
    /// Free-form metadata attached at the call site. Not subject to
    /// redaction.
    pub metadata: MetadataMap,
}

/// A single value in an LLM prompt: either raw text or a structured
/// message array (as produced by chat-style completion APIs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PromptValue {
    /// A single text prompt.
    Text(String),
    /// An ordered sequence of chat messages, each an opaque JSON object.
    Messages(Vec<serde_json::Value>),
}

/// Tag-specific event payload. Serializes with an internal `type` tag
/// matching the names in `spec.md` §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Brackets the start of a run. Carries the run's display name; the
    /// run's metadata lives on the `Run` row, not here.
    RunStart {
        /// Short human-readable label for the run.
        name: String,
    },
    /// Brackets the end of a run. The only event allowed to use the
    /// bounded-wait enqueue mode.
    RunEnd {
        /// Terminal status of the run.
        final_status: FinalStatus,
    },
    /// A single call to a language model.
    LlmCall {
        /// Model identifier as passed to the provider.
        model: String,
        /// The prompt sent to the model.
        prompt: PromptValue,
        /// The model's response text.
        response: String,
        /// Total tokens consumed, when reported by the provider.
        #[serde(skip_serializing_if = "Option::is_none")]
        total_tokens: Option<u64>,
        /// Observed latency of the call, when measured at the call site.
        #[serde(skip_serializing_if = "Option::is_none")]
        latency_ms: Option<i64>,
    },
    /// A single tool invocation.
    ToolCall {
        /// Name of the invoked tool.
        tool_name: String,
        /// Arguments passed to the tool.
        tool_args: serde_json::Value,
        /// Result returned by the tool.
        tool_result: serde_json::Value,
    },
    /// A read from the agent's memory store.
    MemoryRead {
        /// Key read.
        memory_key: String,
        /// Value observed.
        memory_value: serde_json::Value,
        /// Caller-defined memory kind (e.g. "episodic", "scratch").
        memory_type: String,
    },
    /// A write to the agent's memory store.
    MemoryWrite {
        /// Key written.
        memory_key: String,
        /// Value written.
        memory_value: serde_json::Value,
        /// Caller-defined memory kind.
        memory_type: String,
        /// Whether the write overwrote an existing value.
        overwrite: bool,
    },
    /// An error observed during the run.
    Error {
        /// Caller-defined error classification.
        error_type: String,
        /// Human-readable error message.
        error_message: String,
        /// Whether the error is severe enough to fail the run.
        critical: bool,
        /// Stack trace or backtrace text, when available.
        #[serde(skip_serializing_if = "Option::is_none")]
        stack: Option<String>,
    },
    /// The agent's final answer for the run.
    FinalAnswer {
        /// The answer text.
        answer: String,
    },
    /// Escape hatch for caller-defined event kinds. Still goes through the
    /// full pipeline.
    Custom {
        /// Caller-defined event name.
        name: String,
        /// Caller-defined payload.
        payload: serde_json::Value,
    },
}

impl EventPayload {
    /// Returns the wire tag for this payload variant (`"run_start"`,
    /// `"llm_call"`, and so on), matching the column in `spec.md` §3.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        match self {
            Self::RunStart { .. } => "run_start",
            Self::RunEnd { .. } => "run_end",
            Self::LlmCall { .. } => "llm_call",
            Self::ToolCall { .. } => "tool_call",
            Self::MemoryRead { .. } => "memory_read",
            Self::MemoryWrite { .. } => "memory_write",
            Self::Error { .. } => "error",
            Self::FinalAnswer { .. } => "final_answer",
            Self::Custom { .. } => "custom",
        }
    }
}

/// A fully constructed event: envelope plus tagged payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Fields common to every event.
    pub envelope: Envelope,
    /// Tag-specific fields.
    pub payload: EventPayload,
}

impl Event {
    /// Returns the event's wire tag, delegating to the payload.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.payload.tag()
    }

    /// Serializes the payload alone to a JSON value, for the pipeline's
    /// redaction stage to traverse. The envelope is intentionally excluded.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be represented as JSON, which
    /// should not happen for any well-formed `EventPayload`.
    pub fn payload_as_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(&self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::Envelope;
    use super::Event;
    use super::EventPayload;
    use super::EventStatus;
    use super::PromptValue;
    use crate::core::identifiers::RunId;

    fn envelope(run_id: &RunId, event_id: u64) -> Envelope {
        Envelope {
            event_id,
            run_id: run_id.clone(),
            parent_event_id: None,
            timestamp_ms: 1_700_000_000_000,
            duration_ms: None,
            status: EventStatus::Ok,
            metadata: super::MetadataMap::new(),
        }
    }

    #[test]
    fn tag_matches_payload_variant() {
        let run_id = RunId::new();
        let event = Event {
            envelope: envelope(&run_id, 0),
            payload: EventPayload::ToolCall {
                tool_name: "search".to_owned(),
                tool_args: serde_json::json!({"q": "x"}),
                tool_result: serde_json::json!({"hits": 1}),
            },
        };
        assert_eq!(event.tag(), "tool_call");
    }

    #[test]
    fn payload_json_excludes_envelope_fields() {
        let run_id = RunId::new();
        let event = Event {
            envelope: envelope(&run_id, 1),
            payload: EventPayload::LlmCall {
                model: "m".to_owned(),
                prompt: PromptValue::Text("hi".to_owned()),
                response: "hello".to_owned(),
                total_tokens: None,
                latency_ms: None,
            },
        };
        let value = event.payload_as_json().expect("serialize payload");
        assert!(value.get("run_id").is_none());
        assert_eq!(value.get("model").and_then(|v| v.as_str()), Some("m"));
    }
}
