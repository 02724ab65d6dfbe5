// fathom/src/lib.rs
// ============================================================================
// Module: Fathom Facade Library
// Description: Public entry point: `Trace`, `RunGuard`, active-context
//              propagation, and the process-wide default instance.
// Purpose: Single crate application code depends on to instrument an agent.
// Dependencies: crate::{active, context, error, scope, telemetry, trace}
// ============================================================================

//! ## Overview
//! `fathom` wires a bounded queue, a background worker, and a pluggable
//! [`fathom_export::Exporter`] behind one call: [`Trace::run`] opens a run
//! scope, and the returned [`RunGuard`] is both the emitter surface
//! ([`RunGuard::llm`], [`RunGuard::tool`], ...) and the thing whose `Drop`
//! guarantees `run_end` is recorded exactly once. [`get_active_context`]
//! lets framework adapters observe the run active on the calling task or
//! thread without threading a handle through every function signature.
//! [`set_trace`]/[`get_trace`] provide the process-wide default described
//! for simple callers who construct exactly one [`Trace`] at startup.

// ============================================================================
// SECTION: Modules
// ============================================================================

mod active;
mod context;
mod error;
mod scope;
mod telemetry;
mod trace;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use active::ActiveContext;
pub use active::get_active_context;
pub use active::instrument;
pub use error::TraceError;
pub use scope::RunGuard;
pub use telemetry::EmitOutcome;
pub use telemetry::Reporter;
pub use telemetry::StderrReporter;
pub use trace::Trace;
pub use trace::get_trace;
pub use trace::set_trace;

// Re-export the data model so callers need only depend on this crate.
pub use fathom_core::Envelope;
pub use fathom_core::Event;
pub use fathom_core::EventPayload;
pub use fathom_core::EventStatus;
pub use fathom_core::FinalStatus;
pub use fathom_core::HashSampler;
pub use fathom_core::MetadataMap;
pub use fathom_core::MetadataValue;
pub use fathom_core::PromptValue;
pub use fathom_core::Run;
pub use fathom_core::RunId;
pub use fathom_core::RunStatus;
pub use fathom_core::Sampler;

pub use fathom_config::Config;
pub use fathom_config::ConfigError;
pub use fathom_config::ConfigOverrides;
pub use fathom_config::Preset;

pub use fathom_export::ExportError;
pub use fathom_export::Exporter;

pub use fathom_queue::DropCounters;
pub use fathom_queue::WorkerStats;

/// Opens a run scope on the process-wide default [`Trace`] (see
/// [`get_trace`]). Convenience for callers that only ever need one trace
/// instance.
pub fn run(name: impl Into<String>, metadata: MetadataMap) -> RunGuard {
    get_trace().run(name, metadata)
}
