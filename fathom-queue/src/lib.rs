// fathom-queue/src/lib.rs
// ============================================================================
// Module: Fathom Queue Library
// Description: Bounded ingestion channel and the background worker.
// Purpose: Public API surface consumed by the Trace facade.
// Dependencies: crate::queue, crate::worker, crate::telemetry
// ============================================================================

//! ## Overview
//! [`WorkerHandle::spawn`] starts the one background worker per `Trace`
//! instance and returns a handle whose [`WorkerHandle::producer`] is the
//! only way events reach an [`fathom_export::Exporter`]. See
//! [`worker`] for the batching loop and shutdown semantics.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod queue;
pub mod telemetry;
pub mod worker;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use queue::QueueConsumer;
pub use queue::QueueProducer;
pub use queue::bounded_queue;
pub use telemetry::BatchOutcome;
pub use telemetry::DropCounters;
pub use worker::WorkerHandle;
pub use worker::WorkerState;
pub use worker::WorkerStats;
