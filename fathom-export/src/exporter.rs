// fathom-export/src/exporter.rs
// ============================================================================
// Module: Fathom Exporter Contract
// Description: The trait every destination for recorded events implements.
// Purpose: Decouple the worker from any particular storage backend
//          (`spec.md` §4.7).
// Dependencies: fathom-core
// ============================================================================

//! ## Overview
//! An [`Exporter`] receives already-constructed batches from the worker;
//! it never sees the bounded queue directly. `export_batch` must be safe
//! to call repeatedly and must not panic on partial failures within the
//! batch — it reports overall batch success and is expected to log
//! individual event failures itself.

use fathom_config::Config;
use fathom_core::core::event::Event;
use thiserror::Error;

/// Failure exporting a batch. The worker logs this and moves on; it
/// never propagates to the caller that enqueued the events.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The exporter could not be initialized with the given config.
    #[error("exporter initialization failed: {0}")]
    Initialization(String),
    /// The whole batch failed and was not persisted.
    #[error("batch export failed: {0}")]
    Batch(String),
}

/// A destination for recorded events: typically durable storage, but
/// also anything wired in for fan-out (a secondary sink, a test probe).
pub trait Exporter: Send + Sync {
    /// Called once before the first batch, with the resolved
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Initialization`] if the exporter cannot
    /// prepare its destination (e.g. the store file cannot be opened).
    fn initialize(&self, config: &Config) -> Result<(), ExportError>;

    /// Persists `events`. Must be safe to call repeatedly and must not
    /// leave partial state behind on failure.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Batch`] if the whole batch failed and
    /// none of it was persisted.
    fn export_batch(&self, events: &[Event]) -> Result<(), ExportError>;

    /// Called once on worker shutdown, after the final drain.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError`] if final flush/close fails. The worker
    /// logs this; it does not retry.
    fn shutdown(&self) -> Result<(), ExportError>;
}
