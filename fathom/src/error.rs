// fathom/src/error.rs
// ============================================================================
// Module: Fathom Facade Errors
// Description: Failure constructing a `Trace`.
// Purpose: Surface exporter initialization failure at construction time,
//          the one error class this crate treats as fatal
//          (`spec.md` §7 `ConfigError` policy extended to exporter setup).
// Dependencies: fathom-export, thiserror
// ============================================================================

use thiserror::Error;

/// Failure constructing a [`crate::Trace`].
#[derive(Debug, Error)]
pub enum TraceError {
    /// The exporter rejected the resolved configuration.
    #[error("exporter initialization failed: {0}")]
    Initialization(#[from] fathom_export::ExportError),
}
