// fathom-store-sqlite/src/error.rs
// ============================================================================
// Module: Fathom Store Errors
// Description: Store error taxonomy, classifying transient vs fatal
//              SQLite failures for the retry policy (`spec.md` §4.9).
// Purpose: Shared by the storage exporter and the read store.
// Dependencies: rusqlite, thiserror
// ============================================================================

use rusqlite::ErrorCode;
use thiserror::Error;

/// Durable store errors.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    /// Filesystem-level failure opening or creating the database file.
    #[error("store io error: {0}")]
    Io(String),
    /// A busy/locked database; the caller may retry.
    #[error("transient store error: {0}")]
    Transient(String),
    /// A non-retryable engine or data error.
    #[error("store error: {0}")]
    Fatal(String),
    /// The on-disk schema version is newer or otherwise unrecognized.
    #[error("unsupported schema version: {0}")]
    VersionMismatch(String),
    /// The requested run does not exist.
    #[error("run not found: {0}")]
    NotFound(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if is_busy_or_locked(&err) {
            Self::Transient(err.to_string())
        } else {
            Self::Fatal(err.to_string())
        }
    }
}

/// Returns whether `err` represents a transient busy/locked condition
/// rather than a permanent failure.
fn is_busy_or_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(ffi_err, _)
            if matches!(ffi_err.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
