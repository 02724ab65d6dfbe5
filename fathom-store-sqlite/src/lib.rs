// fathom-store-sqlite/src/lib.rs
// ============================================================================
// Module: Fathom SQLite Store Library
// Description: Durable storage exporter and read store contract backed by
//              SQLite.
// Purpose: Public API surface consumed by `fathom-server` and `fathom-cli`.
// Dependencies: crate::connection, crate::error, crate::exporter, crate::read
// ============================================================================

//! ## Overview
//! [`SqliteStore`] is the single type this crate exposes: open it with
//! [`SqliteStore::open`] for read/maintenance use, or register it as an
//! [`fathom_export::Exporter`] with a worker. See [`read`] for the query
//! contract and [`exporter`] for the batch-write path.

use fathom_pipeline::CodecTags;

use crate::error::StoreError;

pub mod connection;
pub mod error;
pub mod exporter;
pub mod read;

pub use error::StoreError as SqliteStoreError;
pub use exporter::ExportStats;
pub use exporter::SqliteStore;
pub use read::MAX_PAGE_LIMIT;
pub use read::Page;
pub use read::RunDetail;
pub use read::RunFilter;
pub use read::StepRecord;
pub use read::StoreStats;
pub use read::TimelineEntry;

/// Parses a stored `blob_codec` column value, failing closed on an
/// unrecognized combination rather than guessing a decode path
/// (`spec.md` §6.4 binary-compatibility requirement).
pub(crate) fn codec_tags(column: &str) -> Result<CodecTags, StoreError> {
    CodecTags::from_column(column)
        .ok_or_else(|| StoreError::Fatal(format!("unrecognized blob_codec {column:?}")))
}
