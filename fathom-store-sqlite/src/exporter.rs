// fathom-store-sqlite/src/exporter.rs
// ============================================================================
// Module: Fathom Storage Exporter
// Description: Persists batches of events into the SQLite store.
// Purpose: `spec.md` §4.8.
// Dependencies: fathom-config, fathom-core, fathom-export, fathom-pipeline,
//               rusqlite
// ============================================================================

//! ## Overview
//! [`SqliteStore`] opens its connection eagerly in [`SqliteStore::open`] (so
//! the same handle can serve read-only callers that never touch the
//! [`Exporter`] trait); [`Exporter::initialize`] only records the resolved
//! [`Config`] each subsequent `export_batch` needs for the pipeline and the
//! blob size guard. All inserts for one batch commit in a single
//! transaction; a conflicting or transient failure retries the whole batch
//! with exponential backoff, never a partial write.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use fathom_config::Config;
use fathom_core::core::event::Envelope;
use fathom_core::core::event::Event;
use fathom_core::core::event::EventPayload;
use fathom_core::core::event::EventStatus;
use fathom_core::core::event::FinalStatus;
use fathom_core::core::event::MetadataMap;
use fathom_core::core::identifiers::RunId;
use fathom_core::core::run::RunStatus;
use fathom_export::ExportError;
use fathom_export::Exporter;
use fathom_pipeline::CodecTags;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::connection::open_connection;
use crate::connection::retry_with_backoff;
use crate::error::StoreError;

/// Well-known envelope metadata keys lifted onto the `runs` row at
/// `run_start` time, since [`EventPayload::RunStart`] itself carries only
/// the run's display name.
const USER_ID_KEY: &str = "user_id";
const SESSION_ID_KEY: &str = "session_id";
const PARENT_RUN_ID_KEY: &str = "parent_run_id";

/// Counters for events dropped before they reached durable storage, kept
/// on the exporter itself rather than a logging call (`spec.md` §7).
#[derive(Debug, Default)]
pub struct ExportStats {
    /// Events whose run had no `runs` row and no `run_start` in the same
    /// batch.
    pub dropped_orphaned: AtomicU64,
    /// Events whose pipeline-encoded blob exceeded `blob_max_bytes`.
    pub dropped_oversized: AtomicU64,
    /// Events dropped because the redaction or encryption stage failed.
    pub dropped_encode_failed: AtomicU64,
    /// Whole batches dropped after exhausting retries.
    pub dropped_batches: AtomicU64,
}

/// `SQLite`-backed storage exporter and read store.
pub struct SqliteStore {
    pub(crate) connection: Arc<Mutex<Connection>>,
    config: Mutex<Option<Config>>,
    /// Drop counters, exposed for the HTTP API / CLI `stats` surfaces.
    pub stats: ExportStats,
}

impl SqliteStore {
    /// Opens (creating if needed) the database at `path` and ensures the
    /// schema is current. Safe to call before [`Exporter::initialize`];
    /// read-only callers that never export can use this constructor alone.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the file cannot be opened or the schema
    /// cannot be created/validated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let mut connection = open_connection(path)?;
        crate::connection::initialize_schema(&mut connection)?;
        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
            config: Mutex::new(None),
            stats: ExportStats::default(),
        })
    }
}

impl Exporter for SqliteStore {
    fn initialize(&self, config: &Config) -> Result<(), ExportError> {
        let mut guard = self.config.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = Some(config.clone());
        Ok(())
    }

    fn export_batch(&self, events: &[Event]) -> Result<(), ExportError> {
        if events.is_empty() {
            return Ok(());
        }
        let config = self
            .config
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .ok_or_else(|| ExportError::Batch("exporter was never initialized".to_owned()))?;

        let outcome = retry_with_backoff(|| apply_batch(&self.connection, &config, events, &self.stats));
        outcome.map_err(|err| {
            self.stats.dropped_batches.fetch_add(1, Ordering::Relaxed);
            ExportError::Batch(err.to_string())
        })
    }

    fn shutdown(&self) -> Result<(), ExportError> {
        Ok(())
    }
}

/// Applies one batch in a single transaction: insert-if-missing `runs`
/// rows for `run_start` events, drop orphaned events, encode and insert
/// `steps` rows, and apply `run_end` status updates.
fn apply_batch(
    connection: &Mutex<Connection>,
    config: &Config,
    events: &[Event],
    stats: &ExportStats,
) -> Result<(), StoreError> {
    let mut guard = connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    let tx = guard.transaction()?;

    let mut known_runs: HashSet<String> = HashSet::new();

    for event in events {
        let run_id = event.envelope.run_id.as_str().to_owned();

        if let EventPayload::RunStart { name } = &event.payload {
            insert_run_if_missing(&tx, &event.envelope, name)?;
            known_runs.insert(run_id.clone());
        }

        if !known_runs.contains(&run_id) && !run_exists(&tx, &event.envelope.run_id)? {
            stats.dropped_orphaned.fetch_add(1, Ordering::Relaxed);
            continue;
        }
        known_runs.insert(run_id.clone());

        let (blob, tags) = match fathom_pipeline::encode(event, config) {
            Ok(encoded) => encoded,
            Err(_err) => {
                stats.dropped_encode_failed.fetch_add(1, Ordering::Relaxed);
                continue;
            }
        };
        if blob.len() as u64 > config.blob_max_bytes {
            stats.dropped_oversized.fetch_add(1, Ordering::Relaxed);
            continue;
        }

        insert_step(&tx, event, &blob, tags)?;

        if let EventPayload::RunEnd { final_status } = &event.payload {
            finalize_run(&tx, &event.envelope.run_id, event.envelope.timestamp_ms, *final_status)?;
        }
    }

    tx.commit()?;
    Ok(())
}

fn run_exists(tx: &rusqlite::Transaction<'_>, run_id: &RunId) -> Result<bool, StoreError> {
    let found: Option<i64> = tx
        .query_row("SELECT 1 FROM runs WHERE id = ?1", params![run_id.as_str()], |row| row.get(0))
        .optional()?;
    Ok(found.is_some())
}

fn insert_run_if_missing(
    tx: &rusqlite::Transaction<'_>,
    envelope: &Envelope,
    name: &str,
) -> Result<(), StoreError> {
    let (user_id, session_id, parent_run_id, metadata) = split_run_metadata(&envelope.metadata);
    let metadata_json =
        serde_json::to_string(&metadata).map_err(|err| StoreError::Fatal(err.to_string()))?;
    tx.execute(
        "INSERT OR IGNORE INTO runs (
            id, name, status, started_at_ms, ended_at_ms,
            user_id, session_id, parent_run_id, metadata
         ) VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?7, ?8)",
        params![
            envelope.run_id.as_str(),
            name,
            RunStatus::Running.as_str(),
            envelope.timestamp_ms,
            user_id,
            session_id,
            parent_run_id,
            metadata_json,
        ],
    )?;
    Ok(())
}

/// Splits well-known run-identifying keys out of an event's envelope
/// metadata, returning the remainder as the run's stored metadata.
fn split_run_metadata(
    metadata: &MetadataMap,
) -> (Option<String>, Option<String>, Option<String>, MetadataMap) {
    let mut remaining = metadata.clone();
    let user_id = remaining.remove(USER_ID_KEY).and_then(|value| value.as_str().map(str::to_owned));
    let session_id =
        remaining.remove(SESSION_ID_KEY).and_then(|value| value.as_str().map(str::to_owned));
    let parent_run_id =
        remaining.remove(PARENT_RUN_ID_KEY).and_then(|value| value.as_str().map(str::to_owned));
    (user_id, session_id, parent_run_id, remaining)
}

fn insert_step(
    tx: &rusqlite::Transaction<'_>,
    event: &Event,
    blob: &[u8],
    tags: CodecTags,
) -> Result<(), StoreError> {
    let envelope = &event.envelope;
    tx.execute(
        "INSERT INTO steps (
            run_id, event_id, event_type, timestamp_ms, duration_ms,
            status, parent_event_id, blob, blob_codec
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            envelope.run_id.as_str(),
            i64::try_from(envelope.event_id).unwrap_or(i64::MAX),
            event.tag(),
            envelope.timestamp_ms,
            envelope.duration_ms,
            status_column(envelope.status),
            envelope.parent_event_id.map(|id| i64::try_from(id).unwrap_or(i64::MAX)),
            blob,
            tags.as_column(),
        ],
    )?;
    Ok(())
}

fn finalize_run(
    tx: &rusqlite::Transaction<'_>,
    run_id: &RunId,
    ended_at_ms: i64,
    final_status: FinalStatus,
) -> Result<(), StoreError> {
    let status = match final_status {
        FinalStatus::Completed => RunStatus::Completed,
        FinalStatus::Failed => RunStatus::Failed,
    };
    tx.execute(
        "UPDATE runs SET ended_at_ms = ?1, status = ?2 WHERE id = ?3",
        params![ended_at_ms, status.as_str(), run_id.as_str()],
    )?;
    Ok(())
}

/// Renders an [`EventStatus`] as the `steps.status` column value.
const fn status_column(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Ok => "ok",
        EventStatus::Error => "error",
        EventStatus::Info => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteStore;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use fathom_core::core::event::Envelope;
    use fathom_core::core::event::Event;
    use fathom_core::core::event::EventPayload;
    use fathom_core::core::event::EventStatus;
    use fathom_core::core::event::FinalStatus;
    use fathom_core::core::event::MetadataMap;
    use fathom_core::core::identifiers::RunId;
    use fathom_export::Exporter;
    use std::sync::atomic::Ordering;

    fn config() -> Config {
        Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load")
    }

    fn envelope(run_id: &RunId, event_id: u64, metadata: MetadataMap) -> Envelope {
        Envelope {
            event_id,
            run_id: run_id.clone(),
            parent_event_id: None,
            timestamp_ms: 1_700_000_000_000 + i64::try_from(event_id).expect("small id"),
            duration_ms: Some(5),
            status: EventStatus::Ok,
            metadata,
        }
    }

    #[test]
    fn run_start_creates_row_and_steps_persist() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("fathom.db")).expect("open");
        store.initialize(&config()).expect("initialize");

        let run_id = RunId::new();
        let mut metadata = MetadataMap::new();
        metadata.insert("user_id".to_owned(), serde_json::json!("u-1"));
        let run_start = Event {
            envelope: envelope(&run_id, 0, metadata),
            payload: EventPayload::RunStart { name: "demo".to_owned() },
        };
        let tool_call = Event {
            envelope: envelope(&run_id, 1, MetadataMap::new()),
            payload: EventPayload::ToolCall {
                tool_name: "search".to_owned(),
                tool_args: serde_json::json!({}),
                tool_result: serde_json::json!({}),
            },
        };
        store.export_batch(&[run_start, tool_call]).expect("export");

        let guard = store.connection.lock().expect("lock");
        let step_count: i64 = guard
            .query_row("SELECT COUNT(*) FROM steps WHERE run_id = ?1", [run_id.as_str()], |row| {
                row.get(0)
            })
            .expect("count");
        assert_eq!(step_count, 2);
        let user_id: Option<String> = guard
            .query_row("SELECT user_id FROM runs WHERE id = ?1", [run_id.as_str()], |row| row.get(0))
            .expect("user_id");
        assert_eq!(user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn orphaned_event_is_dropped_and_counted() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("fathom.db")).expect("open");
        store.initialize(&config()).expect("initialize");

        let run_id = RunId::new();
        let tool_call = Event {
            envelope: envelope(&run_id, 0, MetadataMap::new()),
            payload: EventPayload::ToolCall {
                tool_name: "search".to_owned(),
                tool_args: serde_json::json!({}),
                tool_result: serde_json::json!({}),
            },
        };
        store.export_batch(&[tool_call]).expect("export");
        assert_eq!(store.stats.dropped_orphaned.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn run_end_updates_status_and_ended_at() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("fathom.db")).expect("open");
        store.initialize(&config()).expect("initialize");

        let run_id = RunId::new();
        let run_start = Event {
            envelope: envelope(&run_id, 0, MetadataMap::new()),
            payload: EventPayload::RunStart { name: "demo".to_owned() },
        };
        let run_end = Event {
            envelope: envelope(&run_id, 1, MetadataMap::new()),
            payload: EventPayload::RunEnd { final_status: FinalStatus::Completed },
        };
        store.export_batch(&[run_start, run_end]).expect("export");

        let guard = store.connection.lock().expect("lock");
        let (status, ended_at): (String, Option<i64>) = guard
            .query_row("SELECT status, ended_at_ms FROM runs WHERE id = ?1", [run_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?))
            })
            .expect("row");
        assert_eq!(status, "completed");
        assert!(ended_at.is_some());
    }
}
