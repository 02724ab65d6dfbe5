// fathom-store-sqlite/src/connection.rs
// ============================================================================
// Module: Fathom Store Connection
// Description: Connection opening, pragma setup, schema creation, and the
//              busy-retry helper shared by the exporter and maintenance
//              operations.
// Purpose: `spec.md` §4.9.
// Dependencies: rusqlite
// ============================================================================

//! ## Overview
//! [`open_connection`] applies a WAL-equivalent pragma set so readers never
//! block writers for the query paths in §4.10. [`retry_with_backoff`]
//! retries a transient (`SQLITE_BUSY`/`SQLITE_LOCKED`) failure up to three
//! times with exponential backoff (10ms, 40ms, 160ms) before giving up,
//! matching the retry policy in §4.9.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;

use crate::error::StoreError;

/// Current on-disk schema version.
const SCHEMA_VERSION: i64 = 1;
/// Busy timeout handed to `SQLite` itself, in milliseconds, on top of this
/// crate's own application-level retry loop.
const BUSY_TIMEOUT_MS: u64 = 5_000;
/// Backoff delays between retry attempts, in order.
const RETRY_BACKOFF: [Duration; 3] =
    [Duration::from_millis(10), Duration::from_millis(40), Duration::from_millis(160)];

/// Opens a connection to the database at `path`, creating it if missing,
/// and applies the durability pragma set.
///
/// # Errors
///
/// Returns [`StoreError`] if the file cannot be opened or a pragma fails.
pub fn open_connection(path: &Path) -> Result<Connection, StoreError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|err| StoreError::Io(err.to_string()))?;
    }
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(path, flags)?;
    apply_pragmas(&connection)?;
    Ok(connection)
}

/// Applies the pragma set required for a writer-friendly WAL-equivalent
/// mode, where readers never block writers for the read store's query
/// paths.
fn apply_pragmas(connection: &Connection) -> Result<(), StoreError> {
    connection.execute_batch(
        "PRAGMA foreign_keys = ON; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
    )?;
    connection.busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Creates the schema on first open, or validates the stored version on
/// subsequent opens. An unrecognized future version fails closed rather
/// than attempting a best-effort read.
///
/// # Errors
///
/// Returns [`StoreError::VersionMismatch`] for an unknown schema version,
/// or [`StoreError`] if the schema cannot be created.
pub fn initialize_schema(connection: &mut Connection) -> Result<(), StoreError> {
    let tx = connection.transaction()?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")?;
    let version: Option<i64> =
        tx.query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
            .optional()?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])?;
            tx.execute_batch(SCHEMA_DDL)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(StoreError::VersionMismatch(format!(
                "database schema is version {value}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit()?;
    Ok(())
}

/// Schema DDL for the `runs`/`steps` tables (`spec.md` §4.9), supplemented
/// with an `event_id` column (needed to resolve `parent_event_id` and the
/// `(timestamp_ms, event_id)` ordering from invariant 6) and `status`/
/// `duration_ms` columns (needed by the `get_timeline` read operation;
/// envelope fields the pipeline deliberately excludes from the encoded
/// blob).
const SCHEMA_DDL: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at_ms INTEGER NOT NULL,
    ended_at_ms INTEGER,
    user_id TEXT,
    session_id TEXT,
    parent_run_id TEXT,
    metadata TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS steps (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    event_id INTEGER NOT NULL,
    event_type TEXT NOT NULL,
    timestamp_ms INTEGER NOT NULL,
    duration_ms INTEGER,
    status TEXT NOT NULL,
    parent_event_id INTEGER,
    blob BLOB NOT NULL,
    blob_codec TEXT NOT NULL,
    UNIQUE (run_id, event_id)
);
CREATE INDEX IF NOT EXISTS idx_runs_started_at ON runs (started_at_ms DESC);
CREATE INDEX IF NOT EXISTS idx_runs_status ON runs (status);
CREATE INDEX IF NOT EXISTS idx_steps_run_id ON steps (run_id);
CREATE INDEX IF NOT EXISTS idx_steps_run_id_timestamp ON steps (run_id, timestamp_ms);
CREATE INDEX IF NOT EXISTS idx_steps_timestamp ON steps (timestamp_ms);
";

/// Runs `operation`, retrying up to [`RETRY_BACKOFF`]'s length times on a
/// [`StoreError::Transient`] failure, sleeping the matching backoff delay
/// between attempts.
///
/// # Errors
///
/// Returns the last error once retries are exhausted, or immediately for
/// any non-transient error.
pub fn retry_with_backoff<T>(
    mut operation: impl FnMut() -> Result<T, StoreError>,
) -> Result<T, StoreError> {
    let mut attempt = 0_usize;
    loop {
        match operation() {
            Ok(value) => return Ok(value),
            Err(StoreError::Transient(message)) => {
                if attempt >= RETRY_BACKOFF.len() {
                    return Err(StoreError::Transient(message));
                }
                std::thread::sleep(RETRY_BACKOFF[attempt]);
                attempt += 1;
            }
            Err(other) => return Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::initialize_schema;
    use super::open_connection;
    use crate::error::StoreError;

    #[test]
    fn schema_initializes_once_and_reopens_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("fathom.db");
        let mut connection = open_connection(&path).expect("open");
        initialize_schema(&mut connection).expect("init");
        drop(connection);

        let mut reopened = open_connection(&path).expect("reopen");
        initialize_schema(&mut reopened).expect("idempotent init");
    }

    #[test]
    fn retry_with_backoff_gives_up_after_three_attempts() {
        let mut attempts = 0_usize;
        let result: Result<(), StoreError> = super::retry_with_backoff(|| {
            attempts += 1;
            Err(StoreError::Transient("busy".to_owned()))
        });
        assert!(result.is_err());
        assert_eq!(attempts, 4);
    }
}
