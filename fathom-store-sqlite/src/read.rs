// fathom-store-sqlite/src/read.rs
// ============================================================================
// Module: Fathom Read Store
// Description: Query and maintenance operations consumed by the HTTP API
//              and the CLI.
// Purpose: `spec.md` §4.9-§4.10.
// Dependencies: fathom-config, fathom-core, fathom-pipeline, rusqlite
// ============================================================================

//! ## Overview
//! Every decoding method here takes `config: &Config` explicitly, since a
//! [`SqliteStore`] opened via [`SqliteStore::open`] may never have had
//! [`fathom_export::Exporter::initialize`] called on it. Paging is capped
//! at [`MAX_PAGE_LIMIT`] regardless of what the caller asks for.

use std::path::Path;

use fathom_config::Config;
use fathom_core::core::identifiers::RunId;
use fathom_core::core::run::Run;
use fathom_core::core::run::RunStatus;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Serialize;

use crate::error::StoreError;
use crate::exporter::SqliteStore;

/// Hard ceiling on `list_runs`/`get_steps` paging, regardless of the
/// caller-requested limit.
pub const MAX_PAGE_LIMIT: u64 = 100;

/// A decoded event row as returned by [`SqliteStore::get_steps`] and
/// [`SqliteStore::get_step_data`].
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    /// Store-assigned row id.
    pub id: i64,
    /// Per-run monotonic event id.
    pub event_id: u64,
    /// Event type tag (`"tool_call"`, `"llm_call"`, ...).
    pub event_type: String,
    /// Wall-clock milliseconds when the event was recorded.
    pub timestamp_ms: i64,
    /// Observed duration, when known.
    pub duration_ms: Option<i64>,
    /// Outcome recorded on the event.
    pub status: String,
    /// Enclosing scope's event id, if any.
    pub parent_event_id: Option<u64>,
    /// Fully decoded JSON payload.
    pub payload: serde_json::Value,
}

/// Compact per-event summary used for the UI timeline
/// ([`SqliteStore::get_timeline`]).
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    /// Store-assigned row id.
    pub id: i64,
    /// Event type tag.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Short display name derived from the payload.
    pub name: String,
    /// Wall-clock milliseconds when the event was recorded.
    pub timestamp_ms: i64,
    /// Observed duration, when known.
    pub duration_ms: Option<i64>,
    /// Outcome recorded on the event.
    pub status: String,
    /// Enclosing scope's event id, if any.
    pub parent_event_id: Option<u64>,
}

/// [`Run`] plus the aggregate counts `get_run` must also report.
#[derive(Debug, Clone, Serialize)]
pub struct RunDetail {
    /// The run row itself.
    #[serde(flatten)]
    pub run: Run,
    /// Total number of recorded steps.
    pub step_count: u64,
    /// Number of steps whose status is `error`.
    pub error_count: u64,
}

/// Filters accepted by [`SqliteStore::list_runs`].
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Exact status match.
    pub status: Option<RunStatus>,
    /// Exact `user_id` match.
    pub user_id: Option<String>,
    /// Exact `session_id` match.
    pub session_id: Option<String>,
    /// Case-insensitive substring match over `name`.
    pub search: Option<String>,
    /// Only runs started at or after this timestamp.
    pub started_after: Option<i64>,
    /// Only runs started at or before this timestamp.
    pub started_before: Option<i64>,
}

/// Page bounds shared by every paged read operation.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    /// Requested row count, clamped to [`MAX_PAGE_LIMIT`].
    pub limit: u64,
    /// Row offset.
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self { limit: 20, offset: 0 }
    }
}

impl Page {
    fn clamped_limit(self) -> i64 {
        i64::try_from(self.limit.min(MAX_PAGE_LIMIT)).unwrap_or(i64::MAX)
    }

    fn offset_i64(self) -> i64 {
        i64::try_from(self.offset).unwrap_or(i64::MAX)
    }
}

/// Aggregate store counts returned by [`SqliteStore::stats`].
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Total run count, by status.
    pub runs_by_status: Vec<(String, u64)>,
    /// Total step count, by event type.
    pub steps_by_event_type: Vec<(String, u64)>,
    /// Approximate on-disk size of the database file, in bytes.
    pub total_bytes: u64,
}

impl SqliteStore {
    /// Lists runs matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a query failure.
    pub fn list_runs(&self, filter: &RunFilter, page: Page) -> Result<(Vec<Run>, u64), StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let (clause, count_params) = filter.where_clause();

        let total: i64 = {
            let sql = format!("SELECT COUNT(*) FROM runs WHERE {clause}");
            guard.query_row(&sql, rusqlite::params_from_iter(count_params), |row| row.get(0))?
        };

        let (clause, mut select_params) = filter.where_clause();
        select_params.push(Box::new(page.clamped_limit()));
        select_params.push(Box::new(page.offset_i64()));
        let sql = format!(
            "SELECT id, name, status, started_at_ms, ended_at_ms, user_id, session_id,
                    parent_run_id, metadata
             FROM runs WHERE {clause}
             ORDER BY started_at_ms DESC LIMIT ? OFFSET ?",
        );
        let mut statement = guard.prepare(&sql)?;
        let rows = statement
            .query_map(rusqlite::params_from_iter(select_params), row_to_run)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok((rows, u64::try_from(total).unwrap_or(0)))
    }

    /// Fetches a single run plus its step/error counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no run with `run_id` exists, or
    /// [`StoreError`] on a query failure.
    pub fn get_run(&self, run_id: &RunId) -> Result<RunDetail, StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let run = guard
            .query_row(
                "SELECT id, name, status, started_at_ms, ended_at_ms, user_id, session_id,
                        parent_run_id, metadata
                 FROM runs WHERE id = ?1",
                params![run_id.as_str()],
                row_to_run,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(run_id.as_str().to_owned()))?;

        let step_count: i64 = guard.query_row(
            "SELECT COUNT(*) FROM steps WHERE run_id = ?1",
            params![run_id.as_str()],
            |row| row.get(0),
        )?;
        let error_count: i64 = guard.query_row(
            "SELECT COUNT(*) FROM steps WHERE run_id = ?1 AND status = 'error'",
            params![run_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(RunDetail {
            run,
            step_count: u64::try_from(step_count).unwrap_or(0),
            error_count: u64::try_from(error_count).unwrap_or(0),
        })
    }

    /// Lists a run's steps in `(timestamp_ms, event_id)` order, decoded.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a query or decode failure.
    pub fn get_steps(
        &self,
        config: &Config,
        run_id: &RunId,
        event_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<StepRecord>, StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let limit = page.clamped_limit();
        let offset = page.offset_i64();

        let rows: Vec<RawStep> = if let Some(event_type) = event_type {
            let mut statement = guard.prepare(
                "SELECT id, event_id, event_type, timestamp_ms, duration_ms, status,
                        parent_event_id, blob, blob_codec
                 FROM steps WHERE run_id = ?1 AND event_type = ?2
                 ORDER BY timestamp_ms ASC, event_id ASC LIMIT ?3 OFFSET ?4",
            )?;
            statement
                .query_map(params![run_id.as_str(), event_type, limit, offset], row_to_raw_step)?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            let mut statement = guard.prepare(
                "SELECT id, event_id, event_type, timestamp_ms, duration_ms, status,
                        parent_event_id, blob, blob_codec
                 FROM steps WHERE run_id = ?1
                 ORDER BY timestamp_ms ASC, event_id ASC LIMIT ?2 OFFSET ?3",
            )?;
            statement
                .query_map(params![run_id.as_str(), limit, offset], row_to_raw_step)?
                .collect::<Result<Vec<_>, _>>()?
        };

        rows.into_iter().map(|raw| raw.decode(config)).collect()
    }

    /// Returns a compact per-event summary for the UI timeline.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a query or decode failure.
    pub fn get_timeline(&self, config: &Config, run_id: &RunId) -> Result<Vec<TimelineEntry>, StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut statement = guard.prepare(
            "SELECT id, event_id, event_type, timestamp_ms, duration_ms, status,
                    parent_event_id, blob, blob_codec
             FROM steps WHERE run_id = ?1
             ORDER BY timestamp_ms ASC, event_id ASC",
        )?;
        let raw_rows = statement
            .query_map(params![run_id.as_str()], row_to_raw_step)?
            .collect::<Result<Vec<_>, _>>()?;

        raw_rows
            .into_iter()
            .map(|raw| {
                let tags = crate::codec_tags(&raw.blob_codec)?;
                let payload = fathom_pipeline::decode(&raw.blob, tags, config.encryption_key.as_ref())
                    .map_err(|err| StoreError::Fatal(err.to_string()))?;
                Ok(TimelineEntry {
                    id: raw.id,
                    name: timeline_name(&raw.event_type, &payload),
                    event_type: raw.event_type,
                    timestamp_ms: raw.timestamp_ms,
                    duration_ms: raw.duration_ms,
                    status: raw.status,
                    parent_event_id: raw.parent_event_id,
                })
            })
            .collect()
    }

    /// Returns a single event's fully decoded payload.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no such step exists, or
    /// [`StoreError`] on a decode failure.
    pub fn get_step_data(
        &self,
        config: &Config,
        run_id: &RunId,
        step_id: i64,
    ) -> Result<StepRecord, StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let raw = guard
            .query_row(
                "SELECT id, event_id, event_type, timestamp_ms, duration_ms, status,
                        parent_event_id, blob, blob_codec
                 FROM steps WHERE run_id = ?1 AND id = ?2",
                params![run_id.as_str(), step_id],
                row_to_raw_step,
            )
            .optional()?
            .ok_or_else(|| StoreError::NotFound(format!("step {step_id} in run {run_id}")))?;
        raw.decode(config)
    }

    /// Returns a run's metadata plus its full ordered, decoded timeline,
    /// for a JSON export dump.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the run does not exist or a step fails to
    /// decode.
    pub fn export_run(&self, config: &Config, run_id: &RunId) -> Result<(Run, Vec<StepRecord>), StoreError> {
        let detail = self.get_run(run_id)?;
        let mut steps = self.get_steps(config, run_id, None, Page { limit: MAX_PAGE_LIMIT, offset: 0 })?;
        let mut offset = MAX_PAGE_LIMIT;
        loop {
            let next = self.get_steps(config, run_id, None, Page { limit: MAX_PAGE_LIMIT, offset })?;
            if next.is_empty() {
                break;
            }
            let fetched = next.len() as u64;
            steps.extend(next);
            offset += fetched;
            if fetched < MAX_PAGE_LIMIT {
                break;
            }
        }
        Ok((detail.run, steps))
    }

    /// Returns aggregate counts by run status, by event type, and the
    /// database file size.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a query failure.
    pub fn stats(&self, db_path: &Path) -> Result<StoreStats, StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut by_status = guard.prepare("SELECT status, COUNT(*) FROM runs GROUP BY status")?;
        let runs_by_status = by_status
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(status, count)| (status, u64::try_from(count).unwrap_or(0)))
            .collect();

        let mut by_type = guard.prepare("SELECT event_type, COUNT(*) FROM steps GROUP BY event_type")?;
        let steps_by_event_type = by_type
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|(event_type, count)| (event_type, u64::try_from(count).unwrap_or(0)))
            .collect();

        let total_bytes = std::fs::metadata(db_path).map(|meta| meta.len()).unwrap_or(0);
        Ok(StoreStats { runs_by_status, steps_by_event_type, total_bytes })
    }

    /// Deletes runs (and, by cascade, their steps) started more than
    /// `older_than_days` days ago.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on a query failure.
    pub fn prune(&self, older_than_days: u64, now_ms: i64) -> Result<u64, StoreError> {
        let cutoff = now_ms.saturating_sub(
            i64::try_from(older_than_days.saturating_mul(86_400_000)).unwrap_or(i64::MAX),
        );
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let deleted = guard.execute("DELETE FROM runs WHERE started_at_ms < ?1", params![cutoff])?;
        Ok(u64::try_from(deleted).unwrap_or(0))
    }

    /// Reclaims free space via `VACUUM`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on failure.
    pub fn vacuum(&self) -> Result<(), StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.execute_batch("VACUUM;")?;
        Ok(())
    }

    /// Takes an atomic, non-blocking snapshot of the database at `dest`
    /// using SQLite's online backup API.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the backup cannot be opened or stepped to
    /// completion.
    pub fn backup(&self, dest: &Path) -> Result<(), StoreError> {
        let guard = self.connection.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut destination = crate::connection::open_connection(dest)?;
        let backup = rusqlite::backup::Backup::new(&guard, &mut destination)?;
        backup.run_to_completion(100, std::time::Duration::from_millis(10), None)?;
        Ok(())
    }
}

impl RunFilter {
    fn where_clause(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses = Vec::new();
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = self.status {
            clauses.push("status = ?".to_owned());
            bound.push(Box::new(status.as_str().to_owned()));
        }
        if let Some(user_id) = &self.user_id {
            clauses.push("user_id = ?".to_owned());
            bound.push(Box::new(user_id.clone()));
        }
        if let Some(session_id) = &self.session_id {
            clauses.push("session_id = ?".to_owned());
            bound.push(Box::new(session_id.clone()));
        }
        if let Some(search) = &self.search {
            clauses.push("LOWER(name) LIKE ?".to_owned());
            bound.push(Box::new(format!("%{}%", search.to_lowercase())));
        }
        if let Some(started_after) = self.started_after {
            clauses.push("started_at_ms >= ?".to_owned());
            bound.push(Box::new(started_after));
        }
        if let Some(started_before) = self.started_before {
            clauses.push("started_at_ms <= ?".to_owned());
            bound.push(Box::new(started_before));
        }

        if clauses.is_empty() {
            ("1 = 1".to_owned(), bound)
        } else {
            (clauses.join(" AND "), bound)
        }
    }
}

/// A `steps` row before pipeline decoding.
struct RawStep {
    id: i64,
    event_id: u64,
    event_type: String,
    timestamp_ms: i64,
    duration_ms: Option<i64>,
    status: String,
    parent_event_id: Option<u64>,
    blob: Vec<u8>,
    blob_codec: String,
}

impl RawStep {
    fn decode(self, config: &Config) -> Result<StepRecord, StoreError> {
        let tags = crate::codec_tags(&self.blob_codec)?;
        let payload = fathom_pipeline::decode(&self.blob, tags, config.encryption_key.as_ref())
            .map_err(|err| StoreError::Fatal(err.to_string()))?;
        Ok(StepRecord {
            id: self.id,
            event_id: self.event_id,
            event_type: self.event_type,
            timestamp_ms: self.timestamp_ms,
            duration_ms: self.duration_ms,
            status: self.status,
            parent_event_id: self.parent_event_id,
            payload,
        })
    }
}

fn row_to_raw_step(row: &Row<'_>) -> rusqlite::Result<RawStep> {
    Ok(RawStep {
        id: row.get(0)?,
        event_id: u64::try_from(row.get::<_, i64>(1)?).unwrap_or(0),
        event_type: row.get(2)?,
        timestamp_ms: row.get(3)?,
        duration_ms: row.get(4)?,
        status: row.get(5)?,
        parent_event_id: row
            .get::<_, Option<i64>>(6)?
            .map(|value| u64::try_from(value).unwrap_or(0)),
        blob: row.get(7)?,
        blob_codec: row.get(8)?,
    })
}

fn row_to_run(row: &Row<'_>) -> rusqlite::Result<Run> {
    let status_text: String = row.get(2)?;
    let metadata_text: String = row.get(8)?;
    Ok(Run {
        run_id: RunId::from_raw(row.get::<_, String>(0)?),
        name: row.get(1)?,
        status: parse_run_status(&status_text),
        started_at_ms: row.get(3)?,
        ended_at_ms: row.get(4)?,
        user_id: row.get(5)?,
        session_id: row.get(6)?,
        parent_run_id: row.get::<_, Option<String>>(7)?.map(RunId::from_raw),
        metadata: serde_json::from_str(&metadata_text).unwrap_or_default(),
    })
}

fn parse_run_status(text: &str) -> RunStatus {
    match text {
        "completed" => RunStatus::Completed,
        "failed" => RunStatus::Failed,
        _ => RunStatus::Running,
    }
}

/// Derives the short display name used in a timeline entry from the
/// decoded payload, falling back to the event type tag.
fn timeline_name(event_type: &str, payload: &serde_json::Value) -> String {
    let field = match event_type {
        "tool_call" => "tool_name",
        "llm_call" => "model",
        "error" => "error_type",
        "final_answer" => "answer",
        "run_start" => "name",
        "custom" => "name",
        _ => return event_type.to_owned(),
    };
    payload.get(field).and_then(serde_json::Value::as_str).unwrap_or(event_type).to_owned()
}

#[cfg(test)]
mod tests {
    use super::Page;
    use super::RunFilter;
    use super::SqliteStore;
    use fathom_config::Config;
    use fathom_config::ConfigOverrides;
    use fathom_config::Preset;
    use fathom_core::core::event::Envelope;
    use fathom_core::core::event::Event;
    use fathom_core::core::event::EventPayload;
    use fathom_core::core::event::EventStatus;
    use fathom_core::core::event::MetadataMap;
    use fathom_core::core::identifiers::RunId;
    use fathom_export::Exporter;

    fn config() -> Config {
        Config::load(Preset::Debug, None, ConfigOverrides::default()).expect("load")
    }

    fn seeded_store() -> (tempfile::TempDir, SqliteStore, RunId) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(&dir.path().join("fathom.db")).expect("open");
        store.initialize(&config()).expect("initialize");

        let run_id = RunId::new();
        let envelope = |event_id: u64| Envelope {
            event_id,
            run_id: run_id.clone(),
            parent_event_id: None,
            timestamp_ms: 1_700_000_000_000 + i64::try_from(event_id).expect("small id"),
            duration_ms: Some(3),
            status: EventStatus::Ok,
            metadata: MetadataMap::new(),
        };
        let events = vec![
            Event { envelope: envelope(0), payload: EventPayload::RunStart { name: "demo run".to_owned() } },
            Event {
                envelope: envelope(1),
                payload: EventPayload::ToolCall {
                    tool_name: "search".to_owned(),
                    tool_args: serde_json::json!({}),
                    tool_result: serde_json::json!({}),
                },
            },
            Event {
                envelope: envelope(2),
                payload: EventPayload::FinalAnswer { answer: "done".to_owned() },
            },
        ];
        store.export_batch(&events).expect("export");
        (dir, store, run_id)
    }

    #[test]
    fn list_runs_finds_seeded_run_by_search() {
        let (_dir, store, run_id) = seeded_store();
        let filter = RunFilter { search: Some("DEMO".to_owned()), ..RunFilter::default() };
        let (rows, total) = store.list_runs(&filter, Page::default()).expect("list");
        assert_eq!(total, 1);
        assert_eq!(rows[0].run_id, run_id);
    }

    #[test]
    fn get_run_reports_step_and_error_counts() {
        let (_dir, store, run_id) = seeded_store();
        let detail = store.get_run(&run_id).expect("get_run");
        assert_eq!(detail.step_count, 3);
        assert_eq!(detail.error_count, 0);
    }

    #[test]
    fn get_timeline_derives_name_per_event_type() {
        let (_dir, store, run_id) = seeded_store();
        let timeline = store.get_timeline(&config(), &run_id).expect("timeline");
        assert_eq!(timeline.len(), 3);
        assert_eq!(timeline[1].name, "search");
        assert_eq!(timeline[2].name, "done");
    }

    #[test]
    fn export_run_returns_full_decoded_timeline() {
        let (_dir, store, run_id) = seeded_store();
        let (run, steps) = store.export_run(&config(), &run_id).expect("export_run");
        assert_eq!(run.run_id, run_id);
        assert_eq!(steps.len(), 3);
    }

    #[test]
    fn prune_deletes_runs_older_than_cutoff() {
        let (_dir, store, run_id) = seeded_store();
        let now = 1_700_000_000_000 + 100 * 86_400_000;
        let deleted = store.prune(30, now).expect("prune");
        assert_eq!(deleted, 1);
        assert!(store.get_run(&run_id).is_err());
    }
}
