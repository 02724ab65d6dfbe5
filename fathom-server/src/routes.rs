// fathom-server/src/routes.rs
// ============================================================================
// Module: Fathom Server Routes
// Description: HTTP handlers for the read-only run/step/timeline API.
// Purpose: `spec.md` §6.1 endpoint table.
// Dependencies: axum, fathom-core, fathom-store-sqlite, serde
// ============================================================================

use axum::extract::Path;
use axum::extract::Query;
use axum::extract::State;
use axum::Json;
use fathom_core::core::identifiers::RunId;
use fathom_core::core::run::RunStatus;
use fathom_store_sqlite::Page;
use fathom_store_sqlite::RunDetail;
use fathom_store_sqlite::RunFilter;
use fathom_store_sqlite::SqliteStoreError;
use fathom_store_sqlite::StepRecord;
use fathom_store_sqlite::StoreStats;
use fathom_store_sqlite::TimelineEntry;
use serde::Deserialize;
use serde::Serialize;

use crate::error::ApiError;
use crate::server::ServerState;
use crate::telemetry::HttpRoute;
use crate::telemetry::RequestOutcome;

/// Records a request's outcome on `state.reporter`, then passes `result`
/// through unchanged.
fn report<T>(state: &ServerState, route: HttpRoute, result: Result<T, ApiError>) -> Result<T, ApiError> {
    let (outcome, status) = match &result {
        Ok(_) => (RequestOutcome::Ok, 200),
        Err(ApiError::BadRequest(_)) => (RequestOutcome::Rejected, 400),
        Err(ApiError::Unauthorized) => (RequestOutcome::Rejected, 401),
        Err(ApiError::NotFound | ApiError::Store(SqliteStoreError::NotFound(_))) => {
            (RequestOutcome::Rejected, 404)
        }
        Err(ApiError::RateLimited { .. }) => (RequestOutcome::Rejected, 429),
        Err(ApiError::Store(_)) => (RequestOutcome::Failed, 500),
    };
    state.reporter.report(route, outcome, status);
    result
}

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthBody {
    /// Always `"ok"`.
    status: &'static str,
}

/// `GET /health`: always reports `ok` once the router is serving.
pub async fn health() -> Json<HealthBody> {
    Json(HealthBody { status: "ok" })
}

/// Query parameters accepted by `GET /v1/runs`.
#[derive(Debug, Deserialize, Default)]
pub struct ListRunsQuery {
    /// Exact status filter (`running`, `completed`, `failed`).
    status: Option<String>,
    /// Exact `user_id` filter.
    user_id: Option<String>,
    /// Exact `session_id` filter.
    session_id: Option<String>,
    /// Case-insensitive substring filter over `name`.
    search: Option<String>,
    /// Only runs started at or after this timestamp.
    started_after: Option<i64>,
    /// Only runs started at or before this timestamp.
    started_before: Option<i64>,
    /// Page size; defaults to 20, clamped server-side.
    limit: Option<u64>,
    /// Page offset; defaults to 0.
    offset: Option<u64>,
}

/// Response body of `GET /v1/runs`.
#[derive(Debug, Serialize)]
pub struct ListRunsBody {
    /// Matching runs for the requested page.
    runs: Vec<fathom_core::core::run::Run>,
    /// Total matching rows across all pages.
    total: u64,
}

/// Parses the `status` query filter, rejecting unknown values.
fn parse_status(raw: &str) -> Result<RunStatus, ApiError> {
    match raw {
        "running" => Ok(RunStatus::Running),
        "completed" => Ok(RunStatus::Completed),
        "failed" => Ok(RunStatus::Failed),
        other => Err(ApiError::BadRequest(format!("unknown run status {other:?}"))),
    }
}

/// Wraps a path-extracted run id string as a [`RunId`].
fn parse_run_id(raw: &str) -> RunId {
    RunId::from_raw(raw.to_owned())
}

/// `GET /v1/runs`.
///
/// # Errors
///
/// Returns [`ApiError::BadRequest`] for an unrecognized `status` filter, or
/// [`ApiError::Store`] on a query failure.
pub async fn list_runs(
    State(state): State<ServerState>,
    Query(query): Query<ListRunsQuery>,
) -> Result<Json<ListRunsBody>, ApiError> {
    let result = (|| {
        let status = query.status.as_deref().map(parse_status).transpose()?;
        let filter = RunFilter {
            status,
            user_id: query.user_id.clone(),
            session_id: query.session_id.clone(),
            search: query.search.clone(),
            started_after: query.started_after,
            started_before: query.started_before,
        };
        let page = Page {
            limit: query.limit.unwrap_or(20),
            offset: query.offset.unwrap_or(0),
        };
        let (runs, total) = state.store.list_runs(&filter, page)?;
        Ok(Json(ListRunsBody { runs, total }))
    })();
    report(&state, HttpRoute::ListRuns, result)
}

/// `GET /v1/runs/{run_id}`.
///
/// # Errors
///
/// Returns [`ApiError::Store`] (mapped to 404) when the run is unknown.
pub async fn get_run(
    State(state): State<ServerState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunDetail>, ApiError> {
    let result = state
        .store
        .get_run(&parse_run_id(&run_id))
        .map(Json)
        .map_err(ApiError::from);
    report(&state, HttpRoute::GetRun, result)
}

/// Query parameters accepted by `GET /v1/runs/{run_id}/steps`.
#[derive(Debug, Deserialize, Default)]
pub struct GetStepsQuery {
    /// Restricts results to one event type tag.
    event_type: Option<String>,
    /// Page size; defaults to 20, clamped server-side.
    limit: Option<u64>,
    /// Page offset; defaults to 0.
    offset: Option<u64>,
}

/// `GET /v1/runs/{run_id}/steps`.
///
/// # Errors
///
/// Returns [`ApiError::Store`] on a query or decode failure.
pub async fn get_steps(
    State(state): State<ServerState>,
    Path(run_id): Path<String>,
    Query(query): Query<GetStepsQuery>,
) -> Result<Json<Vec<StepRecord>>, ApiError> {
    let page = Page {
        limit: query.limit.unwrap_or(20),
        offset: query.offset.unwrap_or(0),
    };
    let result = state
        .store
        .get_steps(&state.trace_config, &parse_run_id(&run_id), query.event_type.as_deref(), page)
        .map(Json)
        .map_err(ApiError::from);
    report(&state, HttpRoute::GetSteps, result)
}

/// `GET /v1/runs/{run_id}/timeline`.
///
/// # Errors
///
/// Returns [`ApiError::Store`] on a query or decode failure.
pub async fn get_timeline(
    State(state): State<ServerState>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<TimelineEntry>>, ApiError> {
    let result = state
        .store
        .get_timeline(&state.trace_config, &parse_run_id(&run_id))
        .map(Json)
        .map_err(ApiError::from);
    report(&state, HttpRoute::GetTimeline, result)
}

/// `GET /v1/runs/{run_id}/steps/{step_id}/data`.
///
/// # Errors
///
/// Returns [`ApiError::Store`] (mapped to 404) when the step is unknown.
pub async fn get_step_data(
    State(state): State<ServerState>,
    Path((run_id, step_id)): Path<(String, i64)>,
) -> Result<Json<StepRecord>, ApiError> {
    let result = state
        .store
        .get_step_data(&state.trace_config, &parse_run_id(&run_id), step_id)
        .map(Json)
        .map_err(ApiError::from);
    report(&state, HttpRoute::GetStepData, result)
}

/// Response body of `GET /v1/runs/{run_id}/export`.
#[derive(Debug, Serialize)]
pub struct ExportRunBody {
    /// The run row itself.
    run: fathom_core::core::run::Run,
    /// The run's full ordered, decoded timeline.
    steps: Vec<StepRecord>,
}

/// `GET /v1/runs/{run_id}/export`.
///
/// # Errors
///
/// Returns [`ApiError::Store`] (mapped to 404) when the run is unknown.
pub async fn export_run(
    State(state): State<ServerState>,
    Path(run_id): Path<String>,
) -> Result<Json<ExportRunBody>, ApiError> {
    let result = state
        .store
        .export_run(&state.trace_config, &parse_run_id(&run_id))
        .map(|(run, steps)| Json(ExportRunBody { run, steps }))
        .map_err(ApiError::from);
    report(&state, HttpRoute::ExportRun, result)
}

/// `GET /v1/stats`.
///
/// # Errors
///
/// Returns [`ApiError::Store`] on a query failure.
pub async fn stats(State(state): State<ServerState>) -> Result<Json<StoreStats>, ApiError> {
    let result = state
        .store
        .stats(&state.trace_config.db_path)
        .map(Json)
        .map_err(ApiError::from);
    report(&state, HttpRoute::Stats, result)
}
