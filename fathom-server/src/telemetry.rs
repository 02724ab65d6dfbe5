// fathom-server/src/telemetry.rs
// ============================================================================
// Module: Fathom Server Telemetry
// Description: Dependency-light request outcome reporting.
// Purpose: Observability for the read API without a logging crate.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Mirrors `fathom`'s own [`fathom::Reporter`]-style telemetry: plain enums
//! and a pluggable sink rather than a `log`/`tracing` call site.

use std::io::Write as _;

/// Route classification used for request telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpRoute {
    /// `GET /health`.
    Health,
    /// `GET /v1/runs`.
    ListRuns,
    /// `GET /v1/runs/{run_id}`.
    GetRun,
    /// `GET /v1/runs/{run_id}/steps`.
    GetSteps,
    /// `GET /v1/runs/{run_id}/timeline`.
    GetTimeline,
    /// `GET /v1/runs/{run_id}/steps/{step_id}/data`.
    GetStepData,
    /// `GET /v1/runs/{run_id}/export`.
    ExportRun,
    /// `GET /v1/stats`.
    Stats,
}

impl HttpRoute {
    /// Returns the wire form of this route.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::ListRuns => "list_runs",
            Self::GetRun => "get_run",
            Self::GetSteps => "get_steps",
            Self::GetTimeline => "get_timeline",
            Self::GetStepData => "get_step_data",
            Self::ExportRun => "export_run",
            Self::Stats => "stats",
        }
    }
}

/// Outcome of handling one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// Request served successfully.
    Ok,
    /// Request rejected by auth, rate limiting, or a client error.
    Rejected,
    /// Request failed due to a store/internal error.
    Failed,
}

/// Sink for per-request telemetry.
pub trait Reporter: Send + Sync {
    /// Records one request's outcome.
    fn report(&self, route: HttpRoute, outcome: RequestOutcome, status: u16);
}

/// Default reporter: one line per request, written to stderr.
#[derive(Debug, Default)]
pub struct StderrReporter;

impl Reporter for StderrReporter {
    fn report(&self, route: HttpRoute, outcome: RequestOutcome, status: u16) {
        let line = format!(
            "fathom-server: route={} outcome={:?} status={status}\n",
            route.as_str(),
            outcome
        );
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::HttpRoute;
    use super::RequestOutcome;

    #[test]
    fn route_tags_are_stable() {
        assert_eq!(HttpRoute::ListRuns.as_str(), "list_runs");
        assert_eq!(HttpRoute::GetStepData.as_str(), "get_step_data");
    }

    #[test]
    fn outcome_variants_are_distinguishable() {
        assert_ne!(RequestOutcome::Ok, RequestOutcome::Failed);
    }
}
