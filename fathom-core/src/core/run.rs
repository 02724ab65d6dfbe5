// fathom-core/src/core/run.rs
// ============================================================================
// Module: Fathom Run Entity
// Description: The logical unit of agent work that events belong to.
// Purpose: Shared DTO for the storage exporter, the durable store, and the
//          read store contract / HTTP API.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`Run`] brackets one scoped agent execution. `status` transitions only
//! `running -> completed` or `running -> failed`, entered on `run_start`
//! and left exactly once on `run_end` (`spec.md` §4.12).

use serde::Deserialize;
use serde::Serialize;

use crate::core::event::MetadataMap;
use crate::core::identifiers::RunId;

/// Lifecycle status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The run has started and has not yet ended.
    Running,
    /// The run ended without a critical error.
    Completed,
    /// The run ended with a critical error.
    Failed,
}

impl RunStatus {
    /// Returns the wire form used in storage and the HTTP API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Returns whether `self -> next` is a legal transition.
    ///
    /// The only legal transitions are `running -> completed` and
    /// `running -> failed`; every other pair, including any transition out
    /// of a terminal state, is rejected (`spec.md` §3 invariant 4).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Running, Self::Completed) | (Self::Running, Self::Failed)
        )
    }
}

/// Logical unit of agent work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Opaque run identifier.
    pub run_id: RunId,
    /// Short display label.
    pub name: String,
    /// Current lifecycle status.
    pub status: RunStatus,
    /// Wall-clock milliseconds since the Unix epoch when the run started.
    pub started_at_ms: i64,
    /// Wall-clock milliseconds when the run ended; `None` while running.
    pub ended_at_ms: Option<i64>,
    /// Caller-supplied user identifier, if any.
    pub user_id: Option<String>,
    /// Caller-supplied session identifier, if any.
    pub session_id: Option<String>,
    /// Parent run, for nested runs.
    pub parent_run_id: Option<RunId>,
    /// Free-form run metadata.
    pub metadata: MetadataMap,
}

impl Run {
    /// Derives `duration_ms` from `started_at_ms`/`ended_at_ms`, or `None`
    /// while the run has not ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        self.ended_at_ms.map(|ended| ended - self.started_at_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::RunStatus;

    #[test]
    fn running_may_complete_or_fail() {
        assert!(RunStatus::Running.can_transition_to(RunStatus::Completed));
        assert!(RunStatus::Running.can_transition_to(RunStatus::Failed));
    }

    #[test]
    fn terminal_states_are_sinks() {
        assert!(!RunStatus::Completed.can_transition_to(RunStatus::Failed));
        assert!(!RunStatus::Failed.can_transition_to(RunStatus::Completed));
        assert!(!RunStatus::Running.can_transition_to(RunStatus::Running));
    }
}
