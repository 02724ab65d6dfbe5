// fathom/src/active.rs
// ============================================================================
// Module: Fathom Active Context
// Description: Task/flow-local stack of active runs, for straight-line
//              threads and cooperative tasks alike.
// Purpose: `spec.md` §4.11, §5, §9 — nested runs and sibling tasks must
//          not interleave, and the mechanism must be neither a plain
//          thread-local nor a process-global singleton.
// Dependencies: tokio (task_local!), fathom-core
// ============================================================================

//! ## Overview
//! Two stacks back the active context, and a [`crate::scope::RunGuard`]
//! uses exactly one of them for its whole lifetime:
//!
//! - A `tokio::task_local!` stack, used whenever the calling code runs
//!   inside a future wrapped with [`instrument`]. Task-locals follow the
//!   *task*, not the OS thread, so a run started before an `.await` is
//!   still the active run after the task resumes on a different worker
//!   thread.
//! - A plain thread-local stack, used as a fallback for synchronous
//!   callers and for async code that was never wrapped with
//!   [`instrument`]. This fallback only stays consistent if a given run's
//!   enter and exit happen on the same OS thread; code that needs
//!   cross-await consistency should wrap its top-level future with
//!   [`instrument`].
//!
//! Which stack a given [`crate::scope::RunGuard`] used is decided once, at
//! push time, and the same stack is popped at drop time — the decision is
//! never re-evaluated mid-lifetime.

use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

use crate::context::RunState;

tokio::task_local! {
    static TASK_CONTEXTS: RefCell<Vec<Arc<RunState>>>;
}

thread_local! {
    static THREAD_CONTEXTS: RefCell<Vec<Arc<RunState>>> = RefCell::new(Vec::new());
}

/// Scopes `future` with its own active-context stack, so every `run(...)`
/// call inside it (including across `.await` points, even if the task
/// resumes on a different worker thread) shares one stack.
pub fn instrument<F: Future>(future: F) -> impl Future<Output = F::Output> {
    TASK_CONTEXTS.scope(RefCell::new(Vec::new()), future)
}

/// Pushes `state` onto whichever stack applies to the calling task/thread.
/// Returns whether the task-local stack was used, so the matching
/// [`pop`] call pops the same stack.
pub(crate) fn push(state: Arc<RunState>) -> bool {
    let pushed_to_task = TASK_CONTEXTS
        .try_with(|stack| stack.borrow_mut().push(Arc::clone(&state)))
        .is_ok();
    if !pushed_to_task {
        THREAD_CONTEXTS.with(|stack| stack.borrow_mut().push(state));
    }
    pushed_to_task
}

/// Pops the stack `push` reported using.
pub(crate) fn pop(used_task_local: bool) {
    if used_task_local {
        let _ = TASK_CONTEXTS.try_with(|stack| {
            stack.borrow_mut().pop();
        });
    } else {
        THREAD_CONTEXTS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

pub(crate) fn current_state() -> Option<Arc<RunState>> {
    if let Ok(Some(top)) = TASK_CONTEXTS.try_with(|stack| stack.borrow().last().cloned()) {
        return Some(top);
    }
    THREAD_CONTEXTS.with(|stack| stack.borrow().last().cloned())
}

/// Read-only handle to the currently active run, for framework adapters
/// that need to observe the active run without holding its
/// [`crate::scope::RunGuard`].
#[derive(Clone)]
pub struct ActiveContext(pub(crate) Arc<RunState>);

impl ActiveContext {
    /// The active run's identifier.
    #[must_use]
    pub fn run_id(&self) -> &fathom_core::RunId {
        self.0.run_id()
    }

    /// The enclosing run's identifier, when this run is nested.
    #[must_use]
    pub fn parent_run_id(&self) -> Option<&fathom_core::RunId> {
        self.0.parent_run_id()
    }

    /// Whether this run's sampling decision traces it.
    #[must_use]
    pub fn sampled(&self) -> bool {
        self.0.sampled()
    }
}

/// Returns the run active on the calling task/thread, if any.
#[must_use]
pub fn get_active_context() -> Option<ActiveContext> {
    current_state().map(ActiveContext)
}

#[cfg(test)]
mod tests {
    use super::get_active_context;
    use super::instrument;

    #[test]
    fn no_active_context_outside_any_run() {
        assert!(get_active_context().is_none());
    }

    #[tokio::test]
    async fn instrument_establishes_an_empty_stack() {
        instrument(async {
            assert!(get_active_context().is_none());
        })
        .await;
    }
}
