//! Read-only merge of controller state with external error state.
//!
//! Both inputs stay the source of truth for their own fields; nothing here
//! writes back to either of them.

use std::time::SystemTime;

use acctl_model::{
    ErrorState, ExecutionState, ExecutionStateView, ExecutionStatus, WaitingTaskView,
};

use crate::WaitingQueue;

/// Latest cooldown deadline still in the future, internal or external.
pub fn cooldown_deadline(
    state: &ExecutionState,
    error: Option<&ErrorState>,
    now: SystemTime,
) -> Option<SystemTime> {
    let internal = state.cooldown_until.filter(|until| now < *until);
    let external = error.and_then(|e| e.active_cooldown(now));
    internal.max(external)
}

/// Resolve the externally visible state.
///
/// Order: suspended, then cooldown, then running, then available.
pub fn effective_status(
    state: &ExecutionState,
    error: Option<&ErrorState>,
    now: SystemTime,
) -> ExecutionStatus {
    if state.is_suspended() {
        ExecutionStatus::Suspended
    } else if cooldown_deadline(state, error, now).is_some() {
        ExecutionStatus::Cooldown
    } else if state.is_running() {
        ExecutionStatus::Running
    } else {
        ExecutionStatus::Available
    }
}

/// Build the dashboard view of one account.
pub fn merge(
    state: &ExecutionState,
    waiting_tasks_count: usize,
    error: Option<&ErrorState>,
    now: SystemTime,
) -> ExecutionStateView {
    let execution_duration = state
        .current_task_id
        .as_ref()
        .and(state.started_at)
        .map(|started| now.duration_since(started).unwrap_or_default());

    ExecutionStateView {
        account_id: state.account_id.clone(),
        state: effective_status(state, error, now),
        current_task_id: state.current_task_id.clone(),
        task_type: state.task_type.clone(),
        execution_duration,
        waiting_tasks_count,
        last_completed_task: state.last_completed_task.clone(),
        last_completed_at: state.last_completed_at,
        total_tasks_completed: state.total_tasks_completed,
        cooldown_until: state.cooldown_until.filter(|until| now < *until),
        error_state: error.map(|e| e.view(now)),
    }
}

/// Positional view of a waiting queue.
pub fn waiting(queue: &WaitingQueue, now: SystemTime) -> Vec<WaitingTaskView> {
    queue
        .iter()
        .enumerate()
        .map(|(position, e)| WaitingTaskView {
            position,
            task_id: e.task_id.clone(),
            task_type: e.task_type.clone(),
            enqueued_at: e.enqueued_at,
            waited: now.duration_since(e.enqueued_at).unwrap_or_default(),
            metadata: e.metadata.clone(),
        })
        .collect()
}
