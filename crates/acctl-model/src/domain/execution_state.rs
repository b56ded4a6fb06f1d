use std::time::SystemTime;

use crate::{AccountId, ExecutionStatus, TaskId, TaskType};

/// Stored per-account record.
///
/// `state` only ever holds `Available`, `Running` or `Suspended`.
/// Cooldown is derived from `cooldown_until` at read time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionState {
    pub account_id: AccountId,
    pub state: ExecutionStatus,
    /// Set only while a task runs.
    pub current_task_id: Option<TaskId>,
    pub task_type: Option<TaskType>,
    /// When the current task was admitted.
    pub started_at: Option<SystemTime>,
    pub last_completed_task: Option<TaskId>,
    pub last_completed_at: Option<SystemTime>,
    /// Successful releases over the lifetime of the process.
    pub total_tasks_completed: u64,
    /// Deadline set by the external cooldown policy.
    pub cooldown_until: Option<SystemTime>,
}

impl ExecutionState {
    /// Fresh record in `Available`.
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            state: ExecutionStatus::Available,
            current_task_id: None,
            task_type: None,
            started_at: None,
            last_completed_task: None,
            last_completed_at: None,
            total_tasks_completed: 0,
            cooldown_until: None,
        }
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.current_task_id.is_some()
    }

    #[inline]
    pub fn is_suspended(&self) -> bool {
        self.state == ExecutionStatus::Suspended
    }
}
