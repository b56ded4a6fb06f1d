use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime};

use crate::{
    AccountId, ErrorStateView, ExecutionStatus, RequesterLabels, TaskId, TaskType, serde_time,
};

/// Consolidated per-account state consumed by dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionStateView {
    pub account_id: AccountId,
    /// Effective state after merging cooldown and suspension.
    pub state: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_task_id: Option<TaskId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    /// Seconds since the current task was admitted.
    #[serde(default, with = "serde_time::opt_secs", skip_serializing_if = "Option::is_none")]
    pub execution_duration: Option<Duration>,
    pub waiting_tasks_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_completed_task: Option<TaskId>,
    #[serde(default, with = "serde_time::opt_unix_secs", skip_serializing_if = "Option::is_none")]
    pub last_completed_at: Option<SystemTime>,
    pub total_tasks_completed: u64,
    /// Internal cooldown deadline, if still in the future.
    #[serde(default, with = "serde_time::opt_unix_secs", skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<SystemTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_state: Option<ErrorStateView>,
}

impl ExecutionStateView {
    /// View of an account the controller has never seen.
    pub fn empty(account_id: AccountId) -> Self {
        Self {
            account_id,
            state: ExecutionStatus::Available,
            current_task_id: None,
            task_type: None,
            execution_duration: None,
            waiting_tasks_count: 0,
            last_completed_task: None,
            last_completed_at: None,
            total_tasks_completed: 0,
            cooldown_until: None,
            error_state: None,
        }
    }
}

/// A waiting entry together with its position in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingTaskView {
    /// 0-indexed; 0 is admitted next.
    pub position: usize,
    pub task_id: TaskId,
    pub task_type: TaskType,
    #[serde(with = "serde_time::unix_secs")]
    pub enqueued_at: SystemTime,
    /// Seconds spent waiting so far.
    #[serde(with = "serde_time::secs")]
    pub waited: Duration,
    #[serde(default, skip_serializing_if = "RequesterLabels::is_empty")]
    pub metadata: RequesterLabels,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorLevel;

    #[test]
    fn empty_view_shape() {
        let view = ExecutionStateView::empty(AccountId::from("acc_9"));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["account_id"], "acc_9");
        assert_eq!(json["state"], "available");
        assert_eq!(json["waiting_tasks_count"], 0);
        assert_eq!(json["total_tasks_completed"], 0);
        assert!(json.get("current_task_id").is_none());
        assert!(json.get("execution_duration").is_none());
        assert!(json.get("error_state").is_none());
    }

    #[test]
    fn running_view_shape() {
        let view = ExecutionStateView {
            state: ExecutionStatus::Running,
            current_task_id: Some(TaskId::from("T1")),
            task_type: Some("task".into()),
            execution_duration: Some(Duration::from_secs(42)),
            waiting_tasks_count: 2,
            error_state: Some(ErrorStateView {
                state: ErrorLevel::Warning,
                consecutive_errors: 2,
                cooldown_remaining: Duration::ZERO,
            }),
            ..ExecutionStateView::empty(AccountId::from("acc_1"))
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "running");
        assert_eq!(json["current_task_id"], "T1");
        assert_eq!(json["task_type"], "task");
        assert_eq!(json["execution_duration"], 42);
        assert_eq!(json["waiting_tasks_count"], 2);
        assert_eq!(json["error_state"]["consecutive_errors"], 2);

        let back: ExecutionStateView = serde_json::from_value(json).unwrap();
        assert_eq!(back, view);
    }
}
