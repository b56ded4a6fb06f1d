use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::{AccountId, RequesterLabels, TaskId, TaskType, serde_time};

/// Request to run one task on one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionRequest {
    pub account_id: AccountId,
    pub task_id: TaskId,
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "RequesterLabels::is_empty")]
    pub metadata: RequesterLabels,
}

impl AdmissionRequest {
    pub fn new(
        account_id: impl Into<AccountId>,
        task_id: impl Into<TaskId>,
        task_type: impl Into<TaskType>,
    ) -> Self {
        Self {
            account_id: account_id.into(),
            task_id: task_id.into(),
            task_type: task_type.into(),
            metadata: RequesterLabels::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push(key, value);
        self
    }
}

/// Pending request in an account's waiting queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitingEntry {
    pub task_id: TaskId,
    pub task_type: TaskType,
    #[serde(with = "serde_time::unix_secs")]
    pub enqueued_at: SystemTime,
    #[serde(default, skip_serializing_if = "RequesterLabels::is_empty")]
    pub metadata: RequesterLabels,
}

/// A queued request that has just been transitioned to running.
///
/// Whoever receives it is responsible for dispatching the work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextAdmission {
    pub account_id: AccountId,
    pub task_id: TaskId,
    pub task_type: TaskType,
    #[serde(default, skip_serializing_if = "RequesterLabels::is_empty")]
    pub metadata: RequesterLabels,
    /// Time spent in the queue.
    #[serde(with = "serde_time::secs")]
    pub waited: Duration,
}

/// Outcome of an acquire call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionResult {
    pub admitted: bool,
    /// 0-indexed position when queued.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    /// Queue head admitted ahead of this request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promoted: Option<NextAdmission>,
}

impl AdmissionResult {
    pub fn admitted() -> Self {
        Self {
            admitted: true,
            queue_position: None,
            promoted: None,
        }
    }

    pub fn queued(position: usize, promoted: Option<NextAdmission>) -> Self {
        Self {
            admitted: false,
            queue_position: Some(position),
            promoted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_collects_labels() {
        let req = AdmissionRequest::new("acc_1", "T1", "engagement")
            .with_label("runner", "crawler")
            .with_label("target", "@someone");

        assert_eq!(req.account_id.as_str(), "acc_1");
        assert_eq!(req.task_type, "engagement");
        assert_eq!(req.metadata.get("target"), Some("@someone"));
    }

    #[test]
    fn queued_result_shape() {
        let json = serde_json::to_value(AdmissionResult::queued(1, None)).unwrap();
        assert_eq!(json["admitted"], false);
        assert_eq!(json["queue_position"], 1);
        assert!(json.get("promoted").is_none());

        let json = serde_json::to_value(AdmissionResult::admitted()).unwrap();
        assert_eq!(json["admitted"], true);
        assert!(json.get("queue_position").is_none());
    }
}
