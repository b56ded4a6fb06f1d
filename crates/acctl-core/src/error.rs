use acctl_model::{AccountId, TaskId};
use thiserror::Error;

/// Misuse signals returned by [`AccountController`](crate::AccountController).
///
/// Whenever one of these is returned the account state is left untouched.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    /// Release for an account that has never been acquired.
    #[error("unknown account: {0}")]
    UnknownAccount(AccountId),

    /// Release whose task id does not match the running task.
    #[error("stale release on '{account}': task '{got}' is not running (current: {})", fmt_current(.expected))]
    StaleRelease {
        account: AccountId,
        expected: Option<TaskId>,
        got: TaskId,
    },
}

fn fmt_current(current: &Option<TaskId>) -> String {
    current
        .as_ref()
        .map(|t| format!("'{t}'"))
        .unwrap_or_else(|| "none".to_string())
}

/// Error returned by [`AccountGate`](crate::AccountGate).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GateError {
    /// The caller gave up waiting before being admitted.
    #[error("admission cancelled")]
    Cancelled,

    /// The same task is already waiting on this account.
    #[error("task '{task}' is already waiting on '{account}'")]
    DuplicateTask { account: AccountId, task: TaskId },

    /// The waiter was dropped without an admission.
    #[error("admission channel closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_release_message() {
        let err = ControllerError::StaleRelease {
            account: AccountId::from("acc_1"),
            expected: Some(TaskId::from("T1")),
            got: TaskId::from("T2"),
        };
        assert_eq!(
            err.to_string(),
            "stale release on 'acc_1': task 'T2' is not running (current: 'T1')"
        );

        let err = ControllerError::StaleRelease {
            account: AccountId::from("acc_1"),
            expected: None,
            got: TaskId::from("T2"),
        };
        assert!(err.to_string().ends_with("(current: none)"));
    }
}
