//! Controller events and the subscriber seam.
//!
//! Events are published synchronously, after the account lock has been
//! released, to every registered [`Subscribe`] implementation.

use std::time::SystemTime;

use acctl_model::{AccountId, TaskId};

/// What happened to an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Request admitted immediately.
    Admitted,
    /// Request appended to the waiting queue.
    Queued,
    /// Queue head transitioned to running.
    Promoted,
    /// Running task released (reason carries `success` or `failure`).
    Released,
    /// Release rejected: unknown account or task id mismatch.
    StaleRelease,
    /// Waiting entry removed by its requester.
    Cancelled,
    CooldownSet,
    CooldownCleared,
    Suspended,
    Resumed,
}

/// Notification emitted by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,
    pub account: AccountId,
    pub task: Option<TaskId>,
    pub reason: Option<String>,
    pub queue_position: Option<usize>,
    pub at: SystemTime,
}

impl Event {
    pub fn new(kind: EventKind, account: AccountId, at: SystemTime) -> Self {
        Self {
            kind,
            account,
            task: None,
            reason: None,
            queue_position: None,
            at,
        }
    }

    pub fn with_task(mut self, task: TaskId) -> Self {
        self.task = Some(task);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_position(mut self, position: usize) -> Self {
        self.queue_position = Some(position);
        self
    }
}

/// Receiver of controller events.
///
/// Called inline on the thread performing the mutation, so implementations
/// must be quick and must not call back into the controller.
pub trait Subscribe: Send + Sync + 'static {
    fn on_event(&self, event: &Event);

    fn name(&self) -> &'static str;
}
