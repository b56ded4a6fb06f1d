use std::time::SystemTime;

use acctl_model::{
    AccountId, ErrorState, ExecutionState, ExecutionStatus, NextAdmission, RequesterLabels,
    TaskId, TaskType,
};

use crate::{WaitingQueue, view};

/// State of a single account: the stored record plus its waiting queue.
///
/// Always accessed under the account's mutex.
pub(crate) struct AccountSlot {
    pub state: ExecutionState,
    pub queue: WaitingQueue,
}

impl AccountSlot {
    /// Creates a new idle slot.
    pub fn new(account_id: AccountId) -> Self {
        Self {
            state: ExecutionState::new(account_id),
            queue: WaitingQueue::new(),
        }
    }

    #[inline]
    pub fn effective(&self, error: Option<&ErrorState>, now: SystemTime) -> ExecutionStatus {
        view::effective_status(&self.state, error, now)
    }

    /// Idle, not suspended and out of cooldown.
    #[inline]
    pub fn is_admissible(&self, error: Option<&ErrorState>, now: SystemTime) -> bool {
        self.effective(error, now).is_admissible()
    }

    /// Transition to running with the given task.
    pub fn start(&mut self, task_id: TaskId, task_type: TaskType, now: SystemTime) {
        self.state.state = ExecutionStatus::Running;
        self.state.current_task_id = Some(task_id);
        self.state.task_type = Some(task_type);
        self.state.started_at = Some(now);
    }

    /// Record completion of the running task and go idle.
    ///
    /// The caller has already checked that `current_task_id` matches.
    pub fn finish(&mut self, success: bool, now: SystemTime) {
        self.state.last_completed_task = self.state.current_task_id.take();
        self.state.last_completed_at = Some(now);
        if success {
            self.state.total_tasks_completed += 1;
        }
        self.state.task_type = None;
        self.state.started_at = None;
        if !self.state.is_suspended() {
            self.state.state = ExecutionStatus::Available;
        }
    }

    /// Admit the queue head if the account can take work right now.
    pub fn promote_head(
        &mut self,
        error: Option<&ErrorState>,
        now: SystemTime,
    ) -> Option<NextAdmission> {
        if self.queue.is_empty() || !self.is_admissible(error, now) {
            return None;
        }
        let entry = self.queue.pop_front()?;
        self.start(entry.task_id.clone(), entry.task_type.clone(), now);

        Some(NextAdmission {
            account_id: self.state.account_id.clone(),
            task_id: entry.task_id,
            task_type: entry.task_type,
            metadata: entry.metadata,
            waited: now.duration_since(entry.enqueued_at).unwrap_or_default(),
        })
    }

    pub fn enqueue(
        &mut self,
        task_id: TaskId,
        task_type: TaskType,
        metadata: RequesterLabels,
        now: SystemTime,
    ) -> usize {
        self.queue.push(acctl_model::WaitingEntry {
            task_id,
            task_type,
            enqueued_at: now,
            metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn finish_keeps_suspension() {
        let now = SystemTime::now();
        let mut slot = AccountSlot::new(AccountId::from("acc"));
        slot.start(TaskId::from("T1"), "task".into(), now);
        slot.state.state = ExecutionStatus::Suspended;

        slot.finish(true, now);
        assert_eq!(slot.state.state, ExecutionStatus::Suspended);
        assert_eq!(slot.state.last_completed_task, Some(TaskId::from("T1")));
        assert_eq!(slot.state.total_tasks_completed, 1);
        assert!(slot.state.current_task_id.is_none());
    }

    #[test]
    fn promote_requires_admissible_account() {
        let now = SystemTime::now();
        let mut slot = AccountSlot::new(AccountId::from("acc"));
        slot.enqueue(TaskId::from("T1"), "task".into(), RequesterLabels::new(), now);
        slot.state.cooldown_until = Some(now + Duration::from_secs(1));

        assert!(slot.promote_head(None, now).is_none());
        assert_eq!(slot.queue.len(), 1);

        let later = now + Duration::from_secs(2);
        let next = slot.promote_head(None, later).unwrap();
        assert_eq!(next.task_id, TaskId::from("T1"));
        assert_eq!(next.waited, Duration::from_secs(2));
        assert_eq!(slot.state.current_task_id, Some(TaskId::from("T1")));
        assert!(slot.queue.is_empty());
    }
}
