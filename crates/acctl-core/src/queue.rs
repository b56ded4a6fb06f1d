use std::collections::VecDeque;

use acctl_model::{TaskId, WaitingEntry};

/// Strict FIFO of pending admissions for one account.
///
/// Entries leave only through [`WaitingQueue::pop_front`] (admission) or
/// [`WaitingQueue::remove`] (cancellation); neither reorders the rest.
#[derive(Debug, Default, Clone)]
pub struct WaitingQueue {
    entries: VecDeque<WaitingEntry>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return its 0-indexed position.
    pub fn push(&mut self, entry: WaitingEntry) -> usize {
        self.entries.push_back(entry);
        self.entries.len() - 1
    }

    /// Take the earliest entry.
    pub fn pop_front(&mut self) -> Option<WaitingEntry> {
        self.entries.pop_front()
    }

    /// Remove the first entry with `task_id`.
    pub fn remove(&mut self, task_id: &TaskId) -> Option<WaitingEntry> {
        let idx = self.position(task_id)?;
        self.entries.remove(idx)
    }

    pub fn position(&self, task_id: &TaskId) -> Option<usize> {
        self.entries.iter().position(|e| &e.task_id == task_id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in admission order.
    pub fn iter(&self) -> impl Iterator<Item = &WaitingEntry> {
        self.entries.iter()
    }
}
