use serde::{Deserialize, Serialize};

/// Aggregate counters derived from controller state at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Accounts the controller has a record for.
    pub total_accounts_tracked: usize,
    /// Accounts whose effective state is running.
    pub accounts_running: usize,
    /// Accounts with a non-empty waiting queue.
    pub accounts_waiting: usize,
    /// Sum of all waiting queue lengths.
    pub total_tasks_queued_waiting: usize,
    pub accounts_cooldown: usize,
    pub accounts_suspended: usize,
}
