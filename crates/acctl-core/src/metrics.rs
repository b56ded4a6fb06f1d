//! Aggregate counters derived from a scan of account state.
//!
//! Nothing is stored between calls, so the numbers cannot drift from the
//! state they describe.

use acctl_model::{ExecutionStatus, MetricsSnapshot};

/// Fold `(effective state, queue length)` pairs, one per tracked account.
pub fn aggregate<I>(accounts: I) -> MetricsSnapshot
where
    I: IntoIterator<Item = (ExecutionStatus, usize)>,
{
    accounts
        .into_iter()
        .fold(MetricsSnapshot::default(), |mut m, (status, waiting)| {
            m.total_accounts_tracked += 1;
            m.total_tasks_queued_waiting += waiting;
            if waiting > 0 {
                m.accounts_waiting += 1;
            }
            match status {
                ExecutionStatus::Running => m.accounts_running += 1,
                ExecutionStatus::Cooldown => m.accounts_cooldown += 1,
                ExecutionStatus::Suspended => m.accounts_suspended += 1,
                ExecutionStatus::Available => {}
            }
            m
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scan_is_zero() {
        assert_eq!(aggregate([]), MetricsSnapshot::default());
    }

    #[test]
    fn counts_states_and_queues() {
        let m = aggregate([
            (ExecutionStatus::Running, 2),
            (ExecutionStatus::Running, 0),
            (ExecutionStatus::Cooldown, 1),
            (ExecutionStatus::Available, 0),
            (ExecutionStatus::Suspended, 4),
        ]);

        assert_eq!(m.total_accounts_tracked, 5);
        assert_eq!(m.accounts_running, 2);
        assert_eq!(m.accounts_waiting, 3);
        assert_eq!(m.total_tasks_queued_waiting, 7);
        assert_eq!(m.accounts_cooldown, 1);
        assert_eq!(m.accounts_suspended, 1);
    }
}
