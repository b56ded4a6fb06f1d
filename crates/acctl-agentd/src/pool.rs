use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use acctl_core::{AccountGate, GateError};
use acctl_model::{AccountId, AdmissionRequest, TaskId};
use taskvisor::{BackoffPolicy, JitterPolicy, RestartPolicy, TaskError, TaskFn, TaskRef, TaskSpec};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{config::PoolConfig, failures::FailurePolicy};

/// Share of simulated tasks that fail.
const FAILURE_PERCENT: u128 = 10;

/// Build one supervised task per worker of `pool`.
///
/// Each run of a task is a single admit, work, release cycle; the
/// supervisor restarts it immediately after success and after a short
/// backoff after a simulated failure. Workers walk the account list
/// round-robin, each starting at its own offset, so every account sees
/// traffic from several producers at once.
pub fn specs(
    pool: &PoolConfig,
    accounts: &[AccountId],
    gate: Arc<AccountGate>,
    policy: Arc<FailurePolicy>,
) -> Vec<TaskSpec> {
    let backoff = BackoffPolicy {
        first: Duration::from_millis(200),
        max: Duration::from_secs(2),
        factor: 2.0,
        jitter: JitterPolicy::None,
        ..BackoffPolicy::default()
    };

    (0..pool.workers)
        .map(|id| {
            let worker = Arc::new(Worker {
                pool: pool.clone(),
                id,
                accounts: accounts.to_vec(),
                turn: AtomicUsize::new(id),
                gate: Arc::clone(&gate),
                policy: Arc::clone(&policy),
            });

            // TaskFn::arc wants a &'static str; names are built once at startup.
            let name: &'static str = Box::leak(format!("{}-{id}", pool.name).into_boxed_str());
            let task: TaskRef = TaskFn::arc(name, move |ctx: CancellationToken| {
                let worker = Arc::clone(&worker);
                async move { worker.cycle(&ctx).await }
            });

            TaskSpec::new(task, RestartPolicy::Always { interval: None }, backoff, None)
        })
        .collect()
}

struct Worker {
    pool: PoolConfig,
    id: usize,
    accounts: Vec<AccountId>,
    turn: AtomicUsize,
    gate: Arc<AccountGate>,
    policy: Arc<FailurePolicy>,
}

impl Worker {
    fn next_account(&self) -> AccountId {
        let turn = self.turn.fetch_add(1, Ordering::Relaxed);
        self.accounts[turn % self.accounts.len()].clone()
    }

    async fn cycle(&self, ctx: &CancellationToken) -> Result<(), TaskError> {
        let account = self.next_account();
        let task_id = TaskId::from(format!("{}-{}", self.pool.name, Uuid::new_v4()));
        let req = AdmissionRequest::new(account.clone(), task_id, self.pool.task_type.clone())
            .with_label("pool", self.pool.name.clone())
            .with_label("worker", self.id.to_string());

        let permit = match self.gate.admit(req, ctx).await {
            Ok(permit) => permit,
            Err(GateError::Cancelled) => return Err(TaskError::Canceled),
            Err(e) => {
                warn!(pool = %self.pool.name, %account, error = %e, "admission failed");
                return Err(TaskError::Fail {
                    reason: format!("admission failed: {e}"),
                });
            }
        };
        debug!(%account, task = %permit.task_id(), "running");

        tokio::select! {
            _ = ctx.cancelled() => {
                if let Err(e) = permit.release(false) {
                    warn!(error = %e, "release on shutdown failed");
                }
                return Err(TaskError::Canceled);
            }
            _ = tokio::time::sleep(self.pool.task_duration()) => {}
        }

        let success = Uuid::new_v4().as_u128() % 100 >= FAILURE_PERCENT;
        if success {
            self.policy.record_success(&account);
        } else {
            self.policy.record_failure(&account);
        }
        if let Err(e) = permit.release(success) {
            warn!(%account, error = %e, "release rejected");
        }

        if success {
            Ok(())
        } else {
            Err(TaskError::Fail {
                reason: format!("simulated failure on {account}"),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use acctl_core::{AccountController, ErrorStateStore};

    use super::*;

    type Fixture = (Arc<AccountController>, Arc<AccountGate>, Vec<Arc<Worker>>);

    fn setup(workers: usize, accounts: &[&str]) -> Fixture {
        let store = ErrorStateStore::new();
        let controller = Arc::new(
            AccountController::builder()
                .with_error_source(Arc::new(store.clone()))
                .build(),
        );
        let gate = AccountGate::new(controller.clone());
        let policy = Arc::new(FailurePolicy::new(gate.clone(), store));
        let pool = PoolConfig {
            workers,
            task_ms: 100,
            ..PoolConfig::new("task", "task")
        };
        let accounts: Vec<AccountId> = accounts.iter().copied().map(AccountId::from).collect();

        let workers = (0..workers)
            .map(|id| {
                Arc::new(Worker {
                    pool: pool.clone(),
                    id,
                    accounts: accounts.clone(),
                    turn: AtomicUsize::new(id),
                    gate: gate.clone(),
                    policy: policy.clone(),
                })
            })
            .collect();
        (controller, gate, workers)
    }

    #[test]
    fn one_spec_per_worker() {
        let (_, gate, _) = setup(1, &["acc_1"]);
        let store = ErrorStateStore::new();
        let policy = Arc::new(FailurePolicy::new(gate.clone(), store));
        let pool = PoolConfig {
            workers: 3,
            ..PoolConfig::new("engagement", "engagement")
        };

        let specs = specs(&pool, &["acc_1".into()], gate, policy);
        assert_eq!(specs.len(), 3);
    }

    #[test]
    fn workers_walk_accounts_round_robin_from_own_offset() {
        let (_, _, workers) = setup(2, &["a", "b", "c"]);

        let first: Vec<_> = (0..4).map(|_| workers[0].next_account()).collect();
        let second: Vec<_> = (0..2).map(|_| workers[1].next_account()).collect();

        assert_eq!(first, ["a", "b", "c", "a"].map(AccountId::from).to_vec());
        assert_eq!(second, ["b", "c"].map(AccountId::from).to_vec());
    }

    #[tokio::test(start_paused = true)]
    async fn cycle_runs_and_releases_the_account() {
        let (controller, _, workers) = setup(1, &["acc_1"]);
        let ctx = CancellationToken::new();

        let res = workers[0].cycle(&ctx).await;
        assert!(matches!(res, Ok(()) | Err(TaskError::Fail { .. })));

        let view = controller.get_state(&"acc_1".into());
        assert!(view.current_task_id.is_none());
        assert!(view.last_completed_task.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn workers_share_accounts_and_stop_on_cancel() {
        let (controller, gate, workers) = setup(3, &["acc_1"]);
        let ctx = CancellationToken::new();

        let handles: Vec<_> = workers
            .into_iter()
            .map(|w| {
                let ctx = ctx.clone();
                tokio::spawn(async move { w.cycle(&ctx).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let metrics = controller.metrics();
        assert_eq!(metrics.accounts_running, 1);
        assert_eq!(metrics.total_tasks_queued_waiting, 2);

        ctx.cancel();
        for h in handles {
            assert!(matches!(h.await.unwrap(), Err(TaskError::Canceled)));
        }
        assert_eq!(gate.waiting(), 0);
        assert!(controller.get_state(&"acc_1".into()).current_task_id.is_none());
        assert_eq!(controller.metrics().total_tasks_queued_waiting, 0);
    }
}
