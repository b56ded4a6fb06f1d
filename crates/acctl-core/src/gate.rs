//! Await-able admission on top of [`AccountController`].
//!
//! The controller only answers "admitted or queued". The gate keeps a oneshot
//! waiter per queued request and completes it when a release, resume, cooldown
//! clear or periodic pump hands the account to that request.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, SystemTime},
};

use acctl_model::{AccountId, AdmissionRequest, NextAdmission, TaskId, TaskType};
use tokio::{sync::oneshot, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{AccountController, ControllerError, GateError};

type WaiterKey = (AccountId, TaskId);

/// Async admission front-end shared by task runner pools.
pub struct AccountGate {
    controller: Arc<AccountController>,
    waiters: Mutex<HashMap<WaiterKey, oneshot::Sender<NextAdmission>>>,
}

impl AccountGate {
    pub fn new(controller: Arc<AccountController>) -> Arc<Self> {
        Arc::new(Self {
            controller,
            waiters: Mutex::new(HashMap::new()),
        })
    }

    pub fn controller(&self) -> &Arc<AccountController> {
        &self.controller
    }

    /// Wait until `req` is admitted or `token` is cancelled.
    ///
    /// On cancellation the queued entry is withdrawn. If a concurrent release
    /// already admitted it, the admission is released as unsuccessful so the
    /// account moves on to the next waiter.
    #[instrument(level = "debug", skip(self, req, token), fields(account = %req.account_id, task = %req.task_id))]
    pub async fn admit(
        self: &Arc<Self>,
        req: AdmissionRequest,
        token: &CancellationToken,
    ) -> Result<Permit, GateError> {
        let key = (req.account_id.clone(), req.task_id.clone());
        let task_type = req.task_type.clone();

        let rx = {
            let mut waiters = self.waiters();
            if waiters.contains_key(&key) {
                return Err(GateError::DuplicateTask {
                    account: key.0,
                    task: key.1,
                });
            }
            let (tx, rx) = oneshot::channel();
            waiters.insert(key.clone(), tx);
            rx
        };
        let mut pending = Pending {
            gate: self,
            key: key.clone(),
            armed: true,
        };

        let result = self.controller.acquire(req);
        self.dispatch(result.promoted);

        if result.admitted {
            pending.disarm();
            self.waiters().remove(&key);
            return Ok(Permit::new(Arc::clone(self), key, task_type));
        }

        trace!(position = ?result.queue_position, "waiting for admission");
        tokio::select! {
            biased;
            admitted = rx => match admitted {
                Ok(next) => {
                    pending.disarm();
                    debug!(waited_ms = next.waited.as_millis() as u64, "admitted after wait");
                    Ok(Permit::new(Arc::clone(self), key, next.task_type))
                }
                Err(_) => Err(GateError::Closed),
            },
            _ = token.cancelled() => Err(GateError::Cancelled),
        }
    }

    /// Release a task and forward the account to its next waiter.
    pub fn release(
        &self,
        account_id: &AccountId,
        task_id: &TaskId,
        success: bool,
    ) -> Result<(), ControllerError> {
        let next = self.controller.release(account_id, task_id, success)?;
        self.dispatch(next);
        Ok(())
    }

    pub fn set_cooldown(&self, account_id: &AccountId, until: SystemTime) {
        self.controller.set_cooldown(account_id, until);
    }

    pub fn clear_cooldown(&self, account_id: &AccountId) {
        let next = self.controller.clear_cooldown(account_id);
        self.dispatch(next);
    }

    pub fn suspend(&self, account_id: &AccountId) {
        self.controller.suspend(account_id);
    }

    pub fn resume(&self, account_id: &AccountId) {
        let next = self.controller.resume(account_id);
        self.dispatch(next);
    }

    /// Admit every queue head whose block has lapsed and wake its waiter.
    pub fn pump(&self) -> usize {
        let admitted = self.controller.pump_all();
        let count = admitted.len();
        for next in admitted {
            self.dispatch(Some(next));
        }
        count
    }

    /// Run [`AccountGate::pump`] every `every` until `token` is cancelled.
    pub fn spawn_pump(self: &Arc<Self>, every: Duration, token: CancellationToken) -> JoinHandle<()> {
        let gate = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let n = gate.pump();
                        if n > 0 {
                            debug!(admitted = n, "pump resumed waiting tasks");
                        }
                    }
                }
            }
            trace!("pump stopped");
        })
    }

    /// Number of requests currently awaiting admission through the gate.
    pub fn waiting(&self) -> usize {
        self.waiters().len()
    }

    /// Hand an admission to its waiter.
    ///
    /// If the waiter is gone the admission is released straight away so the
    /// account is not left holding a task nobody runs.
    fn dispatch(&self, mut next: Option<NextAdmission>) {
        while let Some(admission) = next.take() {
            let key = (admission.account_id.clone(), admission.task_id.clone());
            let Some(tx) = self.waiters().remove(&key) else {
                debug!(account = %key.0, task = %key.1, "admission has no gate waiter");
                continue;
            };
            if let Err(orphan) = tx.send(admission) {
                warn!(account = %key.0, task = %key.1, "waiter went away; releasing orphaned admission");
                next = self
                    .controller
                    .release(&orphan.account_id, &orphan.task_id, false)
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "failed to release orphaned admission");
                        None
                    });
            }
        }
    }

    /// Withdraw a request whose caller stopped waiting.
    fn abandon(&self, key: WaiterKey) {
        self.waiters().remove(&key);
        let (account, task) = key;
        if self.controller.cancel_waiting(&account, &task) {
            debug!(%account, %task, "waiting request withdrawn");
            return;
        }
        // Already admitted by a concurrent release; give the account back.
        match self.controller.release(&account, &task, false) {
            Ok(next) => self.dispatch(next),
            Err(e) => debug!(error = %e, "abandoned request was not running"),
        }
    }

    fn waiters(&self) -> MutexGuard<'_, HashMap<WaiterKey, oneshot::Sender<NextAdmission>>> {
        self.waiters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Withdraws the request when `admit` is cancelled or its future is dropped.
struct Pending<'a> {
    gate: &'a AccountGate,
    key: WaiterKey,
    armed: bool,
}

impl Pending<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.gate.abandon(self.key.clone());
        }
    }
}

/// Proof of admission for one task on one account.
///
/// Call [`Permit::release`] when the work is done. A permit dropped without
/// release is released as unsuccessful.
pub struct Permit {
    gate: Arc<AccountGate>,
    account_id: AccountId,
    task_id: TaskId,
    task_type: TaskType,
    released: bool,
}

impl Permit {
    fn new(gate: Arc<AccountGate>, key: WaiterKey, task_type: TaskType) -> Self {
        Self {
            gate,
            account_id: key.0,
            task_id: key.1,
            task_type,
            released: false,
        }
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn task_id(&self) -> &TaskId {
        &self.task_id
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    /// Release the account, recording whether the work succeeded.
    pub fn release(mut self, success: bool) -> Result<(), ControllerError> {
        self.released = true;
        self.gate.release(&self.account_id, &self.task_id, success)
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        warn!(account = %self.account_id, task = %self.task_id, "permit dropped without release");
        if let Err(e) = self.gate.release(&self.account_id, &self.task_id, false) {
            warn!(error = %e, "failed to release dropped permit");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use acctl_model::ExecutionStatus;

    use super::*;
    use crate::{Clock, ManualClock};

    fn req(account: &str, task: &str) -> AdmissionRequest {
        AdmissionRequest::new(account, task, "task")
    }

    fn gate() -> Arc<AccountGate> {
        AccountGate::new(Arc::new(AccountController::new()))
    }

    #[tokio::test]
    async fn immediate_admission() {
        let gate = gate();
        let token = CancellationToken::new();

        let permit = gate.admit(req("acc_1", "T1"), &token).await.unwrap();
        assert_eq!(permit.task_id().as_str(), "T1");
        assert_eq!(permit.task_type(), "task");
        assert_eq!(gate.waiting(), 0);

        permit.release(true).unwrap();
        let view = gate.controller().get_state(&AccountId::from("acc_1"));
        assert_eq!(view.state, ExecutionStatus::Available);
        assert_eq!(view.total_tasks_completed, 1);
    }

    #[tokio::test]
    async fn queued_waiter_is_woken_by_release() {
        let gate = gate();
        let token = CancellationToken::new();
        let first = gate.admit(req("acc_1", "T1"), &token).await.unwrap();

        let g = Arc::clone(&gate);
        let t = token.clone();
        let waiter = tokio::spawn(async move { g.admit(req("acc_1", "T2"), &t).await });

        while gate.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        first.release(true).unwrap();

        let second = waiter.await.unwrap().unwrap();
        assert_eq!(second.task_id().as_str(), "T2");
        let view = gate.controller().get_state(&AccountId::from("acc_1"));
        assert_eq!(view.current_task_id, Some(TaskId::from("T2")));
        second.release(true).unwrap();
    }

    #[tokio::test]
    async fn cancelled_waiter_leaves_the_queue() {
        let gate = gate();
        let token = CancellationToken::new();
        let _holder = gate.admit(req("acc_1", "T1"), &token).await.unwrap();

        let waiter_token = CancellationToken::new();
        let g = Arc::clone(&gate);
        let t = waiter_token.clone();
        let waiter = tokio::spawn(async move { g.admit(req("acc_1", "T2"), &t).await });

        while gate.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        waiter_token.cancel();

        assert_eq!(waiter.await.unwrap().err(), Some(GateError::Cancelled));
        assert_eq!(gate.waiting(), 0);
        assert!(gate.controller().waiting_tasks(&AccountId::from("acc_1")).is_empty());
    }

    #[tokio::test]
    async fn duplicate_waiting_task_is_rejected() {
        let gate = gate();
        let token = CancellationToken::new();
        let _holder = gate.admit(req("acc_1", "T1"), &token).await.unwrap();

        let g = Arc::clone(&gate);
        let t = token.clone();
        let _waiter = tokio::spawn(async move { g.admit(req("acc_1", "T2"), &t).await });
        while gate.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        let err = gate.admit(req("acc_1", "T2"), &token).await.err();
        assert!(matches!(err, Some(GateError::DuplicateTask { .. })));
    }

    #[tokio::test]
    async fn dropped_permit_releases_account() {
        let gate = gate();
        let token = CancellationToken::new();

        drop(gate.admit(req("acc_1", "T1"), &token).await.unwrap());

        let view = gate.controller().get_state(&AccountId::from("acc_1"));
        assert_eq!(view.state, ExecutionStatus::Available);
        assert_eq!(view.total_tasks_completed, 0);
        assert_eq!(view.last_completed_task, Some(TaskId::from("T1")));
    }

    #[tokio::test]
    async fn pump_wakes_waiter_after_cooldown() {
        let clock = Arc::new(ManualClock::default());
        let controller = Arc::new(AccountController::builder().with_clock(clock.clone()).build());
        let gate = AccountGate::new(controller);
        let token = CancellationToken::new();
        let acc = AccountId::from("acc_1");

        gate.set_cooldown(&acc, clock.now() + Duration::from_secs(60));

        let g = Arc::clone(&gate);
        let t = token.clone();
        let waiter = tokio::spawn(async move { g.admit(req("acc_1", "T1"), &t).await });
        while gate.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        assert_eq!(gate.pump(), 0);
        clock.advance(Duration::from_secs(61));
        assert_eq!(gate.pump(), 1);

        let permit = waiter.await.unwrap().unwrap();
        assert_eq!(permit.task_id().as_str(), "T1");
        permit.release(true).unwrap();
    }

    #[tokio::test]
    async fn resume_wakes_waiter() {
        let gate = gate();
        let token = CancellationToken::new();
        let acc = AccountId::from("acc_1");
        gate.suspend(&acc);

        let g = Arc::clone(&gate);
        let t = token.clone();
        let waiter = tokio::spawn(async move { g.admit(req("acc_1", "T1"), &t).await });
        while gate.waiting() == 0 {
            tokio::task::yield_now().await;
        }

        gate.resume(&acc);
        let permit = waiter.await.unwrap().unwrap();
        permit.release(true).unwrap();
    }

    #[tokio::test]
    async fn aborted_waiter_is_skipped() {
        let gate = gate();
        let token = CancellationToken::new();
        let acc = AccountId::from("acc_1");
        let holder = gate.admit(req("acc_1", "T1"), &token).await.unwrap();

        // T2 waits through the gate, then its future is dropped mid-wait.
        let g = Arc::clone(&gate);
        let t = token.clone();
        let dropped = tokio::spawn(async move { g.admit(req("acc_1", "T2"), &t).await });
        while gate.waiting() == 0 {
            tokio::task::yield_now().await;
        }
        dropped.abort();
        let _ = dropped.await;

        // T3 queued directly on the controller.
        gate.controller().acquire(req("acc_1", "T3"));
        holder.release(true).unwrap();

        assert_eq!(
            gate.controller().get_state(&acc).current_task_id,
            Some(TaskId::from("T3"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_storm_leaves_account_idle() {
        let gate = gate();
        let acc = AccountId::from("acc_1");

        for round in 0..50 {
            let mut handles = Vec::with_capacity(20);
            let mut cancels = Vec::new();
            for i in 0..20 {
                let g = Arc::clone(&gate);
                let t = CancellationToken::new();
                if i % 3 == 0 {
                    cancels.push(t.clone());
                }
                let task = format!("T{round}-{i}");
                handles.push(tokio::spawn(async move {
                    if let Ok(permit) = g.admit(req("acc_1", &task), &t).await {
                        tokio::task::yield_now().await;
                        permit.release(true).unwrap();
                    }
                }));
            }
            for t in cancels {
                t.cancel();
            }
            for h in handles {
                h.await.unwrap();
            }
        }

        let view = gate.controller().get_state(&acc);
        assert_eq!(view.state, ExecutionStatus::Available);
        assert!(view.current_task_id.is_none());
        assert_eq!(view.waiting_tasks_count, 0);
        assert_eq!(gate.waiting(), 0);
        assert_eq!(gate.controller().metrics().total_tasks_queued_waiting, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn spawned_pump_stops_on_cancel() {
        let gate = gate();
        let token = CancellationToken::new();
        let handle = gate.spawn_pump(Duration::from_millis(10), token.clone());

        tokio::time::sleep(Duration::from_millis(35)).await;
        token.cancel();
        handle.await.unwrap();
    }
}
