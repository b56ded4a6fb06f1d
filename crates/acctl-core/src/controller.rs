use std::{
    collections::{BTreeMap, HashMap},
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock},
    time::SystemTime,
};

use acctl_model::{
    AccountId, AccountPage, AccountQuery, AdmissionRequest, AdmissionResult, ExecutionStateView,
    ExecutionStatus, MetricsSnapshot, NextAdmission, TaskId, WaitingTaskView,
};
use tracing::{debug, instrument, trace, warn};

use crate::{
    Clock, ControllerError, ErrorStateSource, Event, EventKind, NoErrorState, Subscribe,
    SystemClock, metrics, slot::AccountSlot, view,
};

type SlotRef = Arc<Mutex<AccountSlot>>;

/// Per-account execution admission controller.
///
/// One instance per process, created by the composition root and shared as
/// `Arc<AccountController>`. Each account has its own mutex; the map lock is
/// only held to look up or insert an account, so unrelated accounts never
/// wait on each other.
pub struct AccountController {
    accounts: RwLock<HashMap<AccountId, SlotRef>>,
    clock: Arc<dyn Clock>,
    errors: Arc<dyn ErrorStateSource>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

/// Builder for [`AccountController`].
pub struct ControllerBuilder {
    clock: Arc<dyn Clock>,
    errors: Arc<dyn ErrorStateSource>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl ControllerBuilder {
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_error_source(mut self, errors: Arc<dyn ErrorStateSource>) -> Self {
        self.errors = errors;
        self
    }

    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers.extend(subscribers);
        self
    }

    pub fn build(self) -> AccountController {
        AccountController {
            accounts: RwLock::new(HashMap::new()),
            clock: self.clock,
            errors: self.errors,
            subscribers: self.subscribers,
        }
    }
}

impl Default for ControllerBuilder {
    fn default() -> Self {
        Self {
            clock: Arc::new(SystemClock),
            errors: Arc::new(NoErrorState),
            subscribers: Vec::new(),
        }
    }
}

fn lock(slot: &Mutex<AccountSlot>) -> MutexGuard<'_, AccountSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl AccountController {
    /// Controller with the system clock, no error source and no subscribers.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ControllerBuilder {
        ControllerBuilder::default()
    }

    /// Current time as seen by the controller's clock.
    pub fn now(&self) -> SystemTime {
        self.clock.now()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    /// Ask to run `req.task_id` on `req.account_id`.
    ///
    /// Admits immediately when the account is idle, out of cooldown, not
    /// suspended and nobody is waiting. Otherwise the request is queued.
    /// When the account is admissible but still has a backlog (e.g. right
    /// after a cooldown ended) the queue head is admitted first and handed
    /// back in [`AdmissionResult::promoted`].
    #[instrument(level = "debug", skip(self, req), fields(account = %req.account_id, task = %req.task_id))]
    pub fn acquire(&self, req: AdmissionRequest) -> AdmissionResult {
        let now = self.clock.now();
        let error = self.errors.error_state(&req.account_id);
        let slot = self.slot_or_insert(&req.account_id);
        let mut events = Vec::with_capacity(2);

        let result = {
            let mut slot = lock(&slot);
            let promoted = slot.promote_head(error.as_ref(), now);
            if let Some(next) = &promoted {
                events.push(promoted_event(next, now));
            }

            if promoted.is_none() && slot.is_admissible(error.as_ref(), now) {
                slot.start(req.task_id.clone(), req.task_type, now);
                events.push(
                    Event::new(EventKind::Admitted, req.account_id, now).with_task(req.task_id),
                );
                AdmissionResult::admitted()
            } else {
                let position = slot.enqueue(req.task_id.clone(), req.task_type, req.metadata, now);
                events.push(
                    Event::new(EventKind::Queued, req.account_id, now)
                        .with_task(req.task_id)
                        .with_position(position),
                );
                AdmissionResult::queued(position, promoted)
            }
        };

        match result.queue_position {
            None => debug!("admitted"),
            Some(position) => debug!(position, "queued"),
        }
        self.publish(events);
        result
    }

    /// Finish the running task and admit the next waiting one, if any.
    ///
    /// `task_id` must be the id the task was admitted with. Unknown accounts
    /// and mismatching ids are rejected without touching any state.
    #[instrument(level = "debug", skip(self), fields(account = %account_id, task = %task_id))]
    pub fn release(
        &self,
        account_id: &AccountId,
        task_id: &TaskId,
        success: bool,
    ) -> Result<Option<NextAdmission>, ControllerError> {
        let now = self.clock.now();
        let Some(slot) = self.slot(account_id) else {
            warn!("release for unknown account rejected");
            self.publish(vec![
                Event::new(EventKind::StaleRelease, account_id.clone(), now)
                    .with_task(task_id.clone())
                    .with_reason("unknown account"),
            ]);
            return Err(ControllerError::UnknownAccount(account_id.clone()));
        };

        let error = self.errors.error_state(account_id);
        let mut events = Vec::with_capacity(2);

        let next = {
            let mut guard = lock(&slot);
            if guard.state.current_task_id.as_ref() != Some(task_id) {
                let expected = guard.state.current_task_id.clone();
                drop(guard);

                warn!(current = ?expected, "stale release rejected");
                self.publish(vec![
                    Event::new(EventKind::StaleRelease, account_id.clone(), now)
                        .with_task(task_id.clone())
                        .with_reason("task is not running"),
                ]);
                return Err(ControllerError::StaleRelease {
                    account: account_id.clone(),
                    expected,
                    got: task_id.clone(),
                });
            }

            guard.finish(success, now);
            events.push(
                Event::new(EventKind::Released, account_id.clone(), now)
                    .with_task(task_id.clone())
                    .with_reason(if success { "success" } else { "failure" }),
            );

            let next = guard.promote_head(error.as_ref(), now);
            if let Some(next) = &next {
                events.push(promoted_event(next, now));
            }
            next
        };

        match &next {
            Some(n) => debug!(next = %n.task_id, "released, next admitted"),
            None => debug!(success, "released"),
        }
        self.publish(events);
        Ok(next)
    }

    /// Block new admissions until `until`. The running task is not touched.
    ///
    /// The latest call wins, whether it extends or shortens the cooldown.
    #[instrument(level = "debug", skip(self), fields(account = %account_id))]
    pub fn set_cooldown(&self, account_id: &AccountId, until: SystemTime) {
        let now = self.clock.now();
        let slot = self.slot_or_insert(account_id);
        lock(&slot).state.cooldown_until = Some(until);

        let secs = until.duration_since(now).unwrap_or_default().as_secs();
        debug!(secs, "cooldown set");
        self.publish(vec![
            Event::new(EventKind::CooldownSet, account_id.clone(), now)
                .with_reason(format!("{secs}s")),
        ]);
    }

    /// Lift the internal cooldown and admit the queue head if possible.
    #[instrument(level = "debug", skip(self), fields(account = %account_id))]
    pub fn clear_cooldown(&self, account_id: &AccountId) -> Option<NextAdmission> {
        let now = self.clock.now();
        let slot = self.slot(account_id)?;
        let error = self.errors.error_state(account_id);
        let mut events = vec![Event::new(EventKind::CooldownCleared, account_id.clone(), now)];

        let next = {
            let mut guard = lock(&slot);
            guard.state.cooldown_until = None;
            guard.promote_head(error.as_ref(), now)
        };
        if let Some(next) = &next {
            events.push(promoted_event(next, now));
        }
        self.publish(events);
        next
    }

    /// Administrative stop: no admissions until [`AccountController::resume`].
    ///
    /// A running task keeps running.
    #[instrument(level = "debug", skip(self), fields(account = %account_id))]
    pub fn suspend(&self, account_id: &AccountId) {
        let now = self.clock.now();
        let slot = self.slot_or_insert(account_id);
        let changed = {
            let mut guard = lock(&slot);
            let changed = !guard.state.is_suspended();
            guard.state.state = ExecutionStatus::Suspended;
            changed
        };
        if changed {
            debug!("suspended");
            self.publish(vec![Event::new(EventKind::Suspended, account_id.clone(), now)]);
        }
    }

    /// Lift a suspension and admit the queue head if possible.
    #[instrument(level = "debug", skip(self), fields(account = %account_id))]
    pub fn resume(&self, account_id: &AccountId) -> Option<NextAdmission> {
        let now = self.clock.now();
        let slot = self.slot(account_id)?;
        let error = self.errors.error_state(account_id);
        let mut events = Vec::with_capacity(2);

        let next = {
            let mut guard = lock(&slot);
            if !guard.state.is_suspended() {
                return None;
            }
            guard.state.state = if guard.state.is_running() {
                ExecutionStatus::Running
            } else {
                ExecutionStatus::Available
            };
            events.push(Event::new(EventKind::Resumed, account_id.clone(), now));
            guard.promote_head(error.as_ref(), now)
        };
        if let Some(next) = &next {
            events.push(promoted_event(next, now));
        }
        debug!(promoted = next.is_some(), "resumed");
        self.publish(events);
        next
    }

    /// Admit the queue head of `account_id` if its block has lapsed.
    pub fn pump(&self, account_id: &AccountId) -> Option<NextAdmission> {
        let slot = self.slot(account_id)?;
        self.drain(account_id, &slot)
    }

    /// [`AccountController::pump`] over every tracked account.
    pub fn pump_all(&self) -> Vec<NextAdmission> {
        let admitted: Vec<NextAdmission> = self
            .slots()
            .into_iter()
            .filter_map(|(id, slot)| self.drain(&id, &slot))
            .collect();
        if !admitted.is_empty() {
            trace!(count = admitted.len(), "pump admitted waiting tasks");
        }
        admitted
    }

    /// Remove a waiting entry.
    ///
    /// Returns `false` if it is not queued, including when a concurrent
    /// release has already admitted it.
    #[instrument(level = "debug", skip(self), fields(account = %account_id, task = %task_id))]
    pub fn cancel_waiting(&self, account_id: &AccountId, task_id: &TaskId) -> bool {
        let now = self.clock.now();
        let Some(slot) = self.slot(account_id) else {
            return false;
        };

        let removed = lock(&slot).queue.remove(task_id).is_some();
        if removed {
            debug!("waiting task cancelled");
            self.publish(vec![
                Event::new(EventKind::Cancelled, account_id.clone(), now).with_task(task_id.clone()),
            ]);
        }
        removed
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Snapshot of one account. Unknown accounts yield an available, empty view.
    pub fn get_state(&self, account_id: &AccountId) -> ExecutionStateView {
        let now = self.clock.now();
        let error = self.errors.error_state(account_id);

        match self.slot(account_id) {
            Some(slot) => {
                let guard = lock(&slot);
                view::merge(&guard.state, guard.queue.len(), error.as_ref(), now)
            }
            None => ExecutionStateView {
                error_state: error.map(|e| e.view(now)),
                ..ExecutionStateView::empty(account_id.clone())
            },
        }
    }

    /// Snapshot of every tracked account, ordered by id.
    pub fn get_all_states(&self) -> BTreeMap<AccountId, ExecutionStateView> {
        let now = self.clock.now();
        self.slots()
            .into_iter()
            .map(|(id, slot)| {
                let error = self.errors.error_state(&id);
                let guard = lock(&slot);
                let view = view::merge(&guard.state, guard.queue.len(), error.as_ref(), now);
                (id, view)
            })
            .collect()
    }

    /// Filtered, paginated list of account views.
    ///
    /// `total` counts matches before pagination.
    pub fn query(&self, q: &AccountQuery) -> AccountPage<ExecutionStateView> {
        let filtered: Vec<ExecutionStateView> = self
            .get_all_states()
            .into_values()
            .filter(|v| q.state.is_none_or(|s| v.state == s))
            .collect();
        let total = filtered.len();

        let items = filtered.into_iter().skip(q.offset).take(q.limit).collect();
        AccountPage { items, total }
    }

    /// Waiting queue of one account in admission order.
    pub fn waiting_tasks(&self, account_id: &AccountId) -> Vec<WaitingTaskView> {
        let now = self.clock.now();
        self.slot(account_id)
            .map(|slot| view::waiting(&lock(&slot).queue, now))
            .unwrap_or_default()
    }

    /// Waiting queues grouped by account; accounts with nothing waiting are omitted.
    pub fn all_waiting_tasks(&self) -> BTreeMap<AccountId, Vec<WaitingTaskView>> {
        let now = self.clock.now();
        self.slots()
            .into_iter()
            .filter_map(|(id, slot)| {
                let guard = lock(&slot);
                (!guard.queue.is_empty()).then(|| (id, view::waiting(&guard.queue, now)))
            })
            .collect()
    }

    /// Aggregate counters computed from the current state.
    pub fn metrics(&self) -> MetricsSnapshot {
        let now = self.clock.now();
        let scan: Vec<_> = self
            .slots()
            .into_iter()
            .map(|(id, slot)| {
                let error = self.errors.error_state(&id);
                let guard = lock(&slot);
                (guard.effective(error.as_ref(), now), guard.queue.len())
            })
            .collect();
        metrics::aggregate(scan)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn slot(&self, account_id: &AccountId) -> Option<SlotRef> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts.get(account_id).cloned()
    }

    fn slot_or_insert(&self, account_id: &AccountId) -> SlotRef {
        if let Some(slot) = self.slot(account_id) {
            return slot;
        }
        let mut accounts = self.accounts.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(accounts.entry(account_id.clone()).or_insert_with(|| {
            trace!(account = %account_id, "tracking new account");
            Arc::new(Mutex::new(AccountSlot::new(account_id.clone())))
        }))
    }

    /// Clone out every slot handle so that no map lock is held while
    /// individual accounts are locked.
    fn slots(&self) -> Vec<(AccountId, SlotRef)> {
        let accounts = self.accounts.read().unwrap_or_else(PoisonError::into_inner);
        accounts
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }

    fn drain(&self, account_id: &AccountId, slot: &SlotRef) -> Option<NextAdmission> {
        let now = self.clock.now();
        let error = self.errors.error_state(account_id);
        let next = lock(slot).promote_head(error.as_ref(), now)?;

        debug!(account = %account_id, task = %next.task_id, "waiting task admitted");
        self.publish(vec![promoted_event(&next, now)]);
        Some(next)
    }

    /// Fan events out to every subscriber.
    ///
    /// A panicking subscriber is reported by name and skipped; the rest
    /// still receive the event.
    fn publish(&self, events: Vec<Event>) {
        for event in &events {
            for sub in &self.subscribers {
                trace!(subscriber = sub.name(), kind = ?event.kind, "delivering event");
                if catch_unwind(AssertUnwindSafe(|| sub.on_event(event))).is_err() {
                    warn!(subscriber = sub.name(), kind = ?event.kind, "subscriber panicked");
                }
            }
        }
    }
}

impl Default for AccountController {
    fn default() -> Self {
        Self::new()
    }
}

fn promoted_event(next: &NextAdmission, now: SystemTime) -> Event {
    Event::new(EventKind::Promoted, next.account_id.clone(), now).with_task(next.task_id.clone())
}
