use std::{sync::Arc, time::Duration};

use acctl_core::{AccountGate, ErrorStateStore};
use acctl_model::{AccountId, ErrorLevel, ErrorState};
use taskvisor::{BackoffPolicy, JitterPolicy};
use tracing::{info, warn};

const COOLDOWN_THRESHOLD: u32 = 3;
const BASE_COOLDOWN: Duration = Duration::from_secs(5);
const MAX_COOLDOWN: Duration = Duration::from_secs(120);

/// Minimal error subsystem: counts consecutive failures per account and puts
/// the account into cooldown once the threshold is reached.
///
/// Cooldown length doubles with every failure past the threshold.
pub struct FailurePolicy {
    gate: Arc<AccountGate>,
    store: ErrorStateStore,
    backoff: BackoffPolicy,
}

impl FailurePolicy {
    pub fn new(gate: Arc<AccountGate>, store: ErrorStateStore) -> Self {
        Self {
            gate,
            store,
            backoff: BackoffPolicy {
                first: BASE_COOLDOWN,
                max: MAX_COOLDOWN,
                factor: 2.0,
                jitter: JitterPolicy::None,
                ..BackoffPolicy::default()
            },
        }
    }

    pub fn record_success(&self, account: &AccountId) {
        if self.store.get(account).is_some() {
            info!(%account, "error streak cleared");
            self.store.clear(account);
        }
    }

    pub fn record_failure(&self, account: &AccountId) -> ErrorState {
        let now = self.gate.controller().now();
        let errors = self
            .store
            .get(account)
            .map_or(0, |s| s.consecutive_errors)
            .saturating_add(1);

        let state = if errors < COOLDOWN_THRESHOLD {
            ErrorState {
                level: ErrorLevel::Warning,
                consecutive_errors: errors,
                cooldown_until: None,
            }
        } else {
            let until = now + self.cooldown_for(errors);
            self.gate.set_cooldown(account, until);
            ErrorState {
                level: ErrorLevel::Cooldown,
                consecutive_errors: errors,
                cooldown_until: Some(until),
            }
        };

        warn!(%account, errors, level = ?state.level, "task failure recorded");
        self.store.set(account.clone(), state.clone());
        state
    }

    /// Cooldown for a streak of `errors` (at least the threshold).
    fn cooldown_for(&self, errors: u32) -> Duration {
        self.backoff.next(errors.saturating_sub(COOLDOWN_THRESHOLD))
    }
}
