use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::serde_time;

/// Health level reported by the error/cooldown subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorLevel {
    #[default]
    Normal,
    /// Some consecutive errors, still admitting work.
    Warning,
    /// Policy decided the account must rest.
    Cooldown,
}

/// Error state of an account as owned by the external error subsystem.
///
/// The controller only ever reads it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ErrorState {
    pub level: ErrorLevel,
    pub consecutive_errors: u32,
    #[serde(default, with = "serde_time::opt_unix_secs", skip_serializing_if = "Option::is_none")]
    pub cooldown_until: Option<SystemTime>,
}

/// Display form of [`ErrorState`] embedded into the per-account view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorStateView {
    pub state: ErrorLevel,
    pub consecutive_errors: u32,
    /// Seconds left until the external cooldown ends (0 when none).
    #[serde(with = "serde_time::secs")]
    pub cooldown_remaining: Duration,
}

impl ErrorState {
    /// Returns the external cooldown deadline if it is still in the future.
    pub fn active_cooldown(&self, now: SystemTime) -> Option<SystemTime> {
        self.cooldown_until.filter(|until| now < *until)
    }

    pub fn view(&self, now: SystemTime) -> ErrorStateView {
        let cooldown_remaining = self
            .active_cooldown(now)
            .and_then(|until| until.duration_since(now).ok())
            .unwrap_or_default();

        ErrorStateView {
            state: self.level,
            consecutive_errors: self.consecutive_errors,
            cooldown_remaining,
        }
    }
}
