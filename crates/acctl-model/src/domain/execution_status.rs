use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Availability of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Idle and ready to admit a task.
    Available,
    /// A task is currently executing on the account.
    Running,
    /// New admissions are blocked until a cooldown deadline passes.
    Cooldown,
    /// New admissions are blocked until an operator resumes the account.
    Suspended,
}

impl ExecutionStatus {
    /// Returns `true` if new work may be admitted in this state.
    pub fn is_admissible(&self) -> bool {
        matches!(self, ExecutionStatus::Available)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Available => "available",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Cooldown => "cooldown",
            ExecutionStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid state: '{0}' (valid: available, running, cooldown, suspended)")]
pub struct ParseStatusError(pub String);

impl FromStr for ExecutionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(ExecutionStatus::Available),
            "running" => Ok(ExecutionStatus::Running),
            "cooldown" => Ok(ExecutionStatus::Cooldown),
            "suspended" => Ok(ExecutionStatus::Suspended),
            _ => Err(ParseStatusError(s.to_string())),
        }
    }
}
