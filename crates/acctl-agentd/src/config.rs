use std::{net::SocketAddr, time::Duration};

use acctl_model::AccountId;
use acctl_observe::{LoggerConfig, LoggerFormat, LoggerLevel};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("at least one account is required")]
    NoAccounts,

    #[error("pool '{0}' needs at least one worker")]
    NoWorkers(String),
}

/// One group of simulated runners feeding the controller.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub name: String,
    pub task_type: String,
    pub workers: usize,
    /// Simulated duration of each task.
    pub task_ms: u64,
}

impl PoolConfig {
    pub fn new(name: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task_type: task_type.into(),
            workers: 2,
            task_ms: 1_500,
        }
    }

    pub fn task_duration(&self) -> Duration {
        Duration::from_millis(self.task_ms)
    }
}

#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub http_addr: SocketAddr,
    pub logger: LoggerConfig,
    pub pump_interval_ms: u64,
    pub pools: Vec<PoolConfig>,
    pub accounts: Vec<AccountId>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([127, 0, 0, 1], 8085)),
            logger: LoggerConfig::default(),
            pump_interval_ms: 1_000,
            pools: vec![
                PoolConfig::new("task", "task"),
                PoolConfig {
                    workers: 1,
                    task_ms: 3_000,
                    ..PoolConfig::new("engagement", "engagement")
                },
            ],
            accounts: ["acc_1", "acc_2", "acc_3"].map(AccountId::from).to_vec(),
        }
    }
}

impl AgentConfig {
    /// Defaults overridden by `ACCTL_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut cfg = Self::default();

        if let Some(addr) = get("ACCTL_HTTP_ADDR") {
            cfg.http_addr = addr.parse().map_err(|e| ConfigError::Invalid {
                key: "ACCTL_HTTP_ADDR",
                reason: format!("{e}"),
            })?;
        }
        if let Some(level) = get("ACCTL_LOG_LEVEL") {
            cfg.logger.level = LoggerLevel::new(level).map_err(|e| ConfigError::Invalid {
                key: "ACCTL_LOG_LEVEL",
                reason: e.to_string(),
            })?;
        }
        if let Some(format) = get("ACCTL_LOG_FORMAT") {
            cfg.logger.format =
                format.parse::<LoggerFormat>().map_err(|e| ConfigError::Invalid {
                    key: "ACCTL_LOG_FORMAT",
                    reason: e.to_string(),
                })?;
        }
        if let Some(ms) = get("ACCTL_PUMP_INTERVAL_MS") {
            cfg.pump_interval_ms = ms.trim().parse().map_err(|e| ConfigError::Invalid {
                key: "ACCTL_PUMP_INTERVAL_MS",
                reason: format!("{e}"),
            })?;
        }
        if let Some(list) = get("ACCTL_ACCOUNTS") {
            cfg.accounts = list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(AccountId::from)
                .collect();
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.accounts.is_empty() {
            return Err(ConfigError::NoAccounts);
        }
        if self.pump_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "ACCTL_PUMP_INTERVAL_MS",
                reason: "must be greater than zero".into(),
            });
        }
        if let Some(pool) = self.pools.iter().find(|p| p.workers == 0) {
            return Err(ConfigError::NoWorkers(pool.name.clone()));
        }
        Ok(())
    }

    pub fn pump_interval(&self) -> Duration {
        Duration::from_millis(self.pump_interval_ms)
    }
}
