//! Prometheus metrics for the account execution controller.
//!
//! [`PrometheusMetrics`] counts controller events (register it as a
//! subscriber) and mirrors [`acctl_model::MetricsSnapshot`] into gauges
//! through [`PrometheusMetrics::observe`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use acctl_core::AccountController;
//! use acctl_model::AdmissionRequest;
//! use acctl_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let metrics = Arc::new(PrometheusMetrics::new()?);
//! let controller = AccountController::builder()
//!     .with_subscriber(metrics.clone())
//!     .build();
//!
//! controller.acquire(AdmissionRequest::new("acc_1", "t_1", "task"));
//! metrics.observe(&controller.metrics());
//!
//! let text = metrics.render()?;
//! assert!(text.contains("acctl_accounts_running 1"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `acctl_admissions_total{outcome}` - Counter (`admitted`, `queued`, `promoted`)
//! - `acctl_releases_total{outcome}` - Counter (`success`, `failure`)
//! - `acctl_stale_releases_total` - Counter
//! - `acctl_cancellations_total` - Counter
//! - `acctl_cooldowns_total` - Counter
//! - `acctl_suspensions_total` - Counter
//! - `acctl_accounts_tracked`, `acctl_accounts_running`, `acctl_accounts_waiting`,
//!   `acctl_tasks_queued_waiting`, `acctl_accounts_cooldown`,
//!   `acctl_accounts_suspended` - Gauges
//!
//! ## HTTP Server
//! This crate does NOT serve `/metrics`. Call [`PrometheusMetrics::render`]
//! from whatever HTTP framework the process already runs.

mod backend;
pub use backend::PrometheusMetrics;

pub use prometheus::Registry;
