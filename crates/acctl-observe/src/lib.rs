//! Logging for acctl processes.
//!
//! [`logger_init`] installs a global `tracing` subscriber; with the
//! `subscriber` feature, [`Journal`] turns controller events into log lines.

mod logger;
pub use logger::*;

#[cfg(feature = "subscriber")]
mod subscriber;
#[cfg(feature = "subscriber")]
pub use subscriber::*;
