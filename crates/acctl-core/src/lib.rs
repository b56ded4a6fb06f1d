//! Per-account execution admission control.
//!
//! [`AccountController`] guarantees that at most one task runs per account,
//! queues the rest in arrival order and hands the queue head to whoever
//! releases the account. [`AccountGate`] wraps it for tokio runners that want
//! to await their admission instead of polling.

pub mod clock;
pub use clock::{Clock, ManualClock, SystemClock};

pub mod error;
pub use error::{ControllerError, GateError};

pub mod event;
pub use event::{Event, EventKind, Subscribe};

pub mod error_source;
pub use error_source::{ErrorStateSource, ErrorStateStore, NoErrorState};

mod queue;
pub use queue::WaitingQueue;

mod slot;

pub mod view;

pub mod metrics;

mod controller;
pub use controller::{AccountController, ControllerBuilder};

mod gate;
pub use gate::{AccountGate, Permit};
