mod ids;
pub use ids::{AccountId, TaskId, TaskType};

mod kv;
pub use kv::KeyValue;

mod labels;
pub use labels::RequesterLabels;

mod execution_status;
pub use execution_status::{ExecutionStatus, ParseStatusError};

mod execution_state;
pub use execution_state::ExecutionState;

mod admission;
pub use admission::{AdmissionRequest, AdmissionResult, NextAdmission, WaitingEntry};

mod error_state;
pub use error_state::{ErrorLevel, ErrorState, ErrorStateView};

mod state_view;
pub use state_view::{ExecutionStateView, WaitingTaskView};

mod account_query;
pub use account_query::{AccountPage, AccountQuery};

mod metrics;
pub use metrics::MetricsSnapshot;

pub mod serde_time;
