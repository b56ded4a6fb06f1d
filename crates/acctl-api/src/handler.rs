use std::collections::BTreeMap;

use acctl_model::{
    AccountId, AccountPage, AccountQuery, ExecutionStateView, MetricsSnapshot, WaitingTaskView,
};
use async_trait::async_trait;

use crate::error::ApiError;

/// Account state query handler.
///
/// Implement it directly to put auth, caching or a remote controller behind
/// the HTTP routes; [`crate::ControllerApiAdapter`] covers the in-process case.
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Effective views of all tracked accounts, filtered and paginated.
    async fn list_states(
        &self,
        query: AccountQuery,
    ) -> Result<AccountPage<ExecutionStateView>, ApiError>;

    /// Effective view of one account.
    async fn get_state(&self, id: &AccountId) -> Result<ExecutionStateView, ApiError>;

    /// Waiting queues of every account with a backlog.
    async fn list_waiting(&self) -> Result<BTreeMap<AccountId, Vec<WaitingTaskView>>, ApiError>;

    async fn metrics(&self) -> Result<MetricsSnapshot, ApiError>;
}
