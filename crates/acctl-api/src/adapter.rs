use std::{collections::BTreeMap, sync::Arc};

use acctl_core::AccountController;
use acctl_model::{
    AccountId, AccountPage, AccountQuery, ExecutionStateView, MetricsSnapshot, WaitingTaskView,
};
use async_trait::async_trait;

use crate::error::ApiError;
use crate::handler::ApiHandler;

/// Adapter that serves queries straight from an in-process controller.
pub struct ControllerApiAdapter {
    controller: Arc<AccountController>,
}

impl ControllerApiAdapter {
    pub fn new(controller: Arc<AccountController>) -> Self {
        Self { controller }
    }
}

#[async_trait]
impl ApiHandler for ControllerApiAdapter {
    async fn list_states(
        &self,
        query: AccountQuery,
    ) -> Result<AccountPage<ExecutionStateView>, ApiError> {
        Ok(self.controller.query(&query))
    }

    async fn get_state(&self, id: &AccountId) -> Result<ExecutionStateView, ApiError> {
        Ok(self.controller.get_state(id))
    }

    async fn list_waiting(&self) -> Result<BTreeMap<AccountId, Vec<WaitingTaskView>>, ApiError> {
        Ok(self.controller.all_waiting_tasks())
    }

    async fn metrics(&self) -> Result<MetricsSnapshot, ApiError> {
        Ok(self.controller.metrics())
    }
}
