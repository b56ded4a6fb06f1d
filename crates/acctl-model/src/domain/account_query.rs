use serde::{Deserialize, Serialize};

use super::ExecutionStatus;

const DEFAULT_LIMIT: usize = 100;
const MAX_LIMIT: usize = 1000;

/// Query parameters for listing account states with filtering and pagination.
#[derive(Debug, Clone)]
pub struct AccountQuery {
    /// Filter on the effective state.
    pub state: Option<ExecutionStatus>,
    pub limit: usize,
    pub offset: usize,
}

/// Result of a paginated account query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountPage<T> {
    pub items: Vec<T>,
    pub total: usize,
}

impl AccountQuery {
    pub fn new() -> Self {
        Self {
            state: None,
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn with_state(mut self, state: ExecutionStatus) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit.min(MAX_LIMIT);
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }
}

impl Default for AccountQuery {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_capped() {
        let q = AccountQuery::new().with_limit(5000);
        assert_eq!(q.limit, MAX_LIMIT);
        assert_eq!(AccountQuery::default().limit, DEFAULT_LIMIT);
    }
}
