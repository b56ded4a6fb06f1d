//! Read seam into the external error/cooldown subsystem.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use acctl_model::{AccountId, ErrorState};

/// Read access to error state owned by another subsystem.
///
/// Implementations are queried on every admission decision and view, so they
/// must be cheap and must never call into the controller.
pub trait ErrorStateSource: Send + Sync + 'static {
    fn error_state(&self, account: &AccountId) -> Option<ErrorState>;
}

/// Source that knows about no errors.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoErrorState;

impl ErrorStateSource for NoErrorState {
    fn error_state(&self, _account: &AccountId) -> Option<ErrorState> {
        None
    }
}

/// In-memory error state written by the error subsystem and read by the controller.
#[derive(Clone, Default)]
pub struct ErrorStateStore {
    inner: Arc<RwLock<HashMap<AccountId, ErrorState>>>,
}

impl ErrorStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the error state of an account.
    pub fn set(&self, account: AccountId, state: ErrorState) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.insert(account, state);
    }

    /// Forget the error state of an account (e.g. after a success).
    pub fn clear(&self, account: &AccountId) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.remove(account);
    }

    pub fn get(&self, account: &AccountId) -> Option<ErrorState> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.get(account).cloned()
    }
}

impl ErrorStateSource for ErrorStateStore {
    fn error_state(&self, account: &AccountId) -> Option<ErrorState> {
        self.get(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use acctl_model::ErrorLevel;

    #[test]
    fn store_set_get_clear() {
        let store = ErrorStateStore::new();
        let acc = AccountId::from("acc_1");

        assert!(store.error_state(&acc).is_none());

        store.set(
            acc.clone(),
            ErrorState {
                level: ErrorLevel::Warning,
                consecutive_errors: 2,
                cooldown_until: None,
            },
        );
        assert_eq!(store.error_state(&acc).unwrap().consecutive_errors, 2);

        let shared = store.clone();
        shared.clear(&acc);
        assert!(store.get(&acc).is_none());
    }
}
