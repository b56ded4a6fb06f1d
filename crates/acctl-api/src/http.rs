use std::{collections::BTreeMap, sync::Arc};

use acctl_model::{AccountId, AccountQuery, ExecutionStateView, ExecutionStatus, WaitingTaskView};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{error::ApiError, handler::ApiHandler};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    pub fn new(handler: Arc<H>) -> Self {
        Self { handler }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - GET /api/v1/accounts - List account states (filter by query params)
    /// - GET /api/v1/accounts/{id} - Get one account state
    /// - GET /api/v1/waiting - Waiting queues of all accounts
    /// - GET /api/v1/metrics - Aggregate counters
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/accounts", get(list_states::<H>))
            .route("/api/v1/accounts/{id}", get(get_state::<H>))
            .route("/api/v1/waiting", get(list_waiting::<H>))
            .route("/api/v1/metrics", get(metrics::<H>))
            .with_state(self.handler)
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
struct ListStatesParams {
    /// Filter by effective state
    state: Option<String>,
    /// Max items per page (default 100, max 1000)
    limit: Option<usize>,
    /// Offset for pagination (default 0)
    offset: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListStatesResponse {
    accounts: Vec<ExecutionStateView>,
    total: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct GetStateResponse {
    state: ExecutionStateView,
}

#[derive(Debug, Serialize, Deserialize)]
struct ListWaitingResponse {
    waiting: BTreeMap<AccountId, Vec<WaitingTaskView>>,
    total: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/accounts
///
/// Query params (all optional, combinable):
/// - ?state=running - filter by effective state
/// - ?limit=50      - max items per page (default 100, max 1000)
/// - ?offset=0      - pagination offset (default 0)
async fn list_states<H>(
    State(handler): State<Arc<H>>,
    Query(params): Query<ListStatesParams>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let mut query = AccountQuery::new();

    if let Some(state) = params.state {
        query = query.with_state(state.parse::<ExecutionStatus>()?);
    }
    if let Some(limit) = params.limit {
        query = query.with_limit(limit);
    }
    if let Some(offset) = params.offset {
        query = query.with_offset(offset);
    }

    let page = handler.list_states(query).await?;
    debug!(count = page.items.len(), total = page.total, "accounts listed");

    Ok(Json(ListStatesResponse {
        accounts: page.items,
        total: page.total,
    }))
}

/// GET /api/v1/accounts/{id}
async fn get_state<H>(
    State(handler): State<Arc<H>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    if id.trim().is_empty() {
        return Err(ApiError::InvalidRequest("account_id cannot be empty".into()));
    }

    let account_id = AccountId::from(id);
    debug!(%account_id, "getting account state");
    let state = handler.get_state(&account_id).await?;

    Ok(Json(GetStateResponse { state }))
}

/// GET /api/v1/waiting
async fn list_waiting<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let waiting = handler.list_waiting().await?;
    let total = waiting.values().map(Vec::len).sum();

    Ok(Json(ListWaitingResponse { waiting, total }))
}

/// GET /api/v1/metrics
async fn metrics<H>(State(handler): State<Arc<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    Ok(Json(handler.metrics().await?))
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use acctl_core::{AccountController, ManualClock};
    use acctl_model::{AdmissionRequest, MetricsSnapshot};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;
    use crate::ControllerApiAdapter;

    fn app() -> (Arc<AccountController>, Router) {
        let controller = Arc::new(
            AccountController::builder()
                .with_clock(Arc::new(ManualClock::new(
                    SystemTime::UNIX_EPOCH + Duration::from_secs(1_000),
                )))
                .build(),
        );
        let adapter = Arc::new(ControllerApiAdapter::new(controller.clone()));
        (controller, HttpApi::new(adapter).router())
    }

    async fn get_json(router: Router, uri: &str) -> (StatusCode, Value) {
        let resp = router
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn lists_accounts_with_filter_and_paging() {
        let (controller, router) = app();
        controller.acquire(AdmissionRequest::new("acc_1", "t_1", "task"));
        controller.acquire(AdmissionRequest::new("acc_2", "t_2", "task"));
        controller.suspend(&"acc_3".into());

        let (status, body) = get_json(router.clone(), "/api/v1/accounts").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 3);

        let (_, body) = get_json(router.clone(), "/api/v1/accounts?state=running&limit=1").await;
        assert_eq!(body["total"], 2);
        assert_eq!(body["accounts"].as_array().unwrap().len(), 1);
        assert_eq!(body["accounts"][0]["state"], "running");

        let (_, body) = get_json(router, "/api/v1/accounts?state=suspended").await;
        assert_eq!(body["accounts"][0]["account_id"], "acc_3");
    }

    #[tokio::test]
    async fn invalid_state_filter_is_bad_request() {
        let (_, router) = app();
        let (status, body) = get_json(router, "/api/v1/accounts?state=busy").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("busy"));
    }

    #[tokio::test]
    async fn unknown_account_is_empty_available_view() {
        let (_, router) = app();
        let (status, body) = get_json(router, "/api/v1/accounts/nobody").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["state"]["account_id"], "nobody");
        assert_eq!(body["state"]["state"], "available");
        assert_eq!(body["state"]["waiting_tasks_count"], 0);
    }

    #[tokio::test]
    async fn waiting_lists_queues_in_order() {
        let (controller, router) = app();
        controller.acquire(AdmissionRequest::new("acc_1", "t_1", "task"));
        controller.acquire(AdmissionRequest::new("acc_1", "t_2", "task"));
        controller.acquire(AdmissionRequest::new("acc_1", "t_3", "engagement"));

        let (status, body) = get_json(router, "/api/v1/waiting").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        let queue = &body["waiting"]["acc_1"];
        assert_eq!(queue[0]["task_id"], "t_2");
        assert_eq!(queue[1]["position"], 1);
        assert_eq!(queue[1]["task_type"], "engagement");
    }

    #[tokio::test]
    async fn metrics_endpoint_returns_snapshot() {
        let (controller, router) = app();
        controller.acquire(AdmissionRequest::new("acc_1", "t_1", "task"));
        controller.acquire(AdmissionRequest::new("acc_1", "t_2", "task"));

        let (status, body) = get_json(router, "/api/v1/metrics").await;
        assert_eq!(status, StatusCode::OK);
        let snapshot: MetricsSnapshot = serde_json::from_value(body).unwrap();
        assert_eq!(snapshot.accounts_running, 1);
        assert_eq!(snapshot.total_tasks_queued_waiting, 1);
    }

    #[tokio::test]
    async fn empty_account_id_is_bad_request() {
        let (_, router) = app();
        let (status, body) = get_json(router, "/api/v1/accounts/%20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid request: account_id cannot be empty");
    }
}
