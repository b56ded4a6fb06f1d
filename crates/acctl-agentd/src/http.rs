use std::sync::Arc;

use acctl_api::{ControllerApiAdapter, HttpApi};
use acctl_core::AccountController;
use acctl_prometheus::PrometheusMetrics;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::error;

type MetricsState = (Arc<AccountController>, Arc<PrometheusMetrics>);

/// Query API plus the Prometheus scrape endpoint at `/metrics`.
pub fn router(controller: Arc<AccountController>, metrics: Arc<PrometheusMetrics>) -> Router {
    let api = HttpApi::new(Arc::new(ControllerApiAdapter::new(controller.clone()))).router();
    let scrape = Router::new()
        .route("/metrics", get(scrape))
        .with_state((controller, metrics));
    api.merge(scrape)
}

/// GET /metrics
async fn scrape(State((controller, metrics)): State<MetricsState>) -> Response {
    metrics.observe(&controller.metrics());
    match metrics.render() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to render metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use acctl_core::Subscribe;
    use acctl_model::AdmissionRequest;
    use axum::{
        body::{Body, to_bytes},
        http::Request,
    };
    use tower::util::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn serves_api_and_scrape_endpoint() {
        let metrics = Arc::new(PrometheusMetrics::new().unwrap());
        let subscriber: Arc<dyn Subscribe> = metrics.clone();
        let controller = Arc::new(AccountController::builder().with_subscriber(subscriber).build());
        controller.acquire(AdmissionRequest::new("acc_1", "t_1", "task"));
        let app = router(controller, metrics);

        let resp = app
            .clone()
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let text = String::from_utf8(to_bytes(resp.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
        assert!(text.contains("acctl_accounts_running 1"));
        assert!(text.contains(r#"acctl_admissions_total{outcome="admitted"} 1"#));

        let resp = app
            .oneshot(Request::get("/api/v1/accounts/acc_1").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
