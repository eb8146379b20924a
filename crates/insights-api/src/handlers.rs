//! Route handlers.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use tracing::debug;

use insights_metrics::prometheus::CONTENT_TYPE as EXPOSITION_CONTENT_TYPE;
use insights_metrics::{SchedulerState, render_prometheus};

use crate::ApiState;

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let snapshot = state.registry.snapshot().await;
    debug!(
        workflows = snapshot.len(),
        generation = snapshot.generation(),
        "serving metrics scrape"
    );

    (
        StatusCode::OK,
        [(CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        render_prometheus(&snapshot),
    )
}

/// GET /healthz
///
/// 503 once the scheduler has escalated; 200 otherwise, including while
/// failed cycles are being retried.
pub async fn healthz(State(state): State<ApiState>) -> impl IntoResponse {
    let status = state.status.borrow().clone();
    let code = if status.state == SchedulerState::Failed {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (code, Json(status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use insights_metrics::{RegistryWriter, SchedulerStatus, SnapshotBuilder, metric_registry};
    use tokio::sync::watch;

    fn test_state() -> (ApiState, RegistryWriter, watch::Sender<SchedulerStatus>) {
        let (writer, registry) = metric_registry();
        let (status_tx, status) = watch::channel(SchedulerStatus::default());
        (ApiState { registry, status }, writer, status_tx)
    }

    async fn body_string(resp: axum::response::Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn metrics_before_first_cycle_is_empty_family() {
        let (state, _writer, _status) = test_state();
        let resp = prometheus_metrics(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let content_type = resp.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap();
        assert!(content_type.contains("text/plain"));

        let body = body_string(resp).await;
        assert!(body.contains("# TYPE circleci_custom_workflow_insight_success_rate gauge"));
        assert!(!body.contains("{name="));
    }

    #[tokio::test]
    async fn metrics_serves_published_snapshot() {
        let (state, mut writer, _status) = test_state();
        let mut builder = SnapshotBuilder::new();
        builder.set("build", 0.95);
        writer.publish(builder).await;

        let resp = prometheus_metrics(State(state)).await.into_response();
        let body = body_string(resp).await;
        assert!(body.contains("circleci_custom_workflow_insight_success_rate{name=\"build\"} 0.95"));
    }

    #[tokio::test]
    async fn healthz_reports_ok_while_retrying() {
        let (state, _writer, status_tx) = test_state();
        status_tx.send_modify(|s| {
            s.cycles = 3;
            s.consecutive_failures = 2;
            s.last_error = Some("transport error: connection refused".into());
        });

        let resp = healthz(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body["state"], "idle");
        assert_eq!(body["consecutive_failures"], 2);
    }

    #[tokio::test]
    async fn healthz_reports_unavailable_after_escalation() {
        let (state, _writer, status_tx) = test_state();
        status_tx.send_modify(|s| s.state = SchedulerState::Failed);

        let resp = healthz(State(state)).await.into_response();
        assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        let body: serde_json::Value = serde_json::from_str(&body_string(resp).await).unwrap();
        assert_eq!(body["state"], "failed");
    }
}
