//! insights-api — the exporter's HTTP surface.
//!
//! Serves the last published gauge snapshot for scraping and the snapshot
//! scheduler's status for liveness checks. Handlers only ever read; fetch
//! failures never turn into endpoint errors.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Scheduler status as JSON |

pub mod handlers;

use axum::Router;
use axum::routing::get;
use tokio::sync::watch;

use insights_metrics::{RegistryReader, SchedulerStatus};

/// Shared state for handlers.
#[derive(Clone)]
pub struct ApiState {
    pub registry: RegistryReader,
    pub status: watch::Receiver<SchedulerStatus>,
}

/// Build the exporter router.
pub fn build_router(registry: RegistryReader, status: watch::Receiver<SchedulerStatus>) -> Router {
    let state = ApiState { registry, status };

    Router::new()
        .route("/metrics", get(handlers::prometheus_metrics))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use insights_metrics::{SnapshotBuilder, metric_registry};
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_serves_metrics_and_healthz() {
        let (mut writer, reader) = metric_registry();
        let (_status_tx, status) = watch::channel(SchedulerStatus::default());
        let router = build_router(reader, status);

        let mut builder = SnapshotBuilder::new();
        builder.set("deploy", 0.5);
        writer.publish(builder).await;

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder().uri("/healthz").body(Body::empty()).unwrap();
        let resp = router.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let req = Request::builder().uri("/nope").body(Body::empty()).unwrap();
        let resp = router.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
