//! End-to-end regression tests.
//!
//! Wires the real insights client against a local fixture remote, drives
//! the snapshot scheduler one tick at a time, and scrapes the router the
//! daemon serves.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::Query;
use axum::http::{Request, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use tower::ServiceExt;

use insights_api::build_router;
use insights_client::InsightsClient;
use insights_core::{Credential, ExporterConfig, InsightsTarget, ReportingWindow, Vcs};
use insights_metrics::{SnapshotScheduler, TickOutcome, metric_registry};

const HEALTHY: u8 = 0;
const DOWN: u8 = 1;
const RENAMED: u8 = 2;
const GARBAGE: u8 = 3;

fn record(name: &str, rate: f64) -> serde_json::Value {
    json!({ "name": name, "metrics": { "success_rate": rate, "total_runs": 20 } })
}

/// Serves three pages (2 + 2 + 1 records) while `HEALTHY`.
async fn spawn_remote(mode: Arc<AtomicU8>) -> String {
    let router = Router::new().route(
        "/insights/gh/acme/monorepo/workflows",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let mode = mode.load(Ordering::SeqCst);
            async move {
                match mode {
                    DOWN => return (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
                    GARBAGE => return "not json".into_response(),
                    RENAMED => {
                        return axum::Json(json!({
                            "next_page_token": null,
                            "items": [record("lint", 0.99), record("release", 0.5)]
                        }))
                        .into_response();
                    }
                    _ => {}
                }
                let page = match params.get("page-token").map(String::as_str) {
                    None => json!({ "next_page_token": "p2", "items": [record("build", 0.9), record("test", 0.8)] }),
                    Some("p2") => json!({ "next_page_token": "p3", "items": [record("deploy", 0.7), record("e2e", 0.6)] }),
                    _ => json!({ "next_page_token": null, "items": [record("nightly", 0.5)] }),
                };
                axum::Json(page).into_response()
            }
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

fn test_config(base_url: String) -> ExporterConfig {
    ExporterConfig {
        interval: Duration::from_secs(300),
        request_timeout: Duration::from_secs(5),
        credential: Credential::new("test-token"),
        base_url,
        target: InsightsTarget {
            vcs: Vcs::GitHub,
            org: "acme".to_string(),
            repo: "monorepo".to_string(),
            branch: "main".to_string(),
            reporting_window: ReportingWindow::Last7Days,
        },
    }
}

async fn scrape(router: &Router, path: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(path).body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn sample_names(body: &str) -> Vec<String> {
    body.lines()
        .filter(|line| !line.starts_with('#'))
        .filter_map(|line| {
            let start = line.find("name=\"")? + "name=\"".len();
            let end = start + line[start..].find('"')?;
            Some(line[start..end].to_string())
        })
        .collect()
}

#[tokio::test]
async fn paged_fetch_is_served_on_metrics() {
    let mode = Arc::new(AtomicU8::new(HEALTHY));
    let base = spawn_remote(mode.clone()).await;
    let client = InsightsClient::new(&test_config(base)).unwrap();
    let (writer, reader) = metric_registry();
    let mut scheduler = SnapshotScheduler::new(client, writer, Duration::from_secs(300));
    let router = build_router(reader, scheduler.status());

    let (_, body) = scrape(&router, "/metrics").await;
    assert!(sample_names(&body).is_empty());

    assert!(matches!(scheduler.tick().await, TickOutcome::Published { workflows: 5 }));
    let (status, body) = scrape(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        sample_names(&body),
        vec!["build", "deploy", "e2e", "nightly", "test"]
    );
    assert!(body.contains("{name=\"nightly\"} 0.5"));
}

#[tokio::test]
async fn failed_cycles_keep_serving_last_snapshot() {
    let mode = Arc::new(AtomicU8::new(HEALTHY));
    let base = spawn_remote(mode.clone()).await;
    let client = InsightsClient::new(&test_config(base)).unwrap();
    let (writer, reader) = metric_registry();
    let mut scheduler = SnapshotScheduler::new(client, writer, Duration::from_secs(300));
    let router = build_router(reader, scheduler.status());

    scheduler.tick().await;
    let (_, published) = scrape(&router, "/metrics").await;

    mode.store(DOWN, Ordering::SeqCst);
    assert!(matches!(scheduler.tick().await, TickOutcome::Retained { .. }));
    let (status, body) = scrape(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, published);

    let (status, health) = scrape(&router, "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let health: serde_json::Value = serde_json::from_str(&health).unwrap();
    assert_eq!(health["consecutive_failures"], 1);
    assert!(health["last_error"].as_str().unwrap().contains("502"));
}

#[tokio::test]
async fn recovery_replaces_names_exactly() {
    let mode = Arc::new(AtomicU8::new(HEALTHY));
    let base = spawn_remote(mode.clone()).await;
    let client = InsightsClient::new(&test_config(base)).unwrap();
    let (writer, reader) = metric_registry();
    let mut scheduler = SnapshotScheduler::new(client, writer, Duration::from_secs(300));
    let router = build_router(reader, scheduler.status());

    scheduler.tick().await;
    mode.store(DOWN, Ordering::SeqCst);
    scheduler.tick().await;
    mode.store(RENAMED, Ordering::SeqCst);
    assert!(matches!(scheduler.tick().await, TickOutcome::Published { workflows: 2 }));

    let (_, body) = scrape(&router, "/metrics").await;
    assert_eq!(sample_names(&body), vec!["lint", "release"]);
}

#[tokio::test]
async fn repeated_contract_break_marks_exporter_unhealthy() {
    let mode = Arc::new(AtomicU8::new(HEALTHY));
    let base = spawn_remote(mode.clone()).await;
    let client = InsightsClient::new(&test_config(base)).unwrap();
    let (writer, reader) = metric_registry();
    let mut scheduler = SnapshotScheduler::new(client, writer, Duration::from_secs(300));
    let router = build_router(reader, scheduler.status());

    scheduler.tick().await;
    mode.store(GARBAGE, Ordering::SeqCst);
    assert!(matches!(scheduler.tick().await, TickOutcome::Retained { .. }));
    assert!(matches!(scheduler.tick().await, TickOutcome::Escalated { .. }));

    let (status, _) = scrape(&router, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    // Scrapes still see the last good values.
    let (status, body) = scrape(&router, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(sample_names(&body).len(), 5);
}
