use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use tower::ServiceExt;
use world_probe::publish::write_snapshot;
use world_probe::registry::DisabledGroup;
use world_probe::scanner::disabled_placeholder;
use world_probe::server::router;
use world_probe::types::FleetSnapshot;

fn snapshot() -> FleetSnapshot {
    FleetSnapshot {
        groups: vec![disabled_placeholder(&DisabledGroup {
            id: "polaris".into(),
            display_name: "Polaris".into(),
            icon: "P".into(),
        })],
        generated_at: "2026-01-01T00:00:00.000Z".into(),
        probe_interval_seconds: 60,
    }
}

#[tokio::test]
async fn serves_published_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server-status.json");
    write_snapshot(&path, &snapshot()).unwrap();

    let resp = router(path)
        .oneshot(
            Request::builder()
                .uri("/server-status.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CACHE_CONTROL], "no-cache");
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let back: FleetSnapshot = serde_json::from_slice(&body).unwrap();
    assert_eq!(back, snapshot());
}

#[tokio::test]
async fn health_reports_totals() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("server-status.json");
    write_snapshot(&path, &snapshot()).unwrap();

    let resp = router(path)
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let v: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(v["lastChecked"], "2026-01-01T00:00:00.000Z");
    assert_eq!(v["probeInterval"], 60);
    assert_eq!(v["worlds"], 1);
    assert_eq!(v["channelsTotal"], 0);
}

#[tokio::test]
async fn health_unavailable_without_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let resp = router(dir.path().join("missing.json"))
        .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}
