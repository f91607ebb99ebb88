//! Integration tests for the exporter API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use exporter_lib::{
    health::{components, HealthRegistry},
    models::{DerivedMetric, MetricTag, ResourceKind},
    observability::ExporterMetrics,
    GaugePublisher,
};
use resource_exporter::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_test_app() -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register(components::QUERY_CLIENT).await;
    health_registry.register(components::CYCLE).await;

    let state = Arc::new(AppState::new(health_registry));
    let router = create_router(state.clone());

    (router, state)
}

async fn get(app: Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "healthy");
    assert!(health["components"][components::QUERY_CLIENT].is_object());
    assert!(health["components"][components::CYCLE].is_object());
}

#[tokio::test]
async fn test_healthz_returns_ok_when_backend_degraded() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_degraded(components::QUERY_CLIENT, "HTTP status 503")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::OK);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "degraded");
    assert_eq!(
        health["components"][components::QUERY_CLIENT]["message"],
        "HTTP status 503"
    );
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;

    state
        .health_registry
        .set_unhealthy(components::CYCLE, "stopped")
        .await;

    let (status, body) = get(app, "/healthz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_returns_503_before_first_cycle() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], false);
    assert!(readiness["reason"].is_string());
}

#[tokio::test]
async fn test_readyz_returns_ok_after_cycle() {
    let (app, state) = setup_test_app().await;
    state.health_registry.set_ready(true).await;

    let (status, body) = get(app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);

    let readiness: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(readiness["ready"], true);
    assert!(readiness.get("reason").is_none());
}

#[tokio::test]
async fn test_metrics_exposes_self_metrics() {
    let (app, _state) = setup_test_app().await;

    let metrics = ExporterMetrics::new();
    metrics.observe_cycle_latency(0.02);
    metrics.record_cycle_completed(2, 30);

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    assert!(text.contains("resource_exporter_cycle_latency_seconds_bucket"));
    assert!(text.contains("resource_exporter_cycles_completed_total"));
    assert!(text.contains("resource_exporter_pods_tracked"));
}

#[tokio::test]
async fn test_metrics_exposes_pod_gauges() {
    let (app, _state) = setup_test_app().await;

    let mut publisher = GaugePublisher::new();
    publisher.publish(&[
        DerivedMetric {
            kind: ResourceKind::Memory,
            tag: MetricTag::Usage,
            pod: "api-test-pod".to_string(),
            value: 190.73,
        },
        DerivedMetric {
            kind: ResourceKind::Cpu,
            tag: MetricTag::Percentage,
            pod: "api-test-pod".to_string(),
            value: 999_999.0,
        },
    ]);

    let (status, body) = get(app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);

    let text = String::from_utf8(body).unwrap();
    let sample = |family: &str, tag: &str| {
        text.lines()
            .find(|line| {
                line.starts_with(family)
                    && line.contains("pod=\"api-test-pod\"")
                    && line.contains(&format!("type=\"{}\"", tag))
            })
            .and_then(|line| line.rsplit(' ').next())
            .and_then(|value| value.parse::<f64>().ok())
    };

    assert_eq!(sample("memory_metrics{", "usage"), Some(190.73));
    assert_eq!(
        sample("cpu_metrics{", "percentage_of_usage_and_request"),
        Some(999_999.0)
    );
}

#[tokio::test]
async fn test_unknown_route_returns_404() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = get(app, "/predictions").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
