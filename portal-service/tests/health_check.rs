mod common;

use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/health", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let payload: serde_json::Value = response.json().await.expect("Failed to parse body");
    assert_eq!(payload["status"], "ok");
    assert_eq!(payload["service"], "portal-service");
}

#[tokio::test]
async fn readiness_check_works() {
    let app = TestApp::spawn().await;

    let response = app
        .client
        .get(format!("{}/ready", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}

#[tokio::test]
async fn metrics_endpoint_exposes_request_counters() {
    let app = TestApp::spawn().await;

    // The health poll during startup already produced request samples.
    let response = app
        .client
        .get(format!("{}/metrics", app.address))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    let body = response.text().await.expect("Failed to read body");
    assert!(body.contains("http_requests_total"));
}
