// tests/integration/http_test.rs

//! The HTTP surface end to end: a real listener, the proxy fallback route,
//! and the admin purge endpoint.

use super::test_helpers::TestContext;
use bundlecache::core::model::{ProxyRequest, ProxyResponse};
use bundlecache::server::router;
use bytes::Bytes;
use std::net::SocketAddr;
use std::time::Duration;

async fn spawn_server(ctx: &TestContext) -> SocketAddr {
    let app = router(ctx.state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_missing_url_parameter_is_400() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    let response = reqwest::get(format!("http://{addr}/")).await.unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "bad_request");
    assert!(body["message"].as_str().unwrap().contains("url parameter"));
}

#[tokio::test]
async fn test_invalid_url_parameter_is_400() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    let response = reqwest::get(format!("http://{addr}/?url=%20not%20a%20url"))
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_miss_serves_placeholder_with_no_store() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    let response = reqwest::get(format!("http://{addr}/?url=http://a.test/x"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response
            .headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-store, no-cache, must-revalidate")
    );
    let body = response.text().await.unwrap();
    assert!(body.contains("<html"));

    assert_eq!(ctx.state.queue.len().unwrap(), 1);
}

#[tokio::test]
async fn test_hit_serves_cached_content() {
    let ctx = TestContext::new().await;
    let seeded_request = ProxyRequest::new("GET", "http://a.test/y");
    let seeded = ProxyResponse::new(200, Bytes::from_static(b"Y"), "text/html");
    ctx.state
        .repository
        .store(&seeded_request, &seeded, Duration::from_secs(3600))
        .await
        .unwrap();
    let addr = spawn_server(&ctx).await;

    let response = reqwest::get(format!("http://{addr}/?url=http://a.test/y"))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "Y");
}

#[tokio::test]
async fn test_uncacheable_transport_failure_is_502() {
    let ctx = TestContext::new().await;
    let addr = spawn_server(&ctx).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/?url=http://a.test/p"))
        .body("{\"x\":1}")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "proxy_failed");
}

#[tokio::test]
async fn test_admin_purge_endpoint() {
    let ctx = TestContext::new().await;
    let seeded_request = ProxyRequest::new("GET", "http://a.test/purge-me");
    let seeded = ProxyResponse::new(200, Bytes::from_static(b"data"), "text/html");
    ctx.state
        .repository
        .store(&seeded_request, &seeded, Duration::from_secs(3600))
        .await
        .unwrap();
    let addr = spawn_server(&ctx).await;

    let client = reqwest::Client::new();
    let response = client
        .post(format!("http://{addr}/system/admin/cache/cleanup"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["purged_records"], 1);

    assert!(ctx.state.keyspace.scan_raw("bp:cache:meta:*").is_empty());
}
