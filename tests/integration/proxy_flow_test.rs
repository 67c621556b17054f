// tests/integration/proxy_flow_test.rs

//! End-to-end flows through the request service: cold miss, hot hit,
//! deduplicated bursts, worker-driven cache population, and uncacheable
//! passthrough.

use super::test_helpers::{TestContext, eventually};
use bundlecache::core::errors::BundleCacheError;
use bundlecache::core::model::{ProxyRequest, ProxyResponse};
use bundlecache::core::tasks::worker_pool::WorkerPool;
use bytes::Bytes;
use std::time::Duration;

#[tokio::test]
async fn test_cold_miss_returns_placeholder_and_reserves() {
    let ctx = TestContext::new().await;
    let request = ProxyRequest::new("GET", "http://a.test/x");

    let response = ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.header("Cache-Control"),
        Some("no-store, no-cache, must-revalidate")
    );
    assert!(response.content_type.starts_with("text/html"));

    assert_eq!(ctx.state.queue.len().unwrap(), 1);
    assert!(ctx.state.queue.is_pending("http://a.test/x").unwrap());
    // Nothing crossed the link synchronously.
    assert_eq!(ctx.gateway.request_count(), 0);
}

#[tokio::test]
async fn test_cold_miss_late_response_populates_cache() {
    let ctx = TestContext::new().await;
    ctx.gateway
        .script_response(ProxyResponse::new(200, Bytes::from_static(b"HELLO"), "text/html"));

    let request = ProxyRequest::new("GET", "http://a.test/x");
    let placeholder = ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(placeholder.header("Cache-Control"), Some("no-store, no-cache, must-revalidate"));
    assert_eq!(ctx.state.queue.len().unwrap(), 1);

    // Start the fetch pipeline; the worker drives the reservation through
    // the gateway and into the cache.
    let pool = tokio::spawn(WorkerPool::new(ctx.state.clone()).run(ctx.shutdown_tx.subscribe()));

    let state = ctx.state.clone();
    let cached = eventually(Duration::from_secs(3), || {
        let state = state.clone();
        let request = request.clone();
        async move {
            matches!(
                state.repository.lookup(&request).await,
                Ok(Some(ref r)) if r.body == Bytes::from_static(b"HELLO")
            )
        }
    })
    .await;
    assert!(cached, "worker did not populate the cache in time");

    // A second client request now hits.
    let second = ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(second.status_code, 200);
    assert_eq!(second.body, Bytes::from_static(b"HELLO"));

    // Reservation fully cleared.
    assert!(ctx.state.queue.is_empty().unwrap());
    assert!(!ctx.state.queue.is_pending("http://a.test/x").unwrap());

    let _ = ctx.shutdown_tx.send(());
    let _ = pool.await;
}

#[tokio::test]
async fn test_hot_hit_serves_without_queue_or_gateway() {
    let ctx = TestContext::new().await;
    let request = ProxyRequest::new("GET", "http://a.test/y");
    let seeded = ProxyResponse::new(200, Bytes::from_static(b"Y"), "text/html");
    ctx.state
        .repository
        .store(&request, &seeded, Duration::from_secs(3600))
        .await
        .unwrap();

    let response = ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, Bytes::from_static(b"Y"));

    assert!(ctx.state.queue.is_empty().unwrap());
    assert_eq!(ctx.state.queue.pending_count().unwrap(), 0);
    assert_eq!(ctx.gateway.request_count(), 0);
}

#[tokio::test]
async fn test_expired_record_reads_as_miss() {
    let ctx = TestContext::new().await;
    let request = ProxyRequest::new("GET", "http://a.test/stale");
    let seeded = ProxyResponse::new(200, Bytes::from_static(b"OLD"), "text/html");
    ctx.state
        .repository
        .store(&request, &seeded, Duration::from_millis(30))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(80)).await;

    let response = ctx.state.service.handle(&request).await.unwrap();
    // Miss path: placeholder plus a fresh reservation.
    assert_eq!(response.header("Cache-Control"), Some("no-store, no-cache, must-revalidate"));
    assert_eq!(ctx.state.queue.len().unwrap(), 1);
}

#[tokio::test]
async fn test_dedup_under_burst() {
    let ctx = TestContext::new().await;

    let mut clients = Vec::new();
    for _ in 0..100 {
        let state = ctx.state.clone();
        clients.push(tokio::spawn(async move {
            let request = ProxyRequest::new("GET", "http://a.test/z");
            state.service.handle(&request).await.unwrap()
        }));
    }

    for client in clients {
        let response = client.await.unwrap();
        assert_eq!(response.status_code, 200);
        assert_eq!(
            response.header("Cache-Control"),
            Some("no-store, no-cache, must-revalidate")
        );
    }

    assert_eq!(ctx.state.queue.len().unwrap(), 1);
    assert_eq!(ctx.state.queue.pending_count().unwrap(), 1);
    assert!(ctx.state.queue.is_pending("http://a.test/z").unwrap());
}

#[tokio::test]
async fn test_uncacheable_passthrough() {
    let ctx = TestContext::new().await;
    let mut forwarded = ProxyResponse::new(201, Bytes::from_static(b"created"), "application/json");
    forwarded
        .headers
        .insert("X-Upstream".to_string(), vec!["yes".to_string()]);
    ctx.gateway.script_response(forwarded);

    let mut request = ProxyRequest::new("POST", "http://a.test/p");
    request.body = Bytes::from_static(b"{\"x\":1}");
    request.content_type = "application/json".to_string();

    let response = ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(response.status_code, 201);
    assert_eq!(response.body, Bytes::from_static(b"created"));

    // The POST went straight across the link; nothing was stored or queued.
    assert_eq!(ctx.gateway.request_count(), 1);
    assert!(ctx.state.queue.is_empty().unwrap());
    assert!(ctx.state.keyspace.scan("bp:cache:meta:*").is_empty());
}

#[tokio::test]
async fn test_uncacheable_transport_error_surfaces() {
    let ctx = TestContext::new().await;
    // Nothing scripted: the link behaves as down.
    let request = ProxyRequest::new("POST", "http://a.test/p");

    let err = ctx.state.service.handle(&request).await.unwrap_err();
    assert!(matches!(err, BundleCacheError::Timeout));
    assert!(ctx.state.queue.is_empty().unwrap());
}

#[tokio::test]
async fn test_worker_drops_non_200_and_clears_reservation() {
    let ctx = TestContext::new().await;
    ctx.gateway
        .script_response(ProxyResponse::new(404, Bytes::from_static(b"nope"), "text/html"));

    let request = ProxyRequest::new("GET", "http://a.test/missing");
    ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(ctx.state.queue.len().unwrap(), 1);

    let pool = tokio::spawn(WorkerPool::new(ctx.state.clone()).run(ctx.shutdown_tx.subscribe()));

    let state = ctx.state.clone();
    let cleared = eventually(Duration::from_secs(3), || {
        let state = state.clone();
        async move {
            state.queue.is_empty().unwrap() && !state.queue.is_pending("http://a.test/missing").unwrap()
        }
    })
    .await;
    assert!(cleared, "reservation was not cleared");

    // Nothing cached for the 404.
    assert!(ctx.state.repository.lookup(&request).await.unwrap().is_none());
    // The URL can be reserved again by the next client.
    ctx.state.service.handle(&request).await.unwrap();
    assert_eq!(ctx.state.queue.len().unwrap(), 1);

    let _ = ctx.shutdown_tx.send(());
    let _ = pool.await;
}

#[tokio::test]
async fn test_worker_fetch_error_clears_reservation() {
    let ctx = TestContext::new().await;
    ctx.gateway.script_error(BundleCacheError::Timeout);

    let request = ProxyRequest::new("GET", "http://a.test/flaky");
    ctx.state.service.handle(&request).await.unwrap();

    let pool = tokio::spawn(WorkerPool::new(ctx.state.clone()).run(ctx.shutdown_tx.subscribe()));

    let state = ctx.state.clone();
    let cleared = eventually(Duration::from_secs(3), || {
        let state = state.clone();
        async move {
            state.queue.is_empty().unwrap() && !state.queue.is_pending("http://a.test/flaky").unwrap()
        }
    })
    .await;
    assert!(cleared, "failed fetch must still clear the reservation");

    let _ = ctx.shutdown_tx.send(());
    let _ = pool.await;
}
