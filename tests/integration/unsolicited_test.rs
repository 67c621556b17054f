// tests/integration/unsolicited_test.rs

//! The late-response path: responses with no waiting correlator are cached
//! via the response watcher, keyed by their X-Original-URL header.

use super::test_helpers::{TestContext, eventually};
use bundlecache::core::model::{ProxyRequest, ProxyResponse};
use bundlecache::core::tasks::response_watcher::{ORIGINAL_URL_HEADER, ResponseWatcher};
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

fn unsolicited_response(url: &str, status: u16, body: &'static [u8]) -> ProxyResponse {
    let mut response = ProxyResponse::new(status, Bytes::from_static(body), "text/html");
    response
        .headers
        .insert(ORIGINAL_URL_HEADER.to_string(), vec![url.to_string()]);
    response
}

#[tokio::test]
async fn test_unsolicited_response_is_cached() {
    let ctx = TestContext::new().await;
    let (tx, rx) = mpsc::channel(8);
    let watcher = tokio::spawn(
        ResponseWatcher::new(ctx.state.clone()).run(rx, ctx.shutdown_tx.subscribe()),
    );

    tx.send(unsolicited_response("http://a.test/u", 200, b"U"))
        .await
        .unwrap();

    let state = ctx.state.clone();
    let cached = eventually(Duration::from_secs(2), || {
        let state = state.clone();
        async move {
            let probe = ProxyRequest::new("GET", "http://a.test/u");
            matches!(
                state.repository.lookup(&probe).await,
                Ok(Some(ref r)) if r.body == Bytes::from_static(b"U")
            )
        }
    })
    .await;
    assert!(cached, "unsolicited response was not cached");

    // A client request for the URL now hits.
    let probe = ProxyRequest::new("GET", "http://a.test/u");
    let response = ctx.state.service.handle(&probe).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body, Bytes::from_static(b"U"));

    let _ = ctx.shutdown_tx.send(());
    let _ = watcher.await;
}

#[tokio::test]
async fn test_unsolicited_without_url_header_is_dropped() {
    let ctx = TestContext::new().await;
    let (tx, rx) = mpsc::channel(8);
    let watcher = tokio::spawn(
        ResponseWatcher::new(ctx.state.clone()).run(rx, ctx.shutdown_tx.subscribe()),
    );

    let headerless = ProxyResponse::new(200, Bytes::from_static(b"X"), "text/html");
    tx.send(headerless).await.unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert!(ctx.state.keyspace.scan("bp:cache:meta:*").is_empty());

    let _ = ctx.shutdown_tx.send(());
    let _ = watcher.await;
}

#[tokio::test]
async fn test_unsolicited_non_200_clears_pending_without_caching() {
    let ctx = TestContext::new().await;
    ctx.state.queue.add_pending("http://a.test/err").unwrap();

    let (tx, rx) = mpsc::channel(8);
    let watcher = tokio::spawn(
        ResponseWatcher::new(ctx.state.clone()).run(rx, ctx.shutdown_tx.subscribe()),
    );

    tx.send(unsolicited_response("http://a.test/err", 502, b"bad"))
        .await
        .unwrap();

    let state = ctx.state.clone();
    let cleared = eventually(Duration::from_secs(2), || {
        let state = state.clone();
        async move { !state.queue.is_pending("http://a.test/err").unwrap() }
    })
    .await;
    assert!(cleared, "pending mark was not cleared");
    assert!(ctx.state.keyspace.scan("bp:cache:meta:*").is_empty());

    let _ = ctx.shutdown_tx.send(());
    let _ = watcher.await;
}

#[tokio::test]
async fn test_unsolicited_insertion_clears_pending() {
    let ctx = TestContext::new().await;
    // Simulate a reservation whose synchronous caller already timed out.
    ctx.state.queue.add_pending("http://a.test/late").unwrap();

    let (tx, rx) = mpsc::channel(8);
    let watcher = tokio::spawn(
        ResponseWatcher::new(ctx.state.clone()).run(rx, ctx.shutdown_tx.subscribe()),
    );

    tx.send(unsolicited_response("http://a.test/late", 200, b"LATE"))
        .await
        .unwrap();

    let state = ctx.state.clone();
    let settled = eventually(Duration::from_secs(2), || {
        let state = state.clone();
        async move {
            let probe = ProxyRequest::new("GET", "http://a.test/late");
            let cached = matches!(state.repository.lookup(&probe).await, Ok(Some(_)));
            cached && !state.queue.is_pending("http://a.test/late").unwrap()
        }
    })
    .await;
    assert!(settled, "late response must cache and clear pending");

    let _ = ctx.shutdown_tx.send(());
    let _ = watcher.await;
}
