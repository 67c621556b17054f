// tests/integration/cleanup_test.rs

//! Expiry sweeping and the admin purge: expired records disappear together
//! with their body files.

use super::test_helpers::{TestContext, count_files, eventually};
use bundlecache::core::model::{ProxyRequest, ProxyResponse};
use bundlecache::core::tasks::cleanup::CacheSweeperTask;
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;

async fn seed_entries(ctx: &TestContext, count: usize, ttl: Duration) {
    for i in 0..count {
        let request = ProxyRequest::new("GET", format!("http://a.test/page-{i}"));
        let response = ProxyResponse::new(200, Bytes::from_static(b"body"), "text/html");
        ctx.state.repository.store(&request, &response, ttl).await.unwrap();
    }
}

#[tokio::test]
async fn test_sweep_removes_expired_records_and_files() {
    let ctx = TestContext::new().await;
    seed_entries(&ctx, 200, Duration::from_millis(50)).await;
    assert_eq!(ctx.state.keyspace.scan_raw("bp:cache:meta:*").len(), 200);
    assert!(count_files(Path::new(ctx.cache_dir())) > 0);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let sweeper = tokio::spawn(
        CacheSweeperTask::new(ctx.state.clone()).run(ctx.shutdown_tx.subscribe()),
    );

    let state = ctx.state.clone();
    let swept = eventually(Duration::from_secs(3), || {
        let state = state.clone();
        async move { state.keyspace.scan_raw("bp:cache:meta:*").is_empty() }
    })
    .await;
    assert!(swept, "sweeper did not reclaim expired records");
    assert_eq!(count_files(Path::new(ctx.cache_dir())), 0);

    // A fresh scan confirms nothing expired remains.
    assert!(ctx.state.repository.scan_expired().await.unwrap().is_empty());

    let _ = ctx.shutdown_tx.send(());
    let _ = sweeper.await;
}

#[tokio::test]
async fn test_sweep_keeps_live_records() {
    let ctx = TestContext::new().await;
    seed_entries(&ctx, 5, Duration::from_secs(3600)).await;

    let sweeper = tokio::spawn(
        CacheSweeperTask::new(ctx.state.clone()).run(ctx.shutdown_tx.subscribe()),
    );
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert_eq!(ctx.state.keyspace.scan("bp:cache:meta:*").len(), 5);
    assert!(count_files(Path::new(ctx.cache_dir())) >= 5);

    let _ = ctx.shutdown_tx.send(());
    let _ = sweeper.await;
}

#[tokio::test]
async fn test_scan_expired_honors_decoded_expiry() {
    let ctx = TestContext::new().await;
    seed_entries(&ctx, 3, Duration::from_millis(40)).await;
    seed_entries_live(&ctx).await;

    tokio::time::sleep(Duration::from_millis(90)).await;

    let expired = ctx.state.repository.scan_expired().await.unwrap();
    assert_eq!(expired.len(), 3);
    for item in &expired {
        assert!(item.key.starts_with("bp:cache:meta:"));
        assert!(!item.file_path.is_empty());
    }
}

async fn seed_entries_live(ctx: &TestContext) {
    let request = ProxyRequest::new("GET", "http://a.test/live");
    let response = ProxyResponse::new(200, Bytes::from_static(b"live"), "text/html");
    ctx.state
        .repository
        .store(&request, &response, Duration::from_secs(3600))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_admin_purge_empties_everything() {
    let ctx = TestContext::new().await;
    seed_entries(&ctx, 10, Duration::from_secs(3600)).await;
    let reservation = ProxyRequest::new("GET", "http://a.test/reserved");
    ctx.state.queue.reserve(&reservation).unwrap();

    let removed = ctx.state.purge_all().await;
    assert_eq!(removed, 10);

    assert!(ctx.state.keyspace.scan_raw("bp:cache:meta:*").is_empty());
    assert!(ctx.state.queue.is_empty().unwrap());
    assert_eq!(ctx.state.queue.pending_count().unwrap(), 0);
    assert_eq!(count_files(Path::new(ctx.cache_dir())), 0);

    // Traffic continues normally after a purge.
    let response = ctx.state.service.handle(&reservation).await.unwrap();
    assert_eq!(response.status_code, 200);
    assert_eq!(ctx.state.queue.len().unwrap(), 1);
}
