// tests/integration/persistence_test.rs

//! Reservations and the deduplication set survive a process restart through
//! keyspace snapshots.

use bundlecache::core::keyspace::{Keyspace, snapshot};
use bundlecache::core::model::ProxyRequest;
use bundlecache::core::repository::RequestQueue;
use std::sync::Arc;
use std::time::Duration;

fn queue_on(keyspace: Arc<Keyspace>) -> RequestQueue {
    RequestQueue::new(
        keyspace,
        "bp:reserved:requests".to_string(),
        "bp:pending:requests".to_string(),
    )
}

#[tokio::test]
async fn test_reservations_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyspace.snapshot");

    // First life: reserve two fetches, snapshot, "crash".
    let keyspace = Arc::new(Keyspace::new());
    let queue = queue_on(keyspace.clone());
    assert!(queue.reserve(&ProxyRequest::new("GET", "http://a.test/1")).unwrap());
    assert!(queue.reserve(&ProxyRequest::new("GET", "http://a.test/2")).unwrap());
    snapshot::save(&keyspace, &path).await.unwrap();
    drop(queue);

    // Second life: load the snapshot and find the work still reserved.
    let restored = Arc::new(Keyspace::new());
    assert!(snapshot::load(&restored, &path).await.unwrap());
    let queue = queue_on(restored);

    assert_eq!(queue.len().unwrap(), 2);
    assert!(queue.is_pending("http://a.test/1").unwrap());
    assert!(queue.is_pending("http://a.test/2").unwrap());

    // Dedup still holds across the restart.
    assert!(!queue.reserve(&ProxyRequest::new("GET", "http://a.test/1")).unwrap());

    // The queued records decode back into the original requests.
    let record = queue
        .blocking_dequeue(Duration::from_millis(50))
        .await
        .unwrap()
        .expect("restored queue must yield its head");
    let request: ProxyRequest = serde_json::from_slice(&record).unwrap();
    assert_eq!(request.url, "http://a.test/1");
}

#[tokio::test]
async fn test_pending_leak_recovered_by_purge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keyspace.snapshot");

    // A crash between addPending and worker completion leaks the mark.
    let keyspace = Arc::new(Keyspace::new());
    let queue = queue_on(keyspace.clone());
    queue.add_pending("http://a.test/leaked").unwrap();
    snapshot::save(&keyspace, &path).await.unwrap();

    let restored = Arc::new(Keyspace::new());
    snapshot::load(&restored, &path).await.unwrap();
    let queue = queue_on(restored);

    // The leaked mark withholds retries for that URL.
    assert!(!queue.reserve(&ProxyRequest::new("GET", "http://a.test/leaked")).unwrap());

    // Admin purge is the recovery tool.
    queue.purge_all();
    assert!(queue.reserve(&ProxyRequest::new("GET", "http://a.test/leaked")).unwrap());
}
