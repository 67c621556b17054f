// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests.

use async_trait::async_trait;
use bundlecache::config::Config;
use bundlecache::core::errors::BundleCacheError;
use bundlecache::core::gateway::BundleGateway;
use bundlecache::core::keyspace::Keyspace;
use bundlecache::core::model::{ProxyRequest, ProxyResponse};
use bundlecache::core::state::ProxyState;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// A scripted gateway: `proxy_request` records the request and pops the next
/// scripted result; with nothing scripted it behaves like a dead link.
#[derive(Debug, Default)]
pub struct MockGateway {
    scripted: Mutex<VecDeque<Result<ProxyResponse, BundleCacheError>>>,
    requests: Mutex<Vec<ProxyRequest>>,
}

impl MockGateway {
    pub fn script_response(&self, response: ProxyResponse) {
        self.scripted.lock().unwrap().push_back(Ok(response));
    }

    #[allow(dead_code)]
    pub fn script_error(&self, error: BundleCacheError) {
        self.scripted.lock().unwrap().push_back(Err(error));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    #[allow(dead_code)]
    pub fn requests(&self) -> Vec<ProxyRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl BundleGateway for MockGateway {
    async fn proxy_request(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, BundleCacheError> {
        self.requests.lock().unwrap().push(request.clone());
        self.scripted
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(BundleCacheError::Timeout))
    }

    async fn run_receiver(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        let _ = shutdown_rx.recv().await;
    }
}

/// TestContext provides a complete test environment with a real keyspace,
/// a temp-dir cache, and a scripted gateway.
pub struct TestContext {
    pub state: Arc<ProxyState>,
    pub gateway: Arc<MockGateway>,
    pub shutdown_tx: broadcast::Sender<()>,
    _data_dir: TempDir,
}

impl TestContext {
    /// Creates a new test context with test-friendly timings.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Creates a new test context, letting the caller tweak the configuration.
    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let data_dir = tempfile::tempdir().expect("failed to create temp dir");

        let mut config = Config::default();
        config.cache.dir = data_dir.path().join("cache").to_string_lossy().into_owned();
        config.keyspace.snapshot_path = data_dir
            .path()
            .join("keyspace.snapshot")
            .to_string_lossy()
            .into_owned();
        config.placeholder.dir = data_dir.path().join("pages").to_string_lossy().into_owned();
        config.worker.workers = 2;
        config.worker.queue_watch_timeout = Duration::from_millis(50);
        config.cache.cleanup_interval = Duration::from_millis(100);
        tweak(&mut config);
        config.validate().expect("test config must be valid");

        tokio::fs::create_dir_all(&config.cache.dir)
            .await
            .expect("failed to create cache dir");

        let keyspace = Arc::new(Keyspace::new());
        let gateway = Arc::new(MockGateway::default());
        let state = ProxyState::initialize(config, keyspace, gateway.clone());
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            state,
            gateway,
            shutdown_tx,
            _data_dir: data_dir,
        }
    }

    pub fn cache_dir(&self) -> &str {
        &self.state.config.cache.dir
    }
}

/// Polls an async condition until it holds or the timeout elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Counts regular files under a directory, recursively.
pub fn count_files(dir: &std::path::Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    let mut count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            count += count_files(&path);
        } else {
            count += 1;
        }
    }
    count
}
