// src/core/gateway/ion_cli.rs

//! Gateway strategy that drives an ION bundle agent through its CLI tools:
//! requests go out via `bpsendfile`, responses come back via `bprecvfile`.

use super::correlation::{PendingGuard, PendingTable};
use super::protocol::{PROTOCOL_VERSION, WireRequest, WireResponse, mint_request_id};
use super::{BundleGateway, UNSOLICITED_CHANNEL_CAPACITY};
use crate::config::IonCliConfig;
use crate::core::errors::BundleCacheError;
use crate::core::metrics;
use crate::core::model::{ProxyRequest, ProxyResponse};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// File name `bprecvfile` writes its first received bundle to.
const RECEIVE_FILE: &str = "testfile1";

#[derive(Debug)]
pub struct IonCliGateway {
    config: IonCliConfig,
    timeout: Duration,
    pending: PendingTable,
    unsolicited_tx: mpsc::Sender<ProxyResponse>,
}

impl IonCliGateway {
    pub fn new(
        config: IonCliConfig,
        timeout: Duration,
    ) -> (Arc<Self>, mpsc::Receiver<ProxyResponse>) {
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(UNSOLICITED_CHANNEL_CAPACITY);
        (
            Arc::new(Self {
                config,
                timeout,
                pending: PendingTable::new(),
                unsolicited_tx,
            }),
            unsolicited_rx,
        )
    }

    async fn send_bundle(
        &self,
        request_id: &str,
        request: &ProxyRequest,
    ) -> Result<(), BundleCacheError> {
        let request_dir = PathBuf::from(&self.config.request_dir);
        tokio::fs::create_dir_all(&request_dir).await?;

        let file_path = request_dir.join(format!("req_{request_id}.json"));
        let frame = WireRequest::new(request_id, request).encode()?;
        tokio::fs::write(&file_path, &frame).await?;
        debug!(
            "Created bundle file: {} (id: {})",
            file_path.display(),
            request_id
        );

        let output = Command::new("bpsendfile")
            .arg(&self.config.source_eid)
            .arg(&self.config.dest_eid)
            .arg(&file_path)
            .output()
            .await?;
        if !output.status.success() {
            return Err(BundleCacheError::GatewayError(format!(
                "bpsendfile failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }
        metrics::BUNDLES_SENT_TOTAL.inc();
        Ok(())
    }

    fn dispatch(&self, frame: WireResponse) {
        let Some(unsolicited) = self.pending.dispatch(frame) else {
            return;
        };
        debug!("Unsolicited response: id={}", unsolicited.request_id);
        match unsolicited.into_response() {
            Ok(response) => {
                if self.unsolicited_tx.try_send(response).is_err() {
                    warn!("Unsolicited channel full, dropping response");
                }
            }
            Err(e) => warn!("Failed to convert unsolicited response: {}", e),
        }
    }

    /// One `bprecvfile` round: wait for a bundle, read and dispatch it.
    async fn receive_once(&self) -> Result<(), BundleCacheError> {
        // Stale file from an interrupted previous round.
        let _ = tokio::fs::remove_file(RECEIVE_FILE).await;

        debug!("Waiting for response at {}...", self.config.recv_eid);
        let status = Command::new("bprecvfile")
            .arg(&self.config.recv_eid)
            .arg("1")
            .status()
            .await?;
        if !status.success() {
            return Err(BundleCacheError::GatewayError(format!(
                "bprecvfile exited with {status}"
            )));
        }

        let raw = match tokio::fs::read(RECEIVE_FILE).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("bprecvfile produced no file");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };
        let _ = tokio::fs::remove_file(RECEIVE_FILE).await;

        let frame = match WireResponse::decode(&raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Undecodable bundle file: {}", e);
                return Ok(());
            }
        };
        if frame.version != PROTOCOL_VERSION {
            warn!(
                "Protocol version mismatch: got {}, expected {}",
                frame.version, PROTOCOL_VERSION
            );
            return Ok(());
        }
        metrics::BUNDLES_RECEIVED_TOTAL.inc();
        self.dispatch(frame);
        Ok(())
    }
}

#[async_trait]
impl BundleGateway for IonCliGateway {
    async fn proxy_request(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, BundleCacheError> {
        let request_id = mint_request_id();
        let response_rx = self.pending.register(&request_id);
        let _guard = PendingGuard::new(&self.pending, &request_id);

        self.send_bundle(&request_id, request).await?;

        match tokio::time::timeout(self.timeout, response_rx).await {
            Ok(Ok(frame)) => frame.into_response(),
            Ok(Err(_)) => Err(BundleCacheError::Timeout),
            Err(_) => Err(BundleCacheError::Timeout),
        }
    }

    async fn run_receiver(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("ION CLI receiver loop started.");
        loop {
            tokio::select! {
                result = self.receive_once() => {
                    if let Err(e) = result {
                        warn!("bprecvfile round failed: {}", e);
                        tokio::select! {
                            _ = tokio::time::sleep(Duration::from_secs(1)) => {}
                            _ = shutdown_rx.recv() => return,
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("ION CLI receiver loop shutting down.");
                    return;
                }
            }
        }
    }
}
