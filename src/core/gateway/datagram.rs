// src/core/gateway/datagram.rs

//! The datagram gateway: request/response correlation over an opaque
//! `send/recv` peer, with a single receiver loop demultiplexing frames and a
//! bounded reconnect path for peers that support it.

use super::correlation::{PendingGuard, PendingTable};
use super::protocol::{MAX_BUNDLE_SIZE, PROTOCOL_VERSION, WireRequest, WireResponse, mint_request_id};
use super::{BundleGateway, UNSOLICITED_CHANNEL_CAPACITY};
use crate::core::errors::BundleCacheError;
use crate::core::metrics;
use crate::core::model::{ProxyRequest, ProxyResponse};
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{RwLock, broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Consecutive receive failures tolerated before attempting a reconnect.
const RECONNECT_ERROR_THRESHOLD: u32 = 3;
/// Reconnect attempts before the receiver loop gives up.
const RECONNECT_MAX_ATTEMPTS: u32 = 3;
/// Initial reconnect backoff; doubles per attempt.
const RECONNECT_INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// An opaque datagram peer on the bundle layer. The bundle protocol itself
/// lives behind this seam; the gateway only sends and receives byte frames.
#[async_trait]
pub trait BundlePeer: Send + Sync + std::fmt::Debug {
    async fn send(&self, payload: &[u8]) -> Result<(), BundleCacheError>;

    /// Receives one frame into `buf`, returning its length and a label for
    /// the sending peer.
    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, String), BundleCacheError>;

    fn supports_reconnect(&self) -> bool {
        false
    }

    async fn reconnect(&self) -> Result<(), BundleCacheError> {
        Err(BundleCacheError::GatewayError(
            "peer does not support reconnection".into(),
        ))
    }
}

/// A UDP-backed [`BundlePeer`] for local bring-up and testing against a
/// bundle-layer agent reachable over a datagram socket.
#[derive(Debug)]
pub struct UdpBundlePeer {
    socket: RwLock<UdpSocket>,
    bind_addr: SocketAddr,
    peer_addr: SocketAddr,
}

impl UdpBundlePeer {
    pub async fn bind(bind_addr: &str, peer_addr: &str) -> Result<Self, BundleCacheError> {
        let bind_addr: SocketAddr = bind_addr
            .parse()
            .map_err(|e| BundleCacheError::GatewayError(format!("invalid bind address: {e}")))?;
        let peer_addr: SocketAddr = peer_addr
            .parse()
            .map_err(|e| BundleCacheError::GatewayError(format!("invalid peer address: {e}")))?;
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(peer_addr).await?;
        info!("Datagram peer bound: {} -> {}", bind_addr, peer_addr);
        Ok(Self {
            socket: RwLock::new(socket),
            bind_addr,
            peer_addr,
        })
    }
}

#[async_trait]
impl BundlePeer for UdpBundlePeer {
    async fn send(&self, payload: &[u8]) -> Result<(), BundleCacheError> {
        self.socket.read().await.send(payload).await?;
        Ok(())
    }

    async fn recv(&self, buf: &mut [u8]) -> Result<(usize, String), BundleCacheError> {
        let n = self.socket.read().await.recv(buf).await?;
        Ok((n, self.peer_addr.to_string()))
    }

    fn supports_reconnect(&self) -> bool {
        true
    }

    async fn reconnect(&self) -> Result<(), BundleCacheError> {
        let socket = UdpSocket::bind(self.bind_addr).await?;
        socket.connect(self.peer_addr).await?;
        *self.socket.write().await = socket;
        Ok(())
    }
}

/// Correlated request/response over a [`BundlePeer`].
#[derive(Debug)]
pub struct DatagramGateway {
    peer: Arc<dyn BundlePeer>,
    timeout: Duration,
    pending: PendingTable,
    unsolicited_tx: mpsc::Sender<ProxyResponse>,
}

impl DatagramGateway {
    pub fn new(
        peer: Arc<dyn BundlePeer>,
        timeout: Duration,
    ) -> (Arc<Self>, mpsc::Receiver<ProxyResponse>) {
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(UNSOLICITED_CHANNEL_CAPACITY);
        (
            Arc::new(Self {
                peer,
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
        let frame = WireRequest::new(request_id, request).encode()?;
        debug!(
            "Sending bundle: id={}, size={} bytes",
            request_id,
            frame.len()
        );
        self.peer.send(&frame).await?;
        metrics::BUNDLES_SENT_TOTAL.inc();
        Ok(())
    }

    /// Routes one decoded frame: to its correlator, or onto the bounded
    /// unsolicited channel (overflow drops the frame).
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

    async fn reconnect_with_backoff(
        &self,
        shutdown_rx: &mut broadcast::Receiver<()>,
    ) -> Result<(), BundleCacheError> {
        let mut backoff = RECONNECT_INITIAL_BACKOFF;
        for attempt in 1..=RECONNECT_MAX_ATTEMPTS {
            match self.peer.reconnect().await {
                Ok(()) => {
                    info!("Peer reconnect successful (attempt {})", attempt);
                    return Ok(());
                }
                Err(e) => {
                    warn!(
                        "Peer reconnect attempt {}/{} failed: {}",
                        attempt, RECONNECT_MAX_ATTEMPTS, e
                    );
                }
            }
            if attempt < RECONNECT_MAX_ATTEMPTS {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = shutdown_rx.recv() => {
                        return Err(BundleCacheError::Timeout);
                    }
                }
                backoff *= 2;
            }
        }
        Err(BundleCacheError::GatewayError(
            "reconnect attempts exhausted".into(),
        ))
    }

    fn handle_frame(&self, raw: &[u8], from: &str) {
        if raw.len() >= MAX_BUNDLE_SIZE {
            warn!(
                "Received {} bytes from {} (buffer limit), possible truncation",
                raw.len(),
                from
            );
        }
        let frame = match WireResponse::decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Undecodable frame from {}: {}", from, e);
                return;
            }
        };
        if frame.version != PROTOCOL_VERSION {
            warn!(
                "Protocol version mismatch from {}: got {}, expected {}",
                from, frame.version, PROTOCOL_VERSION
            );
            return;
        }
        metrics::BUNDLES_RECEIVED_TOTAL.inc();
        self.dispatch(frame);
    }
}

#[async_trait]
impl BundleGateway for DatagramGateway {
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
            // Sender dropped without delivering; treat like an expiry.
            Ok(Err(_)) => Err(BundleCacheError::Timeout),
            Err(_) => Err(BundleCacheError::Timeout),
        }
    }

    async fn run_receiver(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) {
        info!("Datagram receiver loop started.");
        let mut buf = vec![0u8; MAX_BUNDLE_SIZE];
        let mut consecutive_errors: u32 = 0;

        loop {
            let received = tokio::select! {
                r = self.peer.recv(&mut buf) => r,
                _ = shutdown_rx.recv() => {
                    info!("Datagram receiver loop shutting down.");
                    return;
                }
            };

            match received {
                Ok((n, from)) => {
                    consecutive_errors = 0;
                    self.handle_frame(&buf[..n], &from);
                }
                Err(e) => {
                    consecutive_errors += 1;
                    warn!("Receive error ({}): {}", consecutive_errors, e);

                    if consecutive_errors >= RECONNECT_ERROR_THRESHOLD
                        && self.peer.supports_reconnect()
                    {
                        match self.reconnect_with_backoff(&mut shutdown_rx).await {
                            Ok(()) => consecutive_errors = 0,
                            Err(e) => {
                                error!("Reconnect failed, stopping receiver loop: {}", e);
                                return;
                            }
                        }
                    } else {
                        let pause = Duration::from_secs(consecutive_errors as u64);
                        tokio::select! {
                            _ = tokio::time::sleep(pause) => {}
                            _ = shutdown_rx.recv() => return,
                        }
                    }
                }
            }
        }
    }
}
