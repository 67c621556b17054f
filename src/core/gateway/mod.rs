// src/core/gateway/mod.rs

//! The DTN transport: a correlated request/response protocol over an opaque
//! datagram peer, with solicited/unsolicited demultiplexing.
//!
//! Three strategies share the wire protocol and correlator machinery:
//! a datagram gateway over a pluggable [`BundlePeer`], an ION CLI gateway
//! shelling out to `bpsendfile`/`bprecvfile`, and a local HTTP gateway for
//! debugging without a bundle link.

pub mod correlation;
pub mod datagram;
pub mod ion_cli;
pub mod local;
pub mod protocol;

pub use correlation::{PendingGuard, PendingTable};
pub use datagram::{BundlePeer, DatagramGateway, UdpBundlePeer};
pub use ion_cli::IonCliGateway;
pub use local::LocalHttpGateway;
pub use protocol::{MAX_BUNDLE_SIZE, PROTOCOL_VERSION, WireRequest, WireResponse};

use crate::config::{Config, TransportMode};
use crate::core::errors::BundleCacheError;
use crate::core::model::{ProxyRequest, ProxyResponse};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

/// Capacity of the bounded unsolicited-response channel; overflow drops.
pub const UNSOLICITED_CHANNEL_CAPACITY: usize = 100;

/// A transport able to carry a request across the DTN link and return its
/// correlated response.
#[async_trait]
pub trait BundleGateway: Send + Sync + std::fmt::Debug {
    /// Sends the request and awaits the correlated response, up to the
    /// per-request timeout. The late response of a timed-out call arrives on
    /// the unsolicited channel instead, so the round trip is not wasted.
    async fn proxy_request(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, BundleCacheError>;

    /// Runs the receiver loop for the lifetime of the transport. Gateways
    /// without an inbound side return immediately.
    async fn run_receiver(self: Arc<Self>, shutdown_rx: broadcast::Receiver<()>);
}

/// Constructs the configured gateway strategy, returning it together with the
/// unsolicited-response channel the response watcher drains.
pub async fn build(
    config: &Config,
) -> Result<(Arc<dyn BundleGateway>, mpsc::Receiver<ProxyResponse>), BundleCacheError> {
    let timeout = config.gateway.timeout;
    match config.gateway.mode {
        TransportMode::BpSocket => {
            let peer = UdpBundlePeer::bind(
                &config.gateway.datagram.bind_addr,
                &config.gateway.datagram.peer_addr,
            )
            .await?;
            let (gateway, unsolicited_rx) = DatagramGateway::new(Arc::new(peer), timeout);
            Ok((gateway, unsolicited_rx))
        }
        TransportMode::IonCli => {
            let (gateway, unsolicited_rx) = IonCliGateway::new(
                config.gateway.ion.clone(),
                timeout,
            );
            Ok((gateway, unsolicited_rx))
        }
        TransportMode::LocalHttp => {
            let (gateway, unsolicited_rx) = LocalHttpGateway::new(timeout)?;
            Ok((gateway, unsolicited_rx))
        }
    }
}
