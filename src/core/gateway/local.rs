// src/core/gateway/local.rs

//! Debug gateway that forwards requests straight to their origin over HTTP.
//! Used for development without a bundle link; there is no inbound side, so
//! the unsolicited channel simply never fires.

use super::{BundleGateway, UNSOLICITED_CHANNEL_CAPACITY};
use crate::core::errors::BundleCacheError;
use crate::core::model::{Headers, ProxyRequest, ProxyResponse};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

#[derive(Debug)]
pub struct LocalHttpGateway {
    client: reqwest::Client,
    /// Kept alive so the watcher's receiver stays open.
    _unsolicited_tx: mpsc::Sender<ProxyResponse>,
}

impl LocalHttpGateway {
    pub fn new(
        timeout: Duration,
    ) -> Result<(Arc<Self>, mpsc::Receiver<ProxyResponse>), BundleCacheError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let (unsolicited_tx, unsolicited_rx) = mpsc::channel(UNSOLICITED_CHANNEL_CAPACITY);
        Ok((
            Arc::new(Self {
                client,
                _unsolicited_tx: unsolicited_tx,
            }),
            unsolicited_rx,
        ))
    }
}

#[async_trait]
impl BundleGateway for LocalHttpGateway {
    async fn proxy_request(
        &self,
        request: &ProxyRequest,
    ) -> Result<ProxyResponse, BundleCacheError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|e| BundleCacheError::InvalidRequest(format!("bad method: {e}")))?;

        let mut builder = self
            .client
            .request(method, &request.url)
            .body(request.body.clone());
        for (name, values) in &request.headers {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let upstream = builder.send().await?;
        let status_code = upstream.status().as_u16();

        let mut headers = Headers::new();
        for (name, value) in upstream.headers() {
            if let Ok(value) = value.to_str() {
                headers
                    .entry(name.to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }
        let content_type = upstream
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        let body = Bytes::from(upstream.bytes().await?);
        let content_length = body.len() as i64;

        Ok(ProxyResponse {
            status_code,
            headers,
            body,
            content_type,
            content_length,
        })
    }

    async fn run_receiver(self: Arc<Self>, _shutdown_rx: broadcast::Receiver<()>) {
        debug!("Local HTTP gateway has no receiver loop.");
    }
}
