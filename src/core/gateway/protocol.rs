// src/core/gateway/protocol.rs

//! The JSON wire protocol layered over the bundle link: versioned frames with
//! an opaque request id and base64-encoded bodies.

use crate::core::errors::BundleCacheError;
use crate::core::model::{Headers, ProxyRequest, ProxyResponse};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Protocol version carried in every frame. Frames with a different version
/// are rejected by the receiver.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum serialized frame size, matching the receive buffer.
pub const MAX_BUNDLE_SIZE: usize = 4 * 1024 * 1024;

/// An outbound request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireRequest {
    pub version: u32,
    pub request_id: String,
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: Headers,
    /// Base64-encoded request body.
    #[serde(default)]
    pub body: String,
}

impl WireRequest {
    pub fn new(request_id: impl Into<String>, request: &ProxyRequest) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            request_id: request_id.into(),
            method: request.method.clone(),
            url: request.url.clone(),
            headers: request.headers.clone(),
            body: BASE64.encode(&request.body),
        }
    }

    /// Serializes the frame, enforcing the bundle size ceiling.
    pub fn encode(&self) -> Result<Vec<u8>, BundleCacheError> {
        let encoded = serde_json::to_vec(self)?;
        if encoded.len() > MAX_BUNDLE_SIZE {
            return Err(BundleCacheError::BundleTooLarge {
                size: encoded.len(),
                max: MAX_BUNDLE_SIZE,
            });
        }
        Ok(encoded)
    }

    /// Rebuilds the proxied request carried by this frame. Exercised by the
    /// remote end of the link; here it backs loopback peers and tests.
    pub fn into_request(self) -> Result<ProxyRequest, BundleCacheError> {
        let body = Bytes::from(BASE64.decode(self.body.as_bytes())?);
        let content_type = crate::core::model::header_value(&self.headers, "Content-Type")
            .unwrap_or_default()
            .to_string();
        let content_length = body.len() as i64;
        Ok(ProxyRequest {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body,
            content_type,
            content_length,
        })
    }
}

/// An inbound response frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireResponse {
    pub version: u32,
    pub request_id: String,
    pub status_code: u16,
    #[serde(default)]
    pub headers: Headers,
    /// Base64-encoded response body.
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub content_type: String,
    #[serde(default)]
    pub content_length: i64,
}

impl WireResponse {
    /// Builds a response frame; the inverse of [`WireResponse::into_response`].
    pub fn from_response(request_id: impl Into<String>, response: &ProxyResponse) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            request_id: request_id.into(),
            status_code: response.status_code,
            headers: response.headers.clone(),
            body: BASE64.encode(&response.body),
            content_type: response.content_type.clone(),
            content_length: response.content_length,
        }
    }

    pub fn decode(raw: &[u8]) -> Result<Self, BundleCacheError> {
        Ok(serde_json::from_slice(raw)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, BundleCacheError> {
        let encoded = serde_json::to_vec(self)?;
        if encoded.len() > MAX_BUNDLE_SIZE {
            return Err(BundleCacheError::BundleTooLarge {
                size: encoded.len(),
                max: MAX_BUNDLE_SIZE,
            });
        }
        Ok(encoded)
    }

    /// Converts the frame into the model response, decoding the body.
    pub fn into_response(self) -> Result<ProxyResponse, BundleCacheError> {
        let body = Bytes::from(BASE64.decode(self.body.as_bytes())?);
        let content_length = if self.content_length != 0 {
            self.content_length
        } else {
            body.len() as i64
        };
        Ok(ProxyResponse {
            status_code: self.status_code,
            headers: self.headers,
            body,
            content_type: self.content_type,
            content_length,
        })
    }
}

/// Mints an opaque request id: 16 hex characters from the system CSPRNG,
/// falling back to the nanosecond clock if entropy is unavailable.
pub fn mint_request_id() -> String {
    let mut raw = [0u8; 8];
    match getrandom::fill(&mut raw) {
        Ok(()) => hex::encode(raw),
        Err(_) => {
            let nanos = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos() as u64;
            format!("{nanos:016x}")
        }
    }
}
