// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the proxy.
/// Using `thiserror` allows for clean error definitions and automatic `From`
/// trait implementations.
#[derive(Error, Debug)]
pub enum BundleCacheError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL host is empty")]
    EmptyHost,

    #[error("HTTP client error: {0}")]
    HttpClientError(String),

    #[error("Bundle size {size} exceeds maximum {max}")]
    BundleTooLarge { size: usize, max: usize },

    #[error("Request timed out or was cancelled")]
    Timeout,

    #[error("Gateway error: {0}")]
    GatewayError(String),

    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Snapshot error: {0}")]
    SnapshotError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// Manual implementation of Clone because `std::io::Error` is not cloneable.
// We wrap it in an Arc to allow for cheap, shared cloning.
impl Clone for BundleCacheError {
    fn clone(&self) -> Self {
        match self {
            BundleCacheError::Io(e) => BundleCacheError::Io(Arc::clone(e)),
            BundleCacheError::Serialization(s) => BundleCacheError::Serialization(s.clone()),
            BundleCacheError::InvalidUrl(s) => BundleCacheError::InvalidUrl(s.clone()),
            BundleCacheError::EmptyHost => BundleCacheError::EmptyHost,
            BundleCacheError::HttpClientError(s) => BundleCacheError::HttpClientError(s.clone()),
            BundleCacheError::BundleTooLarge { size, max } => BundleCacheError::BundleTooLarge {
                size: *size,
                max: *max,
            },
            BundleCacheError::Timeout => BundleCacheError::Timeout,
            BundleCacheError::GatewayError(s) => BundleCacheError::GatewayError(s.clone()),
            BundleCacheError::WrongType => BundleCacheError::WrongType,
            BundleCacheError::InvalidRequest(s) => BundleCacheError::InvalidRequest(s.clone()),
            BundleCacheError::SnapshotError(s) => BundleCacheError::SnapshotError(s.clone()),
            BundleCacheError::Internal(s) => BundleCacheError::Internal(s.clone()),
        }
    }
}

// --- From trait implementations for easy error conversion ---

impl From<std::io::Error> for BundleCacheError {
    fn from(e: std::io::Error) -> Self {
        BundleCacheError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for BundleCacheError {
    fn from(e: serde_json::Error) -> Self {
        BundleCacheError::Serialization(e.to_string())
    }
}

impl From<url::ParseError> for BundleCacheError {
    fn from(e: url::ParseError) -> Self {
        BundleCacheError::InvalidUrl(e.to_string())
    }
}

impl From<reqwest::Error> for BundleCacheError {
    fn from(e: reqwest::Error) -> Self {
        BundleCacheError::HttpClientError(e.to_string())
    }
}

impl From<base64::DecodeError> for BundleCacheError {
    fn from(e: base64::DecodeError) -> Self {
        BundleCacheError::Serialization(format!("base64 decode failed: {e}"))
    }
}

impl From<bincode::error::EncodeError> for BundleCacheError {
    fn from(e: bincode::error::EncodeError) -> Self {
        BundleCacheError::SnapshotError(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for BundleCacheError {
    fn from(e: bincode::error::DecodeError) -> Self {
        BundleCacheError::SnapshotError(e.to_string())
    }
}
