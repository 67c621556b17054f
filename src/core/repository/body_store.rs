// src/core/repository/body_store.rs

//! Filesystem storage for cached response bodies, rooted at the configured
//! cache directory.
//!
//! No locking: paths are deterministic per fingerprint, so concurrent
//! duplicate fetches overwrite each other with identical content.

use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct BodyStore {
    root: PathBuf,
}

impl BodyStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes a body, creating intermediate directories and overwriting any
    /// previous file at the path.
    pub async fn write(&self, path: &Path, body: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, body).await
    }

    /// Reads a body back. A missing file yields `None`, not an error; the
    /// caller treats it as a cache-consistency anomaly.
    pub async fn read(&self, path: &Path) -> std::io::Result<Option<Bytes>> {
        match fs::read(path).await {
            Ok(contents) => Ok(Some(Bytes::from(contents))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Deletes a body file. Idempotent: a missing file is success.
    pub async fn delete(&self, path: &Path) -> std::io::Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}
