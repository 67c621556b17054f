// src/core/keyspace/snapshot.rs

//! Whole-keyspace snapshots, bincode-encoded and written atomically via a
//! temp file and rename. Loading skips entries that expired while the
//! process was down.

use super::store::{Entry, Keyspace};
use crate::core::errors::BundleCacheError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Format marker so incompatible snapshot layouts fail loudly instead of
/// decoding garbage.
const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct KeyspaceSnapshot {
    version: u32,
    records: Vec<(String, Entry)>,
}

/// Serializes the keyspace and writes it to `path`, atomically.
pub async fn save(keyspace: &Keyspace, path: &Path) -> Result<(), BundleCacheError> {
    let snapshot = KeyspaceSnapshot {
        version: SNAPSHOT_FORMAT_VERSION,
        records: keyspace.export(),
    };
    let encoded = bincode::serde::encode_to_vec(&snapshot, bincode::config::standard())?;

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("tmp");
    tokio::fs::write(&tmp_path, &encoded).await?;
    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

/// Loads a snapshot into the keyspace. Returns `false` when no snapshot file
/// exists, which is a normal first start.
pub async fn load(keyspace: &Keyspace, path: &Path) -> Result<bool, BundleCacheError> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    let (snapshot, _): (KeyspaceSnapshot, usize) =
        bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
    if snapshot.version != SNAPSHOT_FORMAT_VERSION {
        return Err(BundleCacheError::SnapshotError(format!(
            "unsupported snapshot format version {}",
            snapshot.version
        )));
    }

    let count = snapshot.records.len();
    keyspace.import(snapshot.records);
    info!("Loaded keyspace snapshot with {} records.", count);
    Ok(true)
}
