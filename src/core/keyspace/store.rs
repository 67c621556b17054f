// src/core/keyspace/store.rs

//! The concurrent keyspace: a `DashMap` of typed values with millisecond
//! expirations. Expired entries are dropped lazily on access; the cache
//! sweeper is the active reaper for the metadata keyspace.

use crate::core::errors::BundleCacheError;
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Notify;
use tokio::time::Instant;
use wildmatch::WildMatch;

/// A stored value. The enum is part of the snapshot format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Str(Bytes),
    List(VecDeque<Bytes>),
    Set(HashSet<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub value: Value,
    /// Absolute expiry as epoch milliseconds; `None` means no expiry.
    pub expires_at: Option<u64>,
}

impl Entry {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at.is_some_and(|at| at <= now_ms)
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// The shared, concurrent keyspace.
#[derive(Debug, Default)]
pub struct Keyspace {
    entries: DashMap<String, Entry>,
    /// Per-list wakeups for blocking pops. `notify_one` permits close the
    /// race between a push and a waiter that has not yet parked.
    list_wakeups: DashMap<String, Arc<Notify>>,
    /// Mutation counter since the last snapshot.
    dirty: AtomicU64,
}

impl Keyspace {
    pub fn new() -> Self {
        Default::default()
    }

    fn mark_dirty(&self) {
        self.dirty.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the mutation count accumulated since the last call, resetting it.
    pub fn take_dirty(&self) -> u64 {
        self.dirty.swap(0, Ordering::Relaxed)
    }

    // --- String keys ---

    /// Writes a string key. Latest write wins; any previous value or type is
    /// replaced. A `ttl` of `None` stores the key without expiry.
    pub fn set(&self, key: &str, value: Bytes, ttl: Option<Duration>) {
        let expires_at = ttl.map(|d| now_ms() + d.as_millis() as u64);
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Str(value),
                expires_at,
            },
        );
        self.mark_dirty();
    }

    /// Reads a string key. Absent and expired keys yield `None`.
    pub fn get(&self, key: &str) -> Result<Option<Bytes>, BundleCacheError> {
        let expired = match self.entries.get(key) {
            None => return Ok(None),
            Some(entry) => {
                if entry.is_expired(now_ms()) {
                    true
                } else {
                    return match &entry.value {
                        Value::Str(b) => Ok(Some(b.clone())),
                        _ => Err(BundleCacheError::WrongType),
                    };
                }
            }
        };
        if expired {
            self.entries.remove(key);
            self.mark_dirty();
        }
        Ok(None)
    }

    /// Remaining lifetime of a key: `None` when absent or already expired,
    /// `Some(Duration::ZERO)` for keys without expiry.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        match entry.expires_at {
            None => Some(Duration::ZERO),
            Some(at) => {
                let now = now_ms();
                if at <= now {
                    None
                } else {
                    Some(Duration::from_millis(at - now))
                }
            }
        }
    }

    /// Deletes a key of any type. Returns whether a key was removed.
    pub fn del(&self, key: &str) -> bool {
        let removed = self.entries.remove(key).is_some();
        if removed {
            self.mark_dirty();
        }
        removed
    }

    /// Returns all live keys matching a glob pattern. Expired entries are
    /// excluded but left in place; the cleanup sweeper owns their removal so
    /// it can also reclaim the files they reference.
    pub fn scan(&self, pattern: &str) -> Vec<String> {
        let matcher = WildMatch::new(pattern);
        let now = now_ms();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(now) && matcher.matches(e.key()))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Returns all keys matching a glob pattern, expired entries included.
    pub fn scan_raw(&self, pattern: &str) -> Vec<String> {
        let matcher = WildMatch::new(pattern);
        self.entries
            .iter()
            .filter(|e| matcher.matches(e.key()))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Reads a string key without honoring or reaping its expiry. Used by the
    /// sweeper to recover the file path of an already-expired record.
    pub fn peek(&self, key: &str) -> Result<Option<Bytes>, BundleCacheError> {
        match self.entries.get(key) {
            None => Ok(None),
            Some(entry) => match &entry.value {
                Value::Str(b) => Ok(Some(b.clone())),
                _ => Err(BundleCacheError::WrongType),
            },
        }
    }

    /// Deletes every key matching a glob pattern. Returns the number removed.
    pub fn flush_pattern(&self, pattern: &str) -> usize {
        let keys = self.scan_raw(pattern);
        let mut removed = 0;
        for key in &keys {
            if self.del(key) {
                removed += 1;
            }
        }
        removed
    }

    // --- Lists (FIFO queues) ---

    fn wakeup_handle(&self, key: &str) -> Arc<Notify> {
        self.list_wakeups
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }

    /// Appends to the tail of the list at `key`, creating it if needed.
    pub fn rpush(&self, key: &str, item: Bytes) -> Result<usize, BundleCacheError> {
        let len = {
            let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::List(VecDeque::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::List(list) => {
                    list.push_back(item);
                    list.len()
                }
                _ => return Err(BundleCacheError::WrongType),
            }
        };
        self.mark_dirty();
        self.wakeup_handle(key).notify_one();
        Ok(len)
    }

    /// Pops the head of the list at `key`, if any.
    pub fn lpop(&self, key: &str) -> Result<Option<Bytes>, BundleCacheError> {
        let mut popped = None;
        let mut drained = false;
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.value {
                Value::List(list) => {
                    popped = list.pop_front();
                    drained = list.is_empty();
                }
                _ => return Err(BundleCacheError::WrongType),
            }
        }
        if popped.is_some() {
            self.mark_dirty();
            if drained {
                self.entries
                    .remove_if(key, |_, e| matches!(&e.value, Value::List(l) if l.is_empty()));
            }
        }
        Ok(popped)
    }

    /// Blocking head pop: waits up to `timeout` for an item to arrive.
    /// Returns `None` on timeout, which callers treat as a normal idle tick.
    pub async fn blpop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Bytes>, BundleCacheError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(item) = self.lpop(key)? {
                return Ok(Some(item));
            }
            let wakeup = self.wakeup_handle(key);
            tokio::select! {
                _ = wakeup.notified() => continue,
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }

    /// Removes the first element equal to `item` from the list at `key`.
    /// Returns the number of elements removed (0 or 1).
    pub fn lrem(&self, key: &str, item: &[u8]) -> Result<usize, BundleCacheError> {
        let mut removed = 0;
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.value {
                Value::List(list) => {
                    if let Some(pos) = list.iter().position(|e| e.as_ref() == item) {
                        list.remove(pos);
                        removed = 1;
                    }
                }
                _ => return Err(BundleCacheError::WrongType),
            }
        }
        if removed > 0 {
            self.mark_dirty();
        }
        Ok(removed)
    }

    pub fn llen(&self, key: &str) -> Result<usize, BundleCacheError> {
        match self.entries.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.value {
                Value::List(list) => Ok(list.len()),
                _ => Err(BundleCacheError::WrongType),
            },
        }
    }

    // --- Sets ---

    /// Inserts a member. Returns `true` iff it was not already present. This is
    /// the hinge of the request-deduplication contract.
    pub fn sadd(&self, key: &str, member: &str) -> Result<bool, BundleCacheError> {
        let added = {
            let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
                value: Value::Set(HashSet::new()),
                expires_at: None,
            });
            match &mut entry.value {
                Value::Set(set) => set.insert(member.to_string()),
                _ => return Err(BundleCacheError::WrongType),
            }
        };
        if added {
            self.mark_dirty();
        }
        Ok(added)
    }

    /// Removes a member. Returns `true` iff it was present.
    pub fn srem(&self, key: &str, member: &str) -> Result<bool, BundleCacheError> {
        let mut removed = false;
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.value {
                Value::Set(set) => removed = set.remove(member),
                _ => return Err(BundleCacheError::WrongType),
            }
        }
        if removed {
            self.mark_dirty();
        }
        Ok(removed)
    }

    pub fn scard(&self, key: &str) -> Result<usize, BundleCacheError> {
        match self.entries.get(key) {
            None => Ok(0),
            Some(entry) => match &entry.value {
                Value::Set(set) => Ok(set.len()),
                _ => Err(BundleCacheError::WrongType),
            },
        }
    }

    pub fn sismember(&self, key: &str, member: &str) -> Result<bool, BundleCacheError> {
        match self.entries.get(key) {
            None => Ok(false),
            Some(entry) => match &entry.value {
                Value::Set(set) => Ok(set.contains(member)),
                _ => Err(BundleCacheError::WrongType),
            },
        }
    }

    // --- Snapshot support ---

    pub(crate) fn export(&self) -> Vec<(String, Entry)> {
        let now = now_ms();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired(now))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub(crate) fn import(&self, records: Vec<(String, Entry)>) {
        let now = now_ms();
        for (key, entry) in records {
            if !entry.is_expired(now) {
                self.entries.insert(key, entry);
            }
        }
    }

    #[doc(hidden)]
    pub fn key_count(&self) -> usize {
        self.entries.len()
    }
}
