//! In-process remote store double.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{KeyTtl, RemoteStore, glob_matches};
use crate::error::{Error, Result};

struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Key-value store kept in process memory.
///
/// Honors expiry like Redis does and can be switched to an unreachable state
/// to exercise the degraded paths deterministically.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
    available: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// A store that reports unavailable on every call.
    pub fn unavailable() -> Self {
        let store = Self::new();
        store.set_available(false);
        store
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Stores a value without expiry, as a key written by another client could be.
    pub fn insert_persistent(&self, key: &str, value: Vec<u8>) {
        self.entries.lock().insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: None,
            },
        );
    }

    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|v| !v.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::CacheUnavailable("memory store switched off".into()))
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(value) if value.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(value) => Ok(Some(value.data.clone())),
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        self.ensure_available()?;
        self.entries.lock().insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.ensure_available()?;
        let now = Instant::now();
        let mut keys: Vec<String> = self
            .entries
            .lock()
            .iter()
            .filter(|(k, v)| !v.is_expired(now) && glob_matches(pattern, k))
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        self.ensure_available()?;
        let mut entries = self.entries.lock();
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count() as u64)
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.ensure_available()?;
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(match entries.get(key) {
            None => KeyTtl::Missing,
            Some(value) if value.is_expired(now) => KeyTtl::Missing,
            Some(StoredValue {
                expires_at: None, ..
            }) => KeyTtl::NoExpiry,
            Some(StoredValue {
                expires_at: Some(at),
                ..
            }) => KeyTtl::Expires(at.saturating_duration_since(now)),
        })
    }

    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
