//! Remote key-value store behind the two remote cache layers.
//!
//! The orchestrator receives the store as an explicit `Arc<dyn RemoteStore>`
//! so tests can swap in [`MemoryStore`] and simulate an unreachable backend.
//!
//! ## Graceful Degradation
//!
//! Every operation is bounded by a timeout and reports failures as
//! [`Error::CacheUnavailable`](crate::Error::CacheUnavailable). Callers treat
//! those as a layer miss.

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RedisConfig;
use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Expiry metadata of a stored key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Expires(Duration),
    NoExpiry,
    Missing,
}

impl KeyTtl {
    /// Interprets the integer reply of the Redis `TTL` command.
    pub fn from_redis_reply(reply: i64) -> Self {
        match reply {
            -1 => KeyTtl::NoExpiry,
            secs if secs >= 0 => KeyTtl::Expires(Duration::from_secs(secs as u64)),
            _ => KeyTtl::Missing,
        }
    }
}

#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Keys matching a glob pattern (`*` wildcard).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;

    /// Deletes the given keys, returning how many existed.
    async fn delete(&self, keys: &[String]) -> Result<u64>;

    async fn ttl(&self, key: &str) -> Result<KeyTtl>;

    /// Liveness check; never errors.
    async fn is_available(&self) -> bool;

    /// Backend name for statistics and logs.
    fn backend(&self) -> &'static str;
}

pub type DynStore = Arc<dyn RemoteStore>;

/// Build the configured remote store.
///
/// Falls back to an unavailable in-memory store when Redis is disabled or the
/// pool cannot be created, so the remote layers are skipped instead of
/// pretending to work.
pub async fn connect_store(config: &RedisConfig) -> DynStore {
    if !config.enabled {
        tracing::info!("Redis disabled, remote cache layers will report unavailable");
        return Arc::new(MemoryStore::unavailable());
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    match RedisStore::from_config(config) {
        Ok(store) => {
            if store.is_available().await {
                tracing::info!("Connected to Redis");
            } else {
                tracing::warn!(
                    url = %config.url,
                    "Redis not reachable at startup; layers will recover when it comes back"
                );
            }
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool, remote cache layers disabled");
            Arc::new(MemoryStore::unavailable())
        }
    }
}

/// Glob matching for the `*` wildcard used by `KEYS` patterns.
pub(crate) fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }
    let mut rest = candidate;
    for (i, part) in parts.iter().enumerate() {
        if i == 0 {
            match rest.strip_prefix(part) {
                Some(r) => rest = r,
                None => return false,
            }
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}
