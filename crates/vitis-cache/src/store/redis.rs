//! Redis-backed remote store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;

use super::{KeyTtl, RemoteStore};
use crate::config::RedisConfig;
use crate::error::{Error, Result};

/// Pooled Redis connection holder.
///
/// Pool wait/create/recycle and each command are bounded by the configured
/// timeout so a stalled server cannot block the retrieval pipeline.
#[derive(Clone)]
pub struct RedisStore {
    pool: Pool,
    timeout: Duration,
}

impl RedisStore {
    pub fn new(pool: Pool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    pub fn from_config(config: &RedisConfig) -> Result<Self> {
        let timeout = config.timeout();
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);

        let mut redis_config = deadpool_redis::Config::from_url(&config.url);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(deadpool_redis::Runtime::Tokio1))
            .map_err(|e| Error::CacheUnavailable(format!("pool creation failed: {e}")))?;
        Ok(Self::new(pool, timeout))
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::CacheUnavailable(format!("no Redis connection: {e}")))
    }

    async fn bounded<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(Error::CacheUnavailable(format!(
                "Redis {op} timed out after {}ms",
                self.timeout.as_millis()
            ))),
        }
    }
}

#[async_trait]
impl RemoteStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.bounded("GET", async {
            let mut conn = self.connection().await?;
            Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
        })
        .await
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let secs = ttl.as_secs().max(1);
        self.bounded("SETEX", async {
            let mut conn = self.connection().await?;
            conn.set_ex::<_, _, ()>(key, value, secs).await?;
            Ok(())
        })
        .await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        self.bounded("KEYS", async {
            let mut conn = self.connection().await?;
            Ok(conn.keys::<_, Vec<String>>(pattern).await?)
        })
        .await
    }

    async fn delete(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.bounded("DEL", async {
            let mut conn = self.connection().await?;
            Ok(conn.del::<_, u64>(keys).await?)
        })
        .await
    }

    async fn ttl(&self, key: &str) -> Result<KeyTtl> {
        self.bounded("TTL", async {
            let mut conn = self.connection().await?;
            let reply: i64 = conn.ttl(key).await?;
            Ok(KeyTtl::from_redis_reply(reply))
        })
        .await
    }

    async fn is_available(&self) -> bool {
        let ping = self
            .bounded("PING", async {
                let mut conn = self.connection().await?;
                let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
                Ok(pong)
            })
            .await;
        match ping {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Redis availability check failed");
                false
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
