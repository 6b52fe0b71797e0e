use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

use crate::model::TtlPolicy;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Redis configuration (remote cache layers)
    #[serde(default)]
    pub redis: RedisConfig,
    /// Remote layer TTLs
    #[serde(default)]
    pub cache: CacheConfig,
    /// Local flat-file fallback layer
    #[serde(default)]
    pub file_cache: FileCacheConfig,
    /// Upstream data source
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.short_ttl_secs == 0 {
            return Err("cache.short_ttl_secs must be > 0".into());
        }
        if self.cache.fallback_ttl_secs == 0 {
            return Err("cache.fallback_ttl_secs must be > 0".into());
        }
        if self.cache.short_ttl_secs > self.cache.fallback_ttl_secs {
            return Err("cache.short_ttl_secs must be <= cache.fallback_ttl_secs".into());
        }
        if self.redis.enabled {
            if self.redis.url.is_empty() {
                return Err("redis.enabled=true requires redis.url".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        if self.file_cache.directory.as_os_str().is_empty() {
            return Err("file_cache.directory must not be empty".into());
        }
        if self.origin.timeout_ms == 0 {
            return Err("origin.timeout_ms must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        Ok(())
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        TtlPolicy {
            short_term: Duration::from_secs(self.cache.short_ttl_secs),
            fallback: Duration::from_secs(self.cache.fallback_ttl_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// When disabled both remote layers report unavailable and are skipped
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379/0")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connect and command timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_redis_enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379/0".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    5000
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Short-term layer TTL in seconds
    #[serde(default = "default_short_ttl_secs")]
    pub short_ttl_secs: u64,

    /// Durable fallback layer TTL in seconds
    #[serde(default = "default_fallback_ttl_secs")]
    pub fallback_ttl_secs: u64,
}

fn default_short_ttl_secs() -> u64 {
    300 // 5 minutes
}

fn default_fallback_ttl_secs() -> u64 {
    2_592_000 // 30 days
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            short_ttl_secs: default_short_ttl_secs(),
            fallback_ttl_secs: default_fallback_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileCacheConfig {
    /// Directory holding one delimited file per dataset
    #[serde(default = "default_file_cache_directory")]
    pub directory: PathBuf,

    /// Memoize parsed files in memory
    #[serde(default = "default_memo_enabled")]
    pub memo_enabled: bool,

    /// Maximum number of memoized files (at least 1)
    #[serde(default = "default_memo_max_entries")]
    pub max_entries: usize,

    /// Memo entry TTL in seconds (at least 60)
    #[serde(default = "default_memo_ttl_secs")]
    pub ttl_secs: u64,
}

impl FileCacheConfig {
    pub const MIN_TTL_SECS: u64 = 60;

    /// Capacity with the floor of one entry applied.
    pub fn capacity(&self) -> usize {
        self.max_entries.max(1)
    }

    /// TTL with the one minute floor applied.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs.max(Self::MIN_TTL_SECS))
    }

    /// Interval between opportunistic expiry sweeps.
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs((self.ttl().as_secs() / 12).max(300))
    }
}

fn default_file_cache_directory() -> PathBuf {
    PathBuf::from("data/fallback")
}

fn default_memo_enabled() -> bool {
    true
}

fn default_memo_max_entries() -> usize {
    100
}

fn default_memo_ttl_secs() -> u64 {
    3600 // 1 hour
}

impl Default for FileCacheConfig {
    fn default() -> Self {
        Self {
            directory: default_file_cache_directory(),
            memo_enabled: default_memo_enabled(),
            max_entries: default_memo_max_entries(),
            ttl_secs: default_memo_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OriginConfig {
    /// Base URL of the upstream table pages
    #[serde(default = "default_origin_base_url")]
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_origin_timeout_ms")]
    pub timeout_ms: u64,
}

impl OriginConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn default_origin_base_url() -> String {
    "http://vitibrasil.cnpuv.embrapa.br/index.php".to_string()
}

fn default_origin_timeout_ms() -> u64 {
    30_000
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            base_url: default_origin_base_url(),
            timeout_ms: default_origin_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use crate::error::{Error, Result};
    use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
    use std::env;
    use std::path::PathBuf;

    /// Flat variables understood for compatibility with existing deployments.
    const FLAT_ALIASES: &[(&str, &str)] = &[
        ("SHORT_CACHE_TTL", "cache.short_ttl_secs"),
        ("FALLBACK_CACHE_TTL", "cache.fallback_ttl_secs"),
        ("CSV_FALLBACK_DIR", "file_cache.directory"),
        ("CSV_CACHE_MAX_SIZE", "file_cache.max_entries"),
        ("CSV_CACHE_TTL", "file_cache.ttl_secs"),
        ("REDIS_URL", "redis.url"),
    ];

    pub fn load_config(path: Option<&str>) -> Result<AppConfig> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if pathbuf.exists() {
                    builder = builder.add_source(File::from(pathbuf));
                }
            }
            None => {
                let default_path = PathBuf::from("vitis.toml");
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., VITIS__CACHE__SHORT_TTL_SECS=60
        builder = builder.add_source(
            Environment::with_prefix("VITIS")
                .try_parsing(true)
                .separator("__"),
        );
        builder = apply_flat_aliases(builder)?;
        let cfg = builder
            .build()
            .map_err(|e| Error::Config(format!("config build error: {e}")))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| Error::Config(format!("config deserialize error: {e}")))?;
        merged.validate().map_err(Error::Config)?;
        Ok(merged)
    }

    fn apply_flat_aliases(
        mut builder: ConfigBuilder<DefaultState>,
    ) -> Result<ConfigBuilder<DefaultState>> {
        for (var, key) in FLAT_ALIASES {
            let value = env::var(var).ok().filter(|v| !v.trim().is_empty());
            builder = builder
                .set_override_option(*key, value)
                .map_err(|e| Error::Config(format!("{var}: {e}")))?;
        }
        if env::var("REDIS_URL").is_err() {
            builder = builder
                .set_override_option("redis.url", redis_url_from_parts())
                .map_err(|e| Error::Config(format!("REDIS_HOST: {e}")))?;
        }
        Ok(builder)
    }

    /// Builds `redis://[:password@]host:port/db` from `REDIS_HOST` and friends.
    fn redis_url_from_parts() -> Option<String> {
        let host = env::var("REDIS_HOST").ok().filter(|h| !h.is_empty())?;
        let port = env::var("REDIS_PORT").unwrap_or_else(|_| "6379".into());
        let db = env::var("REDIS_DB").unwrap_or_else(|_| "0".into());
        let auth = env::var("REDIS_PASSWORD")
            .ok()
            .filter(|p| !p.is_empty())
            .map(|p| format!(":{p}@"))
            .unwrap_or_default();
        Some(format!("redis://{auth}{host}:{port}/{db}"))
    }
}
