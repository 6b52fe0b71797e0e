//! Cache orchestrator: key derivation, TTL policy and per-layer access.
//!
//! ## Layers
//!
//! | Layer           | Backing             | TTL                  |
//! |-----------------|---------------------|----------------------|
//! | `short_term`    | remote store        | `cache.short_ttl_secs` (300s)     |
//! | `fallback`      | remote store        | `cache.fallback_ttl_secs` (30d)   |
//! | `file_fallback` | local flat files    | indefinite           |
//!
//! Every remote call is fallible; errors are logged with their class and
//! surface to the pipeline as a failed stage, never as a panic.

pub mod enrich;
pub mod key;
pub mod stats;

use std::str::FromStr;
use std::sync::Arc;

use time::OffsetDateTime;

use crate::error::{Error, Result};
use crate::file_cache::{FileCache, MappingReport};
use crate::model::{CacheEntry, Layer, RequestParams, TableData, TtlPolicy, TtlRemaining};
use crate::store::{DynStore, KeyTtl};

pub use self::key::CacheKey;

/// Characters with a meaning in `KEYS` patterns.
const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '\\'];
pub use self::stats::{
    CacheStatistics, FileLayerStats, Health, LayerCounters, LayerStatistics, OverallStatus,
    RemoteLayerStats,
};

/// Which remote layers `clear_cache` empties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearScope {
    Short,
    Fallback,
    All,
}

impl ClearScope {
    pub fn layers(&self) -> &'static [Layer] {
        match self {
            ClearScope::Short => &[Layer::ShortTerm],
            ClearScope::Fallback => &[Layer::Fallback],
            ClearScope::All => &[Layer::ShortTerm, Layer::Fallback],
        }
    }
}

impl FromStr for ClearScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(ClearScope::Short),
            "fallback" => Ok(ClearScope::Fallback),
            "all" => Ok(ClearScope::All),
            other => Err(format!(
                "unknown cache scope '{other}', expected short, fallback or all"
            )),
        }
    }
}

pub struct CacheOrchestrator {
    store: DynStore,
    files: Arc<FileCache>,
    ttl: TtlPolicy,
    short_term: LayerCounters,
    fallback: LayerCounters,
    file_fallback: LayerCounters,
}

impl CacheOrchestrator {
    pub fn new(store: DynStore, files: Arc<FileCache>, ttl: TtlPolicy) -> Self {
        Self {
            store,
            files,
            ttl,
            short_term: LayerCounters::default(),
            fallback: LayerCounters::default(),
            file_fallback: LayerCounters::default(),
        }
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    pub fn files(&self) -> &FileCache {
        &self.files
    }

    pub fn ttl_policy(&self) -> TtlPolicy {
        self.ttl
    }

    pub fn counters(&self, layer: Layer) -> Option<&LayerCounters> {
        match layer {
            Layer::ShortTerm => Some(&self.short_term),
            Layer::Fallback => Some(&self.fallback),
            Layer::FileFallback => Some(&self.file_fallback),
            Layer::Fresh => None,
        }
    }

    fn record(&self, layer: Layer, hit: bool) {
        if let Some(counters) = self.counters(layer) {
            if hit {
                counters.record_hit();
            } else {
                counters.record_miss();
            }
        }
    }

    /// Look up `(endpoint, params)` in one layer.
    ///
    /// Remote layers decode the stored [`CacheEntry`]. The file layer resolves
    /// and parses the mapped file; a table without body or footer rows counts
    /// as a miss. `Fresh` is never cached and always misses.
    pub async fn get(
        &self,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
    ) -> Result<Option<CacheEntry>> {
        let result = match layer {
            Layer::ShortTerm | Layer::Fallback => self.get_remote(layer, endpoint, params).await,
            Layer::FileFallback => self.get_file(endpoint, params).await,
            Layer::Fresh => Ok(None),
        };
        self.record(layer, matches!(result, Ok(Some(_))));
        result
    }

    async fn get_remote(
        &self,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
    ) -> Result<Option<CacheEntry>> {
        let Some(key) = CacheKey::derive(layer, endpoint, params) else {
            return Ok(None);
        };
        let Some(raw) = self.store.get(key.as_str()).await? else {
            tracing::debug!(endpoint, layer = %layer, key = %key, "Cache miss");
            return Ok(None);
        };
        let entry: CacheEntry = serde_json::from_slice(&raw)?;
        tracing::debug!(
            endpoint,
            layer = %layer,
            key = %key,
            age_secs = entry.age().whole_seconds(),
            "Cache hit"
        );
        Ok(Some(entry))
    }

    /// File reads and parsing run on the blocking pool.
    async fn get_file(&self, endpoint: &str, params: &RequestParams) -> Result<Option<CacheEntry>> {
        let files = Arc::clone(&self.files);
        let owned_endpoint = endpoint.to_string();
        let sub_option = params.sub_option().map(str::to_string);
        let table = tokio::task::spawn_blocking(move || {
            files.data_for_endpoint(&owned_endpoint, sub_option.as_deref())
        })
        .await
        .map_err(|e| Error::FileParse(format!("file layer task failed: {e}")))??;
        if table.has_no_rows() {
            tracing::warn!(endpoint, "Fallback file has no data rows");
            return Ok(None);
        }
        Ok(Some(CacheEntry {
            payload: TableData::clone(&table),
            stored_at: OffsetDateTime::now_utc(),
            origin_layer: Layer::FileFallback,
        }))
    }

    /// Store `payload` in a remote layer with that layer's TTL. Layers that
    /// are not stored remotely are left untouched.
    pub async fn set(
        &self,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
        payload: &TableData,
    ) -> Result<()> {
        let (Some(key), Some(ttl)) = (
            CacheKey::derive(layer, endpoint, params),
            self.ttl.for_layer(layer),
        ) else {
            return Ok(());
        };
        let entry = CacheEntry::new(payload.clone(), Layer::Fresh);
        let raw = serde_json::to_vec(&entry)?;
        self.store.set_ex(key.as_str(), raw, ttl).await?;
        tracing::debug!(endpoint, layer = %layer, key = %key, ttl_secs = ttl.as_secs(), "Cached payload");
        Ok(())
    }

    /// Remaining TTL of the `(endpoint, params)` entry in a remote layer.
    pub async fn ttl_remaining(
        &self,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
    ) -> Result<TtlRemaining> {
        let Some(key) = CacheKey::derive(layer, endpoint, params) else {
            return Ok(TtlRemaining::Absent);
        };
        Ok(match self.store.ttl(key.as_str()).await? {
            KeyTtl::Expires(left) => TtlRemaining::Seconds(left.as_secs()),
            KeyTtl::NoExpiry => TtlRemaining::NoExpiry,
            KeyTtl::Missing => TtlRemaining::Absent,
        })
    }

    pub fn validate_file_mappings(&self) -> MappingReport {
        self.files.validate_mappings()
    }

    /// Delete remote entries, for one endpoint or all of them.
    ///
    /// Fails with [`Error::InvalidEndpoint`] when the endpoint holds glob
    /// characters and with [`Error::CacheUnavailable`] when the store is
    /// unreachable.
    pub async fn clear_cache(&self, endpoint: Option<&str>, scope: ClearScope) -> Result<u64> {
        if let Some(endpoint) = endpoint {
            if endpoint.contains(GLOB_CHARS) {
                return Err(Error::InvalidEndpoint(format!(
                    "'{endpoint}' contains key pattern characters"
                )));
            }
        }
        if !self.store.is_available().await {
            tracing::warn!("Remote store not available for cache clearing");
            return Err(Error::CacheUnavailable(
                "remote store not available for cache clearing".into(),
            ));
        }

        let mut cleared = 0;
        for layer in scope.layers() {
            let Some(pattern) = CacheKey::pattern(*layer, endpoint) else {
                continue;
            };
            let keys = self.store.keys(&pattern).await?;
            if !keys.is_empty() {
                cleared += self.store.delete(&keys).await?;
            }
        }
        tracing::info!(cleared, ?endpoint, ?scope, "Cleared cache entries");
        Ok(cleared)
    }

    /// Drop every memoized file parse.
    pub fn clear_file_memo(&self) -> usize {
        self.files.clear_memo()
    }

    pub async fn statistics(&self) -> CacheStatistics {
        let available = self.store.is_available().await;
        let short_term = self.remote_layer_stats(Layer::ShortTerm, available).await;
        let fallback = self.remote_layer_stats(Layer::Fallback, available).await;

        let report = self.files.validate_mappings();
        let file_fallback = FileLayerStats {
            active: report.overall_status.is_usable(),
            description: Layer::FileFallback.description(),
            directory: report.directory,
            mapping_status: report.overall_status,
            missing_files: report.missing_files,
            memo: self.files.memo_stats(),
            hits: self.file_fallback.hits(),
            misses: self.file_fallback.misses(),
        };

        let active_layers = [short_term.active, fallback.active, file_fallback.active]
            .iter()
            .filter(|active| **active)
            .count();

        CacheStatistics {
            timestamp: OffsetDateTime::now_utc(),
            backend: self.store.backend(),
            store_available: available,
            layers: LayerStatistics {
                short_term,
                fallback,
                file_fallback,
            },
            overall: OverallStatus {
                active_layers,
                total_layers: 3,
                health: Health::from_active_layers(active_layers),
            },
        }
    }

    async fn remote_layer_stats(&self, layer: Layer, available: bool) -> RemoteLayerStats {
        let entries = match (available, CacheKey::pattern(layer, None)) {
            (true, Some(pattern)) => match self.store.keys(&pattern).await {
                Ok(keys) => Some(keys.len()),
                Err(e) => {
                    tracing::warn!(layer = %layer, error = %e, "Failed to count cache entries");
                    None
                }
            },
            _ => None,
        };
        let counters = self.counters(layer);
        RemoteLayerStats {
            active: available,
            description: layer.description(),
            entries,
            ttl_seconds: self.ttl.for_layer(layer).map_or(0, |d| d.as_secs()),
            hits: counters.map_or(0, |c| c.hits()),
            misses: counters.map_or(0, |c| c.misses()),
        }
    }
}
