//! Resilient three-tier cache for Vitis tabular data.
//!
//! Retrieval walks a fixed cascade:
//!
//! 1. **short_term**: remote store, minutes-scale TTL
//! 2. **fresh**: the origin fetch supplied by the caller
//! 3. **fallback**: remote store, days-scale TTL
//! 4. **file_fallback**: local delimited files, memoized in process
//!
//! Callers get data plus an honest provenance label, or an explicit
//! [`Retrieval::Unavailable`] when every layer failed.

pub mod clock;
pub mod config;
pub mod error;
pub mod file_cache;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod origin;
pub mod pipeline;
pub mod store;

use std::sync::Arc;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::AppConfig;
pub use error::{Error, FetchFailure, OriginError, Result};
pub use file_cache::{FileCache, MappingReport, MappingStatus};
pub use model::{EnrichedPayload, Layer, RequestParams, TableData};
pub use orchestrator::{CacheOrchestrator, CacheStatistics, ClearScope};
pub use origin::OriginClient;
pub use pipeline::{JsonRecordParser, RecordParser, Retrieval, RetrievalPipeline};
pub use store::{DynStore, MemoryStore, RedisStore, RemoteStore, connect_store};

/// Wire the orchestrator from configuration.
///
/// ## Graceful Degradation
///
/// An unreachable or disabled Redis does not fail construction: the remote
/// layers report unavailable and retrieval falls through to the file layer.
/// Only an unusable fallback directory is fatal.
pub async fn build_orchestrator(config: &AppConfig) -> Result<Arc<CacheOrchestrator>> {
    let store = connect_store(&config.redis).await;
    let files = FileCache::new(&config.file_cache, Arc::new(SystemClock))?;
    Ok(Arc::new(CacheOrchestrator::new(
        store,
        Arc::new(files),
        config.ttl_policy(),
    )))
}

/// Orchestrator plus pipeline with the configured origin timeout.
pub async fn build_pipeline(config: &AppConfig) -> Result<RetrievalPipeline> {
    let orchestrator = build_orchestrator(config).await?;
    Ok(RetrievalPipeline::new(orchestrator, config.origin.timeout()))
}
