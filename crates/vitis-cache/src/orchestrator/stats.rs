//! Hit/miss accounting and the aggregated statistics report.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use time::OffsetDateTime;

use crate::file_cache::{MappingStatus, MemoStats};

/// Lock-free hit/miss counters for one layer.
#[derive(Debug, Default)]
pub struct LayerCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl LayerCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Hit rate in `[0.0, 1.0]`, zero before the first lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits();
        let total = hits + self.misses();
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Overall health from the number of active layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Health {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Health {
    pub fn from_active_layers(active: usize) -> Self {
        match active {
            3.. => Health::Excellent,
            2 => Health::Good,
            1 => Health::Fair,
            _ => Health::Poor,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Health::Excellent => "excellent",
            Health::Good => "good",
            Health::Fair => "fair",
            Health::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteLayerStats {
    pub active: bool,
    pub description: &'static str,
    /// `None` when the store could not be queried
    pub entries: Option<usize>,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileLayerStats {
    pub active: bool,
    pub description: &'static str,
    pub directory: PathBuf,
    pub mapping_status: MappingStatus,
    pub missing_files: Vec<String>,
    pub memo: MemoStats,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LayerStatistics {
    pub short_term: RemoteLayerStats,
    pub fallback: RemoteLayerStats,
    pub file_fallback: FileLayerStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverallStatus {
    pub active_layers: usize,
    pub total_layers: usize,
    pub health: Health,
}

/// Snapshot returned by [`CacheOrchestrator::statistics`](super::CacheOrchestrator::statistics).
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatistics {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub backend: &'static str,
    pub store_available: bool,
    pub layers: LayerStatistics,
    pub overall: OverallStatus,
}

impl CacheStatistics {
    /// Remote entries across both layers, when both could be counted.
    pub fn total_remote_entries(&self) -> Option<usize> {
        Some(self.layers.short_term.entries? + self.layers.fallback.entries?)
    }
}
