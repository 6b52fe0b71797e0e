//! Bounded in-process memo of parsed files.
//!
//! Entries are keyed by path and versioned by the file modification time.
//! Expiry uses the injected [`Clock`] so it can be tested without sleeping.
//! Least-recently-accessed order is tracked with a sequence number bumped on
//! every hit, which stays unambiguous when the clock does not move.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use parking_lot::Mutex;
use serde::Serialize;

use crate::clock::Clock;

/// Utilization above which `optimize` evicts by LRU.
const OPTIMIZE_THRESHOLD: f64 = 0.8;
/// Share of capacity freed by `optimize`.
const OPTIMIZE_FREE_SHARE: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct MemoEntry<V> {
    pub path: PathBuf,
    pub modified: SystemTime,
    pub data: Arc<V>,
    pub cached_at: Instant,
    pub last_access: Instant,
    pub access_count: u64,
    seq: u64,
}

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
    invalidations: u64,
    inserts: u64,
}

struct MemoState<V> {
    entries: HashMap<PathBuf, MemoEntry<V>>,
    seq: u64,
    last_sweep: Instant,
    counters: Counters,
}

impl<V> MemoState<V> {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn purge_expired(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, e| now.saturating_duration_since(e.cached_at) < ttl);
        let removed = before - self.entries.len();
        self.counters.expired += removed as u64;
        self.last_sweep = now;
        removed
    }

    fn evict_lru(&mut self, count: usize) -> usize {
        let mut order: Vec<(u64, PathBuf)> = self
            .entries
            .iter()
            .map(|(path, e)| (e.seq, path.clone()))
            .collect();
        order.sort_unstable_by_key(|(seq, _)| *seq);

        let mut evicted = 0;
        for (_, path) in order.into_iter().take(count) {
            if self.entries.remove(&path).is_some() {
                tracing::debug!(path = %path.display(), "Evicted least recently used memo entry");
                evicted += 1;
            }
        }
        self.counters.evictions += evicted as u64;
        evicted
    }
}

/// Outcome of a manual [`FileMemo::optimize`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OptimizeReport {
    pub initial_size: usize,
    pub final_size: usize,
    pub expired_cleaned: usize,
    pub lru_evicted: usize,
}

impl OptimizeReport {
    pub fn total_freed(&self) -> usize {
        self.initial_size - self.final_size
    }
}

/// Point-in-time memo statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemoStats {
    pub enabled: bool,
    pub size: usize,
    pub capacity: usize,
    pub ttl_seconds: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_entries: u64,
    pub invalidations: u64,
    pub total_files_cached: u64,
    /// Percentage of lookups served from the memo
    pub hit_rate_percent: f64,
    pub utilization_percent: f64,
    pub avg_access_count: f64,
    pub cache_efficiency: &'static str,
    pub memory_usage: &'static str,
}

impl MemoStats {
    /// Statistics reported when memoization is switched off.
    pub fn disabled(capacity: usize, ttl: Duration) -> Self {
        Self {
            enabled: false,
            size: 0,
            capacity,
            ttl_seconds: ttl.as_secs(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expired_entries: 0,
            invalidations: 0,
            total_files_cached: 0,
            hit_rate_percent: 0.0,
            utilization_percent: 0.0,
            avg_access_count: 0.0,
            cache_efficiency: efficiency_label(0.0),
            memory_usage: usage_label(0.0),
        }
    }
}

pub fn efficiency_label(hit_rate_percent: f64) -> &'static str {
    if hit_rate_percent > 80.0 {
        "excellent"
    } else if hit_rate_percent > 60.0 {
        "good"
    } else if hit_rate_percent > 40.0 {
        "fair"
    } else {
        "poor"
    }
}

fn usage_label(utilization_percent: f64) -> &'static str {
    if utilization_percent > 90.0 {
        "high"
    } else if utilization_percent > 70.0 {
        "medium"
    } else {
        "low"
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// LRU+TTL memo guarded by a single lock.
///
/// The lock is held only for map operations; callers parse outside of it and
/// [`insert`](FileMemo::insert) the result afterwards.
pub struct FileMemo<V> {
    state: Mutex<MemoState<V>>,
    capacity: usize,
    ttl: Duration,
    sweep_interval: Duration,
    clock: Arc<dyn Clock>,
}

impl<V> FileMemo<V> {
    pub fn new(
        capacity: usize,
        ttl: Duration,
        sweep_interval: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let now = clock.now();
        Self {
            state: Mutex::new(MemoState {
                entries: HashMap::new(),
                seq: 0,
                last_sweep: now,
                counters: Counters::default(),
            }),
            capacity: capacity.max(1),
            ttl,
            sweep_interval,
            clock,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.state.lock().entries.contains_key(path)
    }

    /// Memoized data for `path` if it was cached at version `modified` and
    /// has not outlived the TTL. Stale versions are dropped on the way.
    pub fn get(&self, path: &Path, modified: SystemTime) -> Option<Arc<V>> {
        let now = self.clock.now();
        let mut state = self.state.lock();

        let Some(entry) = state.entries.get(path) else {
            state.counters.misses += 1;
            return None;
        };

        if entry.modified != modified {
            state.entries.remove(path);
            state.counters.invalidations += 1;
            state.counters.misses += 1;
            tracing::debug!(path = %path.display(), "Memo entry invalidated by file modification");
            return None;
        }

        if now.saturating_duration_since(entry.cached_at) >= self.ttl {
            state.entries.remove(path);
            state.counters.expired += 1;
            state.counters.misses += 1;
            return None;
        }

        let seq = state.next_seq();
        state.counters.hits += 1;
        let entry = state.entries.get_mut(path)?;
        entry.last_access = now;
        entry.access_count += 1;
        entry.seq = seq;
        Some(Arc::clone(&entry.data))
    }

    /// Memoize `data` for `path` at version `modified`.
    ///
    /// When the memo is full, expired entries go first, then the least
    /// recently accessed ones until a slot is free.
    pub fn insert(&self, path: &Path, modified: SystemTime, data: V) -> Arc<V> {
        let now = self.clock.now();
        let data = Arc::new(data);
        let mut state = self.state.lock();

        if now.saturating_duration_since(state.last_sweep) >= self.sweep_interval {
            let removed = state.purge_expired(now, self.ttl);
            if removed > 0 {
                tracing::debug!(removed, "Periodic memo sweep removed expired entries");
            }
        }

        if !state.entries.contains_key(path) && state.entries.len() >= self.capacity {
            state.purge_expired(now, self.ttl);
            let len = state.entries.len();
            if len >= self.capacity {
                state.evict_lru(len - self.capacity + 1);
            }
        }

        let seq = state.next_seq();
        state.counters.inserts += 1;
        state.entries.insert(
            path.to_path_buf(),
            MemoEntry {
                path: path.to_path_buf(),
                modified,
                data: Arc::clone(&data),
                cached_at: now,
                last_access: now,
                access_count: 1,
                seq,
            },
        );
        data
    }

    pub fn invalidate(&self, path: &Path) -> bool {
        let mut state = self.state.lock();
        let removed = state.entries.remove(path).is_some();
        if removed {
            state.counters.invalidations += 1;
        }
        removed
    }

    /// Drop every entry, returning how many there were.
    pub fn clear(&self) -> usize {
        let mut state = self.state.lock();
        let count = state.entries.len();
        state.entries.clear();
        count
    }

    /// Purge expired entries (always when `force`, otherwise only if a sweep
    /// is due) and, above 80% utilization, evict a fifth of the capacity.
    pub fn optimize(&self, force: bool) -> OptimizeReport {
        let now = self.clock.now();
        let mut state = self.state.lock();
        let initial_size = state.entries.len();

        let sweep_due = now.saturating_duration_since(state.last_sweep) >= self.sweep_interval;
        let expired_cleaned = if force || sweep_due {
            state.purge_expired(now, self.ttl)
        } else {
            0
        };

        let mut lru_evicted = 0;
        if state.entries.len() as f64 > self.capacity as f64 * OPTIMIZE_THRESHOLD {
            let to_free = ((self.capacity as f64 * OPTIMIZE_FREE_SHARE) as usize).max(1);
            lru_evicted = state.evict_lru(to_free);
        }

        let report = OptimizeReport {
            initial_size,
            final_size: state.entries.len(),
            expired_cleaned,
            lru_evicted,
        };
        tracing::info!(
            freed = report.total_freed(),
            expired = expired_cleaned,
            lru = lru_evicted,
            "Memo optimization completed"
        );
        report
    }

    pub fn stats(&self) -> MemoStats {
        let state = self.state.lock();
        let c = state.counters;
        let size = state.entries.len();
        let lookups = c.hits + c.misses;
        let hit_rate = if lookups > 0 {
            c.hits as f64 / lookups as f64 * 100.0
        } else {
            0.0
        };
        let utilization = size as f64 / self.capacity as f64 * 100.0;
        let avg_access = if size > 0 {
            state.entries.values().map(|e| e.access_count).sum::<u64>() as f64 / size as f64
        } else {
            0.0
        };

        MemoStats {
            enabled: true,
            size,
            capacity: self.capacity,
            ttl_seconds: self.ttl.as_secs(),
            hits: c.hits,
            misses: c.misses,
            evictions: c.evictions,
            expired_entries: c.expired,
            invalidations: c.invalidations,
            total_files_cached: c.inserts,
            hit_rate_percent: round2(hit_rate),
            utilization_percent: round2(utilization),
            avg_access_count: round2(avg_access),
            cache_efficiency: efficiency_label(hit_rate),
            memory_usage: usage_label(utilization),
        }
    }
}
