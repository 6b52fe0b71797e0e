//! Metadata attached to every payload handed back to callers.

use std::sync::LazyLock;

use regex::Regex;
use time::OffsetDateTime;

use super::CacheOrchestrator;
use crate::error::{Error, Result};
use crate::model::{
    CacheStatus, CacheTtlInfo, EnrichedPayload, Layer, Metadata, RequestParams, TableData,
    TtlRemaining,
};

static YEAR_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19|20)\d{2}\b").expect("valid year regex"));

/// Body rows scanned for a year when header and footer have none.
const BODY_ROWS_SCANNED: usize = 3;

pub const EXPIRES_FRESH: &str = "N/A (fresh data)";
pub const EXPIRES_INDEFINITE: &str = "N/A (indefinite)";
pub const EXPIRES_REDIS_UNAVAILABLE: &str = "Redis unavailable";
pub const EXPIRES_NO_EXPIRY: &str = "No expiry set";
pub const EXPIRES_EXPIRED: &str = "Expired";
pub const EXPIRES_UNKNOWN: &str = "Unknown";

/// `{h}h {m}m {s}s`, leading zero units dropped.
pub fn format_expires_in(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}

/// Human-readable expiry of the layer the payload came from.
pub fn expires_in(layer: Layer, remaining: TtlRemaining) -> String {
    match layer {
        Layer::Fresh => EXPIRES_FRESH.into(),
        Layer::FileFallback => EXPIRES_INDEFINITE.into(),
        Layer::ShortTerm | Layer::Fallback => match remaining {
            TtlRemaining::Seconds(0) | TtlRemaining::Absent => EXPIRES_EXPIRED.into(),
            TtlRemaining::Seconds(secs) => format_expires_in(secs),
            TtlRemaining::NoExpiry => EXPIRES_NO_EXPIRY.into(),
            TtlRemaining::RedisUnavailable => EXPIRES_REDIS_UNAVAILABLE.into(),
        },
    }
}

/// Year of the data: explicit parameter, then a year found in the table,
/// then the current UTC year.
pub fn detect_year(params: &RequestParams, data: &TableData) -> String {
    params
        .year()
        .map(str::to_string)
        .or_else(|| scan_year(data))
        .unwrap_or_else(current_year)
}

fn scan_year(data: &TableData) -> Option<String> {
    let header = data.header.iter().flatten();
    let footer = data.footer.iter().flatten();
    let body = data
        .body
        .iter()
        .take(BODY_ROWS_SCANNED)
        .flat_map(|item| item.item_data.iter());

    header
        .chain(footer)
        .chain(body)
        .find_map(|cell| YEAR_PATTERN.find(cell).map(|m| m.as_str().to_string()))
}

fn current_year() -> String {
    OffsetDateTime::now_utc().year().to_string()
}

impl CacheOrchestrator {
    /// Attach year, TTL and layer metadata to `data`.
    ///
    /// Never fails: when the TTL lookups break, only the year and the layer
    /// label are attached.
    pub async fn enrich(
        &self,
        data: TableData,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
    ) -> EnrichedPayload {
        match self.try_enrich(&data, layer, endpoint, params).await {
            Ok((metadata, expires_in)) => EnrichedPayload {
                data,
                cached: layer,
                metadata,
                expires_in,
            },
            Err(e) => {
                tracing::warn!(
                    endpoint,
                    layer = %layer,
                    error = %e,
                    class = e.class(),
                    "Metadata enrichment failed, attaching basic metadata"
                );
                basic_payload(data, layer, params)
            }
        }
    }

    async fn try_enrich(
        &self,
        data: &TableData,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
    ) -> Result<(Metadata, String)> {
        let year = detect_year(params, data);

        let (short, fallback) = if self.store().is_available().await {
            (
                self.ttl_remaining(Layer::ShortTerm, endpoint, params)
                    .await
                    .map_err(|e| Error::Enrichment(format!("short-term TTL lookup: {e}")))?,
                self.ttl_remaining(Layer::Fallback, endpoint, params)
                    .await
                    .map_err(|e| Error::Enrichment(format!("fallback TTL lookup: {e}")))?,
            )
        } else {
            (TtlRemaining::RedisUnavailable, TtlRemaining::RedisUnavailable)
        };

        let remaining = match layer {
            Layer::Fallback => fallback,
            _ => short,
        };

        let metadata = Metadata {
            year,
            cache_ttl: CacheTtlInfo::new(short, fallback),
            cache_status: CacheStatus {
                active_layer: layer.label().to_string(),
                layer_description: layer.description().to_string(),
            },
        };
        tracing::debug!(endpoint, layer = %layer, year = %metadata.year, "Enriched payload metadata");
        Ok((metadata, expires_in(layer, remaining)))
    }
}

fn basic_payload(data: TableData, layer: Layer, params: &RequestParams) -> EnrichedPayload {
    let year = params
        .year()
        .map(str::to_string)
        .unwrap_or_else(current_year);
    let expires_in = match layer {
        Layer::Fresh => EXPIRES_FRESH.into(),
        Layer::FileFallback => EXPIRES_INDEFINITE.into(),
        Layer::ShortTerm | Layer::Fallback => EXPIRES_UNKNOWN.into(),
    };
    EnrichedPayload {
        data,
        cached: layer,
        metadata: Metadata {
            year,
            cache_ttl: CacheTtlInfo::unknown(),
            cache_status: CacheStatus {
                active_layer: layer.label().to_string(),
                layer_description: EXPIRES_UNKNOWN.into(),
            },
        },
        expires_in,
    }
}
