//! Canonical record shape, cache envelope and layer descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize, Serializer};
use time::OffsetDateTime;

/// Canonical table shape produced by every layer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    #[serde(default)]
    pub header: Vec<Vec<String>>,
    #[serde(default)]
    pub body: Vec<BodyItem>,
    #[serde(default)]
    pub footer: Vec<Vec<String>>,
}

impl TableData {
    /// True when the table carries no body and no footer rows.
    pub fn has_no_rows(&self) -> bool {
        self.body.is_empty() && self.footer.is_empty()
    }
}

/// A body row with its grouped sub-rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyItem {
    #[serde(default)]
    pub item_data: Vec<String>,
    #[serde(default)]
    pub sub_items: Vec<Vec<String>>,
}

impl BodyItem {
    pub fn new(item_data: Vec<String>) -> Self {
        Self {
            item_data,
            sub_items: Vec::new(),
        }
    }
}

/// Cache tier a payload was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    ShortTerm,
    Fallback,
    FileFallback,
    Fresh,
}

impl Layer {
    pub fn label(&self) -> &'static str {
        match self {
            Layer::ShortTerm => "short_term",
            Layer::Fallback => "fallback",
            Layer::FileFallback => "file_fallback",
            Layer::Fresh => "fresh",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Layer::ShortTerm => "Fast cache (5 minutes)",
            Layer::Fallback => "Backup cache (30 days)",
            Layer::FileFallback => "Local file fallback",
            Layer::Fresh => "Real-time origin fetch",
        }
    }

    /// Key prefix in the remote store, `None` for layers that are not stored remotely.
    pub fn key_prefix(&self) -> Option<&'static str> {
        match self {
            Layer::ShortTerm => Some("short:"),
            Layer::Fallback => Some("fallback:"),
            Layer::FileFallback | Layer::Fresh => None,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// TTL applied by each layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlPolicy {
    pub short_term: Duration,
    pub fallback: Duration,
}

impl TtlPolicy {
    pub const DEFAULT_SHORT: Duration = Duration::from_secs(300);
    pub const DEFAULT_FALLBACK: Duration = Duration::from_secs(2_592_000);

    /// TTL for a remote layer; `None` means the layer is not expired by the store.
    pub fn for_layer(&self, layer: Layer) -> Option<Duration> {
        match layer {
            Layer::ShortTerm => Some(self.short_term),
            Layer::Fallback => Some(self.fallback),
            Layer::FileFallback | Layer::Fresh => None,
        }
    }
}

impl Default for TtlPolicy {
    fn default() -> Self {
        Self {
            short_term: Self::DEFAULT_SHORT,
            fallback: Self::DEFAULT_FALLBACK,
        }
    }
}

/// Envelope stored in the remote cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: TableData,
    #[serde(with = "time::serde::rfc3339")]
    pub stored_at: OffsetDateTime,
    pub origin_layer: Layer,
}

impl CacheEntry {
    pub fn new(payload: TableData, origin_layer: Layer) -> Self {
        Self {
            payload,
            stored_at: OffsetDateTime::now_utc(),
            origin_layer,
        }
    }

    /// Time elapsed since the entry was written.
    pub fn age(&self) -> time::Duration {
        OffsetDateTime::now_utc() - self.stored_at
    }
}

/// Request parameters, kept sorted so that insertion order never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    pub const YEAR: &'static str = "year";
    pub const SUB_OPTION: &'static str = "sub_option";

    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a parameter; empty values are treated as absent.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if !value.trim().is_empty() {
            self.0.insert(key.into(), value);
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn with_opt(mut self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        if let Some(value) = value {
            self.insert(key, value);
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn year(&self) -> Option<&str> {
        self.get(Self::YEAR)
    }

    pub fn sub_option(&self) -> Option<&str> {
        self.get(Self::SUB_OPTION)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = RequestParams::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Remaining TTL reported for a remote layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlRemaining {
    Seconds(u64),
    NoExpiry,
    RedisUnavailable,
    /// Key not present in the layer
    Absent,
}

impl Serialize for TtlRemaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TtlRemaining::Seconds(secs) => serializer.serialize_u64(*secs),
            TtlRemaining::NoExpiry => serializer.serialize_str("no_expiry"),
            TtlRemaining::RedisUnavailable => serializer.serialize_str("redis_unavailable"),
            TtlRemaining::Absent => serializer.serialize_none(),
        }
    }
}

/// `cache_ttl` block of the payload metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheTtlInfo {
    pub short_cache_ttl: TtlRemaining,
    pub fallback_cache_ttl: TtlRemaining,
    pub csv_fallback_ttl: &'static str,
}

impl CacheTtlInfo {
    pub const INDEFINITE: &'static str = "indefinite";

    pub fn new(short_cache_ttl: TtlRemaining, fallback_cache_ttl: TtlRemaining) -> Self {
        Self {
            short_cache_ttl,
            fallback_cache_ttl,
            csv_fallback_ttl: Self::INDEFINITE,
        }
    }

    /// TTL block used when enrichment failed and nothing is known.
    pub fn unknown() -> Self {
        Self::new(TtlRemaining::Absent, TtlRemaining::Absent)
    }
}

/// `cache_status` block of the payload metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStatus {
    pub active_layer: String,
    pub layer_description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub year: String,
    pub cache_ttl: CacheTtlInfo,
    pub cache_status: CacheStatus,
}

/// Payload returned to the caller together with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedPayload {
    pub data: TableData,
    #[serde(serialize_with = "serialize_cached_flag")]
    pub cached: Layer,
    pub metadata: Metadata,
    pub expires_in: String,
}

/// `false` for fresh data, the layer label otherwise.
fn serialize_cached_flag<S: Serializer>(layer: &Layer, serializer: S) -> Result<S::Ok, S::Error> {
    match layer {
        Layer::Fresh => serializer.serialize_bool(false),
        other => serializer.serialize_str(other.label()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn params_ignore_insertion_order_and_empty_values() {
        let a: RequestParams = [("year", "2023"), ("sub_option", "DERIVADOS")]
            .into_iter()
            .collect();
        let b = RequestParams::new()
            .with("sub_option", "DERIVADOS")
            .with("year", "2023")
            .with("extra", "  ");
        assert_eq!(a, b);
        assert_eq!(b.year(), Some("2023"));
        assert_eq!(b.get("extra"), None);
    }

    #[test]
    fn cache_entry_round_trips_with_utc_timestamp() {
        let entry = CacheEntry::new(TableData::default(), Layer::Fresh);
        let raw = serde_json::to_vec(&entry).unwrap();
        let back: CacheEntry = serde_json::from_slice(&raw).unwrap();
        assert_eq!(back.stored_at.offset(), time::UtcOffset::UTC);
        assert_eq!(back.origin_layer, Layer::Fresh);
    }

    #[test]
    fn enriched_payload_serializes_cached_flag() {
        let payload = EnrichedPayload {
            data: TableData::default(),
            cached: Layer::Fresh,
            metadata: Metadata {
                year: "2023".into(),
                cache_ttl: CacheTtlInfo::new(
                    TtlRemaining::Seconds(120),
                    TtlRemaining::RedisUnavailable,
                ),
                cache_status: CacheStatus {
                    active_layer: "fresh".into(),
                    layer_description: Layer::Fresh.description().into(),
                },
            },
            expires_in: "N/A (fresh data)".into(),
        };
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["cached"], json!(false));
        assert_eq!(value["metadata"]["cache_ttl"]["short_cache_ttl"], json!(120));
        assert_eq!(
            value["metadata"]["cache_ttl"]["fallback_cache_ttl"],
            json!("redis_unavailable")
        );
        assert_eq!(
            value["metadata"]["cache_ttl"]["csv_fallback_ttl"],
            json!("indefinite")
        );

        let stale = EnrichedPayload {
            cached: Layer::FileFallback,
            ..payload
        };
        let value = serde_json::to_value(&stale).unwrap();
        assert_eq!(value["cached"], json!("file_fallback"));
    }
}
