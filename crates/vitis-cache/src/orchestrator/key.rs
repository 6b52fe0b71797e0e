//! Deterministic cache keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::file_cache::mapping::normalize_endpoint;
use crate::model::{Layer, RequestParams};

/// Hashed material: struct fields serialize in declaration order and the
/// params map is sorted, so the JSON is canonical.
#[derive(Serialize)]
struct KeyMaterial<'a> {
    endpoint: &'a str,
    params: &'a BTreeMap<String, String>,
}

/// `"{prefix}{endpoint}:{sha256 hex}"` key of a remote layer entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for `layer`, or `None` when the layer is not stored remotely.
    pub fn derive(layer: Layer, endpoint: &str, params: &RequestParams) -> Option<Self> {
        let prefix = layer.key_prefix()?;
        let endpoint = normalize_endpoint(endpoint);
        let digest = digest(&endpoint, params);
        Some(Self(format!("{prefix}{endpoint}:{digest}")))
    }

    /// Glob pattern matching every key of `layer`, optionally for one endpoint.
    pub fn pattern(layer: Layer, endpoint: Option<&str>) -> Option<String> {
        let prefix = layer.key_prefix()?;
        Some(match endpoint {
            Some(endpoint) => format!("{prefix}{}:*", normalize_endpoint(endpoint)),
            None => format!("{prefix}*"),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn digest(endpoint: &str, params: &RequestParams) -> String {
    let material = KeyMaterial {
        endpoint,
        params: params.as_map(),
    };
    // Serializing a struct of str and a string map cannot fail.
    let canonical = serde_json::to_vec(&material).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&canonical);
    hex::encode(hasher.finalize())
}
