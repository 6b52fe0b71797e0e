//! Cascading retrieval across the cache layers and the origin.
//!
//! ```text
//! TryShortCache ──miss──▶ FetchOrigin ──fail──▶ TryDurableCache ──miss──▶ TryFileCache ──miss──▶ AllFailed
//!      │hit                   │ok                      │hit                      │hit
//!      ▼                      ▼                        ▼                         ▼
//!  short_term           fresh (cached in         fallback                 file_fallback
//!                       both remote layers)
//! ```
//!
//! Each stage has its own handler returning a [`StageOutcome`]. The order is
//! fixed: fresh data beats stale data, stale data beats no data.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, FetchFailure, OriginError};
use crate::model::{EnrichedPayload, Layer, RequestParams, TableData};
use crate::orchestrator::CacheOrchestrator;

/// Turns raw origin bytes into the canonical table.
pub trait RecordParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Result<TableData, OriginError>;
}

/// Accepts the canonical table as JSON, bare or wrapped in `{"data": ...}`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonRecordParser;

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonShape {
    Wrapped { data: TableData },
    Bare(TableData),
}

impl RecordParser for JsonRecordParser {
    fn parse(&self, raw: &[u8]) -> Result<TableData, OriginError> {
        let shape: JsonShape = serde_json::from_slice(raw)
            .map_err(|e| OriginError::parse(format!("invalid table JSON: {e}")))?;
        let table = match shape {
            JsonShape::Wrapped { data } => data,
            JsonShape::Bare(table) => table,
        };
        if table.header.is_empty() && table.has_no_rows() {
            return Err(OriginError::parse("parsed data is empty"));
        }
        Ok(table)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    TryShortCache,
    FetchOrigin,
    TryDurableCache,
    TryFileCache,
    AllFailed,
}

impl Stage {
    pub fn next(self) -> Stage {
        match self {
            Stage::TryShortCache => Stage::FetchOrigin,
            Stage::FetchOrigin => Stage::TryDurableCache,
            Stage::TryDurableCache => Stage::TryFileCache,
            Stage::TryFileCache | Stage::AllFailed => Stage::AllFailed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TryShortCache => "try_short_cache",
            Stage::FetchOrigin => "fetch_origin",
            Stage::TryDurableCache => "try_durable_cache",
            Stage::TryFileCache => "try_file_cache",
            Stage::AllFailed => "all_failed",
        }
    }
}

/// Why a stage could not produce data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub error_class: &'static str,
    /// Set for origin failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_failure: Option<FetchFailure>,
    pub message: String,
}

impl StageFailure {
    fn from_error(stage: Stage, error: &Error) -> Self {
        let fetch_failure = match error {
            Error::OriginFetch(origin) => Some(origin.kind),
            _ => None,
        };
        Self {
            stage,
            error_class: error.class(),
            fetch_failure,
            message: error.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum StageOutcome {
    Hit { data: TableData, layer: Layer },
    Miss,
    Failed(StageFailure),
}

/// Result of [`RetrievalPipeline::retrieve`].
#[derive(Debug)]
pub enum Retrieval {
    Found {
        payload: EnrichedPayload,
        layer: Layer,
    },
    /// Every layer missed or failed; no data is invented.
    Unavailable { failures: Vec<StageFailure> },
}

impl Retrieval {
    pub fn layer(&self) -> Option<Layer> {
        match self {
            Retrieval::Found { layer, .. } => Some(*layer),
            Retrieval::Unavailable { .. } => None,
        }
    }

    pub fn payload(&self) -> Option<&EnrichedPayload> {
        match self {
            Retrieval::Found { payload, .. } => Some(payload),
            Retrieval::Unavailable { .. } => None,
        }
    }

    pub fn into_payload(self) -> Option<EnrichedPayload> {
        match self {
            Retrieval::Found { payload, .. } => Some(payload),
            Retrieval::Unavailable { .. } => None,
        }
    }
}

pub struct RetrievalPipeline {
    orchestrator: Arc<CacheOrchestrator>,
    parser: Arc<dyn RecordParser>,
    origin_timeout: Duration,
}

impl RetrievalPipeline {
    pub fn new(orchestrator: Arc<CacheOrchestrator>, origin_timeout: Duration) -> Self {
        Self {
            orchestrator,
            parser: Arc::new(JsonRecordParser),
            origin_timeout,
        }
    }

    pub fn with_parser(mut self, parser: Arc<dyn RecordParser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn orchestrator(&self) -> &Arc<CacheOrchestrator> {
        &self.orchestrator
    }

    /// Serve `(endpoint, params)` from the first layer that has it.
    ///
    /// `fetch` is called at most once, only after a short-term miss, and is
    /// bounded by the origin timeout. Inner errors never escape: they are
    /// logged and collected into [`Retrieval::Unavailable`] when nothing
    /// could be served.
    pub async fn retrieve<F, Fut>(
        &self,
        endpoint: &str,
        params: &RequestParams,
        fetch: F,
    ) -> Retrieval
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, OriginError>>,
    {
        let mut fetch = Some(fetch);
        let mut failures = Vec::new();
        let mut stage = Stage::TryShortCache;

        loop {
            let outcome = match stage {
                Stage::TryShortCache => self.try_layer(stage, Layer::ShortTerm, endpoint, params).await,
                Stage::FetchOrigin => match fetch.take() {
                    Some(fetch) => self.fetch_origin(endpoint, params, fetch).await,
                    None => StageOutcome::Miss,
                },
                Stage::TryDurableCache => self.try_layer(stage, Layer::Fallback, endpoint, params).await,
                Stage::TryFileCache => self.try_layer(stage, Layer::FileFallback, endpoint, params).await,
                Stage::AllFailed => {
                    tracing::error!(
                        endpoint,
                        params = ?params.as_map(),
                        failures = failures.len(),
                        "All layers failed"
                    );
                    return Retrieval::Unavailable { failures };
                }
            };

            match outcome {
                StageOutcome::Hit { data, layer } => {
                    if matches!(layer, Layer::Fallback | Layer::FileFallback) {
                        tracing::warn!(endpoint, layer = %layer, "Serving stale data");
                    } else {
                        tracing::info!(endpoint, layer = %layer, "Serving data");
                    }
                    let payload = self.orchestrator.enrich(data, layer, endpoint, params).await;
                    return Retrieval::Found { payload, layer };
                }
                StageOutcome::Miss => {
                    tracing::debug!(endpoint, stage = stage.as_str(), "Stage missed");
                }
                StageOutcome::Failed(failure) => failures.push(failure),
            }
            stage = stage.next();
        }
    }

    async fn try_layer(
        &self,
        stage: Stage,
        layer: Layer,
        endpoint: &str,
        params: &RequestParams,
    ) -> StageOutcome {
        match self.orchestrator.get(layer, endpoint, params).await {
            Ok(Some(entry)) => StageOutcome::Hit {
                data: entry.payload,
                layer,
            },
            Ok(None) => StageOutcome::Miss,
            Err(e) => {
                tracing::warn!(
                    endpoint,
                    layer = %layer,
                    class = e.class(),
                    error = %e,
                    "Layer lookup failed"
                );
                StageOutcome::Failed(StageFailure::from_error(stage, &e))
            }
        }
    }

    async fn fetch_origin<F, Fut>(
        &self,
        endpoint: &str,
        params: &RequestParams,
        fetch: F,
    ) -> StageOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<u8>, OriginError>>,
    {
        let fetched = match tokio::time::timeout(self.origin_timeout, fetch()).await {
            Ok(result) => result,
            Err(_) => Err(OriginError::timeout(format!(
                "no response within {}ms",
                self.origin_timeout.as_millis()
            ))),
        };
        let data = match fetched.and_then(|raw| self.parser.parse(&raw)) {
            Ok(data) => data,
            Err(e) => {
                tracing::error!(
                    endpoint,
                    failure = %e.kind,
                    error = %e.message,
                    "Origin fetch failed"
                );
                let error = Error::OriginFetch(e);
                return StageOutcome::Failed(StageFailure::from_error(Stage::FetchOrigin, &error));
            }
        };

        for layer in [Layer::ShortTerm, Layer::Fallback] {
            if let Err(e) = self.orchestrator.set(layer, endpoint, params, &data).await {
                tracing::warn!(
                    endpoint,
                    layer = %layer,
                    class = e.class(),
                    error = %e,
                    "Failed to cache fresh data"
                );
            }
        }

        StageOutcome::Hit {
            data,
            layer: Layer::Fresh,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_advance_in_fixed_order() {
        let mut stage = Stage::TryShortCache;
        let mut seen = vec![stage];
        while stage != Stage::AllFailed {
            stage = stage.next();
            seen.push(stage);
        }
        assert_eq!(
            seen,
            vec![
                Stage::TryShortCache,
                Stage::FetchOrigin,
                Stage::TryDurableCache,
                Stage::TryFileCache,
                Stage::AllFailed,
            ]
        );
        assert_eq!(Stage::AllFailed.next(), Stage::AllFailed);
    }

    #[test]
    fn json_parser_accepts_bare_and_wrapped_tables() {
        let bare = br#"{"header":[["Produto","2023"]],"body":[{"item_data":["Vinho","1"],"sub_items":[]}],"footer":[]}"#;
        let wrapped = br#"{"data":{"header":[["Produto","2023"]],"body":[{"item_data":["Vinho","1"],"sub_items":[]}],"footer":[]}}"#;
        let a = JsonRecordParser.parse(bare).unwrap();
        let b = JsonRecordParser.parse(wrapped).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.body.len(), 1);
    }

    #[test]
    fn json_parser_rejects_garbage_and_empty_tables() {
        let err = JsonRecordParser.parse(b"<html>").unwrap_err();
        assert_eq!(err.kind, FetchFailure::Parse);
        let err = JsonRecordParser.parse(br#"{"data":{}}"#).unwrap_err();
        assert_eq!(err.kind, FetchFailure::Parse);
    }
}
