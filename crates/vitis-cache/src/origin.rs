//! HTTP client for the upstream table pages.

use url::Url;

use crate::config::OriginConfig;
use crate::error::{Error, OriginError, Result};
use crate::file_cache::mapping::normalize_endpoint;
use crate::model::RequestParams;

/// `opcao` query value per endpoint.
pub const ROUTE_OPTIONS: &[(&str, &str)] = &[
    ("producao", "opt_02"),
    ("processamento", "opt_03"),
    ("comercializacao", "opt_04"),
    ("importacao", "opt_05"),
    ("exportacao", "opt_06"),
];

pub fn route_option(endpoint: &str) -> Option<&'static str> {
    let endpoint = normalize_endpoint(endpoint);
    ROUTE_OPTIONS
        .iter()
        .find(|(name, _)| *name == endpoint)
        .map(|(_, opt)| *opt)
}

#[derive(Debug, Clone)]
pub struct OriginClient {
    http: reqwest::Client,
    base_url: Url,
}

impl OriginClient {
    pub fn new(config: &OriginConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| Error::Config(format!("invalid origin.base_url '{}': {e}", config.base_url)))?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}?opcao=..&ano=..&subopcao=..`, optional parts only when set.
    pub fn build_url(
        &self,
        endpoint: &str,
        params: &RequestParams,
    ) -> std::result::Result<Url, OriginError> {
        let option = route_option(endpoint).ok_or_else(|| {
            OriginError::protocol(format!("no origin option for endpoint '{endpoint}'"))
        })?;

        let mut url = self.base_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("opcao", option);
            if let Some(year) = params.year() {
                query.append_pair("ano", year);
            }
            if let Some(sub_option) = params.sub_option() {
                query.append_pair("subopcao", sub_option);
            }
        }
        Ok(url)
    }

    /// Raw body of the upstream page. Non-success statuses are protocol
    /// failures.
    pub async fn fetch(
        &self,
        endpoint: &str,
        params: &RequestParams,
    ) -> std::result::Result<Vec<u8>, OriginError> {
        let url = self.build_url(endpoint, params)?;
        tracing::info!(endpoint, url = %url, "Fetching from origin");

        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(OriginError::protocol(format!("origin answered {status}")));
        }
        let body = response.bytes().await?;
        tracing::debug!(endpoint, bytes = body.len(), "Origin responded");
        Ok(body.to_vec())
    }
}
