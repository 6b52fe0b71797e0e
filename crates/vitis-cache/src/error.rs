//! Error types for the cache and fallback engine.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Result type for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the cache components.
///
/// Every variant except [`Error::Config`] and [`Error::Io`] is recoverable at
/// the pipeline level: the retrieval pipeline turns it into a layer miss and
/// moves on to the next stage.
#[derive(Debug, Error)]
pub enum Error {
    /// Remote store unreachable or timed out
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),

    /// Network, timeout, protocol or parse failure contacting the origin
    #[error(transparent)]
    OriginFetch(#[from] OriginError),

    /// Endpoint name that cannot be used as given
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    /// Unknown endpoint or missing mapped file
    #[error("File resolution error: {0}")]
    FileResolution(String),

    /// Encoding or format failure reading a flat file
    #[error("File parse error: {0}")]
    FileParse(String),

    /// Metadata computation failure (never reaches callers of `retrieve`)
    #[error("Enrichment error: {0}")]
    Enrichment(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Filesystem error outside per-file parsing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Cache envelope (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Short class name used in structured log entries.
    pub fn class(&self) -> &'static str {
        match self {
            Error::CacheUnavailable(_) => "cache_unavailable",
            Error::OriginFetch(_) => "origin_fetch",
            Error::InvalidEndpoint(_) => "invalid_endpoint",
            Error::FileResolution(_) => "file_resolution",
            Error::FileParse(_) => "file_parse",
            Error::Enrichment(_) => "enrichment",
            Error::Config(_) => "config",
            Error::Io(_) => "io",
            Error::Serialization(_) => "serialization",
        }
    }
}

impl From<redis::RedisError> for Error {
    fn from(err: redis::RedisError) -> Self {
        Error::CacheUnavailable(err.to_string())
    }
}

/// Failure class of an origin fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchFailure {
    Timeout,
    Connection,
    Protocol,
    Parse,
}

impl FetchFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchFailure::Timeout => "timeout",
            FetchFailure::Connection => "connection",
            FetchFailure::Protocol => "protocol",
            FetchFailure::Parse => "parse",
        }
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned by an origin fetch callback or the record parser.
#[derive(Debug, Clone, Error)]
#[error("Origin fetch failed ({kind}): {message}")]
pub struct OriginError {
    pub kind: FetchFailure,
    pub message: String,
}

impl OriginError {
    pub fn new(kind: FetchFailure, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchFailure::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(FetchFailure::Connection, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(FetchFailure::Protocol, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(FetchFailure::Parse, message)
    }
}

impl From<reqwest::Error> for OriginError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            FetchFailure::Timeout
        } else if err.is_connect() {
            FetchFailure::Connection
        } else if err.is_decode() {
            FetchFailure::Parse
        } else {
            FetchFailure::Protocol
        };
        OriginError::new(kind, err.to_string())
    }
}
