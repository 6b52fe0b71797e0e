//! Local flat-file fallback layer.
//!
//! Resolves an endpoint and optional sub-option to one delimited file in the
//! configured directory, parses it into a [`TableData`] and memoizes the
//! result in a bounded [`FileMemo`].

pub mod convert;
pub mod mapping;
pub mod memo;
pub mod parser;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use crate::clock::Clock;
use crate::config::FileCacheConfig;
use crate::error::{Error, Result};
use crate::model::TableData;

pub use self::mapping::{ENDPOINT_FILES, EndpointFiles, EndpointMapping};
pub use self::memo::{FileMemo, MemoStats, OptimizeReport};

/// Status of one mapped file on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub exists: bool,
    pub readable: bool,
    pub size_bytes: u64,
}

impl FileStatus {
    fn inspect(path: &Path) -> Self {
        match fs::metadata(path) {
            Ok(meta) => Self {
                exists: true,
                readable: meta.is_file() && fs::File::open(path).is_ok(),
                size_bytes: meta.len(),
            },
            Err(_) => Self {
                exists: false,
                readable: false,
                size_bytes: 0,
            },
        }
    }
}

/// One entry of [`FileCache::available_endpoints`].
#[derive(Debug, Clone, Serialize)]
pub struct EndpointInfo {
    pub endpoint: &'static str,
    pub default_file: &'static str,
    pub sub_options: BTreeMap<&'static str, &'static str>,
    pub files_status: BTreeMap<&'static str, FileStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStatus {
    Valid,
    Partial,
    Invalid,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Valid => "valid",
            MappingStatus::Partial => "partial",
            MappingStatus::Invalid => "invalid",
        }
    }

    /// The file layer can serve something unless nothing exists at all.
    pub fn is_usable(&self) -> bool {
        !matches!(self, MappingStatus::Invalid)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointReport {
    pub valid: bool,
    pub default_file: &'static str,
    pub default_file_exists: bool,
    pub sub_options_count: usize,
    pub valid_sub_options: usize,
    pub files: BTreeMap<&'static str, FileStatus>,
    pub errors: Vec<String>,
}

/// Result of checking every mapped file against the directory.
#[derive(Debug, Clone, Serialize)]
pub struct MappingReport {
    pub overall_status: MappingStatus,
    pub directory: PathBuf,
    pub total_endpoints: usize,
    pub valid_endpoints: usize,
    pub invalid_endpoints: usize,
    pub total_files: usize,
    pub existing_files: usize,
    pub missing_files: Vec<String>,
    pub endpoints: BTreeMap<&'static str, EndpointReport>,
}

pub struct FileCache {
    directory: PathBuf,
    mapping: EndpointMapping,
    memo: Option<FileMemo<TableData>>,
    memo_capacity: usize,
    memo_ttl: Duration,
}

impl FileCache {
    pub fn new(config: &FileCacheConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Self::with_mapping(config, clock, ENDPOINT_FILES)
    }

    /// Creates the directory when missing. A path that is not a readable
    /// directory is rejected.
    pub fn with_mapping(
        config: &FileCacheConfig,
        clock: Arc<dyn Clock>,
        mapping: EndpointMapping,
    ) -> Result<Self> {
        let directory = config.directory.clone();
        if !directory.exists() {
            tracing::warn!(directory = %directory.display(), "Fallback directory missing, creating it");
            fs::create_dir_all(&directory).map_err(|e| {
                Error::FileResolution(format!(
                    "cannot create fallback directory '{}': {e}",
                    directory.display()
                ))
            })?;
        }
        if !directory.is_dir() {
            return Err(Error::FileResolution(format!(
                "'{}' exists but is not a directory",
                directory.display()
            )));
        }
        fs::read_dir(&directory).map_err(|e| {
            Error::FileResolution(format!(
                "no read permission for directory '{}': {e}",
                directory.display()
            ))
        })?;

        let memo = config.memo_enabled.then(|| {
            FileMemo::new(
                config.capacity(),
                config.ttl(),
                config.cleanup_interval(),
                clock,
            )
        });

        tracing::info!(
            directory = %directory.display(),
            memo_enabled = config.memo_enabled,
            capacity = config.capacity(),
            ttl_secs = config.ttl().as_secs(),
            "File fallback layer initialized"
        );

        Ok(Self {
            directory,
            mapping,
            memo,
            memo_capacity: config.capacity(),
            memo_ttl: config.ttl(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn known_endpoints(&self) -> Vec<&'static str> {
        mapping::known_endpoints(self.mapping)
    }

    /// Path of the file backing `(endpoint, sub_option)`.
    ///
    /// The file must exist, be a regular file and be readable.
    pub fn resolve(&self, endpoint: &str, sub_option: Option<&str>) -> Result<PathBuf> {
        if endpoint.trim().is_empty() {
            return Err(Error::FileResolution("endpoint cannot be empty".into()));
        }
        let files = mapping::find(self.mapping, endpoint).ok_or_else(|| {
            Error::FileResolution(format!(
                "unknown endpoint '{}'. Available endpoints: {}",
                mapping::normalize_endpoint(endpoint),
                self.known_endpoints().join(", ")
            ))
        })?;

        let file = files.file_for(sub_option);
        let path = self.directory.join(file);
        let meta = fs::metadata(&path).map_err(|_| {
            Error::FileResolution(format!(
                "file '{file}' for endpoint '{}' not found in '{}'",
                files.endpoint,
                self.directory.display()
            ))
        })?;
        if !meta.is_file() {
            return Err(Error::FileResolution(format!(
                "'{}' is not a regular file",
                path.display()
            )));
        }
        fs::File::open(&path).map_err(|e| {
            Error::FileResolution(format!("'{}' is not readable: {e}", path.display()))
        })?;

        tracing::debug!(endpoint = files.endpoint, ?sub_option, file, "Resolved fallback file");
        Ok(path)
    }

    /// Parsed and converted content of `path`, served from the memo while the
    /// file is unchanged.
    pub fn parse_file(&self, path: &Path) -> Result<Arc<TableData>> {
        let modified = fs::metadata(path).and_then(|m| m.modified()).ok();
        if modified.is_none() {
            if let Some(memo) = &self.memo {
                if memo.invalidate(path) {
                    tracing::debug!(path = %path.display(), "Dropped memo entry of unreadable file");
                }
            }
        }

        if let (Some(memo), Some(modified)) = (&self.memo, modified) {
            if let Some(table) = memo.get(path, modified) {
                tracing::debug!(path = %path.display(), "Memo hit");
                return Ok(table);
            }
        }

        let parsed = parser::parse_file(path)?;
        let table = convert::to_table(&parsed);
        tracing::debug!(
            path = %path.display(),
            rows = parsed.rows.len(),
            skipped = parsed.skipped_rows,
            encoding = parsed.encoding,
            delimiter = %char::from(parsed.delimiter).escape_default(),
            "Parsed fallback file"
        );

        match (&self.memo, modified) {
            (Some(memo), Some(modified)) => Ok(memo.insert(path, modified, table)),
            _ => Ok(Arc::new(table)),
        }
    }

    /// Resolve, parse and convert in one step.
    pub fn data_for_endpoint(
        &self,
        endpoint: &str,
        sub_option: Option<&str>,
    ) -> Result<Arc<TableData>> {
        let path = self.resolve(endpoint, sub_option)?;
        self.parse_file(&path)
    }

    pub fn available_endpoints(&self) -> Vec<EndpointInfo> {
        self.mapping
            .iter()
            .map(|entry| EndpointInfo {
                endpoint: entry.endpoint,
                default_file: entry.default_file,
                sub_options: entry.sub_options.iter().copied().collect(),
                files_status: entry
                    .files()
                    .into_iter()
                    .map(|file| (file, FileStatus::inspect(&self.directory.join(file))))
                    .collect(),
            })
            .collect()
    }

    pub fn validate_mappings(&self) -> MappingReport {
        let mut endpoints = BTreeMap::new();
        let mut missing_files: Vec<String> = Vec::new();
        let mut all_files: Vec<&'static str> = Vec::new();
        let mut valid_endpoints = 0;

        for entry in self.mapping {
            let mut files = BTreeMap::new();
            let mut errors = Vec::new();

            let default_status = FileStatus::inspect(&self.directory.join(entry.default_file));
            files.insert(entry.default_file, default_status);
            if !default_status.exists {
                errors.push(format!("default file '{}' not found", entry.default_file));
                push_unique(&mut missing_files, entry.default_file);
            }

            let mut valid_sub_options = 0;
            for (sub_option, file) in entry.sub_options {
                let status = *files
                    .entry(*file)
                    .or_insert_with(|| FileStatus::inspect(&self.directory.join(file)));
                if status.exists {
                    valid_sub_options += 1;
                } else {
                    errors.push(format!("sub-option '{sub_option}' file '{file}' not found"));
                    push_unique(&mut missing_files, file);
                }
            }

            for file in entry.files() {
                if !all_files.contains(&file) {
                    all_files.push(file);
                }
            }

            let valid = errors.is_empty();
            if valid {
                valid_endpoints += 1;
            }
            endpoints.insert(
                entry.endpoint,
                EndpointReport {
                    valid,
                    default_file: entry.default_file,
                    default_file_exists: default_status.exists,
                    sub_options_count: entry.sub_options.len(),
                    valid_sub_options,
                    files,
                    errors,
                },
            );
        }

        let total_files = all_files.len();
        let existing_files = total_files - missing_files.len();
        let overall_status = if missing_files.is_empty() {
            MappingStatus::Valid
        } else if existing_files > 0 {
            MappingStatus::Partial
        } else {
            MappingStatus::Invalid
        };

        tracing::info!(
            status = overall_status.as_str(),
            valid_endpoints,
            total_endpoints = self.mapping.len(),
            "Endpoint mapping validation completed"
        );

        MappingReport {
            overall_status,
            directory: self.directory.clone(),
            total_endpoints: self.mapping.len(),
            valid_endpoints,
            invalid_endpoints: self.mapping.len() - valid_endpoints,
            total_files,
            existing_files,
            missing_files,
            endpoints,
        }
    }

    pub fn memo_stats(&self) -> MemoStats {
        match &self.memo {
            Some(memo) => memo.stats(),
            None => MemoStats::disabled(self.memo_capacity, self.memo_ttl),
        }
    }

    pub fn optimize(&self, force: bool) -> Option<OptimizeReport> {
        self.memo.as_ref().map(|memo| memo.optimize(force))
    }

    pub fn clear_memo(&self) -> usize {
        let cleared = self.memo.as_ref().map_or(0, |memo| memo.clear());
        tracing::info!(cleared, "File memo cleared");
        cleared
    }
}

fn push_unique(list: &mut Vec<String>, file: &str) {
    if !list.iter().any(|f| f == file) {
        list.push(file.to_string());
    }
}
