//! Delimited flat-file parsing.
//!
//! Files come from different exports over the years: some are UTF-8, older
//! ones Windows-1252, and the delimiter is not always a semicolon.

use std::borrow::Cow;
use std::path::Path;

use encoding_rs::{Encoding, UTF_8, WINDOWS_1252};

use crate::error::{Error, Result};

/// Tried in order; the first one that decodes without replacement wins.
const ENCODINGS: &[&Encoding] = &[UTF_8, WINDOWS_1252];

const DELIMITER_CANDIDATES: &[u8] = b";,\t|";
const DEFAULT_DELIMITER: u8 = b';';
const SAMPLE_BYTES: usize = 1024;

/// Rows of one file, before conversion to the canonical table shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Rows dropped because they could not be parsed
    pub skipped_rows: usize,
    pub encoding: &'static str,
    pub delimiter: u8,
}

impl ParsedFile {
    fn empty() -> Self {
        Self {
            encoding: UTF_8.name(),
            delimiter: DEFAULT_DELIMITER,
            ..Default::default()
        }
    }
}

pub fn parse_file(path: &Path) -> Result<ParsedFile> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::FileResolution(format!("cannot read '{}': {e}", path.display()))
    })?;
    parse_bytes(&bytes).map_err(|e| match e {
        Error::FileParse(msg) => Error::FileParse(format!("{}: {msg}", path.display())),
        other => other,
    })
}

pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedFile> {
    let (text, encoding) = decode(bytes)?;
    if text.trim().is_empty() {
        return Ok(ParsedFile::empty());
    }

    let delimiter = detect_delimiter(sample(&text));
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| Error::FileParse(format!("unreadable header row: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    let mut skipped_rows = 0;
    for (index, record) in reader.records().enumerate() {
        // Header is line 1
        let line = index + 2;
        let record = match record {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(line, error = %e, "Skipping malformed row");
                skipped_rows += 1;
                continue;
            }
        };

        // Cells beyond the header have no column and are dropped.
        let overflow: Vec<&str> = record
            .iter()
            .skip(columns.len())
            .filter(|v| !v.is_empty())
            .collect();
        if !overflow.is_empty() {
            tracing::debug!(
                line,
                dropped = ?overflow,
                columns = columns.len(),
                "Dropping cells beyond the header"
            );
        }

        let mut values: Vec<String> = record
            .iter()
            .take(columns.len())
            .map(str::to_string)
            .collect();
        values.resize(columns.len(), String::new());

        if values.iter().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(values);
    }

    if skipped_rows > 0 {
        tracing::warn!(skipped_rows, "Parsed file with error rows skipped");
    }

    Ok(ParsedFile {
        columns,
        rows,
        skipped_rows,
        encoding: encoding.name(),
        delimiter,
    })
}

/// Decode with the first encoding that maps every byte.
pub fn decode(bytes: &[u8]) -> Result<(Cow<'_, str>, &'static Encoding)> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    for encoding in ENCODINGS {
        if let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes) {
            if *encoding != UTF_8 {
                tracing::debug!(encoding = encoding.name(), "Decoded with legacy encoding");
            }
            return Ok((text, encoding));
        }
    }
    Err(Error::FileParse(
        "content is not valid in any supported encoding".into(),
    ))
}

/// Pick the candidate delimiter with a consistent, non-zero count on every
/// sampled line; semicolon when nothing is conclusive.
pub fn detect_delimiter(sample: &str) -> u8 {
    let mut lines: Vec<&str> = sample.lines().filter(|l| !l.trim().is_empty()).collect();
    // The last line of a truncated sample may be cut in the middle.
    if sample.len() >= SAMPLE_BYTES && lines.len() > 1 {
        lines.pop();
    }
    if lines.is_empty() {
        return DEFAULT_DELIMITER;
    }

    let mut best: Option<(u8, usize)> = None;
    for &candidate in DELIMITER_CANDIDATES {
        let counts: Vec<usize> = lines
            .iter()
            .map(|line| count_unquoted(line, candidate))
            .collect();
        let first = counts[0];
        if first == 0 || counts.iter().any(|&c| c != first) {
            continue;
        }
        if best.is_none_or(|(_, n)| first > n) {
            best = Some((candidate, first));
        }
    }
    best.map(|(d, _)| d).unwrap_or(DEFAULT_DELIMITER)
}

fn count_unquoted(line: &str, delimiter: u8) -> usize {
    let mut in_quotes = false;
    let mut count = 0;
    for byte in line.bytes() {
        if byte == b'"' {
            in_quotes = !in_quotes;
        } else if byte == delimiter && !in_quotes {
            count += 1;
        }
    }
    count
}

fn sample(text: &str) -> &str {
    if text.len() <= SAMPLE_BYTES {
        return text;
    }
    let mut end = SAMPLE_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}
