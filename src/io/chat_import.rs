//! Offline chat log import.
//!
//! Supported inputs:
//!
//! * plain text, one `username: message` per line (`|`, `>` and ` - ` are
//!   accepted as separators too)
//! * CSV with an `author,text` / `username,message` style header, or
//!   headerless `author,text` rows
//! * NDJSON recordings of raw live chat responses (see [`super::ndjson`])
//!
//! Rows that cannot be parsed are skipped and counted, never fatal.
//! Offline identities are the lowercased, trimmed username; the display name
//! keeps its original case.

use crate::models::ChatMessage;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::path::{Path, PathBuf};
use thiserror::Error;

const AUTHOR_COLUMNS: &[&str] = &["author", "username", "user", "name"];
const TEXT_COLUMNS: &[&str] = &["text", "message", "content", "msg"];
const TIMESTAMP_COLUMNS: &[&str] = &["timestamp", "time", "observed_at"];

const LINE_PATTERNS: &[&str] = &[
    r"^([^:]+):\s*(.+)$",
    r"^([^|]+)\|\s*(.+)$",
    r"^([^>]+)>\s*(.+)$",
    r"^(.+?)\s+-\s+(.+)$",
];

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
}

/// File formats accepted by [`import_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ImportFormat {
    #[display("text")]
    Text,
    #[display("csv")]
    Csv,
    #[display("ndjson")]
    Ndjson,
}

impl ImportFormat {
    /// Detect the format from the file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "txt" | "log" => Some(ImportFormat::Text),
            "csv" => Some(ImportFormat::Csv),
            "ndjson" | "jsonl" => Some(ImportFormat::Ndjson),
            _ => None,
        }
    }
}

/// Parsed messages plus the number of rows that had to be skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportReport {
    pub format: ImportFormat,
    pub messages: Vec<ChatMessage>,
    pub skipped: usize,
}

impl ImportReport {
    pub fn new(format: ImportFormat) -> Self {
        Self {
            format,
            messages: Vec::new(),
            skipped: 0,
        }
    }

    fn push(&mut self, username: &str, text: &str, observed_at: DateTime<Utc>) {
        let username = username.trim();
        let text = text.trim();
        if username.is_empty() || text.is_empty() {
            self.skipped += 1;
            return;
        }
        self.messages.push(ChatMessage::new(
            username.to_lowercase(),
            username,
            text,
            observed_at,
        ));
    }
}

/// Import a chat log, choosing the parser from the file extension.
pub fn import_file(path: &Path) -> Result<ImportReport, ImportError> {
    let format = ImportFormat::from_path(path).ok_or_else(|| {
        ImportError::UnsupportedFormat(
            path.extension()
                .map(|e| e.to_string_lossy().to_string())
                .unwrap_or_else(|| "<none>".to_string()),
        )
    })?;

    let io_error = |source| ImportError::Io {
        path: path.to_path_buf(),
        source,
    };

    let report = match format {
        ImportFormat::Ndjson => {
            let file = std::fs::File::open(path).map_err(io_error)?;
            super::ndjson::replay_recording(std::io::BufReader::new(file)).map_err(io_error)?
        }
        ImportFormat::Text => {
            let content = std::fs::read_to_string(path).map_err(io_error)?;
            parse_text(&content, Utc::now())
        }
        ImportFormat::Csv => {
            let content = std::fs::read_to_string(path).map_err(io_error)?;
            parse_csv(&content, Utc::now())?
        }
    };

    tracing::info!(
        path = %path.display(),
        format = %report.format,
        messages = report.messages.len(),
        skipped = report.skipped,
        "📂 Chat log imported"
    );
    Ok(report)
}

/// Split one chat line into `(username, message)`
fn split_chat_line(patterns: &[Regex], line: &str) -> Option<(String, String)> {
    patterns.iter().find_map(|pattern| {
        let captures = pattern.captures(line)?;
        Some((
            captures.get(1)?.as_str().trim().to_string(),
            captures.get(2)?.as_str().trim().to_string(),
        ))
    })
}

/// Parse a `username: message` text log. Every message gets `observed_at`.
pub fn parse_text(content: &str, observed_at: DateTime<Utc>) -> ImportReport {
    let patterns: Vec<Regex> = LINE_PATTERNS
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();
    let mut report = ImportReport::new(ImportFormat::Text);

    for (line_number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match split_chat_line(&patterns, line) {
            Some((username, message)) => report.push(&username, &message, observed_at),
            None => {
                tracing::debug!(line = line_number + 1, "⏭️ Skipping line without separator");
                report.skipped += 1;
            }
        }
    }

    report
}

fn find_column(headers: &[String], names: &[&str]) -> Option<usize> {
    let headers: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    names
        .iter()
        .find_map(|name| headers.iter().position(|h| h == name))
}

/// Parse a CSV chat log.
///
/// The first record is treated as a header only when it names both an author
/// and a text column; otherwise it is data, with column 0 the author and
/// column 1 the text. An optional RFC 3339 timestamp column overrides
/// `observed_at`.
pub fn parse_csv(content: &str, observed_at: DateTime<Utc>) -> Result<ImportReport, ImportError> {
    let mut records = parse_csv_records(content).into_iter();
    let mut report = ImportReport::new(ImportFormat::Csv);

    let Some(first) = records.next() else {
        return Ok(report);
    };

    let author = find_column(&first, AUTHOR_COLUMNS);
    let text = find_column(&first, TEXT_COLUMNS);
    let (author_col, text_col, timestamp_col, data) = match (author, text) {
        (Some(a), Some(t)) => (a, t, find_column(&first, TIMESTAMP_COLUMNS), None),
        _ => (0, 1, None, Some(first)),
    };

    for (row_number, row) in data.into_iter().chain(records).enumerate() {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            continue;
        }

        let (Some(username), Some(message)) = (row.get(author_col), row.get(text_col)) else {
            tracing::debug!(row = row_number + 1, columns = row.len(), "⏭️ Skipping short CSV row");
            report.skipped += 1;
            continue;
        };

        let sent_at = match timestamp_col.and_then(|c| row.get(c)).map(|s| s.trim()) {
            Some(raw) if !raw.is_empty() => match DateTime::parse_from_rfc3339(raw) {
                Ok(parsed) => parsed.with_timezone(&Utc),
                Err(_) => {
                    tracing::debug!(row = row_number + 1, "⏭️ Skipping row with bad timestamp");
                    report.skipped += 1;
                    continue;
                }
            },
            _ => observed_at,
        };

        report.push(username, message, sent_at);
    }

    Ok(report)
}

/// Split CSV content into records (RFC 4180 quoting, CRLF or LF line ends)
fn parse_csv_records(content: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.trim_start_matches('\u{feff}').chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    field.push('"');
                    chars.next();
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }

        match c {
            '"' if field.is_empty() => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
            }
            _ => field.push(c),
        }
    }

    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }

    records
}
