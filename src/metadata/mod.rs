pub mod csv;
pub mod json;
pub mod jsonl;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::OutputFormat;
use crate::parsers::browser::{Browser, VisitRecord};

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] ::csv::Error),
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("format {0:?} is not a file export")]
    NotAnExport(OutputFormat),
    #[error("writer lock poisoned")]
    Poisoned,
}

/// Provenance stamped on every exported row.
#[derive(Debug, Clone)]
pub struct ExportContext {
    pub tool_version: String,
    pub config_hash: String,
    pub anonymize_urls: bool,
}

/// One exported visit. Borrowed from the record except where anonymization rewrites the url.
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    pub browser: Browser,
    pub timestamp: DateTime<Utc>,
    pub title: &'a str,
    pub url: String,
    pub domain: String,
    pub visit_count: u64,
    pub tool_version: &'a str,
    pub config_hash: &'a str,
}

impl<'a> ExportRow<'a> {
    pub fn new(record: &'a VisitRecord, ctx: &'a ExportContext) -> Self {
        let url = if ctx.anonymize_urls {
            anonymize_url(record.url())
        } else {
            record.url().to_string()
        };
        Self {
            browser: record.browser(),
            timestamp: record.timestamp(),
            title: record.title(),
            url,
            domain: record.domain(),
            visit_count: record.visit_count(),
            tool_version: &ctx.tool_version,
            config_hash: &ctx.config_hash,
        }
    }
}

/// Export sink for the filtered timeline.
///
/// # Example
/// ```rust
/// use histocarve::config::OutputFormat;
/// use histocarve::metadata::{self, ExportContext};
///
/// let dir = std::env::temp_dir().join("histocarve_export_example");
/// std::fs::create_dir_all(&dir).unwrap();
/// let ctx = ExportContext {
///     tool_version: "0.1.0".to_string(),
///     config_hash: String::new(),
///     anonymize_urls: false,
/// };
/// let sink = metadata::build_sink(OutputFormat::Jsonl, ctx, &dir.join("out.jsonl")).unwrap();
/// sink.flush().unwrap();
/// ```
pub trait HistorySink: Send + Sync {
    fn record_visit(&self, record: &VisitRecord) -> Result<(), ExportError>;
    fn flush(&self) -> Result<(), ExportError>;
}

pub fn build_sink(
    format: OutputFormat,
    ctx: ExportContext,
    path: &Path,
) -> Result<Box<dyn HistorySink>, ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    match format {
        OutputFormat::Json => Ok(Box::new(json::JsonSink::new(ctx, path)?)),
        OutputFormat::Jsonl => Ok(Box::new(jsonl::JsonlSink::new(ctx, path)?)),
        OutputFormat::Csv => Ok(Box::new(csv::CsvSink::new(ctx, path)?)),
        other => Err(ExportError::NotAnExport(other)),
    }
}

/// Write every record and flush. Returns the number of rows written.
pub fn export_all(sink: &dyn HistorySink, records: &[VisitRecord]) -> Result<usize, ExportError> {
    for record in records {
        sink.record_visit(record)?;
    }
    sink.flush()?;
    Ok(records.len())
}

/// Keep scheme and authority, replace path and query with a short stable token.
pub fn anonymize_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return "anonymized_url".to_string();
    };
    let split = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(split);
    let path_and_query = tail.split('#').next().unwrap_or("");

    let mut hasher = Sha256::new();
    hasher.update(path_and_query.as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{scheme}://{authority}/path_{}", &digest[..8])
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ExportError> {
    mutex.lock().map_err(|_| ExportError::Poisoned)
}
