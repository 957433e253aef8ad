use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags, params_from_iter};
use thiserror::Error;
use tracing::debug;

use crate::parsers::browser::{Browser, RawVisit, VisitRecord, canonicalize};
use crate::parsers::epoch::{EpochFamily, RawTimestamp};
use crate::parsers::snapshot::{Snapshot, SnapshotCopier};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("snapshot of {path} failed: {source}")]
    Snapshot {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("no known history tables found (tables: {0})")]
    UnknownSchema(String),
    #[error("no candidate query returned rows")]
    NoRows,
    #[error("extraction aborted: {0}")]
    Aborted(String),
}

/// Row cap handed to adapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchLimit {
    Rows(usize),
    Unbounded,
}

impl FetchLimit {
    fn to_sql_value(self) -> Value {
        match self {
            FetchLimit::Rows(n) => Value::Integer(i64::try_from(n).unwrap_or(i64::MAX)),
            // SQLite treats a negative LIMIT as no limit.
            FetchLimit::Unbounded => Value::Integer(-1),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExtractRequest {
    pub fetch_limit: FetchLimit,
    /// Exclusive lower bound; `None` fetches without a time bound.
    pub cutoff: Option<DateTime<Utc>>,
}

/// Family-specific query logic over an opened history database.
pub trait SourceAdapter: Send + Sync {
    fn family(&self) -> EpochFamily;

    fn query(
        &self,
        conn: &Connection,
        request: &ExtractRequest,
    ) -> Result<Vec<RawVisit>, SourceError>;
}

pub struct ChromiumAdapter;
pub struct MozillaAdapter;
pub struct SafariAdapter;

static CHROMIUM: ChromiumAdapter = ChromiumAdapter;
static MOZILLA: MozillaAdapter = MozillaAdapter;
static SAFARI: SafariAdapter = SafariAdapter;

pub fn adapter_for(browser: Browser) -> &'static dyn SourceAdapter {
    match browser.family() {
        EpochFamily::Chromium => &CHROMIUM,
        EpochFamily::Mozilla => &MOZILLA,
        EpochFamily::Safari => &SAFARI,
    }
}

/// Snapshot, open, query and canonicalize one browser's history database.
pub fn extract(
    browser: Browser,
    path: &Path,
    copier: &dyn SnapshotCopier,
    request: &ExtractRequest,
) -> Result<Vec<VisitRecord>, SourceError> {
    extract_with(adapter_for(browser), browser, path, copier, request)
}

/// [`extract`] with an explicit adapter. The snapshot is removed on every exit path,
/// including a panic inside the adapter.
pub fn extract_with(
    adapter: &dyn SourceAdapter,
    browser: Browser,
    path: &Path,
    copier: &dyn SnapshotCopier,
    request: &ExtractRequest,
) -> Result<Vec<VisitRecord>, SourceError> {
    let snapshot =
        Snapshot::create(copier, browser, path).map_err(|source| SourceError::Snapshot {
            path: path.display().to_string(),
            source,
        })?;
    let rows = {
        let conn = Connection::open_with_flags(
            snapshot.path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        adapter.query(&conn, request)?
    };

    let total = rows.len();
    let mut out = Vec::with_capacity(total);
    let mut dropped = 0usize;
    for raw in rows {
        match canonicalize(browser, raw) {
            Ok(record) => out.push(record),
            Err(err) => {
                dropped += 1;
                debug!("{} row dropped: {err}", browser.key());
            }
        }
    }
    if dropped > 0 {
        debug!("{}: kept {} of {} rows", browser.key(), out.len(), total);
    }

    if let (EpochFamily::Safari, Some(cutoff)) = (adapter.family(), request.cutoff) {
        // The unfiltered safari candidate relies on this in-memory bound.
        out.retain(|r| r.timestamp() > cutoff);
    }
    Ok(out)
}

fn has_table(conn: &Connection, name: &str) -> Result<bool, SourceError> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
    let mut rows = stmt.query([name])?;
    Ok(rows.next()?.is_some())
}

fn list_tables(conn: &Connection) -> Result<Vec<String>, SourceError> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Build `<select> [WHERE <ts> > ?] ORDER BY <ts> DESC LIMIT ?` and its parameters.
fn bounded_query(
    select: &str,
    ts_column: &str,
    family: EpochFamily,
    request: &ExtractRequest,
    apply_cutoff: bool,
) -> (String, Vec<Value>) {
    let mut sql = select.to_string();
    let mut params = Vec::with_capacity(2);
    if let (true, Some(cutoff)) = (apply_cutoff, request.cutoff) {
        sql.push_str(&format!(" WHERE {ts_column} > ?"));
        params.push(family.to_native(cutoff).to_sql_value());
    }
    sql.push_str(&format!(" ORDER BY {ts_column} DESC LIMIT ?"));
    params.push(request.fetch_limit.to_sql_value());
    (sql, params)
}

/// Text columns may hold blobs in damaged or hand-edited databases; non-UTF-8 reads as null.
fn text_value(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        Value::Blob(bytes) => String::from_utf8(bytes).ok(),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Null => None,
    }
}

fn count_value(value: Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(i),
        Value::Real(f) if f.is_finite() => Some(f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn run_query(
    conn: &Connection,
    sql: &str,
    params: Vec<Value>,
) -> Result<Vec<RawVisit>, SourceError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params_from_iter(params), |row| {
        let url = text_value(row.get(0)?);
        let title = text_value(row.get(1)?);
        let visit_count = count_value(row.get(2)?);
        // Unreadable values are treated like nulls so one bad row cannot sink the query.
        let visit_time: Option<RawTimestamp> = row.get(3).unwrap_or(None);
        Ok(RawVisit {
            url,
            title,
            visit_count,
            visit_time,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

impl SourceAdapter for ChromiumAdapter {
    fn family(&self) -> EpochFamily {
        EpochFamily::Chromium
    }

    fn query(
        &self,
        conn: &Connection,
        request: &ExtractRequest,
    ) -> Result<Vec<RawVisit>, SourceError> {
        if !has_table(conn, "urls")? {
            return Err(SourceError::UnknownSchema(list_tables(conn)?.join(", ")));
        }
        let (sql, params) = bounded_query(
            "SELECT url, title, visit_count, last_visit_time FROM urls",
            "last_visit_time",
            self.family(),
            request,
            true,
        );
        run_query(conn, &sql, params)
    }
}

impl SourceAdapter for MozillaAdapter {
    fn family(&self) -> EpochFamily {
        EpochFamily::Mozilla
    }

    fn query(
        &self,
        conn: &Connection,
        request: &ExtractRequest,
    ) -> Result<Vec<RawVisit>, SourceError> {
        if !has_table(conn, "moz_places")? || !has_table(conn, "moz_historyvisits")? {
            return Err(SourceError::UnknownSchema(list_tables(conn)?.join(", ")));
        }
        let (sql, params) = bounded_query(
            "SELECT p.url, p.title, p.visit_count, h.visit_date \
             FROM moz_places p JOIN moz_historyvisits h ON p.id = h.place_id",
            "h.visit_date",
            self.family(),
            request,
            true,
        );
        run_query(conn, &sql, params)
    }
}

/// One way of reading Safari history; the on-disk schema differs across macOS releases.
struct SafariCandidate {
    name: &'static str,
    required: &'static [&'static str],
    select: &'static str,
    ts_column: &'static str,
    apply_cutoff: bool,
}

const SAFARI_CANDIDATES: &[SafariCandidate] = &[
    SafariCandidate {
        name: "joined visits",
        required: &["history_items", "history_visits"],
        select: "SELECT hi.url, hv.title, hi.visit_count, hv.visit_time \
                 FROM history_items hi JOIN history_visits hv ON hi.id = hv.history_item",
        ts_column: "hv.visit_time",
        apply_cutoff: true,
    },
    SafariCandidate {
        name: "direct items",
        required: &["history_items"],
        select: "SELECT url, title, visit_count, visit_time FROM history_items",
        ts_column: "visit_time",
        apply_cutoff: true,
    },
    SafariCandidate {
        name: "direct items, unfiltered",
        required: &["history_items"],
        select: "SELECT url, title, visit_count, visit_time FROM history_items",
        ts_column: "visit_time",
        apply_cutoff: false,
    },
];

impl SourceAdapter for SafariAdapter {
    fn family(&self) -> EpochFamily {
        EpochFamily::Safari
    }

    fn query(
        &self,
        conn: &Connection,
        request: &ExtractRequest,
    ) -> Result<Vec<RawVisit>, SourceError> {
        let tables = list_tables(conn)?;
        debug!("safari tables: {}", tables.join(", "));

        let mut last_error = None;
        let mut tried = 0usize;
        for candidate in SAFARI_CANDIDATES {
            if !candidate.required.iter().all(|t| tables.iter().any(|have| have == t)) {
                continue;
            }
            tried += 1;
            let (sql, params) = bounded_query(
                candidate.select,
                candidate.ts_column,
                self.family(),
                request,
                candidate.apply_cutoff,
            );
            match run_query(conn, &sql, params) {
                Ok(rows) if !rows.is_empty() => {
                    debug!("safari candidate '{}' returned {} rows", candidate.name, rows.len());
                    return Ok(rows);
                }
                Ok(_) => debug!("safari candidate '{}' returned no rows", candidate.name),
                Err(err) => {
                    debug!("safari candidate '{}' failed: {err}", candidate.name);
                    last_error = Some(err);
                }
            }
        }

        if tried == 0 {
            return Err(SourceError::UnknownSchema(tables.join(", ")));
        }
        Err(last_error.unwrap_or(SourceError::NoRows))
    }
}
