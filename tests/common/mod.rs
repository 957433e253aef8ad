//! Shared fixtures for integration tests.
//!
//! Builds small but schema-faithful history databases for each browser family in a
//! temp directory, plus the plan and options the collector needs to read them.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{Connection, params};

use histocarve::parsers::browser::{Browser, VisitRecord};
use histocarve::pipeline::{CollectOptions, SourceLocation, SourcePlan};

// ============================================================================
// Data Structures
// ============================================================================

#[derive(Debug, Clone)]
pub struct Visit {
    pub url: String,
    pub title: Option<String>,
    pub visit_count: Option<i64>,
    pub at: DateTime<Utc>,
}

pub fn visit(url: &str, visit_count: i64, at: DateTime<Utc>) -> Visit {
    Visit {
        url: url.to_string(),
        title: Some(format!("title of {url}")),
        visit_count: Some(visit_count),
        at,
    }
}

// ============================================================================
// Time Helpers
// ============================================================================

pub fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).single().expect("timestamp")
}

pub fn webkit_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros() + 11_644_473_600 * 1_000_000
}

pub fn unix_micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

pub fn cocoa_seconds(at: DateTime<Utc>) -> f64 {
    (at.timestamp() - 978_307_200) as f64
}

// ============================================================================
// Database Builders
// ============================================================================

pub fn chrome_db(path: &Path, visits: &[Visit]) {
    let conn = Connection::open(path).expect("open chrome db");
    conn.execute(
        "CREATE TABLE urls (id INTEGER PRIMARY KEY, url LONGVARCHAR, title LONGVARCHAR, \
         visit_count INTEGER DEFAULT 0 NOT NULL, typed_count INTEGER DEFAULT 0 NOT NULL, \
         last_visit_time INTEGER NOT NULL, hidden INTEGER DEFAULT 0 NOT NULL)",
        [],
    )
    .expect("create urls");
    for v in visits {
        conn.execute(
            "INSERT INTO urls (url, title, visit_count, last_visit_time) VALUES (?1, ?2, ?3, ?4)",
            params![v.url, v.title, v.visit_count.unwrap_or(0), webkit_micros(v.at)],
        )
        .expect("insert url");
    }
}

pub fn firefox_db(path: &Path, visits: &[Visit]) {
    let conn = Connection::open(path).expect("open firefox db");
    conn.execute_batch(
        "CREATE TABLE moz_places (id INTEGER PRIMARY KEY, url LONGVARCHAR, title LONGVARCHAR, \
             rev_host LONGVARCHAR, visit_count INTEGER DEFAULT 0, hidden INTEGER DEFAULT 0);
         CREATE TABLE moz_historyvisits (id INTEGER PRIMARY KEY, from_visit INTEGER, \
             place_id INTEGER, visit_date INTEGER, visit_type INTEGER, session INTEGER);",
    )
    .expect("create moz tables");
    for (i, v) in visits.iter().enumerate() {
        let id = i as i64 + 1;
        conn.execute(
            "INSERT INTO moz_places (id, url, title, visit_count) VALUES (?1, ?2, ?3, ?4)",
            params![id, v.url, v.title, v.visit_count],
        )
        .expect("insert place");
        conn.execute(
            "INSERT INTO moz_historyvisits (place_id, visit_date, visit_type) VALUES (?1, ?2, 1)",
            params![id, unix_micros(v.at)],
        )
        .expect("insert visit");
    }
}

pub fn safari_db(path: &Path, visits: &[Visit]) {
    let conn = Connection::open(path).expect("open safari db");
    conn.execute_batch(
        "CREATE TABLE history_items (id INTEGER PRIMARY KEY, url TEXT NOT NULL UNIQUE, \
             domain_expansion TEXT, visit_count INTEGER NOT NULL, title TEXT, visit_time REAL);
         CREATE TABLE history_visits (id INTEGER PRIMARY KEY, history_item INTEGER NOT NULL, \
             visit_time REAL NOT NULL, title TEXT, load_successful BOOLEAN NOT NULL DEFAULT 1);",
    )
    .expect("create safari tables");
    for (i, v) in visits.iter().enumerate() {
        let id = i as i64 + 1;
        conn.execute(
            "INSERT INTO history_items (id, url, visit_count, visit_time) VALUES (?1, ?2, ?3, ?4)",
            params![id, v.url, v.visit_count.unwrap_or(0), cocoa_seconds(v.at)],
        )
        .expect("insert item");
        conn.execute(
            "INSERT INTO history_visits (history_item, visit_time, title) VALUES (?1, ?2, ?3)",
            params![id, cocoa_seconds(v.at), v.title],
        )
        .expect("insert visit");
    }
}

/// Build the database for `browser` at `dir/<key>.db` with the family's schema.
pub fn build_source(dir: &Path, browser: Browser, visits: &[Visit]) -> PathBuf {
    let path = dir.join(format!("{}.db", browser.key()));
    match browser {
        Browser::Safari => safari_db(&path, visits),
        Browser::Firefox | Browser::TorBrowser | Browser::LibreWolf => firefox_db(&path, visits),
        _ => chrome_db(&path, visits),
    }
    path
}

// ============================================================================
// Collector Helpers
// ============================================================================

pub fn plan_of(sources: &[(Browser, &Path)]) -> SourcePlan {
    sources
        .iter()
        .map(|(b, p)| (*b, SourceLocation::Found(p.to_path_buf())))
        .collect()
}

/// Options reading every row regardless of age.
pub fn everything() -> CollectOptions {
    CollectOptions {
        no_time_filter: true,
        ..CollectOptions::default()
    }
}

pub fn record(browser: Browser, url: &str, visit_count: i64, at: DateTime<Utc>) -> VisitRecord {
    VisitRecord::new(browser, url, Some(format!("title of {url}")), Some(visit_count), at)
}

pub fn urls(records: &[VisitRecord]) -> Vec<&str> {
    records.iter().map(|r| r.url()).collect()
}
