use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::parsers::epoch::{ConversionError, EpochFamily, RawTimestamp};

/// Placeholder used when a source row has no title.
pub const NO_TITLE: &str = "No Title";

/// Supported browsers, in the order sources are collected and merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Firefox,
    Safari,
    Brave,
    Opera,
    Edge,
    Vivaldi,
    #[serde(rename = "tor")]
    TorBrowser,
    Chromium,
    #[serde(rename = "librewolf")]
    LibreWolf,
}

impl Browser {
    pub const ALL: [Browser; 10] = [
        Browser::Chrome,
        Browser::Firefox,
        Browser::Safari,
        Browser::Brave,
        Browser::Opera,
        Browser::Edge,
        Browser::Vivaldi,
        Browser::TorBrowser,
        Browser::Chromium,
        Browser::LibreWolf,
    ];

    pub fn family(self) -> EpochFamily {
        match self {
            Browser::Firefox | Browser::TorBrowser | Browser::LibreWolf => EpochFamily::Mozilla,
            Browser::Safari => EpochFamily::Safari,
            Browser::Chrome
            | Browser::Brave
            | Browser::Opera
            | Browser::Edge
            | Browser::Vivaldi
            | Browser::Chromium => EpochFamily::Chromium,
        }
    }

    /// Short lowercase key used in config files, CLI lists and temp file names.
    pub fn key(self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Firefox => "firefox",
            Browser::Safari => "safari",
            Browser::Brave => "brave",
            Browser::Opera => "opera",
            Browser::Edge => "edge",
            Browser::Vivaldi => "vivaldi",
            Browser::TorBrowser => "tor",
            Browser::Chromium => "chromium",
            Browser::LibreWolf => "librewolf",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Browser::Chrome => "Chrome",
            Browser::Firefox => "Firefox",
            Browser::Safari => "Safari",
            Browser::Brave => "Brave",
            Browser::Opera => "Opera",
            Browser::Edge => "Edge",
            Browser::Vivaldi => "Vivaldi",
            Browser::TorBrowser => "Tor Browser",
            Browser::Chromium => "Chromium",
            Browser::LibreWolf => "LibreWolf",
        }
    }
}

impl fmt::Display for Browser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl Serialize for Browser {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownBrowser(pub String);

impl fmt::Display for UnknownBrowser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown browser '{}'", self.0)
    }
}

impl std::error::Error for UnknownBrowser {}

impl FromStr for Browser {
    type Err = UnknownBrowser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Browser::ALL
            .into_iter()
            .find(|b| b.key() == wanted || b.display_name().to_ascii_lowercase() == wanted)
            .ok_or_else(|| UnknownBrowser(s.trim().to_string()))
    }
}

/// One visit, normalized across browser families. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisitRecord {
    browser: Browser,
    url: String,
    title: String,
    visit_count: u64,
    timestamp: DateTime<Utc>,
}

impl VisitRecord {
    pub fn new(
        browser: Browser,
        url: impl Into<String>,
        title: Option<String>,
        visit_count: Option<i64>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let title = title
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| NO_TITLE.to_string());
        let visit_count = visit_count
            .and_then(|c| u64::try_from(c).ok())
            .filter(|c| *c > 0)
            .unwrap_or(1);
        Self {
            browser,
            url: url.into(),
            title,
            visit_count,
            timestamp,
        }
    }

    pub fn browser(&self) -> Browser {
        self.browser
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn visit_count(&self) -> u64 {
        self.visit_count
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn domain(&self) -> String {
        derive_domain(&self.url)
    }
}

/// Lowercased network location of `scheme://authority/...`, or `""` when there is none.
pub fn derive_domain(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return String::new();
    };
    let valid_scheme = scheme
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic())
        && scheme
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    if !valid_scheme {
        return String::new();
    }
    let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    rest[..end].to_lowercase()
}

/// A row as read from a history database, before normalization.
#[derive(Debug, Clone)]
pub struct RawVisit {
    pub url: Option<String>,
    pub title: Option<String>,
    pub visit_count: Option<i64>,
    pub visit_time: Option<RawTimestamp>,
}

#[derive(Debug, Error, PartialEq)]
pub enum RowRejected {
    #[error("row has no url")]
    MissingUrl,
    #[error(transparent)]
    Timestamp(#[from] ConversionError),
}

/// Stamp and wrap a raw row. Rows without a url or a convertible timestamp are rejected.
pub fn canonicalize(browser: Browser, raw: RawVisit) -> Result<VisitRecord, RowRejected> {
    let url = match raw.url {
        Some(url) if !url.is_empty() => url,
        _ => return Err(RowRejected::MissingUrl),
    };
    let value = raw.visit_time.ok_or(ConversionError::Missing)?;
    let timestamp = browser.family().normalize(value)?;
    Ok(VisitRecord::new(browser, url, raw.title, raw.visit_count, timestamp))
}
