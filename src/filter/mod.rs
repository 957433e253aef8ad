//! # Filter Pipeline
//!
//! Narrows the collected timeline with independent predicates: domain allow and deny
//! lists, keywords over title and url, visit-count bounds and time bounds. Each
//! predicate is an intersection, so the order they run in only changes the intermediate
//! counts, never the final set. Records are selected or rejected, never modified.

pub mod matcher;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::parsers::browser::VisitRecord;

pub use matcher::{MatchMode, PatternMatcher, RegexMatcher, SubstringMatcher};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub domain_whitelist: Vec<String>,
    pub domain_blacklist: Vec<String>,
    pub keywords: Vec<String>,
    pub min_visit_count: u64,
    pub max_visit_count: Option<u64>,
    pub time_from: Option<String>,
    pub time_to: Option<String>,
    pub use_regex: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            domain_whitelist: Vec::new(),
            domain_blacklist: Vec::new(),
            keywords: Vec::new(),
            min_visit_count: 1,
            max_visit_count: None,
            time_from: None,
            time_to: None,
            use_regex: false,
        }
    }
}

impl FilterConfig {
    /// True when a filter that discards rows by content (not by time) is configured.
    pub fn has_content_filters(&self) -> bool {
        !self.domain_whitelist.is_empty()
            || !self.domain_blacklist.is_empty()
            || !self.keywords.is_empty()
            || self.min_visit_count > 1
            || self.max_visit_count.is_some()
    }
}

/// Problems with filter input. Each one disables only the predicate or bound it names.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterWarning {
    #[error("invalid {predicate} pattern '{pattern}': {message}; {predicate} filter skipped")]
    InvalidPattern {
        predicate: &'static str,
        pattern: String,
        message: String,
    },
    #[error("invalid {bound} format: {value}; bound ignored")]
    InvalidTimeBound { bound: &'static str, value: String },
}

#[derive(Debug)]
enum Predicate {
    DomainWhitelist(Vec<Box<dyn PatternMatcher>>),
    DomainBlacklist(Vec<Box<dyn PatternMatcher>>),
    Keywords(Vec<Box<dyn PatternMatcher>>),
    MinVisits(u64),
    MaxVisits(u64),
    TimeFrom(DateTime<Utc>),
    TimeTo(DateTime<Utc>),
}

impl Predicate {
    fn name(&self) -> &'static str {
        match self {
            Predicate::DomainWhitelist(_) => "domain_whitelist",
            Predicate::DomainBlacklist(_) => "domain_blacklist",
            Predicate::Keywords(_) => "keywords",
            Predicate::MinVisits(_) => "min_visit_count",
            Predicate::MaxVisits(_) => "max_visit_count",
            Predicate::TimeFrom(_) => "time_from",
            Predicate::TimeTo(_) => "time_to",
        }
    }

    fn keeps(&self, record: &VisitRecord) -> bool {
        match self {
            Predicate::DomainWhitelist(matchers) => {
                let domain = record.domain();
                matchers.iter().any(|m| m.is_match(&domain))
            }
            Predicate::DomainBlacklist(matchers) => {
                let domain = record.domain();
                !matchers.iter().any(|m| m.is_match(&domain))
            }
            Predicate::Keywords(matchers) => matchers
                .iter()
                .any(|m| m.is_match(record.title()) || m.is_match(record.url())),
            Predicate::MinVisits(min) => record.visit_count() >= *min,
            Predicate::MaxVisits(max) => record.visit_count() <= *max,
            Predicate::TimeFrom(from) => record.timestamp() >= *from,
            Predicate::TimeTo(to) => record.timestamp() <= *to,
        }
    }
}

/// Record counts around one predicate, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCount {
    pub predicate: &'static str,
    pub before: usize,
    pub after: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FilterOutcome {
    pub records: Vec<VisitRecord>,
    pub stages: Vec<StageCount>,
}

#[derive(Debug, Default)]
pub struct FilterPipeline {
    predicates: Vec<Predicate>,
    warnings: Vec<FilterWarning>,
}

type PredicateCtor = fn(Vec<Box<dyn PatternMatcher>>) -> Predicate;

impl FilterPipeline {
    pub fn from_config(config: &FilterConfig) -> Self {
        let mode = MatchMode::from_flag(config.use_regex);
        let mut pipeline = FilterPipeline::default();

        let lists: [(&'static str, &Vec<String>, PredicateCtor); 3] = [
            ("domain_whitelist", &config.domain_whitelist, Predicate::DomainWhitelist),
            ("domain_blacklist", &config.domain_blacklist, Predicate::DomainBlacklist),
            ("keywords", &config.keywords, Predicate::Keywords),
        ];
        for (name, patterns, build) in lists {
            if patterns.is_empty() {
                continue;
            }
            match mode.compile(patterns) {
                Ok(matchers) => pipeline.predicates.push(build(matchers)),
                Err((pattern, err)) => pipeline.warnings.push(FilterWarning::InvalidPattern {
                    predicate: name,
                    pattern,
                    message: err.to_string(),
                }),
            }
        }

        if config.min_visit_count > 1 {
            pipeline.predicates.push(Predicate::MinVisits(config.min_visit_count));
        }
        if let Some(max) = config.max_visit_count {
            pipeline.predicates.push(Predicate::MaxVisits(max));
        }

        let warnings = &mut pipeline.warnings;
        let from = parse_bound("time_from", config.time_from.as_deref(), warnings);
        let to = parse_bound("time_to", config.time_to.as_deref(), warnings);
        if let Some(from) = from {
            pipeline.predicates.push(Predicate::TimeFrom(from));
        }
        if let Some(to) = to {
            pipeline.predicates.push(Predicate::TimeTo(to));
        }

        for warning in &pipeline.warnings {
            warn!("{warning}");
        }
        pipeline
    }

    pub fn warnings(&self) -> &[FilterWarning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn keeps(&self, record: &VisitRecord) -> bool {
        self.predicates.iter().all(|p| p.keeps(record))
    }

    pub fn apply(&self, records: Vec<VisitRecord>) -> FilterOutcome {
        let mut stages = Vec::with_capacity(self.predicates.len());
        let mut current = records;
        for predicate in &self.predicates {
            let before = current.len();
            current.retain(|r| predicate.keeps(r));
            debug!("{}: {} -> {} entries", predicate.name(), before, current.len());
            stages.push(StageCount {
                predicate: predicate.name(),
                before,
                after: current.len(),
            });
        }
        FilterOutcome {
            records: current,
            stages,
        }
    }
}

fn parse_bound(
    bound: &'static str,
    value: Option<&str>,
    warnings: &mut Vec<FilterWarning>,
) -> Option<DateTime<Utc>> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    let parsed = parse_time_bound(value);
    if parsed.is_none() {
        warnings.push(FilterWarning::InvalidTimeBound {
            bound,
            value: value.to_string(),
        });
    }
    parsed
}

/// Filter `records` with a pipeline built from `config`.
pub fn apply(records: Vec<VisitRecord>, config: &FilterConfig) -> Vec<VisitRecord> {
    FilterPipeline::from_config(config).apply(records).records
}

/// Parse an ISO-8601 time bound. Values without an offset are taken as UTC.
pub fn parse_time_bound(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::browser::Browser;
    use chrono::TimeZone;

    fn record(url: &str, title: &str, count: i64, secs: i64) -> VisitRecord {
        VisitRecord::new(
            Browser::Chrome,
            url,
            Some(title.to_string()),
            Some(count),
            Utc.timestamp_opt(secs, 0).single().expect("ts"),
        )
    }

    fn urls(records: &[VisitRecord]) -> Vec<&str> {
        records.iter().map(|r| r.url()).collect()
    }

    #[test]
    fn whitelist_substring() {
        let records = vec![
            record("https://api.github.com/x", "API", 1, 10),
            record("https://example.com/y", "Example", 1, 20),
        ];
        let config = FilterConfig {
            domain_whitelist: vec!["github.com".into()],
            ..FilterConfig::default()
        };
        assert_eq!(urls(&apply(records, &config)), vec!["https://api.github.com/x"]);
    }

    #[test]
    fn blacklist_drops_any_match() {
        let records = vec![
            record("https://ads.tracker.net/p", "", 1, 10),
            record("https://news.site/p", "", 1, 20),
            record("https://cdn.TRACKER.net/q", "", 1, 30),
        ];
        let config = FilterConfig {
            domain_blacklist: vec!["Tracker".into(), "nothing".into()],
            ..FilterConfig::default()
        };
        assert_eq!(urls(&apply(records, &config)), vec!["https://news.site/p"]);
    }

    #[test]
    fn whitelist_only_looks_at_domain() {
        let records = vec![record("https://example.com/github.com", "github.com", 1, 10)];
        let config = FilterConfig {
            domain_whitelist: vec!["github.com".into()],
            ..FilterConfig::default()
        };
        assert!(apply(records, &config).is_empty());
    }

    #[test]
    fn keywords_match_title_or_url() {
        let records = vec![
            record("https://a.com/rust-book", "Chapter 1", 1, 10),
            record("https://b.com/", "Learning RUST", 1, 20),
            record("https://c.com/", "Cooking", 1, 30),
            record("https://d.com/go", "Go tour", 1, 40),
        ];
        let config = FilterConfig {
            keywords: vec!["rust".into(), "tour".into()],
            ..FilterConfig::default()
        };
        assert_eq!(
            urls(&apply(records, &config)),
            vec!["https://a.com/rust-book", "https://b.com/", "https://d.com/go"]
        );
    }

    #[test]
    fn regex_mode() {
        let records = vec![
            record("https://www.rust-lang.org/", "", 1, 10),
            record("https://blog.rust-lang.org/", "", 1, 20),
        ];
        let config = FilterConfig {
            domain_whitelist: vec![r"^www\.".into()],
            use_regex: true,
            ..FilterConfig::default()
        };
        assert_eq!(urls(&apply(records, &config)), vec!["https://www.rust-lang.org/"]);
    }

    #[test]
    fn min_visit_count_keeps_inclusive() {
        let records = vec![
            record("https://one", "", 1, 10),
            record("https://five", "", 5, 20),
            record("https://ten", "", 10, 30),
        ];
        let config = FilterConfig {
            min_visit_count: 5,
            ..FilterConfig::default()
        };
        assert_eq!(urls(&apply(records.clone(), &config)), vec!["https://five", "https://ten"]);

        let config = FilterConfig {
            max_visit_count: Some(5),
            ..FilterConfig::default()
        };
        assert_eq!(urls(&apply(records, &config)), vec!["https://one", "https://five"]);
    }

    #[test]
    fn time_bounds_are_inclusive() {
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).single().expect("ts").timestamp();
        let records = vec![
            record("https://before", "", 1, base - 1),
            record("https://at-from", "", 1, base),
            record("https://at-to", "", 1, base + 3600),
            record("https://after", "", 1, base + 3601),
        ];
        let config = FilterConfig {
            time_from: Some("2025-06-01T10:00:00".into()),
            time_to: Some("2025-06-01T11:00:00Z".into()),
            ..FilterConfig::default()
        };
        assert_eq!(urls(&apply(records, &config)), vec!["https://at-from", "https://at-to"]);
    }

    #[test]
    fn invalid_time_bound_is_skipped_with_warning() {
        let records = vec![record("https://a", "", 1, 10), record("https://b", "", 7, 20)];
        let config = FilterConfig {
            time_from: Some("yesterday-ish".into()),
            min_visit_count: 5,
            ..FilterConfig::default()
        };
        let pipeline = FilterPipeline::from_config(&config);
        assert_eq!(
            pipeline.warnings(),
            &[FilterWarning::InvalidTimeBound {
                bound: "time_from",
                value: "yesterday-ish".into()
            }]
        );
        assert_eq!(urls(&pipeline.apply(records).records), vec!["https://b"]);
    }

    #[test]
    fn invalid_regex_skips_only_its_predicate() {
        let records = vec![
            record("https://a.com", "rust", 1, 10),
            record("https://b.com", "go", 1, 20),
        ];
        let config = FilterConfig {
            domain_whitelist: vec!["([".into()],
            keywords: vec!["rust".into()],
            use_regex: true,
            ..FilterConfig::default()
        };
        let pipeline = FilterPipeline::from_config(&config);
        assert_eq!(pipeline.warnings().len(), 1);
        assert!(matches!(
            pipeline.warnings()[0],
            FilterWarning::InvalidPattern { predicate: "domain_whitelist", .. }
        ));
        assert_eq!(urls(&pipeline.apply(records).records), vec!["https://a.com"]);
    }

    #[test]
    fn stage_counts_track_each_predicate() {
        let records = vec![
            record("https://github.com/a", "", 1, 10),
            record("https://github.com/b", "", 9, 20),
            record("https://example.com/", "", 9, 30),
        ];
        let config = FilterConfig {
            domain_whitelist: vec!["github".into()],
            min_visit_count: 2,
            ..FilterConfig::default()
        };
        let outcome = FilterPipeline::from_config(&config).apply(records);
        assert_eq!(
            outcome.stages,
            vec![
                StageCount { predicate: "domain_whitelist", before: 3, after: 2 },
                StageCount { predicate: "min_visit_count", before: 2, after: 1 },
            ]
        );
    }

    #[test]
    fn default_config_keeps_everything() {
        let records = vec![record("https://a", "", 1, 10), record("not a url", "", 1, 20)];
        let config = FilterConfig::default();
        assert!(!config.has_content_filters());
        assert!(FilterPipeline::from_config(&config).is_empty());
        assert_eq!(apply(records.clone(), &config), records);
    }

    #[test]
    fn content_filter_detection() {
        let time_only = FilterConfig {
            time_from: Some("2025-01-01".into()),
            ..FilterConfig::default()
        };
        assert!(!time_only.has_content_filters());
        let with_max = FilterConfig {
            max_visit_count: Some(3),
            ..FilterConfig::default()
        };
        assert!(with_max.has_content_filters());
    }

    #[test]
    fn parses_time_bound_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).single().expect("ts");
        assert_eq!(parse_time_bound("2025-06-01T10:00:00"), Some(expected));
        assert_eq!(parse_time_bound("2025-06-01T10:00:00Z"), Some(expected));
        assert_eq!(parse_time_bound("2025-06-01T12:00:00+02:00"), Some(expected));
        assert_eq!(parse_time_bound("2025-06-01 10:00:00"), Some(expected));
        assert_eq!(parse_time_bound("2025-06-01T10:00"), Some(expected));
        assert_eq!(
            parse_time_bound("2025-06-01"),
            Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).single()
        );
        assert_eq!(parse_time_bound("06/01/2025"), None);
    }
}
