//! # Analytics
//!
//! Aggregate views over a filtered timeline: summary counts, time range, per-browser
//! usage, top domains and temporal pattern buckets. [`analyze`] folds the records once
//! into an accumulator and freezes it into an immutable [`AnalyticsReport`].

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Datelike, Utc, Weekday};
use serde::{Deserialize, Serialize};

use crate::parsers::browser::{Browser, VisitRecord};

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Hour,
    Day,
    Weekday,
    Month,
}

impl Granularity {
    pub fn bucket(self, timestamp: DateTime<Utc>) -> String {
        match self {
            Granularity::Hour => timestamp.format("%H:00").to_string(),
            Granularity::Day => timestamp.format("%Y-%m-%d").to_string(),
            Granularity::Weekday => weekday_name(timestamp.weekday()).to_string(),
            Granularity::Month => timestamp.format("%Y-%m").to_string(),
        }
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyticsOptions {
    pub group_by: Granularity,
    pub top_domains_limit: usize,
}

impl Default for AnalyticsOptions {
    fn default() -> Self {
        Self {
            group_by: Granularity::Hour,
            top_domains_limit: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_entries: usize,
    pub total_visits: u64,
    pub unique_domains: usize,
    pub unique_urls: usize,
    pub average_visits_per_entry: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeRange {
    pub earliest: DateTime<Utc>,
    pub latest: DateTime<Utc>,
    pub span_days: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrowserUsage {
    pub entries: usize,
    pub visits: u64,
    pub entries_pct: f64,
    pub visits_pct: f64,
    pub unique_domains: usize,
    pub average_visits_per_entry: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopDomains {
    pub by_count: Vec<DomainCount>,
    pub by_visits: Vec<DomainCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatternBucket {
    pub label: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub summary: Summary,
    pub time_range: Option<TimeRange>,
    pub browser_usage: BTreeMap<Browser, BrowserUsage>,
    pub top_domains: TopDomains,
    pub group_by: Granularity,
    pub patterns: Vec<PatternBucket>,
    /// Number of entries per visit count.
    pub visit_frequency: BTreeMap<u64, u64>,
}

#[derive(Default)]
struct BrowserTally {
    entries: usize,
    visits: u64,
    domains: HashSet<String>,
}

#[derive(Default)]
struct DomainTally {
    entries: u64,
    visits: u64,
}

#[derive(Default)]
struct Accumulator {
    entries: usize,
    visits: u64,
    all_domains: HashSet<String>,
    urls: HashSet<String>,
    earliest: Option<DateTime<Utc>>,
    latest: Option<DateTime<Utc>>,
    browsers: BTreeMap<Browser, BrowserTally>,
    domain_index: HashMap<String, usize>,
    domains: Vec<(String, DomainTally)>,
    buckets: BTreeMap<String, u64>,
    visit_frequency: BTreeMap<u64, u64>,
}

impl Accumulator {
    fn push(mut self, record: &VisitRecord, group_by: Granularity) -> Self {
        let domain = record.domain();
        let visits = record.visit_count();
        let ts = record.timestamp();

        self.entries += 1;
        self.visits += visits;
        self.urls.insert(record.url().to_string());
        self.earliest = Some(self.earliest.map_or(ts, |e| e.min(ts)));
        self.latest = Some(self.latest.map_or(ts, |l| l.max(ts)));

        let browser = self.browsers.entry(record.browser()).or_default();
        browser.entries += 1;
        browser.visits += visits;
        if !domain.is_empty() {
            browser.domains.insert(domain.clone());
            // insertion order of `domains` is encounter order, used for tie breaks
            let slot = match self.domain_index.get(&domain) {
                Some(&i) => i,
                None => {
                    self.domain_index.insert(domain.clone(), self.domains.len());
                    self.domains.push((domain.clone(), DomainTally::default()));
                    self.domains.len() - 1
                }
            };
            let tally = &mut self.domains[slot].1;
            tally.entries += 1;
            tally.visits += visits;
        }
        self.all_domains.insert(domain);

        *self.buckets.entry(group_by.bucket(ts)).or_insert(0) += 1;
        *self.visit_frequency.entry(visits).or_insert(0) += 1;
        self
    }

    fn finish(self, options: &AnalyticsOptions) -> AnalyticsReport {
        let summary = Summary {
            total_entries: self.entries,
            total_visits: self.visits,
            unique_domains: self.all_domains.len(),
            unique_urls: self.urls.len(),
            average_visits_per_entry: if self.entries == 0 {
                0.0
            } else {
                round2(self.visits as f64 / self.entries as f64)
            },
        };

        let time_range = match (self.earliest, self.latest) {
            (Some(earliest), Some(latest)) => Some(TimeRange {
                earliest,
                latest,
                span_days: (latest - earliest).num_days(),
            }),
            _ => None,
        };

        let total_entries = self.entries;
        let total_visits = self.visits;
        let browser_usage = self
            .browsers
            .into_iter()
            .map(|(browser, tally)| {
                let usage = BrowserUsage {
                    entries: tally.entries,
                    visits: tally.visits,
                    entries_pct: percent(tally.entries as f64, total_entries as f64),
                    visits_pct: percent(tally.visits as f64, total_visits as f64),
                    unique_domains: tally.domains.len(),
                    average_visits_per_entry: if tally.entries == 0 {
                        0.0
                    } else {
                        tally.visits as f64 / tally.entries as f64
                    },
                };
                (browser, usage)
            })
            .collect();

        let top_domains = TopDomains {
            by_count: ranked(&self.domains, |t| t.entries, options.top_domains_limit),
            by_visits: ranked(&self.domains, |t| t.visits, options.top_domains_limit),
        };

        let patterns = match options.group_by {
            Granularity::Weekday => WEEKDAYS
                .iter()
                .map(|day| {
                    let label = weekday_name(*day).to_string();
                    let count = self.buckets.get(&label).copied().unwrap_or(0);
                    PatternBucket { label, count }
                })
                .collect(),
            _ => self
                .buckets
                .into_iter()
                .map(|(label, count)| PatternBucket { label, count })
                .collect(),
        };

        AnalyticsReport {
            summary,
            time_range,
            browser_usage,
            top_domains,
            group_by: options.group_by,
            patterns,
            visit_frequency: self.visit_frequency,
        }
    }
}

/// Highest first; `sort_by` is stable so ties stay in encounter order.
fn ranked(
    domains: &[(String, DomainTally)],
    key: fn(&DomainTally) -> u64,
    limit: usize,
) -> Vec<DomainCount> {
    let mut ranked: Vec<DomainCount> = domains
        .iter()
        .map(|(domain, tally)| DomainCount {
            domain: domain.clone(),
            count: key(tally),
        })
        .collect();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);
    ranked
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn analyze(records: &[VisitRecord], options: &AnalyticsOptions) -> AnalyticsReport {
    records
        .iter()
        .fold(Accumulator::default(), |acc, record| acc.push(record, options.group_by))
        .finish(options)
}

/// Pattern buckets alone, without the rest of the report.
pub fn patterns(records: &[VisitRecord], group_by: Granularity) -> Vec<PatternBucket> {
    let options = AnalyticsOptions {
        group_by,
        top_domains_limit: 0,
    };
    analyze(records, &options).patterns
}
