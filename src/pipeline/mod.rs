//! # Pipeline Module
//!
//! Collects visit records from every enabled browser source, isolating failures per
//! source, and merges them into one timeline ordered newest first.

pub mod events;
pub mod workers;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use crate::parsers::browser::{Browser, VisitRecord};
use crate::parsers::snapshot::{FsCopier, SnapshotCopier};
use crate::parsers::sqlite_db::{ExtractRequest, FetchLimit};

use events::{SourceOutcome, SourceReport};
use workers::SourceJob;

/// Multiplier applied to the display limit when content filters will discard rows.
pub const FILTER_FETCH_MULTIPLIER: usize = 10;

/// Result of external path discovery for one browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Found(PathBuf),
    Absent,
}

/// Enabled browsers and where their databases are. Iterates in declared browser order.
pub type SourcePlan = BTreeMap<Browser, SourceLocation>;

#[derive(Debug, Clone)]
pub struct CollectOptions {
    pub days_back: u32,
    pub display_limit: usize,
    pub search_all: bool,
    pub no_time_filter: bool,
    /// Whether domain, keyword or visit-count filters will run downstream.
    pub filters_active: bool,
    /// Run one worker per source instead of reading sources one at a time.
    pub parallel: bool,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            days_back: 7,
            display_limit: 100,
            search_all: false,
            no_time_filter: false,
            filters_active: false,
            parallel: false,
        }
    }
}

impl CollectOptions {
    /// Adapter-facing row cap, wider than the display limit when filters will thin the
    /// stream.
    pub fn fetch_limit(&self) -> FetchLimit {
        if self.search_all || self.no_time_filter {
            FetchLimit::Unbounded
        } else if self.filters_active {
            FetchLimit::Rows(self.display_limit.saturating_mul(FILTER_FETCH_MULTIPLIER))
        } else {
            FetchLimit::Rows(self.display_limit)
        }
    }

    /// Source-level lower time bound, if source-level time filtering is on.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if self.no_time_filter {
            return None;
        }
        let days = TimeDelta::try_days(i64::from(self.days_back)).unwrap_or(TimeDelta::MAX);
        Some(now.checked_sub_signed(days).unwrap_or(DateTime::<Utc>::MIN_UTC))
    }
}

/// Merged records plus what happened at each source.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    pub records: Vec<VisitRecord>,
    pub reports: Vec<SourceReport>,
}

impl Collection {
    pub fn failures(&self) -> impl Iterator<Item = &SourceReport> {
        self.reports.iter().filter(|r| r.is_failure())
    }
}

pub struct Collector<C: SnapshotCopier = FsCopier> {
    copier: C,
}

impl Default for Collector<FsCopier> {
    fn default() -> Self {
        Self { copier: FsCopier }
    }
}

impl<C: SnapshotCopier> Collector<C> {
    pub fn with_copier(copier: C) -> Self {
        Self { copier }
    }

    pub fn collect(
        &self,
        plan: &SourcePlan,
        options: &CollectOptions,
        now: DateTime<Utc>,
    ) -> Collection {
        let request = ExtractRequest {
            fetch_limit: options.fetch_limit(),
            cutoff: options.cutoff(now),
        };
        info!(
            "collecting from {} source(s), fetch_limit={:?}, cutoff={:?}",
            plan.len(),
            request.fetch_limit,
            request.cutoff
        );

        let mut reports: Vec<Option<SourceReport>> = Vec::with_capacity(plan.len());
        let mut jobs = Vec::new();
        let mut job_slots = Vec::new();
        for (browser, location) in plan {
            match location {
                SourceLocation::Found(path) => {
                    info!("reading {} history from {}", browser, path.display());
                    job_slots.push(reports.len());
                    reports.push(None);
                    jobs.push(SourceJob {
                        browser: *browser,
                        path: path.as_path(),
                    });
                }
                SourceLocation::Absent => {
                    info!("{} history not found", browser);
                    reports.push(Some(SourceReport {
                        browser: *browser,
                        outcome: SourceOutcome::Absent,
                    }));
                }
            }
        }

        let results = if options.parallel {
            workers::run_parallel(&jobs, &self.copier, &request)
        } else {
            workers::run_sequential(&jobs, &self.copier, &request)
        };

        let mut records = Vec::new();
        for ((job, slot), result) in jobs.iter().zip(job_slots).zip(results) {
            let path = job.path.to_path_buf();
            let outcome = match result {
                Ok(batch) => {
                    let count = batch.len();
                    records.extend(batch);
                    SourceOutcome::Extracted { path, records: count }
                }
                Err(err) => {
                    warn!("error reading {} history: {err}", job.browser);
                    SourceOutcome::Failed {
                        path,
                        error: err.to_string(),
                    }
                }
            };
            reports[slot] = Some(SourceReport {
                browser: job.browser,
                outcome,
            });
        }

        sort_timeline(&mut records);
        Collection {
            records,
            reports: reports.into_iter().flatten().collect(),
        }
    }
}

/// Newest first; equal timestamps keep their existing relative order.
pub fn sort_timeline(records: &mut [VisitRecord]) {
    records.sort_by(|a, b| b.timestamp().cmp(&a.timestamp()));
}
