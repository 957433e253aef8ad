//! # Utility Module
//!
//! Glue between the command line and the library: CLI overrides on top of the loaded
//! configuration, browser selection, collection options and the display limit.

use std::collections::HashSet;

use crate::analytics::{AnalyticsOptions, Granularity};
use crate::cli::{CliOptions, FormatArg, GroupByArg};
use crate::config::{Config, OutputFormat};
use crate::parsers::browser::Browser;
use crate::pipeline::CollectOptions;

pub fn format_from_cli(format: FormatArg) -> OutputFormat {
    match format {
        FormatArg::Timeline => OutputFormat::Timeline,
        FormatArg::Stats => OutputFormat::Stats,
        FormatArg::TopDomains => OutputFormat::TopDomains,
        FormatArg::BrowserUsage => OutputFormat::BrowserUsage,
        FormatArg::Patterns => OutputFormat::Patterns,
        FormatArg::Json => OutputFormat::Json,
        FormatArg::Jsonl => OutputFormat::Jsonl,
        FormatArg::Csv => OutputFormat::Csv,
    }
}

pub fn granularity_from_cli(group_by: GroupByArg) -> Granularity {
    match group_by {
        GroupByArg::Hour => Granularity::Hour,
        GroupByArg::Day => Granularity::Day,
        GroupByArg::Weekday => Granularity::Weekday,
        GroupByArg::Month => Granularity::Month,
    }
}

fn parse_names(list: &[String], unknown: &mut Vec<String>) -> HashSet<Browser> {
    let mut known = HashSet::new();
    for entry in list {
        let trimmed = entry.trim();
        if trimmed.is_empty() {
            continue;
        }
        match trimmed.parse::<Browser>() {
            Ok(browser) => {
                known.insert(browser);
            }
            Err(_) => unknown.push(trimmed.to_string()),
        }
    }
    known
}

/// Apply `--browsers` (enable only these) and `--exclude-browsers` (disable these) to the
/// config. Returns names that matched no browser; those are otherwise ignored.
pub fn select_browsers(
    cfg: &mut Config,
    include: Option<&[String]>,
    exclude: Option<&[String]>,
) -> Vec<String> {
    let mut unknown = Vec::new();
    if let Some(list) = include {
        let wanted = parse_names(list, &mut unknown);
        for browser in Browser::ALL {
            cfg.set_browser(browser, wanted.contains(&browser));
        }
    }
    if let Some(list) = exclude {
        for browser in parse_names(list, &mut unknown) {
            cfg.set_browser(browser, false);
        }
    }
    unknown
}

fn trimmed(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Overlay every set CLI option on the loaded config. Browser selection is separate,
/// see [`select_browsers`].
pub fn apply_cli_overrides(cfg: &mut Config, opts: &CliOptions) {
    if let Some(format) = opts.format {
        cfg.output.format = format_from_cli(format);
    }
    if let Some(days) = opts.days {
        cfg.output.days_back = days;
    }
    if let Some(limit) = opts.limit {
        cfg.output.limit = limit;
    }

    let filters = &mut cfg.filters;
    if let Some(list) = &opts.domain_include {
        filters.domain_whitelist = trimmed(list);
    }
    if let Some(list) = &opts.domain_exclude {
        filters.domain_blacklist = trimmed(list);
    }
    if let Some(list) = &opts.search {
        filters.keywords = trimmed(list);
    }
    if let Some(min) = opts.min_visits {
        filters.min_visit_count = min;
    }
    if let Some(max) = opts.max_visits {
        filters.max_visit_count = Some(max);
    }
    if let Some(from) = &opts.time_from {
        filters.time_from = Some(from.clone());
    }
    if let Some(to) = &opts.time_to {
        filters.time_to = Some(to.clone());
    }
    if opts.regex {
        filters.use_regex = true;
    }

    if let Some(group_by) = opts.group_by {
        cfg.analytics.group_patterns_by = granularity_from_cli(group_by);
    }
    if opts.parallel {
        cfg.collection.parallel = true;
    }
    if opts.anonymize {
        cfg.exports.anonymize_urls = true;
    }
}

pub fn collect_options(cfg: &Config, search_all: bool, no_time_filter: bool) -> CollectOptions {
    CollectOptions {
        days_back: cfg.output.days_back,
        display_limit: cfg.output.limit,
        search_all,
        no_time_filter,
        filters_active: cfg.filters.has_content_filters(),
        parallel: cfg.collection.parallel,
    }
}

pub fn analytics_options(cfg: &Config) -> AnalyticsOptions {
    AnalyticsOptions {
        group_by: cfg.analytics.group_patterns_by,
        top_domains_limit: cfg.analytics.top_domains_limit,
    }
}

/// Truncate to `limit` unless `search_all`. Returns how many records were cut.
pub fn apply_display_limit<T>(records: &mut Vec<T>, limit: usize, search_all: bool) -> usize {
    if search_all || records.len() <= limit {
        return 0;
    }
    let cut = records.len() - limit;
    records.truncate(limit);
    cut
}
