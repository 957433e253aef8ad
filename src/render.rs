//! # Render
//!
//! Plain-text views of the timeline and of an [`AnalyticsReport`]. Every function
//! writes to a caller-supplied [`Write`] so the views can be captured in tests.

use std::collections::{BTreeSet, HashMap};
use std::io::{self, Write};

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Utc};

use crate::analytics::AnalyticsReport;
use crate::config::DisplayConfig;
use crate::parsers::browser::{Browser, VisitRecord};

const RULE_WIDTH: usize = 80;
const FIELD_WIDTH: usize = 70;
const BAR_WIDTH: usize = 50;
const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn banner(out: &mut dyn Write, title: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))?;
    writeln!(out, "{title}")?;
    writeln!(out, "{}", "=".repeat(RULE_WIDTH))
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

/// Format with a user-supplied strftime string, falling back to the default on a bad one.
pub fn format_instant(ts: DateTime<Utc>, format: &str) -> String {
    let valid = !StrftimeItems::new(format).any(|item| matches!(item, Item::Error));
    let format = if valid { format } else { DEFAULT_DATE_FORMAT };
    ts.format(format).to_string()
}

pub fn render_timeline(
    out: &mut dyn Write,
    records: &[VisitRecord],
    display: &DisplayConfig,
) -> io::Result<()> {
    if records.is_empty() {
        return writeln!(out, "No history entries found");
    }
    banner(out, &format!("BROWSER HISTORY TIMELINE ({} entries)", records.len()))?;

    let mut current_date = String::new();
    for record in records {
        let ts = record.timestamp();
        let date = ts.format("%Y-%m-%d").to_string();
        if date != current_date {
            writeln!(out)?;
            writeln!(out, "{date}")?;
            writeln!(out, "{}", "-".repeat(40))?;
            current_date = date;
        }
        writeln!(out, "  {} [{}]", ts.format("%H:%M:%S"), record.browser())?;
        writeln!(out, "    {}", truncate(record.title(), FIELD_WIDTH))?;
        if display.show_url {
            writeln!(out, "    {}", truncate(record.url(), FIELD_WIDTH))?;
        }
        if display.show_visit_count && record.visit_count() > 1 {
            writeln!(out, "    visited {} times", record.visit_count())?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn render_stats(
    out: &mut dyn Write,
    report: &AnalyticsReport,
    display: &DisplayConfig,
) -> io::Result<()> {
    banner(out, "BROWSER HISTORY STATISTICS")?;

    let summary = &report.summary;
    writeln!(out, "\nSUMMARY")?;
    writeln!(out, "   Total entries: {}", summary.total_entries)?;
    writeln!(out, "   Total visits: {}", summary.total_visits)?;
    writeln!(out, "   Unique domains: {}", summary.unique_domains)?;
    writeln!(out, "   Unique URLs: {}", summary.unique_urls)?;
    writeln!(out, "   Avg visits/entry: {}", summary.average_visits_per_entry)?;

    if let Some(range) = &report.time_range {
        writeln!(out, "\nTIME RANGE")?;
        writeln!(out, "   From: {}", format_instant(range.earliest, &display.date_format))?;
        writeln!(out, "   To: {}", format_instant(range.latest, &display.date_format))?;
        writeln!(out, "   Span: {} days", range.span_days)?;
    }

    if !report.browser_usage.is_empty() {
        writeln!(out, "\nBROWSER USAGE")?;
        let mut usage: Vec<_> = report.browser_usage.iter().collect();
        usage.sort_by(|a, b| b.1.entries.cmp(&a.1.entries));
        for (browser, u) in usage {
            writeln!(out, "   {browser}: {} ({:.1}%)", u.entries, u.entries_pct)?;
        }
    }

    if !report.top_domains.by_count.is_empty() {
        writeln!(out, "\nTOP DOMAINS (by frequency)")?;
        for d in report.top_domains.by_count.iter().take(10) {
            writeln!(out, "   {}: {}", d.domain, d.count)?;
        }
    }

    if !report.patterns.is_empty() {
        writeln!(out, "\nBROWSING PATTERNS")?;
        for bucket in report.patterns.iter().take(12) {
            writeln!(out, "   {}: {}", bucket.label, bucket.count)?;
        }
    }
    Ok(())
}

pub fn render_top_domains(
    out: &mut dyn Write,
    report: &AnalyticsReport,
    records: &[VisitRecord],
    limit: usize,
) -> io::Result<()> {
    let mut visits: HashMap<String, u64> = HashMap::new();
    let mut browsers: HashMap<String, BTreeSet<Browser>> = HashMap::new();
    for record in records {
        let domain = record.domain();
        if domain.is_empty() {
            continue;
        }
        *visits.entry(domain.clone()).or_insert(0) += record.visit_count();
        browsers.entry(domain).or_default().insert(record.browser());
    }

    banner(out, &format!("TOP {limit} DOMAINS ANALYSIS"))?;
    writeln!(out, "\nBY FREQUENCY")?;
    writeln!(out, "{}", "-".repeat(60))?;
    for (rank, d) in report.top_domains.by_count.iter().enumerate() {
        let names: Vec<String> = browsers
            .get(&d.domain)
            .map(|set| set.iter().map(|b| b.to_string()).collect())
            .unwrap_or_default();
        writeln!(out, "{:2}. {}", rank + 1, d.domain)?;
        writeln!(
            out,
            "    {} entries | {} total visits | {}",
            d.count,
            visits.get(&d.domain).copied().unwrap_or(0),
            names.join(", ")
        )?;
        writeln!(out)?;
    }
    Ok(())
}

pub fn render_browser_usage(out: &mut dyn Write, report: &AnalyticsReport) -> io::Result<()> {
    banner(out, "BROWSER USAGE ANALYSIS")?;
    for (browser, usage) in &report.browser_usage {
        writeln!(out, "\n{browser}")?;
        writeln!(out, "   Entries: {} ({:.1}%)", usage.entries, usage.entries_pct)?;
        writeln!(out, "   Visits: {} ({:.1}%)", usage.visits, usage.visits_pct)?;
        writeln!(out, "   Unique domains: {}", usage.unique_domains)?;
        writeln!(out, "   Avg visits/entry: {:.1}", usage.average_visits_per_entry)?;
    }
    Ok(())
}

pub fn render_patterns(out: &mut dyn Write, report: &AnalyticsReport) -> io::Result<()> {
    let group = format!("{:?}", report.group_by).to_lowercase();
    banner(out, &format!("BROWSING PATTERNS (grouped by {group})"))?;

    let max = report.patterns.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    let total = report.summary.total_entries;
    for bucket in &report.patterns {
        let bar_len = (bucket.count as f64 / max as f64 * BAR_WIDTH as f64) as usize;
        let pct = if total > 0 {
            bucket.count as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        writeln!(
            out,
            "{:>12} |{:<width$} {:>6} ({:4.1}%)",
            bucket.label,
            "#".repeat(bar_len),
            bucket.count,
            pct,
            width = BAR_WIDTH
        )?;
    }
    Ok(())
}
