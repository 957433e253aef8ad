use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatArg {
    Timeline,
    Stats,
    TopDomains,
    BrowserUsage,
    Patterns,
    Json,
    Jsonl,
    Csv,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupByArg {
    Hour,
    Day,
    Weekday,
    Month,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Browser history timeline and analytics")]
pub struct CliOptions {
    /// Optional path to config file (YAML)
    #[arg(long)]
    pub config_path: Option<PathBuf>,

    /// Write the default config to --config-path (or ./histocarve.yml) and exit
    #[arg(long)]
    pub init_config: bool,

    /// Output format
    #[arg(long, value_enum)]
    pub format: Option<FormatArg>,

    /// Days back to search
    #[arg(long)]
    pub days: Option<u32>,

    /// Start time (ISO 8601, e.g. 2025-06-01T10:00:00)
    #[arg(long)]
    pub time_from: Option<String>,

    /// End time (ISO 8601, e.g. 2025-06-07T18:00:00)
    #[arg(long)]
    pub time_to: Option<String>,

    /// Only read these browsers (comma-separated keys)
    #[arg(long, value_delimiter = ',')]
    pub browsers: Option<Vec<String>>,

    /// Skip these browsers (comma-separated keys)
    #[arg(long, value_delimiter = ',')]
    pub exclude_browsers: Option<Vec<String>>,

    /// Keep only these domains (comma-separated patterns)
    #[arg(long, value_delimiter = ',')]
    pub domain_include: Option<Vec<String>>,

    /// Drop these domains (comma-separated patterns)
    #[arg(long, value_delimiter = ',')]
    pub domain_exclude: Option<Vec<String>>,

    /// Keywords matched against title and url (comma-separated)
    #[arg(long, value_delimiter = ',')]
    pub search: Option<Vec<String>>,

    /// Minimum visit count
    #[arg(long)]
    pub min_visits: Option<u64>,

    /// Maximum visit count
    #[arg(long)]
    pub max_visits: Option<u64>,

    /// Treat domain and keyword patterns as regular expressions
    #[arg(long)]
    pub regex: bool,

    /// Max entries to show
    #[arg(long)]
    pub limit: Option<usize>,

    /// Read whole databases and show every match
    #[arg(long)]
    pub all: bool,

    /// Disable source-level time filtering
    #[arg(long)]
    pub no_time_filter: bool,

    /// Output file for json, jsonl and csv formats
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Time unit for pattern buckets
    #[arg(long, value_enum)]
    pub group_by: Option<GroupByArg>,

    /// Read browsers concurrently
    #[arg(long)]
    pub parallel: bool,

    /// Replace url paths with stable tokens in exports
    #[arg(long)]
    pub anonymize: bool,

    /// Verbose diagnostics on stderr
    #[arg(long)]
    pub debug: bool,
}

pub fn parse() -> CliOptions {
    CliOptions::parse()
}
