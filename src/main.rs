use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, warn};

use histocarve::config::{self, OutputFormat};
use histocarve::filter::FilterPipeline;
use histocarve::metadata::{self, ExportContext};
use histocarve::pipeline::Collector;
use histocarve::{analytics, cli, discovery, logging, render, util};

const DEFAULT_CONFIG_FILE: &str = "histocarve.yml";

fn main() -> Result<()> {
    let cli_opts = cli::parse();
    logging::init_logging(cli_opts.debug);

    if cli_opts.init_config {
        let path = cli_opts
            .config_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        config::write_default_config(&path)?;
        println!("Created default config: {}", path.display());
        return Ok(());
    }

    let loaded = config::load_config(cli_opts.config_path.as_deref())?;
    let mut cfg = loaded.config;
    let unknown = util::select_browsers(
        &mut cfg,
        cli_opts.browsers.as_deref(),
        cli_opts.exclude_browsers.as_deref(),
    );
    for name in unknown {
        warn!("unknown browser '{name}' ignored");
    }
    util::apply_cli_overrides(&mut cfg, &cli_opts);

    if cli_opts.all {
        info!("searching entire database");
    }
    if cli_opts.no_time_filter {
        info!("source time filtering disabled");
    }

    let enabled = cfg.enabled_browsers();
    let plan = discovery::plan(&enabled);
    let collect_opts = util::collect_options(&cfg, cli_opts.all, cli_opts.no_time_filter);
    let collection = Collector::default().collect(&plan, &collect_opts, Utc::now());

    if collection.records.is_empty() {
        info!("no browser history found");
        println!("No browser history found");
        return Ok(());
    }
    info!("found {} entries, applying filters", collection.records.len());

    let pipeline = FilterPipeline::from_config(&cfg.filters);
    let mut records = pipeline.apply(collection.records).records;
    if records.is_empty() {
        info!("no entries match the filters");
        println!("No entries match the specified filters");
        return Ok(());
    }
    info!("filtered to {} entries", records.len());

    let cut = util::apply_display_limit(&mut records, cfg.output.limit, cli_opts.all);
    if cut > 0 {
        info!(
            "limiting display to {} entries (use --all to show all)",
            cfg.output.limit
        );
    }

    let format = cfg.output.format;
    if format.is_export() {
        let path = cli_opts
            .output
            .clone()
            .or_else(|| format.default_filename().map(PathBuf::from))
            .context("no output path for export")?;
        let ctx = ExportContext {
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            config_hash: loaded.config_hash,
            anonymize_urls: cfg.exports.anonymize_urls,
        };
        export(format, ctx, &path, &records)?;
        return Ok(());
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    if format == OutputFormat::Timeline {
        render::render_timeline(&mut out, &records, &cfg.display)?;
        out.flush()?;
        return Ok(());
    }

    let report = analytics::analyze(&records, &util::analytics_options(&cfg));
    match format {
        OutputFormat::Stats => render::render_stats(&mut out, &report, &cfg.display)?,
        OutputFormat::TopDomains => render::render_top_domains(
            &mut out,
            &report,
            &records,
            cfg.analytics.top_domains_limit,
        )?,
        OutputFormat::BrowserUsage => render::render_browser_usage(&mut out, &report)?,
        OutputFormat::Patterns => render::render_patterns(&mut out, &report)?,
        _ => render::render_timeline(&mut out, &records, &cfg.display)?,
    }
    out.flush()?;
    Ok(())
}

fn export(
    format: OutputFormat,
    ctx: ExportContext,
    path: &Path,
    records: &[histocarve::parsers::browser::VisitRecord],
) -> Result<()> {
    let sink = metadata::build_sink(format, ctx, path)
        .with_context(|| format!("opening {}", path.display()))?;
    let written = metadata::export_all(sink.as_ref(), records)?;
    info!("exported {written} entries to {}", path.display());
    println!("History exported to {}", path.display());
    Ok(())
}
