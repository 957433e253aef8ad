mod common;

use clap::Parser;

use histocarve::cli::CliOptions;
use histocarve::config::{self, OutputFormat};
use histocarve::filter::FilterPipeline;
use histocarve::metadata::{self, ExportContext};
use histocarve::parsers::browser::Browser;
use histocarve::pipeline::Collector;
use histocarve::util;

use common::{build_source, plan_of, ts, visit};

#[test]
fn config_file_and_flags_drive_an_export() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config_path = dir.path().join("histocarve.yml");
    std::fs::write(
        &config_path,
        "version: 1\n\
         browsers:\n  firefox: false\n\
         output:\n  format: timeline\n  limit: 1\n  days_back: 30\n\
         filters:\n  keywords: [github]\n",
    )
    .expect("write config");
    let output = dir.path().join("out").join("history.jsonl");

    let config_arg = config_path.to_str().expect("utf8 path");
    let output_arg = output.to_str().expect("utf8 path");
    let opts = CliOptions::try_parse_from([
        "histocarve",
        "--config-path",
        config_arg,
        "--browsers",
        "chrome,firefox,mosaic",
        "--exclude-browsers",
        "firefox",
        "--format",
        "jsonl",
        "--anonymize",
        "--output",
        output_arg,
    ])
    .expect("parse");

    let loaded = config::load_config(opts.config_path.as_deref()).expect("load");
    let mut cfg = loaded.config;
    let unknown = util::select_browsers(
        &mut cfg,
        opts.browsers.as_deref(),
        opts.exclude_browsers.as_deref(),
    );
    assert_eq!(unknown, vec!["mosaic"]);
    util::apply_cli_overrides(&mut cfg, &opts);
    assert_eq!(cfg.output.format, OutputFormat::Jsonl);
    assert_eq!(cfg.enabled_browsers(), vec![Browser::Chrome]);

    let chrome = build_source(
        dir.path(),
        Browser::Chrome,
        &[
            visit("https://github.com/private/repo?token=1", 2, ts(2024, 1, 20, 9, 0)),
            visit("https://github.com/other", 1, ts(2024, 1, 19, 9, 0)),
            visit("https://example.com/", 1, ts(2024, 1, 18, 9, 0)),
        ],
    );
    let plan = plan_of(&[(Browser::Chrome, &chrome)]);
    let collect_opts = util::collect_options(&cfg, opts.all, opts.no_time_filter);
    // keywords are a content filter, so sources are read ten times wider than the display limit
    assert_eq!(
        collect_opts.fetch_limit(),
        histocarve::parsers::sqlite_db::FetchLimit::Rows(10)
    );
    let collection = Collector::default().collect(&plan, &collect_opts, ts(2024, 1, 25, 0, 0));
    let mut records = FilterPipeline::from_config(&cfg.filters).apply(collection.records).records;
    assert_eq!(records.len(), 2);
    assert_eq!(util::apply_display_limit(&mut records, cfg.output.limit, opts.all), 1);

    let ctx = ExportContext {
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        config_hash: loaded.config_hash.clone(),
        anonymize_urls: cfg.exports.anonymize_urls,
    };
    let path = opts.output.clone().expect("output");
    let sink = metadata::build_sink(cfg.output.format, ctx, &path).expect("sink");
    assert_eq!(metadata::export_all(sink.as_ref(), &records).expect("export"), 1);

    let text = std::fs::read_to_string(&path).expect("read export");
    let first = text.lines().next().expect("line");
    let row: serde_json::Value = serde_json::from_str(first).expect("json");
    assert_eq!(row["browser"], "Chrome");
    assert_eq!(row["domain"], "github.com");
    assert_eq!(row["config_hash"], loaded.config_hash.as_str());
    let url = row["url"].as_str().expect("url");
    assert!(url.starts_with("https://github.com/path_"));
    assert!(!url.contains("token"));
}

#[test]
fn init_config_writes_loadable_default() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("fresh.yml");
    config::write_default_config(&path).expect("write");
    let cfg = config::load_config(Some(&path)).expect("load").config;
    assert_eq!(cfg.enabled_browsers().len(), 10);
    assert_eq!(cfg.output.format, OutputFormat::Timeline);
}

#[test]
fn invalid_flag_values_are_rejected() {
    assert!(CliOptions::try_parse_from(["histocarve", "--days", "a week"]).is_err());
    assert!(CliOptions::try_parse_from(["histocarve", "--group-by", "fortnight"]).is_err());
    assert!(CliOptions::try_parse_from(["histocarve", "--min-visits", "-1"]).is_err());
}
