//! Browser history timeline: per-family extraction, a merged newest-first timeline,
//! composable filters and aggregate analytics.

pub mod analytics;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod filter;
pub mod logging;
pub mod metadata;
pub mod parsers;
pub mod pipeline;
pub mod render;
pub mod util;
