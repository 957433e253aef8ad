//! # Pipeline Events
//!
//! Per-source outcomes reported by the collector.

use std::path::PathBuf;

use serde::Serialize;

use crate::parsers::browser::Browser;

/// What happened when a browser's history source was visited.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceOutcome {
    /// Discovery found no database; a normal condition.
    Absent,
    /// The adapter ran and produced this many records.
    Extracted { path: PathBuf, records: usize },
    /// The adapter failed; it contributed no records.
    Failed { path: PathBuf, error: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub browser: Browser,
    pub outcome: SourceOutcome,
}

impl SourceReport {
    pub fn records(&self) -> usize {
        match &self.outcome {
            SourceOutcome::Extracted { records, .. } => *records,
            _ => 0,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, SourceOutcome::Failed { .. })
    }
}
