//! # Pipeline Workers
//!
//! Runs source extraction jobs, either inline or on one scoped thread per source.

use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::thread;

use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use crate::parsers::browser::{Browser, VisitRecord};
use crate::parsers::snapshot::SnapshotCopier;
use crate::parsers::sqlite_db::{self, ExtractRequest, SourceError};

/// One browser's database to read.
pub struct SourceJob<'a> {
    pub browser: Browser,
    pub path: &'a Path,
}

pub type JobResult = Result<Vec<VisitRecord>, SourceError>;

/// Run one job, converting a panic inside the adapter into an ordinary failure.
fn run_job(
    job: &SourceJob<'_>,
    copier: &dyn SnapshotCopier,
    request: &ExtractRequest,
) -> JobResult {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        sqlite_db::extract(job.browser, job.path, copier, request)
    }));
    match outcome {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "adapter panicked".to_string());
            warn!("{} adapter panicked: {message}", job.browser.key());
            Err(SourceError::Aborted(message))
        }
    }
}

/// Run jobs one after another in the given order.
pub fn run_sequential(
    jobs: &[SourceJob<'_>],
    copier: &dyn SnapshotCopier,
    request: &ExtractRequest,
) -> Vec<JobResult> {
    jobs.iter().map(|job| run_job(job, copier, request)).collect()
}

/// Run every job on its own thread. Results come back in job order, whatever order the
/// threads finish in.
pub fn run_parallel(
    jobs: &[SourceJob<'_>],
    copier: &dyn SnapshotCopier,
    request: &ExtractRequest,
) -> Vec<JobResult> {
    let (tx, rx) = unbounded::<(usize, JobResult)>();

    thread::scope(|scope| {
        for (index, job) in jobs.iter().enumerate() {
            let tx = tx.clone();
            scope.spawn(move || {
                let result = run_job(job, copier, request);
                if tx.send((index, result)).is_err() {
                    warn!("result channel closed before {} finished", job.browser.key());
                }
            });
        }
    });
    drop(tx);

    let mut slots: Vec<Option<JobResult>> = jobs.iter().map(|_| None).collect();
    for (index, result) in rx {
        debug!("worker {index} finished");
        slots[index] = Some(result);
    }
    slots
        .into_iter()
        .zip(jobs)
        .map(|(slot, job)| {
            slot.unwrap_or_else(|| {
                let message = format!("{} worker produced no result", job.browser.key());
                Err(SourceError::Aborted(message))
            })
        })
        .collect()
}
