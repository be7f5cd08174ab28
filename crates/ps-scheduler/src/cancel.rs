//! Ledger-driven batch deletion.

use ps_types::{JobId, SchedulerError, SweepResult};
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::BatchScheduler;
use crate::ledger::read_job_ids;

/// A delete call that failed. Never fatal: cancellation moves on.
#[derive(Error, Debug)]
#[error("failed to delete job {job_id}: {source}")]
pub struct DeleteError {
    pub job_id: JobId,
    pub source: SchedulerError,
}

#[derive(Debug, Default)]
pub struct CancelReport {
    pub deleted: Vec<JobId>,
    pub failures: Vec<DeleteError>,
}

impl CancelReport {
    pub fn failure_count(&self) -> usize {
        self.failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Call `delete` once per id, in order, whatever happens to earlier calls.
pub fn cancel_jobs<S>(scheduler: &mut S, job_ids: &[JobId]) -> CancelReport
where
    S: BatchScheduler + ?Sized,
{
    let mut report = CancelReport::default();
    for job_id in job_ids {
        match scheduler.delete(job_id) {
            Ok(()) => report.deleted.push(job_id.clone()),
            Err(source) => {
                warn!(job = %job_id, error = %source, "delete failed, continuing");
                report.failures.push(DeleteError {
                    job_id: job_id.clone(),
                    source,
                });
            }
        }
    }
    info!(
        scheduler = scheduler.name(),
        deleted = report.deleted.len(),
        failed = report.failures.len(),
        "cancellation finished"
    );
    report
}

/// Cancel every job listed in the ledger file at `path`.
pub fn cancel_from_ledger<S, P>(scheduler: &mut S, path: P) -> SweepResult<CancelReport>
where
    S: BatchScheduler + ?Sized,
    P: AsRef<Path>,
{
    let job_ids = read_job_ids(path.as_ref())?;
    info!(ledger = %path.as_ref().display(), jobs = job_ids.len(), "cancelling from ledger");
    Ok(cancel_jobs(scheduler, &job_ids))
}
