//! In-process (simulated) batch scheduler.
//!
//! Records submissions locally with no external dependencies. Used by the
//! test suite and by dry runs to check the dependency chains a sweep would
//! produce before anything reaches a real queue.

use ps_types::{JobDescriptor, JobId, SchedulerError, SchedulerResult};
use std::collections::{HashMap, HashSet};
use tracing::info;

use crate::client::BatchScheduler;

/// A job queued on the in-memory scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryJob {
    pub id: JobId,
    pub descriptor: JobDescriptor,
    pub depends_on: Vec<JobId>,
    pub deleted: bool,
}

#[derive(Debug, Default)]
pub struct InMemoryScheduler {
    jobs: Vec<InMemoryJob>,
    positions: HashMap<JobId, usize>,
    /// Submission call number (0-indexed) that should fail.
    fail_submit_at: Option<usize>,
    fail_deletes: HashSet<JobId>,
    submit_calls: usize,
    delete_calls: Vec<JobId>,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `call`-th submission (0-indexed) fail.
    pub fn fail_submission_at(mut self, call: usize) -> Self {
        self.fail_submit_at = Some(call);
        self
    }

    /// Make deleting `job_id` fail.
    pub fn fail_delete_of(mut self, job_id: JobId) -> Self {
        self.fail_deletes.insert(job_id);
        self
    }

    pub fn jobs(&self) -> &[InMemoryJob] {
        &self.jobs
    }

    pub fn job(&self, job_id: &JobId) -> Option<&InMemoryJob> {
        self.positions.get(job_id).map(|&i| &self.jobs[i])
    }

    /// Every id passed to `delete`, in call order, including failed ones.
    pub fn delete_calls(&self) -> &[JobId] {
        &self.delete_calls
    }

    /// Peak number of jobs running at once if every job took one time step.
    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency_with(|_| 1)
    }

    /// Start and end time of every job, in submission order, when job `i`
    /// takes `duration(i)` steps and starts as soon as all of its
    /// dependencies have finished. Durations below one step count as one.
    pub fn schedule_with<F>(&self, duration: F) -> Vec<(u64, u64)>
    where
        F: Fn(usize) -> u64,
    {
        let mut schedule: Vec<(u64, u64)> = Vec::with_capacity(self.jobs.len());
        for (i, job) in self.jobs.iter().enumerate() {
            // Dependencies are always submitted earlier, so their end times
            // are already known.
            let start = job
                .depends_on
                .iter()
                .filter_map(|dep| self.positions.get(dep))
                .map(|&d| schedule[d].1)
                .max()
                .unwrap_or(0);
            schedule.push((start, start + duration(i).max(1)));
        }
        schedule
    }

    /// Peak number of jobs running at once under [`Self::schedule_with`].
    pub fn max_concurrency_with<F>(&self, duration: F) -> usize
    where
        F: Fn(usize) -> u64,
    {
        let mut events: Vec<(u64, i64)> = self
            .schedule_with(duration)
            .into_iter()
            .flat_map(|(start, end)| [(start, 1), (end, -1)])
            .collect();

        // Ends sort before starts at the same instant.
        events.sort();
        let mut running: i64 = 0;
        let mut peak: i64 = 0;
        for (_, delta) in events {
            running += delta;
            peak = peak.max(running);
        }
        peak as usize
    }
}

impl BatchScheduler for InMemoryScheduler {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn submit(&mut self, job: &JobDescriptor, depends_on: &[JobId]) -> SchedulerResult<JobId> {
        let call = self.submit_calls;
        self.submit_calls += 1;

        if self.fail_submit_at == Some(call) {
            return Err(SchedulerError::Rejected {
                reason: format!("simulated failure on submission {call}"),
            });
        }
        if let Some(unknown) = depends_on.iter().find(|d| !self.positions.contains_key(*d)) {
            return Err(SchedulerError::UnknownJob {
                job_id: unknown.clone(),
            });
        }

        let id = JobId::new(format!("{}.memory", self.jobs.len() + 1));
        self.positions.insert(id.clone(), self.jobs.len());
        self.jobs.push(InMemoryJob {
            id: id.clone(),
            descriptor: job.clone(),
            depends_on: depends_on.to_vec(),
            deleted: false,
        });
        Ok(id)
    }

    fn delete(&mut self, job_id: &JobId) -> SchedulerResult<()> {
        self.delete_calls.push(job_id.clone());

        if self.fail_deletes.contains(job_id) {
            return Err(SchedulerError::Rejected {
                reason: format!("job {job_id} has already completed"),
            });
        }
        let position = *self
            .positions
            .get(job_id)
            .ok_or_else(|| SchedulerError::UnknownJob {
                job_id: job_id.clone(),
            })?;
        self.jobs[position].deleted = true;
        info!(job = %job_id, "deleted simulated job");
        Ok(())
    }
}
