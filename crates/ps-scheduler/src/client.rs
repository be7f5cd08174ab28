//! Batch scheduler abstraction.

use ps_types::{JobDescriptor, JobId, SchedulerResult};

/// Core scheduler interface.
///
/// Every call is a blocking round trip to the queueing system. Implementations
/// may shell out to a real scheduler (see [`super::pbs::PbsScheduler`]) or
/// keep jobs in process (see [`super::memory::InMemoryScheduler`]).
pub trait BatchScheduler {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Queue `job`, not to start before every job in `depends_on` has
    /// finished. Returns the scheduler-assigned id.
    fn submit(&mut self, job: &JobDescriptor, depends_on: &[JobId]) -> SchedulerResult<JobId>;

    /// Remove a job from the queue.
    fn delete(&mut self, job_id: &JobId) -> SchedulerResult<()>;
}

impl<S: BatchScheduler + ?Sized> BatchScheduler for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn submit(&mut self, job: &JobDescriptor, depends_on: &[JobId]) -> SchedulerResult<JobId> {
        (**self).submit(job, depends_on)
    }

    fn delete(&mut self, job_id: &JobId) -> SchedulerResult<()> {
        (**self).delete(job_id)
    }
}
