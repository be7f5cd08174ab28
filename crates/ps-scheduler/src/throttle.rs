//! Concurrency throttling through scheduler-side job dependencies.
//!
//! Nothing runs locally: the submitter hands every item to the scheduler in
//! order, making later items depend on earlier ones so that no more than `k`
//! are ever eligible to start at once. Two window strategies are offered:
//!
//! - [`WindowStrategy::FifoSingle`]: item `i >= k` depends on the single job
//!   submitted `k` places before it. A finished job frees its place right
//!   away.
//! - [`WindowStrategy::BarrierBatch`]: items go in batches of `k` and every
//!   item of a batch depends on all jobs of the previous batch. A batch only
//!   starts once the whole previous batch has finished.

use chrono::Utc;
use ps_types::{
    config_error, JobDescriptor, JobId, LedgerError, SubmissionError, SubmissionRecord, SweepResult,
};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, error, info, warn};

use crate::client::BatchScheduler;
use crate::ledger::Ledger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WindowStrategy {
    #[default]
    FifoSingle,
    BarrierBatch,
}

impl std::fmt::Display for WindowStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowStrategy::FifoSingle => write!(f, "fifo-single"),
            WindowStrategy::BarrierBatch => write!(f, "barrier-batch"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Maximum number of items eligible to run at once.
    pub concurrency: usize,
    pub window: WindowStrategy,
}

impl ThrottleConfig {
    pub fn new(concurrency: usize, window: WindowStrategy) -> Self {
        Self {
            concurrency,
            window,
        }
    }
}

/// Outcome of a complete submission pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionSummary {
    pub window: WindowStrategy,
    /// Concurrency actually used, after clamping to the item count.
    pub concurrency: usize,
    pub submitted: usize,
    /// The requested limit exceeded the item count and was lowered.
    pub clamped: bool,
    /// Largest number of ids the dependency window held at any point.
    pub peak_window: usize,
}

/// The ids later submissions are made to wait on.
enum DependencyWindow {
    Fifo {
        limit: usize,
        ids: VecDeque<JobId>,
    },
    Barrier {
        limit: usize,
        previous: Vec<JobId>,
        current: Vec<JobId>,
    },
}

impl DependencyWindow {
    fn new(config: &ThrottleConfig, limit: usize) -> Self {
        match config.window {
            WindowStrategy::FifoSingle => Self::Fifo {
                limit,
                ids: VecDeque::with_capacity(limit),
            },
            WindowStrategy::BarrierBatch => Self::Barrier {
                limit,
                previous: Vec::new(),
                current: Vec::with_capacity(limit),
            },
        }
    }

    /// Dependencies for the next submission. FIFO gives up the oldest id
    /// here, freeing its place for the job about to be submitted.
    fn next_dependencies(&mut self) -> Vec<JobId> {
        match self {
            Self::Fifo { limit, ids } => {
                if ids.len() == *limit {
                    ids.pop_front().into_iter().collect()
                } else {
                    Vec::new()
                }
            }
            Self::Barrier { previous, .. } => previous.clone(),
        }
    }

    fn push(&mut self, id: JobId) {
        match self {
            Self::Fifo { ids, .. } => ids.push_back(id),
            Self::Barrier {
                limit,
                previous,
                current,
            } => {
                current.push(id);
                if current.len() == *limit {
                    *previous = std::mem::take(current);
                }
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Fifo { ids, .. } => ids.len(),
            Self::Barrier { previous, .. } => previous.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ThrottledSubmitter {
    config: ThrottleConfig,
}

impl ThrottledSubmitter {
    pub fn new(config: ThrottleConfig) -> SweepResult<Self> {
        if config.concurrency < 1 {
            return Err(config_error!(
                "concurrency limit must be at least 1, got {}",
                config.concurrency
            ));
        }
        Ok(Self { config })
    }

    pub fn config(&self) -> &ThrottleConfig {
        &self.config
    }

    /// The limit actually applied to `item_count` items.
    pub fn effective_concurrency(&self, item_count: usize) -> usize {
        self.config.concurrency.min(item_count.max(1))
    }

    /// Submit every item in order, appending each id to `ledger` as soon as
    /// it is obtained.
    ///
    /// The first failed submission stops the pass. The returned
    /// [`SubmissionError`] carries the failing index and every id already
    /// obtained; those ids are also in `ledger`.
    pub fn submit_all<S>(
        &self,
        scheduler: &mut S,
        items: &[JobDescriptor],
        ledger: &mut Ledger,
    ) -> SweepResult<SubmissionSummary>
    where
        S: BatchScheduler + ?Sized,
    {
        let limit = self.effective_concurrency(items.len());
        let clamped = limit < self.config.concurrency;
        if clamped {
            warn!(
                requested = self.config.concurrency,
                clamped = limit,
                "concurrency limit exceeds item count, clamping"
            );
        }

        info!(
            scheduler = scheduler.name(),
            items = items.len(),
            concurrency = limit,
            window = %self.config.window,
            "submitting sweep"
        );

        let mut window = DependencyWindow::new(&self.config, limit);
        let mut obtained: Vec<JobId> = Vec::with_capacity(items.len());
        let mut peak_window = 0;

        for (index, item) in items.iter().enumerate() {
            let depends_on = window.next_dependencies();
            let job_id = match scheduler.submit(item, &depends_on) {
                Ok(id) => id,
                Err(source) => {
                    error!(
                        index,
                        item = %item.name,
                        submitted = obtained.len(),
                        error = %source,
                        "submission failed, aborting run"
                    );
                    return Err(SubmissionError {
                        index,
                        item: item.name.clone(),
                        submitted: obtained,
                        source,
                    }
                    .into());
                }
            };

            debug!(index, item = %item.name, job = %job_id, ?depends_on, "submitted");

            obtained.push(job_id.clone());
            let appended = ledger.append(SubmissionRecord {
                item_index: index,
                item_name: item.name.clone(),
                job_id: job_id.clone(),
                depends_on,
                submitted_at: Utc::now(),
            });
            if let Err(source) = appended {
                error!(
                    index,
                    item = %item.name,
                    job = %job_id,
                    queued = ?obtained,
                    error = %source,
                    "ledger write failed, aborting run"
                );
                return Err(LedgerError {
                    index,
                    item: item.name.clone(),
                    submitted: obtained,
                    source,
                }
                .into());
            }
            window.push(job_id);
            peak_window = peak_window.max(window.len());
        }

        info!(submitted = obtained.len(), "sweep submitted");

        Ok(SubmissionSummary {
            window: self.config.window,
            concurrency: limit,
            submitted: obtained.len(),
            clamped,
            peak_window,
        })
    }
}
