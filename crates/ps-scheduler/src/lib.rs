//! Submission of sweep jobs to an external batch scheduler.
//!
//! Provides:
//! - A small scheduler client interface with a PBS (`qsub`/`qdel`) adapter
//!   and an in-process scheduler for tests and dry runs
//! - Sliding-window throttling that bounds concurrency through job
//!   dependencies alone
//! - An append-only ledger of submitted job ids and ledger-driven cancellation

pub mod cancel;
pub mod client;
pub mod ledger;
pub mod memory;
pub mod pbs;
pub mod throttle;

pub use cancel::{cancel_from_ledger, cancel_jobs, CancelReport, DeleteError};
pub use client::BatchScheduler;
pub use ledger::{read_job_ids, rotate, rotated, Ledger};
pub use memory::{InMemoryJob, InMemoryScheduler};
pub use pbs::{PbsConfig, PbsScheduler};
pub use throttle::{SubmissionSummary, ThrottleConfig, ThrottledSubmitter, WindowStrategy};
