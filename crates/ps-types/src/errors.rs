use std::path::PathBuf;

use thiserror::Error;

use crate::job::JobId;

/// Main error type for a parsweep study
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Materialization error: {0}")]
    Materialization(#[from] MaterializationError),

    #[error("Submission error: {0}")]
    Submission(#[from] SubmissionError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised while preparing a unit's execution context
#[derive(Error, Debug)]
pub enum MaterializationError {
    #[error("Template file not found: {}", .path.display())]
    TemplateMissing { path: PathBuf },

    #[error("Failed to write {}: {message}", .path.display())]
    Io { path: PathBuf, message: String },
}

/// Errors surfaced by a batch scheduler client
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler command `{command}` could not be started: {message}")]
    Unavailable { command: String, message: String },

    #[error("scheduler command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("job rejected by scheduler: {reason}")]
    Rejected { reason: String },

    #[error("unexpected scheduler response: {response:?}")]
    InvalidResponse { response: String },

    #[error("unknown job: {job_id}")]
    UnknownJob { job_id: JobId },
}

/// A submission that aborted a run.
///
/// `submitted` holds every identifier obtained before the failure, in
/// submission order, so the caller can inspect or cancel them.
#[derive(Error, Debug)]
#[error(
    "submission of item {index} ({item}) failed after {} successful submissions: {source}",
    .submitted.len()
)]
pub struct SubmissionError {
    pub index: usize,
    pub item: String,
    pub submitted: Vec<JobId>,
    pub source: SchedulerError,
}

/// A ledger write that failed after the scheduler accepted the job.
///
/// `submitted` includes the job of item `index`: it is queued even though
/// its id may be missing from the ledger file.
#[derive(Error, Debug)]
#[error(
    "recording item {index} ({item}) in the ledger failed with {} jobs queued: {source}",
    .submitted.len()
)]
pub struct LedgerError {
    pub index: usize,
    pub item: String,
    pub submitted: Vec<JobId>,
    pub source: std::io::Error,
}

/// Result type alias for parsweep operations
pub type SweepResult<T> = Result<T, SweepError>;

/// Result alias for scheduler client operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::errors::SweepError::Config(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = SubmissionError {
            index: 3,
            item: "a1b5".to_string(),
            submitted: vec![JobId::new("101"), JobId::new("102")],
            source: SchedulerError::Rejected {
                reason: "quota exceeded".to_string(),
            },
        };

        let message = error.to_string();
        assert!(message.contains("item 3"));
        assert!(message.contains("a1b5"));
        assert!(message.contains("after 2 successful"));
        assert!(message.contains("quota exceeded"));
    }

    #[test]
    fn test_error_conversion() {
        let err = MaterializationError::TemplateMissing {
            path: PathBuf::from("input.dat"),
        };
        let sweep_error: SweepError = err.into();

        match sweep_error {
            SweepError::Materialization(MaterializationError::TemplateMissing { path }) => {
                assert_eq!(path, PathBuf::from("input.dat"))
            }
            _ => panic!("Expected Materialization error"),
        }
    }

    #[test]
    fn test_config_macro() {
        let err = config_error!("concurrency must be at least 1, got {}", 0);
        assert_eq!(
            err.to_string(),
            "Configuration error: concurrency must be at least 1, got 0"
        );
    }
}
