use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Opaque identifier returned by a batch scheduler for a submitted job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything a scheduler client needs to queue one job.
///
/// A job runs one work unit, or the whole contents of an execution slot, in
/// which case `workdirs` lists every unit directory in pack order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    pub name: String,
    pub script: Option<PathBuf>,
    pub workdirs: Vec<PathBuf>,
}

impl JobDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: None,
            workdirs: Vec::new(),
        }
    }

    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = Some(script.into());
        self
    }

    pub fn with_workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdirs.push(dir.into());
        self
    }
}

/// One successful submission, as kept in the run ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    /// Position of the item in submission order (0-indexed).
    pub item_index: usize,
    pub item_name: String,
    pub job_id: JobId,
    /// Jobs this submission was made to wait on.
    pub depends_on: Vec<JobId>,
    pub submitted_at: DateTime<Utc>,
}
