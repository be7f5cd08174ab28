//! Study configuration loaded from a TOML file.
//!
//! # Example TOML
//!
//! ```toml
//! [study]
//! name = "mydemo"
//! path = "."
//! input_template = "input.dat"
//! submit_template = "run.pbs"
//!
//! [parameters]
//! N = [56, 100, 375]
//! Ez = [0, 12, 22]
//!
//! [[groups]]
//! members = ["a", "b"]
//! values = [[0, 1, 2, 3], [4, 5, 6, 7]]
//!
//! [packing]
//! cores_per_node = 16
//! cores_per_unit = 1
//!
//! [submission]
//! concurrency = 3
//! window = "fifo-single"
//! ledger = "jobs.ledger"
//! ```
//!
//! Unknown keys are rejected in every section.

use ps_scheduler::{PbsConfig, ThrottleConfig, WindowStrategy};
use ps_sweep::{slot_capacity, ParameterSpace};
use ps_types::{config_error, ParameterValue, SweepResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Top-level study configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StudyConfig {
    #[serde(default)]
    pub study: StudySection,

    /// Independent parameters and their candidate values.
    #[serde(default)]
    pub parameters: BTreeMap<String, Vec<ParameterValue>>,

    /// Parameters varied in lockstep.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,

    /// Present when several units share one node-sized job.
    #[serde(default)]
    pub packing: Option<PackingConfig>,

    #[serde(default)]
    pub submission: SubmissionConfig,

    #[serde(default)]
    pub pbs: PbsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StudySection {
    pub name: String,
    /// Directory the study directory is created in.
    pub path: PathBuf,
    pub input_template: PathBuf,
    pub submit_template: Option<PathBuf>,
}

impl Default for StudySection {
    fn default() -> Self {
        Self {
            name: "study".to_string(),
            path: PathBuf::from("."),
            input_template: PathBuf::from("input.dat"),
            submit_template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupConfig {
    pub members: Vec<String>,
    /// One value list per member, index-aligned.
    pub values: Vec<Vec<ParameterValue>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackingConfig {
    pub cores_per_node: usize,
    pub cores_per_unit: usize,
}

impl PackingConfig {
    pub fn capacity(&self) -> SweepResult<usize> {
        slot_capacity(self.cores_per_node, self.cores_per_unit)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SubmissionConfig {
    /// Maximum number of jobs eligible to run at once.
    pub concurrency: usize,
    pub window: WindowStrategy,
    /// Ledger file, relative to the study directory unless absolute.
    pub ledger: PathBuf,
}

impl Default for SubmissionConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            window: WindowStrategy::default(),
            ledger: PathBuf::from("jobs.ledger"),
        }
    }
}

impl SubmissionConfig {
    pub fn throttle(&self) -> ThrottleConfig {
        ThrottleConfig::new(self.concurrency, self.window)
    }
}

impl StudyConfig {
    /// Parse a study file. Relative paths are resolved against the file's
    /// directory.
    pub fn load<P: AsRef<Path>>(path: P) -> SweepResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read study file {}: {e}", path.display()))?;
        let mut config: Self =
            toml::from_str(&raw).map_err(|e| config_error!("{}: {e}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> SweepResult<Self> {
        toml::from_str(raw).map_err(|e| config_error!("invalid study file: {e}"))
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.study.path);
        resolve(&mut self.study.input_template);
        if let Some(template) = self.study.submit_template.as_mut() {
            resolve(template);
        }
    }

    /// Check everything that can be checked before touching the filesystem
    /// or the scheduler.
    pub fn validate(&self) -> SweepResult<()> {
        let name = &self.study.name;
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(config_error!("invalid study name `{name}`"));
        }
        if self.submission.concurrency < 1 {
            return Err(config_error!(
                "submission.concurrency must be at least 1, got {}",
                self.submission.concurrency
            ));
        }
        if let Some(packing) = &self.packing {
            packing.capacity()?;
        }
        Ok(())
    }

    pub fn parameter_space(&self) -> SweepResult<ParameterSpace> {
        let mut builder = ParameterSpace::builder();
        for (name, values) in &self.parameters {
            builder = builder.add_parameter(name.clone(), values.clone());
        }
        for group in &self.groups {
            builder = builder.add_group(group.members.clone(), group.values.clone());
        }
        builder.build()
    }

    /// `<path>/<name>`: where unit directories, the ledger and run records
    /// live.
    pub fn study_dir(&self) -> PathBuf {
        self.study.path.join(&self.study.name)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.study_dir().join(&self.submission.ledger)
    }
}
