//! The build / run / cancel workflow of a study.

use chrono::{DateTime, Utc};
use ps_scheduler::{
    cancel_from_ledger, rotate, rotated, BatchScheduler, CancelReport, Ledger, SubmissionSummary,
    ThrottledSubmitter, WindowStrategy,
};
use ps_sweep::{
    enumerate, pack, ExecutionContext, Materializer, Packing, ParameterSpace,
    TemplateMaterializer, WorkUnit,
};
use ps_types::{config_error, JobDescriptor, ParameterValue, SubmissionRecord, SweepResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use uuid::Uuid;

use crate::config::StudyConfig;

pub const UNITS_MANIFEST: &str = "units.json";
pub const RUN_SUMMARY: &str = "run.json";

/// Record of one submission pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub study: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window: WindowStrategy,
    /// Concurrency limit after clamping to the item count.
    pub concurrency: usize,
    /// Number of scheduler jobs, one per unit or one per slot.
    pub item_count: usize,
    pub packing: Option<Packing>,
    pub records: Vec<SubmissionRecord>,
}

impl RunSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[derive(Debug, Serialize)]
struct ManifestEntry<'a> {
    index: usize,
    name: &'a str,
    parameters: BTreeMap<String, ParameterValue>,
    directory: &'a PathBuf,
}

#[derive(Debug, Clone)]
pub struct Study {
    config: StudyConfig,
    space: ParameterSpace,
    units: Vec<WorkUnit>,
}

impl Study {
    /// Validate `config` and expand its sweep.
    pub fn from_config(config: StudyConfig) -> SweepResult<Self> {
        config.validate()?;
        let space = config.parameter_space()?;
        let units = enumerate(&space);
        info!(
            study = %config.study.name,
            dimensions = space.len(),
            units = units.len(),
            "study defined"
        );
        Ok(Self {
            config,
            space,
            units,
        })
    }

    pub fn config(&self) -> &StudyConfig {
        &self.config
    }

    pub fn space(&self) -> &ParameterSpace {
        &self.space
    }

    /// Every unit in canonical order. Touches nothing on disk.
    pub fn plan(&self) -> &[WorkUnit] {
        &self.units
    }

    pub fn study_dir(&self) -> PathBuf {
        self.config.study_dir()
    }

    /// Materializer writing units under the study directory from the
    /// configured templates.
    pub fn default_materializer(&self) -> TemplateMaterializer {
        let materializer =
            TemplateMaterializer::new(self.study_dir(), &self.config.study.input_template);
        match &self.config.study.submit_template {
            Some(template) => materializer.with_submit_template(template),
            None => materializer,
        }
    }

    /// Materialize every unit and write the `units.json` manifest.
    pub fn build<M>(&self, materializer: &M) -> SweepResult<Vec<ExecutionContext>>
    where
        M: Materializer + ?Sized,
    {
        let study_dir = self.study_dir();
        fs::create_dir_all(&study_dir)?;

        let contexts = self
            .units
            .iter()
            .map(|unit| materializer.materialize(unit))
            .collect::<Result<Vec<_>, _>>()?;

        let manifest: Vec<ManifestEntry<'_>> = self
            .units
            .iter()
            .zip(&contexts)
            .map(|(unit, context)| ManifestEntry {
                index: unit.index,
                name: &unit.name,
                parameters: unit.flatten(),
                directory: &context.directory,
            })
            .collect();
        fs::write(
            study_dir.join(UNITS_MANIFEST),
            serde_json::to_string_pretty(&manifest)?,
        )?;

        info!(study = %self.config.study.name, units = contexts.len(), dir = %study_dir.display(), "study built");
        Ok(contexts)
    }

    /// The packing applied to this study's units, if packing is configured.
    pub fn packing(&self) -> SweepResult<Option<Packing>> {
        match &self.config.packing {
            Some(packing) => Ok(Some(pack(&self.units, packing.capacity()?)?)),
            None => Ok(None),
        }
    }

    /// One job per unit, or one per slot when packing is configured.
    ///
    /// `contexts` must be the output of [`Study::build`] for this study.
    pub fn job_descriptors(&self, contexts: &[ExecutionContext]) -> SweepResult<Vec<JobDescriptor>> {
        if contexts.len() != self.units.len()
            || contexts
                .iter()
                .zip(&self.units)
                .any(|(c, u)| c.unit_index != u.index || c.unit_name != u.name)
        {
            return Err(config_error!(
                "execution contexts do not match the units of study `{}`; rebuild first",
                self.config.study.name
            ));
        }

        let descriptors: Vec<JobDescriptor> = match self.packing()? {
            None => contexts.iter().map(unit_job).collect(),
            Some(packing) => packing
                .slots
                .iter()
                .map(|slot| {
                    let hosted = &contexts[slot.units.clone()];
                    let mut job =
                        JobDescriptor::new(format!("{}-{}", self.config.study.name, slot.name()));
                    if let Some(script) = hosted.first().and_then(|c| c.script.as_ref()) {
                        job = job.with_script(script);
                    }
                    hosted
                        .iter()
                        .fold(job, |job, context| job.with_workdir(&context.directory))
                })
                .collect(),
        };
        Ok(descriptors)
    }

    /// Start a fresh ledger at the configured path. A ledger left by an
    /// earlier run is rotated aside first, never truncated.
    pub fn open_ledger(&self) -> SweepResult<Ledger> {
        let path = self.config.ledger_path();
        if let Some(previous) = rotate(&path)? {
            info!(ledger = %path.display(), moved_to = %previous.display(), "kept previous ledger");
        }
        Ok(Ledger::create(path)?)
    }

    /// Ledgers of earlier runs, oldest first.
    pub fn previous_ledgers(&self) -> SweepResult<Vec<PathBuf>> {
        Ok(rotated(self.config.ledger_path())?)
    }

    /// Submit the built study with a fresh on-disk ledger and write
    /// `run.json` once every job is queued.
    pub fn execute<S>(&self, scheduler: &mut S, contexts: &[ExecutionContext]) -> SweepResult<RunSummary>
    where
        S: BatchScheduler + ?Sized,
    {
        let mut ledger = self.open_ledger()?;
        let summary = self.execute_with_ledger(scheduler, contexts, &mut ledger)?;
        self.write_run_summary(&summary)?;
        Ok(summary)
    }

    /// Submit the built study, recording into `ledger`.
    pub fn execute_with_ledger<S>(
        &self,
        scheduler: &mut S,
        contexts: &[ExecutionContext],
        ledger: &mut Ledger,
    ) -> SweepResult<RunSummary>
    where
        S: BatchScheduler + ?Sized,
    {
        let items = self.job_descriptors(contexts)?;
        let packing = self.packing()?;
        let submitter = ThrottledSubmitter::new(self.config.submission.throttle())?;

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!(%run_id, study = %self.config.study.name, jobs = items.len(), "run started");

        let SubmissionSummary {
            window,
            concurrency,
            submitted,
            ..
        } = submitter.submit_all(scheduler, &items, ledger)?;

        let finished_at = Utc::now();
        info!(%run_id, submitted, "run finished");

        Ok(RunSummary {
            run_id,
            study: self.config.study.name.clone(),
            started_at,
            finished_at,
            window,
            concurrency,
            item_count: items.len(),
            packing,
            records: ledger.records().to_vec(),
        })
    }

    pub fn write_run_summary(&self, summary: &RunSummary) -> SweepResult<PathBuf> {
        let path = self.study_dir().join(RUN_SUMMARY);
        fs::write(&path, serde_json::to_string_pretty(summary)?)?;
        Ok(path)
    }

    /// Delete every job in the study's ledger.
    pub fn cancel<S>(&self, scheduler: &mut S) -> SweepResult<CancelReport>
    where
        S: BatchScheduler + ?Sized,
    {
        cancel_from_ledger(scheduler, self.config.ledger_path())
    }

    /// Delete every job of the current run and of every earlier run whose
    /// ledger was rotated aside.
    pub fn cancel_all<S>(&self, scheduler: &mut S) -> SweepResult<CancelReport>
    where
        S: BatchScheduler + ?Sized,
    {
        let mut ledgers = self.previous_ledgers()?;
        let current = self.config.ledger_path();
        if current.is_file() {
            ledgers.push(current);
        }

        let mut report = CancelReport::default();
        for ledger in ledgers {
            let CancelReport { deleted, failures } = cancel_from_ledger(scheduler, &ledger)?;
            report.deleted.extend(deleted);
            report.failures.extend(failures);
        }
        Ok(report)
    }
}

fn unit_job(context: &ExecutionContext) -> JobDescriptor {
    let job = JobDescriptor::new(&context.unit_name).with_workdir(&context.directory);
    match &context.script {
        Some(script) => job.with_script(script),
        None => job,
    }
}
