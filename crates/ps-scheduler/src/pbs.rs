//! PBS/Torque adapter driven through the `qsub` and `qdel` commands.

use ps_types::{JobDescriptor, JobId, SchedulerError, SchedulerResult};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::process::{Command, Output};
use tracing::debug;

use crate::client::BatchScheduler;

/// Environment variable listing the unit directories a job must run,
/// separated by `:`.
pub const UNIT_DIRS_VAR: &str = "PARSWEEP_UNIT_DIRS";

/// Commands and options used to talk to the PBS server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PbsConfig {
    pub qsub: String,
    pub qdel: String,
    /// Dependency type passed to `-W depend=`, e.g. `afterany` or `afterok`.
    pub dependency: String,
    /// Extra arguments placed before the per-job options on every `qsub`.
    pub extra_args: Vec<String>,
}

impl Default for PbsConfig {
    fn default() -> Self {
        Self {
            qsub: "qsub".to_string(),
            qdel: "qdel".to_string(),
            dependency: "afterany".to_string(),
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PbsScheduler {
    config: PbsConfig,
}

impl PbsScheduler {
    pub fn new(config: PbsConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(PbsConfig::default())
    }

    /// Arguments for one `qsub` call, script last.
    pub fn submit_args(
        &self,
        job: &JobDescriptor,
        depends_on: &[JobId],
    ) -> SchedulerResult<Vec<OsString>> {
        let script = job.script.as_ref().ok_or_else(|| SchedulerError::Rejected {
            reason: format!("job {} has no submission script", job.name),
        })?;

        let mut args: Vec<OsString> = self.config.extra_args.iter().map(OsString::from).collect();
        args.push("-N".into());
        args.push(job.name.clone().into());

        if !depends_on.is_empty() {
            let ids: Vec<&str> = depends_on.iter().map(JobId::as_str).collect();
            args.push("-W".into());
            args.push(format!("depend={}:{}", self.config.dependency, ids.join(":")).into());
        }

        // `qsub -v` splits its list on commas.
        if let Some(dir) = job
            .workdirs
            .iter()
            .find(|dir| dir.as_os_str().to_string_lossy().contains(','))
        {
            return Err(SchedulerError::Rejected {
                reason: format!(
                    "job {}: unit directory {} contains a comma",
                    job.name,
                    dir.display()
                ),
            });
        }

        if !job.workdirs.is_empty() {
            let mut var = OsString::from(format!("{UNIT_DIRS_VAR}="));
            for (i, dir) in job.workdirs.iter().enumerate() {
                if i > 0 {
                    var.push(":");
                }
                var.push(dir.as_os_str());
            }
            args.push("-v".into());
            args.push(var);
        }

        args.push(script.as_os_str().to_owned());
        Ok(args)
    }

    fn run(program: &str, args: &[OsString], job: Option<&JobDescriptor>) -> SchedulerResult<Output> {
        let mut command = Command::new(program);
        command.args(args);
        if let Some(dir) = job.and_then(|j| j.workdirs.first()) {
            command.current_dir(dir);
        }
        let output = command.output().map_err(|e| SchedulerError::Unavailable {
            command: program.to_string(),
            message: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(SchedulerError::CommandFailed {
                command: program.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output)
    }
}

impl BatchScheduler for PbsScheduler {
    fn name(&self) -> &str {
        "pbs"
    }

    fn submit(&mut self, job: &JobDescriptor, depends_on: &[JobId]) -> SchedulerResult<JobId> {
        let args = self.submit_args(job, depends_on)?;
        debug!(job = %job.name, ?args, "running qsub");

        let output = Self::run(&self.config.qsub, &args, Some(job))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        // qsub prints the new id as the last non-empty line.
        match stdout.lines().map(str::trim).filter(|l| !l.is_empty()).last() {
            Some(id) if !id.contains(char::is_whitespace) => Ok(JobId::new(id)),
            _ => Err(SchedulerError::InvalidResponse {
                response: stdout.trim().to_string(),
            }),
        }
    }

    fn delete(&mut self, job_id: &JobId) -> SchedulerResult<()> {
        Self::run(&self.config.qdel, &[job_id.as_str().into()], None)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> JobDescriptor {
        JobDescriptor::new("N56")
            .with_script("/study/N56/run.pbs")
            .with_workdir("/study/N56")
    }

    fn strings(args: Vec<OsString>) -> Vec<String> {
        args.into_iter()
            .map(|a| a.into_string().unwrap())
            .collect()
    }

    #[test]
    fn submit_args_without_dependencies() {
        let pbs = PbsScheduler::with_defaults();
        let args = strings(pbs.submit_args(&job(), &[]).unwrap());
        assert_eq!(
            args,
            vec![
                "-N",
                "N56",
                "-v",
                "PARSWEEP_UNIT_DIRS=/study/N56",
                "/study/N56/run.pbs"
            ]
        );
    }

    #[test]
    fn submit_args_join_dependencies() {
        let pbs = PbsScheduler::new(PbsConfig {
            dependency: "afterok".to_string(),
            extra_args: vec!["-q".to_string(), "short".to_string()],
            ..Default::default()
        });
        let deps = [JobId::new("11.srv"), JobId::new("12.srv")];
        let job = job().with_workdir("/study/N100");
        let args = strings(pbs.submit_args(&job, &deps).unwrap());
        assert_eq!(&args[..2], &["-q", "short"]);
        assert!(args.contains(&"depend=afterok:11.srv:12.srv".to_string()));
        assert!(args.contains(&"PARSWEEP_UNIT_DIRS=/study/N56:/study/N100".to_string()));
    }

    #[test]
    fn comma_in_unit_directory_is_rejected() {
        let pbs = PbsScheduler::with_defaults();
        let job = job().with_workdir("/study/a,b");
        match pbs.submit_args(&job, &[]) {
            Err(SchedulerError::Rejected { reason }) => assert!(reason.contains("/study/a,b")),
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn job_without_script_is_rejected() {
        let pbs = PbsScheduler::with_defaults();
        let result = pbs.submit_args(&JobDescriptor::new("bare"), &[]);
        assert!(matches!(result, Err(SchedulerError::Rejected { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn submit_reads_id_from_stdout() {
        let mut pbs = PbsScheduler::new(PbsConfig {
            qsub: "echo".to_string(),
            ..Default::default()
        });
        let job = JobDescriptor::new("N56").with_script("run.pbs");
        // `echo -N N56 run.pbs` prints the arguments back: not a single token.
        let result = pbs.submit(&job, &[]);
        assert!(matches!(result, Err(SchedulerError::InvalidResponse { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_is_reported() {
        let mut pbs = PbsScheduler::new(PbsConfig {
            qsub: "false".to_string(),
            qdel: "false".to_string(),
            ..Default::default()
        });
        let job = JobDescriptor::new("N56").with_script("run.pbs");
        assert!(matches!(
            pbs.submit(&job, &[]),
            Err(SchedulerError::CommandFailed { .. })
        ));
        assert!(matches!(
            pbs.delete(&JobId::new("1")),
            Err(SchedulerError::CommandFailed { .. })
        ));
    }

    #[test]
    fn missing_binary_is_unavailable() {
        let mut pbs = PbsScheduler::new(PbsConfig {
            qdel: "parsweep-no-such-qdel".to_string(),
            ..Default::default()
        });
        assert!(matches!(
            pbs.delete(&JobId::new("1")),
            Err(SchedulerError::Unavailable { .. })
        ));
    }
}
