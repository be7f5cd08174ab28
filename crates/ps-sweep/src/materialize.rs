//! Turning work units into runnable directories.

use ps_types::{MaterializationError, ParameterValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::unit::WorkUnit;

/// A unit's prepared working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub unit_index: usize,
    pub unit_name: String,
    pub directory: PathBuf,
    pub input_file: PathBuf,
    /// Submission script copied into the directory, if one was configured.
    pub script: Option<PathBuf>,
}

/// Prepares the execution context for a single unit.
///
/// Implementations must be idempotent: materializing the same unit twice
/// yields the same context and leaves the same files behind.
pub trait Materializer {
    fn materialize(&self, unit: &WorkUnit) -> Result<ExecutionContext, MaterializationError>;
}

/// Copies an input template (and optionally a submission script) into
/// `<root>/<unit name>/`, substituting the unit's parameter values.
#[derive(Debug, Clone)]
pub struct TemplateMaterializer {
    root: PathBuf,
    input_template: PathBuf,
    submit_template: Option<PathBuf>,
}

impl TemplateMaterializer {
    pub fn new(root: impl Into<PathBuf>, input_template: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            input_template: input_template.into(),
            submit_template: None,
        }
    }

    pub fn with_submit_template(mut self, template: impl Into<PathBuf>) -> Self {
        self.submit_template = Some(template.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_template(path: &Path) -> Result<String, MaterializationError> {
        if !path.is_file() {
            return Err(MaterializationError::TemplateMissing {
                path: path.to_path_buf(),
            });
        }
        fs::read_to_string(path).map_err(|e| io_error(path, e))
    }

    fn target_path(directory: &Path, template: &Path) -> PathBuf {
        match template.file_name() {
            Some(file_name) => directory.join(file_name),
            None => directory.join("input"),
        }
    }
}

impl Materializer for TemplateMaterializer {
    fn materialize(&self, unit: &WorkUnit) -> Result<ExecutionContext, MaterializationError> {
        let input = Self::read_template(&self.input_template)?;
        let script_template = match &self.submit_template {
            Some(path) => Some((path, Self::read_template(path)?)),
            None => None,
        };

        let directory = self.root.join(&unit.name);
        fs::create_dir_all(&directory).map_err(|e| io_error(&directory, e))?;

        let input_file = Self::target_path(&directory, &self.input_template);
        let rendered = rewrite_lines(&input, &unit.flatten());
        fs::write(&input_file, rendered).map_err(|e| io_error(&input_file, e))?;

        let script = match script_template {
            Some((template_path, contents)) => {
                let script_path = Self::target_path(&directory, template_path);
                fs::write(&script_path, contents).map_err(|e| io_error(&script_path, e))?;
                Some(script_path)
            }
            None => None,
        };

        debug!(unit = %unit.name, directory = %directory.display(), "materialized unit");

        Ok(ExecutionContext {
            unit_index: unit.index,
            unit_name: unit.name.clone(),
            directory,
            input_file,
            script,
        })
    }
}

fn io_error(path: &Path, error: std::io::Error) -> MaterializationError {
    MaterializationError::Io {
        path: path.to_path_buf(),
        message: error.to_string(),
    }
}

/// Replace the value on every line whose leading key names a parameter.
///
/// The key is the first token of the line, ended by whitespace, `=` or `:`.
/// Indentation and the separator are kept; whatever followed the separator
/// is replaced by the value. Other lines pass through untouched.
pub fn rewrite_lines(template: &str, values: &BTreeMap<String, ParameterValue>) -> String {
    let mut out = String::with_capacity(template.len());
    for raw in template.split_inclusive('\n') {
        let (line, ending) = split_line_ending(raw);
        let body = line.trim_start();
        let indent = &line[..line.len() - body.len()];

        let key_end = body
            .find(|c: char| c.is_whitespace() || c == '=' || c == ':')
            .unwrap_or(body.len());
        let key = &body[..key_end];

        match values.get(key) {
            Some(value) if !key.is_empty() => {
                let rest = &body[key_end..];
                let value_start = rest
                    .find(|c: char| !(c.is_whitespace() || c == '=' || c == ':'))
                    .unwrap_or(rest.len());
                let separator = match &rest[..value_start] {
                    "" => " ",
                    sep => sep,
                };
                out.push_str(indent);
                out.push_str(key);
                out.push_str(separator);
                out.push_str(&value.to_string());
            }
            _ => out.push_str(line),
        }
        out.push_str(ending);
    }
    out
}

fn split_line_ending(raw: &str) -> (&str, &str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}
