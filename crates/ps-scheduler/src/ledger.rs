//! Append-only record of submitted jobs.
//!
//! The on-disk form is one job id per line, written as soon as the
//! scheduler hands the id back, so a run that dies half way still leaves a
//! ledger that can drive cancellation.

use chrono::Utc;
use ps_types::{JobId, SubmissionRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Ledger {
    file: Option<(PathBuf, File)>,
    records: Vec<SubmissionRecord>,
}

impl Ledger {
    /// A ledger that keeps records in memory only.
    pub fn in_memory() -> Self {
        Self {
            file: None,
            records: Vec::new(),
        }
    }

    /// Start a fresh ledger file at `path`, replacing any previous one.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        File::create(&path)?;
        let file = OpenOptions::new().append(true).open(&path)?;
        Ok(Self {
            file: Some((path, file)),
            records: Vec::new(),
        })
    }

    /// Record a successful submission and persist its id.
    ///
    /// The record is kept in memory even when the file write fails.
    pub fn append(&mut self, record: SubmissionRecord) -> io::Result<()> {
        let line = format!("{}\n", record.job_id);
        self.records.push(record);
        if let Some((_, file)) = self.file.as_mut() {
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.file.as_ref().map(|(path, _)| path.as_path())
    }

    pub fn records(&self) -> &[SubmissionRecord] {
        &self.records
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.records.iter().map(|r| r.job_id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Move a ledger that still lists jobs aside to `<path>.<UTC timestamp>`,
/// returning where it went. Missing or empty ledgers are left alone.
pub fn rotate<P: AsRef<Path>>(path: P) -> io::Result<Option<PathBuf>> {
    let path = path.as_ref();
    if !path.is_file() || read_job_ids(path)?.is_empty() {
        return Ok(None);
    }
    let stamp = Utc::now().format("%Y%m%dT%H%M%S%.6fZ").to_string();
    let mut target = suffixed(path, &stamp);
    let mut attempt = 1;
    while target.exists() {
        target = suffixed(path, &format!("{stamp}-{attempt}"));
        attempt += 1;
    }
    fs::rename(path, &target)?;
    Ok(Some(target))
}

/// Ledgers set aside by [`rotate`] for `path`, oldest first.
pub fn rotated<P: AsRef<Path>>(path: P) -> io::Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
        return Ok(Vec::new());
    };
    let prefix = format!("{}.", file_name.to_string_lossy());
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_name().to_string_lossy().starts_with(&prefix) && entry.path().is_file() {
            found.push(entry.path());
        }
    }
    // Timestamps sort lexicographically.
    found.sort();
    Ok(found)
}

fn suffixed(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

/// Read the job ids from a ledger file, skipping blank lines.
pub fn read_job_ids<P: AsRef<Path>>(path: P) -> io::Result<Vec<JobId>> {
    let contents = fs::read_to_string(path)?;
    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(JobId::new)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn record(index: usize, id: &str) -> SubmissionRecord {
        SubmissionRecord {
            item_index: index,
            item_name: format!("unit{index}"),
            job_id: JobId::new(id),
            depends_on: Vec::new(),
            submitted_at: Utc::now(),
        }
    }

    #[test]
    fn each_append_is_visible_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("jobs.ledger");
        let mut ledger = Ledger::create(&path).unwrap();

        ledger.append(record(0, "101.srv")).unwrap();
        assert_eq!(read_job_ids(&path).unwrap(), vec![JobId::new("101.srv")]);

        ledger.append(record(1, "102.srv")).unwrap();
        assert_eq!(
            read_job_ids(&path).unwrap(),
            vec![JobId::new("101.srv"), JobId::new("102.srv")]
        );
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.path(), Some(path.as_path()));
    }

    #[test]
    fn create_truncates_previous_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.ledger");
        fs::write(&path, "old.1\nold.2\n").unwrap();

        let mut ledger = Ledger::create(&path).unwrap();
        ledger.append(record(0, "new.1")).unwrap();
        assert_eq!(read_job_ids(&path).unwrap(), vec![JobId::new("new.1")]);
    }

    #[test]
    fn rotate_moves_a_used_ledger_aside() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.ledger");
        fs::write(&path, "1.srv\n2.srv\n").unwrap();

        let moved = rotate(&path).unwrap().unwrap();
        assert!(!path.exists());
        assert!(moved
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("jobs.ledger."));
        assert_eq!(
            read_job_ids(&moved).unwrap(),
            vec![JobId::new("1.srv"), JobId::new("2.srv")]
        );
        assert_eq!(rotated(&path).unwrap(), vec![moved]);
    }

    #[test]
    fn rotate_leaves_missing_and_empty_ledgers() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.ledger");
        assert_eq!(rotate(&path).unwrap(), None);

        fs::write(&path, "\n").unwrap();
        assert_eq!(rotate(&path).unwrap(), None);
        assert!(path.exists());
        assert!(rotated(&path).unwrap().is_empty());
    }

    #[test]
    fn repeated_rotation_keeps_every_ledger() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.ledger");
        for id in ["1.srv", "2.srv", "3.srv"] {
            fs::write(&path, format!("{id}\n")).unwrap();
            rotate(&path).unwrap().unwrap();
        }
        let ids: Vec<JobId> = rotated(&path)
            .unwrap()
            .iter()
            .flat_map(|p| read_job_ids(p).unwrap())
            .collect();
        assert_eq!(
            ids,
            vec![JobId::new("1.srv"), JobId::new("2.srv"), JobId::new("3.srv")]
        );
    }

    #[test]
    fn read_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("jobs.ledger");
        fs::write(&path, "1.srv\n\n  2.srv  \n\n").unwrap();
        assert_eq!(
            read_job_ids(&path).unwrap(),
            vec![JobId::new("1.srv"), JobId::new("2.srv")]
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_write_still_keeps_the_record() {
        let mut ledger = Ledger::create("/dev/full").unwrap();
        assert!(ledger.append(record(0, "7.srv")).is_err());
        assert_eq!(ledger.job_ids(), vec![JobId::new("7.srv")]);
    }

    #[test]
    fn in_memory_ledger_keeps_records() {
        let mut ledger = Ledger::in_memory();
        ledger.append(record(0, "1.memory")).unwrap();
        assert!(ledger.path().is_none());
        assert_eq!(ledger.job_ids(), vec![JobId::new("1.memory")]);
    }
}
