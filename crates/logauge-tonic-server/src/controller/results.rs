//! Persistence of successful worker results.
//!
//! Each persisted line reads `<rfc3339> phase=<name> <report>`. Every line is
//! also emitted as a `tracing` event with target `results`, so runs without a
//! results file still leave a trace in the logs.

use chrono::{SecondsFormat, Utc};
use logauge_tonic_core::{
    logauge::{IoContext, Result},
    types::{Phase, WorkerId},
};
use std::{
    fs::{File, OpenOptions},
    io::{LineWriter, Write},
    path::{Path, PathBuf},
};

/// Receives one call per successful worker result of a persisted phase.
pub trait ResultsSink: Send + Sync + 'static {
    fn persist(&mut self, phase: Phase, worker_id: WorkerId, report: &str) -> Result<()>;
}

/// Append-only results file.
///
/// A file left over from a previous run is moved to `<path>.1` on open, so
/// every run starts with a fresh file and keeps exactly one backup.
#[derive(Debug)]
pub struct FileResultsSink {
    path: PathBuf,
    out: LineWriter<File>,
}

impl FileResultsSink {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if path.exists() {
            let backup = backup_path(&path);
            std::fs::rename(&path, &backup).with_path(&path)?;
            tracing::info!("Moved previous results to {}", backup.display());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_path(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_path(&path)?;
        Ok(Self {
            path,
            out: LineWriter::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ResultsSink for FileResultsSink {
    fn persist(&mut self, phase: Phase, worker_id: WorkerId, report: &str) -> Result<()> {
        tracing::info!(target: "results", phase = phase.as_str(), worker_id, "{report}");
        let at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        writeln!(self.out, "{at} phase={phase} {report}").with_path(&self.path)
    }
}

/// Collects results in memory.
impl ResultsSink for Vec<(Phase, String)> {
    fn persist(&mut self, phase: Phase, worker_id: WorkerId, report: &str) -> Result<()> {
        tracing::info!(target: "results", phase = phase.as_str(), worker_id, "{report}");
        self.push((phase, report.to_string()));
        Ok(())
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_timestamp_phase_and_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.log");
        let mut sink = FileResultsSink::open(&path).unwrap();
        sink.persist(Phase::Initialize, 0, "worker=0 initialized")
            .unwrap();
        sink.persist(Phase::Gendata, 1, "worker=1 events=10").unwrap();
        drop(sink);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let (stamp, rest) = lines[0].split_once(' ').unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());
        assert_eq!(rest, "phase=initialize worker=0 initialized");
        assert!(lines[1].ends_with(" phase=gendata worker=1 events=10"));
    }

    #[test]
    fn previous_run_is_kept_as_backup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.log");
        std::fs::write(&path, "old run\n").unwrap();

        let mut sink = FileResultsSink::open(&path).unwrap();
        sink.persist(Phase::Forward, 0, "new run").unwrap();
        drop(sink);

        assert_eq!(
            std::fs::read_to_string(dir.path().join("results.log.1")).unwrap(),
            "old run\n"
        );
        assert!(
            std::fs::read_to_string(&path)
                .unwrap()
                .ends_with("phase=forward new run\n")
        );
    }
}
