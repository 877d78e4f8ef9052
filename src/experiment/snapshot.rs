use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::experiment::trial::TrialReport;
use crate::experiment::BoxError;

pub fn snapshot_path(dir: &Path, trial: usize) -> PathBuf {
    dir.join(format!("trial_{}.json", trial))
}

/// Writes the raw demand and route details of a trial to `trial_<n>.json`.
pub fn write_snapshot(dir: &Path, report: &TrialReport) -> Result<PathBuf, BoxError> {
    let path = snapshot_path(dir, report.trial);
    let mut writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush()?;
    debug!("Snapshot written to {}", path.display());
    Ok(path)
}

pub fn read_snapshot(path: &Path) -> Result<TrialReport, BoxError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}
