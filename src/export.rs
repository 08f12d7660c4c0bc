//! Listing and exporting stored runs.

use std::io::Write;
use std::path::{Path, PathBuf};

use log::info;

use crate::error::{AppResult, DaqError};
use crate::storage::{Database, Run};

fn format_instant(ts: chrono::DateTime<chrono::Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Writes a table of all stored runs to `out`.
///
/// Errors with [`DaqError::NoRows`] when the store holds no runs, so the
/// CLI can exit non-zero like the read-only precondition failures.
pub fn list_runs(db: &Database, out: &mut dyn Write) -> AppResult<()> {
    if !db.exists() {
        return Err(DaqError::DatabaseMissing(db.path().display().to_string()));
    }
    let runs = db.list_runs()?;
    if runs.is_empty() {
        return Err(DaqError::NoRows("no runs found".into()));
    }
    writeln!(
        out,
        "{:>4}  {:<20}  {:<19}  {:<19}  {:<12}  {}",
        "id", "name", "start", "stop", "user", "notes"
    )?;
    for run in &runs {
        writeln!(
            out,
            "{:>4}  {:<20}  {:<19}  {:<19}  {:<12}  {}",
            run.id,
            run.name,
            format_instant(run.started_at),
            run.stopped_at.map(format_instant).unwrap_or_default(),
            run.user.clone().unwrap_or_default(),
            run.notes.clone().unwrap_or_default(),
        )?;
    }
    Ok(())
}

/// Default export file name: `<name>_<start>_<stop>.csv`.
pub fn default_dump_path(run: &Run) -> PathBuf {
    PathBuf::from(format!(
        "{}_{}_{}.csv",
        run.name,
        run.started_at.format("%Y%m%dT%H%M%S"),
        run.stopped_at
            .map(|ts| ts.format("%Y%m%dT%H%M%S").to_string())
            .unwrap_or_else(|| "open".into()),
    ))
}

/// Exports one run's records to a CSV file.
pub fn dump_run(db: &Database, run_id: i64, path: &Path) -> AppResult<usize> {
    if !db.exists() {
        return Err(DaqError::DatabaseMissing(db.path().display().to_string()));
    }
    let records = db.records(run_id)?;
    if records.is_empty() {
        return Err(DaqError::NoRows(format!("no rows found for id: {run_id}")));
    }
    info!("Writing data to [{}]", path.display());
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["id", "run_id", "value", "unit", "difference", "timestamp"])?;
    for r in &records {
        writer.write_record(&[
            r.id.to_string(),
            r.run_id.to_string(),
            r.value.to_string(),
            r.unit.clone(),
            r.difference.to_string(),
            r.timestamp.to_rfc3339(),
        ])?;
    }
    writer.flush().map_err(DaqError::Io)?;
    Ok(records.len())
}
