use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::clock::month_bucket;
use crate::config::{ParamMap, RunResult};
use crate::error::Result;
use crate::report::aggregate::Report;
use crate::report::render::render_table;

pub const RAW_RESULTS_FILE: &str = "result.yaml";
pub const TABLE_FILE: &str = "result_table.txt";
pub const TABLE_CSV_FILE: &str = "result_table.csv";
pub const PARSED_RESULTS_FILE: &str = "result_parsed.yaml";

/// `<log_dir>/runner/<year>-<month>/<name>-<run_id>`
pub fn run_dir_path(log_dir: &Path, name: &str, run_id: &str) -> PathBuf {
    log_dir
        .join("runner")
        .join(month_bucket())
        .join(format!("{}-{}", name, run_id))
}

/// Create the run directory for a sweep.
pub fn create_run_dir(log_dir: &Path, name: &str, run_id: &str) -> Result<PathBuf> {
    let path = run_dir_path(log_dir, name, run_id);
    fs::create_dir_all(&path)?;
    Ok(path)
}

/// Write the table as CSV: tag column first, then metrics.
pub fn write_csv(report: &Report, path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record(&report.columns)?;
    for group in &report.groups {
        wtr.write_record(report.columns.iter().map(|c| group.field(c)))?;
    }

    wtr.flush()?;
    Ok(())
}

/// Persist raw results, rendered table and parsed summary into `run_dir`.
pub fn persist(run_dir: &Path, run_id: &str, results: &[RunResult], report: &Report) -> Result<()> {
    let mut raw = ParamMap::new();
    raw.insert(
        run_id.to_string(),
        Value::Array(results.iter().cloned().map(Value::Object).collect()),
    );
    fs::write(run_dir.join(RAW_RESULTS_FILE), serde_yaml::to_string(&raw)?)?;

    let mut table = render_table(report);
    table.push('\n');
    fs::write(run_dir.join(TABLE_FILE), table)?;

    fs::write(
        run_dir.join(PARSED_RESULTS_FILE),
        serde_yaml::to_string(&report.parsed())?,
    )?;

    if !report.is_empty() {
        write_csv(report, &run_dir.join(TABLE_CSV_FILE))?;
    }

    Ok(())
}
