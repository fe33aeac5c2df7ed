// =============================================================================
// Scan Log — per-ticker outcome rows and the CSV artifact
// =============================================================================
//
// Workers append rows concurrently; rows are never mutated after append.
// Once every worker has finished, the orchestrator writes the whole log to a
// timestamped CSV so consecutive runs never overwrite each other.
// =============================================================================

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

use crate::types::{ScanModule, ScanStatus};

/// Outcome of one ticker in one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    pub ticker: String,
    pub module: ScanModule,
    pub status: ScanStatus,
    pub details: String,
    pub time: DateTime<Local>,
}

impl ScanResult {
    pub fn new(
        ticker: impl Into<String>,
        module: ScanModule,
        status: ScanStatus,
        details: impl Into<String>,
    ) -> Self {
        Self {
            ticker: ticker.into(),
            module,
            status,
            details: details.into(),
            time: Local::now(),
        }
    }
}

/// Append-only, thread-safe accumulator of scan rows.
#[derive(Default)]
pub struct ScanLog {
    rows: Mutex<Vec<ScanResult>>,
}

impl ScanLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, row: ScanResult) {
        self.rows.lock().push(row);
    }

    /// Copy of all rows in append order.
    pub fn snapshot(&self) -> Vec<ScanResult> {
        self.rows.lock().clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }
}

/// File name for a run started at `started_at`.
pub fn log_file_name(started_at: DateTime<Local>) -> String {
    format!("scan_{}.csv", started_at.format("%Y-%m-%d_%H%M%S"))
}

/// Write `rows` as CSV into `dir` (created if needed) and return the path.
pub fn write_csv(dir: &Path, started_at: DateTime<Local>, rows: &[ScanResult]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let path = dir.join(log_file_name(started_at));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("failed to create scan log {}", path.display()))?;

    writer.write_record(["Ticker", "Module", "Status", "Details", "Time"])?;
    for row in rows {
        writer.write_record([
            row.ticker.clone(),
            row.module.to_string(),
            row.status.to_string(),
            row.details.clone(),
            row.time.format("%H:%M:%S").to_string(),
        ])?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to flush scan log {}", path.display()))?;

    info!(path = %path.display(), rows = rows.len(), "scan log written");
    Ok(path)
}
