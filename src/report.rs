//! Presentation of sweep results: a fixed-width table for the terminal and a
//! JSON document for later processing.

use crate::error::{Result, SweepError};
use crate::executor::{MeasurementRecord, RunStatus};
use crate::metrics::{derive, MetricsReport};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::path::Path;

pub const NO_RESULTS: &str =
    "No results were collected successfully. Check the execution errors above.";

/// Everything a finished sweep produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepReport {
    pub records: Vec<MeasurementRecord>,
    pub metrics: MetricsReport,
}

impl SweepReport {
    pub fn from_records(records: Vec<MeasurementRecord>) -> Self {
        let metrics = derive(&records);
        SweepReport { records, metrics }
    }

    pub fn failed_runs(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status != RunStatus::Measured)
            .count()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SweepError::io(path, e))
    }
}

/// Renders derived rows, values rounded to four decimals.
pub fn render_table(metrics: &MetricsReport) -> String {
    let mut out = String::new();
    if metrics.rows.is_empty() {
        out.push_str(NO_RESULTS);
        out.push('\n');
    } else {
        let width = metrics
            .rows
            .iter()
            .map(|r| r.executable.len())
            .max()
            .unwrap_or(0)
            .max("executable".len());

        let _ = writeln!(
            out,
            "{:<width$} {:>8} {:>9} {:>10} {:>10} {:>8} {:>12}",
            "executable",
            "n",
            "processes",
            "time_s",
            "baseline_s",
            "speedup",
            "efficiency_%",
            width = width
        );
        let _ = writeln!(out, "{:-<1$}", "", width + 63);
        for row in &metrics.rows {
            let _ = writeln!(
                out,
                "{:<width$} {:>8} {:>9} {:>10.4} {:>10.4} {:>8.4} {:>12.4}",
                row.executable,
                row.problem_size,
                row.processes,
                row.elapsed,
                row.baseline,
                row.speedup,
                row.efficiency,
                width = width
            );
        }
    }

    for group in &metrics.excluded_groups {
        let _ = writeln!(
            out,
            "excluded: {} (n={}) baseline run p={} {}, {} measured run(s) dropped",
            group.executable,
            group.problem_size,
            group.baseline_processes,
            group.baseline_status,
            group.dropped_rows
        );
    }
    out
}
