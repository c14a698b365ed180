//! Run executor.
//!
//! Every sweep entry yields exactly one [`MeasurementRecord`], in sweep order,
//! whatever happens to the run. Failures are recorded, not raised; only a
//! launcher that cannot be started at all aborts the sweep.
//!
//! Runs are strictly sequential. Each launch may itself start many worker
//! processes, and overlapping launches would compete for cores and skew the
//! timings.

use crate::error::{Result, SweepError};
use crate::sweep::ConfigEntry;
use crate::toolchain::{ExitState, Launcher, Presence};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::OnceLock;

/// Why a record does or does not carry a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    Measured,
    MissingExecutable,
    /// Non-zero exit, or `code: None` when killed by a signal.
    Failed { code: Option<i32> },
    TimedOut,
    /// The run succeeded but its output held no decimal number.
    NoMeasurement,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Measured => write!(f, "OK"),
            RunStatus::MissingExecutable => write!(f, "MISSING EXECUTABLE"),
            RunStatus::Failed { code: Some(code) } => write!(f, "FAILED (exit {})", code),
            RunStatus::Failed { code: None } => write!(f, "FAILED (signal)"),
            RunStatus::TimedOut => write!(f, "TIMED OUT"),
            RunStatus::NoMeasurement => write!(f, "NO MEASUREMENT"),
        }
    }
}

/// Outcome of one sweep entry. `elapsed` is `None` for every status but
/// [`RunStatus::Measured`]; it never stands in for a zero time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub executable: String,
    pub problem_size: u64,
    pub processes: u32,
    pub elapsed: Option<f64>,
    pub status: RunStatus,
}

impl MeasurementRecord {
    fn new(entry: &ConfigEntry, elapsed: Option<f64>, status: RunStatus) -> Self {
        MeasurementRecord {
            executable: entry.executable.clone(),
            problem_size: entry.problem_size,
            processes: entry.processes,
            elapsed,
            status,
        }
    }
}

fn decimal_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[0-9]+\.[0-9]+").expect("decimal pattern is valid"))
}

/// Extracts the first `digits.digits` substring of `output` as seconds.
/// A value too large to be a finite `f64` counts as no measurement.
///
/// ```
/// use scaling_sweep::executor::parse_elapsed;
///
/// assert_eq!(parse_elapsed("done in 2.0000 seconds"), Some(2.0));
/// assert_eq!(parse_elapsed("done in 2 seconds"), None);
/// ```
pub fn parse_elapsed(output: &str) -> Option<f64> {
    decimal_pattern()
        .find(output)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|secs| secs.is_finite())
}

/// Runs a single entry and classifies the result.
pub fn run_entry(
    entry: &ConfigEntry,
    artifact_dir: &Path,
    launcher: &dyn Launcher,
    presence: &dyn Presence,
) -> Result<MeasurementRecord> {
    let artifact = artifact_dir.join(&entry.executable);
    if !presence.exists(&artifact) {
        tracing::error!(
            executable = %entry.executable,
            path = %artifact.display(),
            "executable not found, recording failure"
        );
        return Ok(MeasurementRecord::new(entry, None, RunStatus::MissingExecutable));
    }

    let output = launcher.run(&artifact, entry.problem_size, entry.processes)?;

    let record = match output.exit {
        exit if exit.success() => match parse_elapsed(&output.stdout) {
            Some(secs) => MeasurementRecord::new(entry, Some(secs), RunStatus::Measured),
            None => {
                tracing::warn!(
                    executable = %entry.executable,
                    n = entry.problem_size,
                    p = entry.processes,
                    "run succeeded but no elapsed time was found in its output"
                );
                MeasurementRecord::new(entry, None, RunStatus::NoMeasurement)
            }
        },
        ExitState::Exited(code) => {
            tracing::warn!(
                executable = %entry.executable,
                n = entry.problem_size,
                p = entry.processes,
                code,
                stderr = %output.stderr.trim(),
                "run failed"
            );
            MeasurementRecord::new(entry, None, RunStatus::Failed { code: Some(code) })
        }
        ExitState::Signaled => {
            tracing::warn!(
                executable = %entry.executable,
                n = entry.problem_size,
                p = entry.processes,
                stderr = %output.stderr.trim(),
                "run killed by signal"
            );
            MeasurementRecord::new(entry, None, RunStatus::Failed { code: None })
        }
        ExitState::TimedOut => {
            tracing::warn!(
                executable = %entry.executable,
                n = entry.problem_size,
                p = entry.processes,
                "run timed out"
            );
            MeasurementRecord::new(entry, None, RunStatus::TimedOut)
        }
    };

    match record.elapsed {
        Some(secs) => tracing::info!(
            "Test: {} (n={}, p={}) -> OK ({:.4}s)",
            entry.executable,
            entry.problem_size,
            entry.processes,
            secs
        ),
        None => tracing::info!(
            "Test: {} (n={}, p={}) -> {}",
            entry.executable,
            entry.problem_size,
            entry.processes,
            record.status
        ),
    }

    Ok(record)
}

/// Runs the sweep in order, one record per entry.
///
/// If the launcher cannot be started the sweep stops, and the records
/// collected so far travel inside [`SweepError::SweepAborted`].
pub fn execute(
    entries: &[ConfigEntry],
    artifact_dir: &Path,
    launcher: &dyn Launcher,
    presence: &dyn Presence,
) -> Result<Vec<MeasurementRecord>> {
    let mut records = Vec::with_capacity(entries.len());
    for entry in entries {
        match run_entry(entry, artifact_dir, launcher, presence) {
            Ok(record) => records.push(record),
            Err(source) => {
                tracing::error!(
                    completed = records.len(),
                    remaining = entries.len() - records.len(),
                    "sweep aborted: {}",
                    source
                );
                return Err(SweepError::SweepAborted {
                    completed: records,
                    source: Box::new(source),
                });
            }
        }
    }
    Ok(records)
}
