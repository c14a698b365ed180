//! Speedup and efficiency derivation.
//!
//! Records are grouped by (executable, problem size). The baseline of a group
//! is the group's *first record in sweep order*, counted before failures are
//! dropped; with the usual `process_counts = [1, ...]` that is the
//! single-process run. When that reference run has no time the whole group is
//! excluded and reported in [`MetricsReport::excluded_groups`] rather than
//! falling back to a later run.

use crate::executor::{MeasurementRecord, RunStatus};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A measured record extended with its group baseline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedRow {
    pub executable: String,
    pub problem_size: u64,
    pub processes: u32,
    pub elapsed: f64,
    pub baseline: f64,
    /// Process count of the run the baseline came from.
    pub baseline_processes: u32,
    pub speedup: f64,
    /// Percentage, 100 meaning linear scaling.
    pub efficiency: f64,
}

/// A group dropped because its reference run produced no time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcludedGroup {
    pub executable: String,
    pub problem_size: u64,
    pub baseline_processes: u32,
    /// How the reference run ended.
    pub baseline_status: RunStatus,
    /// Successful runs discarded along with the group. Zero when every run
    /// of the group failed.
    pub dropped_rows: usize,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub rows: Vec<DerivedRow>,
    pub excluded_groups: Vec<ExcludedGroup>,
}

pub fn speedup(baseline: f64, elapsed: f64) -> f64 {
    if elapsed > 0.0 {
        baseline / elapsed
    } else {
        0.0
    }
}

pub fn efficiency(speedup: f64, processes: u32) -> f64 {
    if processes > 0 {
        (speedup / processes as f64) * 100.0
    } else {
        0.0
    }
}

struct Reference {
    baseline: Option<f64>,
    processes: u32,
    status: RunStatus,
    order: usize,
}

/// Derives metric rows from the full, ordered record sequence.
pub fn derive(records: &[MeasurementRecord]) -> MetricsReport {
    let mut references: HashMap<(&str, u64), Reference> = HashMap::new();
    for record in records {
        let next = references.len();
        references
            .entry((record.executable.as_str(), record.problem_size))
            .or_insert(Reference {
                baseline: record.elapsed,
                processes: record.processes,
                status: record.status,
                order: next,
            });
    }

    let mut rows = Vec::new();
    let mut dropped: HashMap<(&str, u64), usize> = HashMap::new();

    for record in records {
        let Some(elapsed) = record.elapsed else {
            continue;
        };
        let key = (record.executable.as_str(), record.problem_size);
        let reference = &references[&key];
        let Some(baseline) = reference.baseline else {
            *dropped.entry(key).or_default() += 1;
            continue;
        };

        let speedup = speedup(baseline, elapsed);
        rows.push(DerivedRow {
            executable: record.executable.clone(),
            problem_size: record.problem_size,
            processes: record.processes,
            elapsed,
            baseline,
            baseline_processes: reference.processes,
            speedup,
            efficiency: efficiency(speedup, record.processes),
        });
    }

    let mut excluded: Vec<(usize, ExcludedGroup)> = references
        .iter()
        .filter(|(_, r)| r.baseline.is_none())
        .map(|(&(exe, n), r)| {
            let group = ExcludedGroup {
                executable: exe.to_string(),
                problem_size: n,
                baseline_processes: r.processes,
                baseline_status: r.status,
                dropped_rows: dropped.get(&(exe, n)).copied().unwrap_or(0),
            };
            (r.order, group)
        })
        .collect();
    excluded.sort_by_key(|(order, _)| *order);

    for (_, group) in &excluded {
        tracing::warn!(
            executable = %group.executable,
            n = group.problem_size,
            baseline_p = group.baseline_processes,
            baseline_status = %group.baseline_status,
            dropped = group.dropped_rows,
            "baseline run has no time, excluding group from metrics"
        );
    }

    MetricsReport {
        rows,
        excluded_groups: excluded.into_iter().map(|(_, g)| g).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::RunStatus;
    use proptest::prelude::*;

    fn rec(exe: &str, n: u64, p: u32, t: Option<f64>) -> MeasurementRecord {
        MeasurementRecord {
            executable: exe.to_string(),
            problem_size: n,
            processes: p,
            elapsed: t,
            status: if t.is_some() {
                RunStatus::Measured
            } else {
                RunStatus::Failed { code: Some(1) }
            },
        }
    }

    #[test]
    fn test_two_point_group() {
        let report = derive(&[rec("A", 100, 1, Some(2.0)), rec("A", 100, 2, Some(1.0))]);
        assert_eq!(report.rows.len(), 2);
        assert!(report.excluded_groups.is_empty());

        let first = &report.rows[0];
        assert_eq!(first.baseline, 2.0);
        assert_eq!(first.speedup, 1.0);
        assert_eq!(first.efficiency, 100.0);

        let second = &report.rows[1];
        assert_eq!(second.baseline, 2.0);
        assert_eq!(second.baseline_processes, 1);
        assert_eq!(second.speedup, 2.0);
        assert_eq!(second.efficiency, 100.0);
    }

    #[test]
    fn test_groups_are_independent() {
        let report = derive(&[
            rec("A", 100, 1, Some(4.0)),
            rec("A", 100, 4, Some(2.0)),
            rec("A", 200, 1, Some(8.0)),
            rec("A", 200, 4, Some(1.0)),
            rec("B", 100, 1, Some(1.0)),
            rec("B", 100, 4, Some(1.0)),
        ]);
        let speedups: Vec<f64> = report.rows.iter().map(|r| r.speedup).collect();
        assert_eq!(speedups, vec![1.0, 2.0, 1.0, 8.0, 1.0, 1.0]);
        let efficiencies: Vec<f64> = report.rows.iter().map(|r| r.efficiency).collect();
        assert_eq!(efficiencies, vec![100.0, 50.0, 100.0, 200.0, 100.0, 25.0]);
    }

    #[test]
    fn test_failed_baseline_excludes_group() {
        let report = derive(&[
            rec("A", 100, 1, None),
            rec("A", 100, 2, Some(1.0)),
            rec("A", 100, 4, Some(0.5)),
            rec("A", 200, 1, Some(3.0)),
        ]);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].problem_size, 200);
        assert_eq!(
            report.excluded_groups,
            vec![ExcludedGroup {
                executable: "A".to_string(),
                problem_size: 100,
                baseline_processes: 1,
                baseline_status: RunStatus::Failed { code: Some(1) },
                dropped_rows: 2,
            }]
        );
    }

    #[test]
    fn test_group_without_any_time_is_excluded_with_nothing_dropped() {
        let mut missing = rec("B", 50, 1, None);
        missing.status = RunStatus::MissingExecutable;
        let mut second = rec("B", 50, 2, None);
        second.status = RunStatus::MissingExecutable;

        let report = derive(&[rec("A", 50, 1, Some(1.0)), missing, second]);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.excluded_groups.len(), 1);
        let group = &report.excluded_groups[0];
        assert_eq!(group.executable, "B");
        assert_eq!(group.baseline_status, RunStatus::MissingExecutable);
        assert_eq!(group.dropped_rows, 0);
    }

    #[test]
    fn test_failed_non_baseline_is_just_dropped() {
        let report = derive(&[
            rec("A", 100, 1, Some(2.0)),
            rec("A", 100, 2, None),
            rec("A", 100, 4, Some(1.0)),
        ]);
        let procs: Vec<u32> = report.rows.iter().map(|r| r.processes).collect();
        assert_eq!(procs, vec![1, 4]);
        assert!(report.excluded_groups.is_empty());
    }

    #[test]
    fn test_baseline_is_positional_not_minimum() {
        let report = derive(&[rec("A", 10, 4, Some(1.0)), rec("A", 10, 1, Some(4.0))]);
        assert_eq!(report.rows[0].baseline_processes, 4);
        assert_eq!(report.rows[1].baseline, 1.0);
        assert_eq!(report.rows[1].speedup, 0.25);
    }

    #[test]
    fn test_zero_time_guard() {
        let report = derive(&[rec("A", 10, 1, Some(1.0)), rec("A", 10, 2, Some(0.0))]);
        assert_eq!(report.rows[1].speedup, 0.0);
        assert_eq!(report.rows[1].efficiency, 0.0);
    }

    #[test]
    fn test_zero_processes_guard() {
        assert_eq!(efficiency(3.0, 0), 0.0);
        assert_eq!(speedup(1.0, -1.0), 0.0);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(derive(&[]), MetricsReport::default());
    }

    proptest! {
        #[test]
        fn prop_baseline_and_efficiency_identity(
            times in prop::collection::vec(prop::option::of(0.0f64..100.0), 1..12),
        ) {
            let procs = [1u32, 2, 4, 8];
            let records: Vec<MeasurementRecord> = times
                .iter()
                .enumerate()
                .map(|(i, t)| rec("A", 10 + (i / procs.len()) as u64, procs[i % procs.len()], *t))
                .collect();
            let report = derive(&records);

            for row in &report.rows {
                let first = records
                    .iter()
                    .find(|r| r.problem_size == row.problem_size)
                    .unwrap();
                prop_assert_eq!(first.elapsed, Some(row.baseline));
                prop_assert_eq!(row.efficiency, efficiency(row.speedup, row.processes));
                prop_assert_eq!(row.efficiency, row.speedup / row.processes as f64 * 100.0);
            }

            prop_assert_eq!(derive(&records), report);
        }
    }
}
