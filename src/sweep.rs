//! Sweep generation: the cross product of executables, problem sizes and
//! process counts, executable-major, process-count-minor.
//!
//! The order is load-bearing. The metrics stage treats the first entry of each
//! (executable, problem size) group as its baseline.

use serde::{Deserialize, Serialize};

/// One point of the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub executable: String,
    pub problem_size: u64,
    pub processes: u32,
}

/// Builds the ordered sweep. Duplicated inputs yield duplicated entries.
pub fn generate(executables: &[String], problem_sizes: &[u64], process_counts: &[u32]) -> Vec<ConfigEntry> {
    executables
        .iter()
        .flat_map(|exe| {
            problem_sizes.iter().flat_map(move |&n| {
                process_counts.iter().map(move |&p| ConfigEntry {
                    executable: exe.clone(),
                    problem_size: n,
                    processes: p,
                })
            })
        })
        .collect()
}
