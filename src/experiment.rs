//! End-to-end pipeline: build, sweep, execute, derive.
//!
//! Data only flows forward. Build failures abort before anything runs; per
//! entry failures travel as [`RunStatus`](crate::executor::RunStatus) values
//! into the report.

use crate::build::{build_all, BuildSummary};
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::executor::execute;
use crate::report::SweepReport;
use crate::sweep::{generate, ConfigEntry};
use crate::toolchain::{Compiler, Launcher, Presence};

/// The collaborators an experiment runs against.
pub struct Experiment<'a> {
    pub config: &'a ExperimentConfig,
    pub compiler: &'a dyn Compiler,
    pub launcher: &'a dyn Launcher,
    pub presence: &'a dyn Presence,
}

impl<'a> Experiment<'a> {
    pub fn plan(&self) -> Vec<ConfigEntry> {
        generate(
            &self.config.executables(),
            &self.config.problem_sizes,
            &self.config.process_counts,
        )
    }

    pub fn build(&self) -> Result<BuildSummary> {
        tracing::info!("--- Build started ---");
        let summary = build_all(self.config, self.compiler, self.presence)?;
        tracing::info!(
            built = summary.built.len(),
            skipped = summary.skipped.len(),
            "--- Build finished ---"
        );
        Ok(summary)
    }

    /// Runs the sweep and derives metrics, without building.
    pub fn measure(&self) -> Result<SweepReport> {
        let entries = self.plan();
        tracing::info!(runs = entries.len(), "--- Running sweep (this may take a while) ---");
        let records = execute(&entries, &self.config.artifact_dir, self.launcher, self.presence)?;
        tracing::info!("--- Sweep finished ---");

        Ok(SweepReport::from_records(records))
    }

    pub fn run(&self) -> Result<SweepReport> {
        self.build()?;
        self.measure()
    }
}
