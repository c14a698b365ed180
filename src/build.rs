//! Build stage: compile every target before anything is measured.
//!
//! A missing source is skipped with a warning. A failed compile aborts the
//! whole experiment.

use crate::config::ExperimentConfig;
use crate::error::{Result, SweepError};
use crate::toolchain::{BuildStatus, Compiler, Presence};
use serde::Serialize;

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    pub built: Vec<String>,
    /// Targets whose source was not found.
    pub skipped: Vec<String>,
}

pub fn build_all(config: &ExperimentConfig, compiler: &dyn Compiler, presence: &dyn Presence) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();

    for target in &config.targets {
        if !presence.exists(&target.source) {
            tracing::warn!(
                executable = %target.name,
                source = %target.source.display(),
                "source file not found, skipping build"
            );
            summary.skipped.push(target.name.clone());
            continue;
        }

        let artifact = config.artifact_path(&target.name);
        tracing::info!(
            "Compiling {} -> {}",
            target.source.display(),
            artifact.display()
        );

        match compiler.compile(&target.source, &target.name, &artifact)? {
            BuildStatus::Built => summary.built.push(target.name.clone()),
            BuildStatus::Failed { code, diagnostic } => {
                tracing::error!(executable = %target.name, ?code, "compilation failed");
                return Err(SweepError::BuildFailed {
                    target: target.name.clone(),
                    code,
                    diagnostic,
                });
            }
        }
    }

    Ok(summary)
}
