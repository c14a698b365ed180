//! Experiment configuration.
//!
//! A configuration names the programs to build, the problem sizes and process
//! counts to sweep, and the command templates used to compile and launch each
//! program. It is normally read from a JSON file:
//!
//! ```json
//! {
//!   "targets": [{ "name": "matrix_add", "source": "matrix_add.c" }],
//!   "problem_sizes": [1024, 2048],
//!   "process_counts": [1, 2, 4, 8]
//! }
//! ```
//!
//! Command templates may reference `{source}`, `{name}`, `{artifact}`,
//! `{size}` and `{procs}`; see [`CommandTemplate`].

use crate::error::{Result, SweepError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One program to compile and measure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub source: PathBuf,
}

/// An external command with placeholder substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTemplate {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

/// Values available for substitution into a [`CommandTemplate`].
#[derive(Debug, Default, Clone)]
pub struct Placeholders<'a> {
    pub source: Option<&'a Path>,
    pub name: Option<&'a str>,
    pub artifact: Option<&'a Path>,
    pub size: Option<u64>,
    pub procs: Option<u32>,
}

/// A template with every placeholder filled in, ready to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

const COMPILER_PLACEHOLDERS: &[&str] = &["source", "name", "artifact"];
const LAUNCHER_PLACEHOLDERS: &[&str] = &["name", "artifact", "size", "procs"];

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([a-z_]+)\}").expect("placeholder pattern is valid"))
}

impl CommandTemplate {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        CommandTemplate {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
        }
    }

    /// `mpicc {source} -o {artifact}`
    pub fn default_compiler() -> Self {
        CommandTemplate::new("mpicc", &["{source}", "-o", "{artifact}"])
    }

    /// `mpirun --oversubscribe --allow-run-as-root -np {procs} {artifact} {size}`
    pub fn default_launcher() -> Self {
        CommandTemplate::new(
            "mpirun",
            &[
                "--oversubscribe",
                "--allow-run-as-root",
                "-np",
                "{procs}",
                "{artifact}",
                "{size}",
            ],
        )
    }

    pub fn render(&self, vars: &Placeholders<'_>) -> RenderedCommand {
        RenderedCommand {
            program: substitute(&self.program, vars),
            args: self.args.iter().map(|a| substitute(a, vars)).collect(),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), substitute(v, vars)))
                .collect(),
        }
    }

    fn check_placeholders(&self, role: &str, allowed: &[&str]) -> Result<()> {
        let fields = std::iter::once(&self.program)
            .chain(self.args.iter())
            .chain(self.env.values());
        for field in fields {
            for cap in placeholder_pattern().captures_iter(field) {
                let key = &cap[1];
                if !allowed.contains(&key) {
                    return Err(SweepError::Config(format!(
                        "{} template uses unknown placeholder '{{{}}}' (allowed: {})",
                        role,
                        key,
                        allowed.join(", ")
                    )));
                }
            }
        }
        Ok(())
    }
}

fn substitute(field: &str, vars: &Placeholders<'_>) -> String {
    placeholder_pattern()
        .replace_all(field, |cap: &regex::Captures<'_>| {
            let value = match &cap[1] {
                "source" => vars.source.map(|p| p.display().to_string()),
                "name" => vars.name.map(str::to_string),
                "artifact" => vars.artifact.map(|p| p.display().to_string()),
                "size" => vars.size.map(|n| n.to_string()),
                "procs" => vars.procs.map(|p| p.to_string()),
                _ => None,
            };
            value.unwrap_or_else(|| cap[0].to_string())
        })
        .into_owned()
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from(".")
}

/// The full experiment description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Programs in declaration order. This order is the executable order of
    /// the sweep.
    pub targets: Vec<Target>,
    pub problem_sizes: Vec<u64>,
    /// The first count of this list designates the baseline run of every
    /// (executable, problem size) group.
    pub process_counts: Vec<u32>,
    #[serde(default = "CommandTemplate::default_compiler")]
    pub compiler: CommandTemplate,
    #[serde(default = "CommandTemplate::default_launcher")]
    pub launcher: CommandTemplate,
    /// Directory holding compiled executables, one per target name.
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,
    /// Per-run limit. `None` waits forever.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl ExperimentConfig {
    pub fn new(targets: Vec<Target>, problem_sizes: Vec<u64>, process_counts: Vec<u32>) -> Self {
        ExperimentConfig {
            targets,
            problem_sizes,
            process_counts,
            compiler: CommandTemplate::default_compiler(),
            launcher: CommandTemplate::default_launcher(),
            artifact_dir: default_artifact_dir(),
            timeout_secs: None,
        }
    }

    /// Reads a configuration file. Call [`validate`](Self::validate) once
    /// any overrides have been applied.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SweepError::io(path, e))?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.targets.is_empty() {
            return Err(SweepError::Config("no targets configured".to_string()));
        }
        if self.problem_sizes.is_empty() {
            return Err(SweepError::Config("no problem sizes configured".to_string()));
        }
        if self.process_counts.is_empty() {
            return Err(SweepError::Config("no process counts configured".to_string()));
        }
        if self.problem_sizes.contains(&0) {
            return Err(SweepError::Config("problem sizes must be positive".to_string()));
        }
        if self.process_counts.contains(&0) {
            return Err(SweepError::Config("process counts must be positive".to_string()));
        }

        let mut seen = HashSet::new();
        for target in &self.targets {
            if target.name.is_empty() {
                return Err(SweepError::Config("target with empty name".to_string()));
            }
            if !seen.insert(target.name.as_str()) {
                return Err(SweepError::Config(format!(
                    "duplicate target name '{}'",
                    target.name
                )));
            }
        }

        self.compiler.check_placeholders("compiler", COMPILER_PLACEHOLDERS)?;
        self.launcher.check_placeholders("launcher", LAUNCHER_PLACEHOLDERS)?;

        if let Some((first, min)) = self.unusual_baseline() {
            tracing::warn!(
                first,
                min,
                "first process count is not the smallest; speedups will be relative to p={}",
                first
            );
        }
        Ok(())
    }

    /// `(first, smallest)` process counts when the positional baseline is
    /// not the smallest count, `None` otherwise.
    pub fn unusual_baseline(&self) -> Option<(u32, u32)> {
        let first = *self.process_counts.first()?;
        let min = self.process_counts.iter().copied().min()?;
        (first != min).then_some((first, min))
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.artifact_dir.join(name)
    }

    pub fn executables(&self) -> Vec<String> {
        self.targets.iter().map(|t| t.name.clone()).collect()
    }
}
