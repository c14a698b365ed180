//! Error types for sweep orchestration.
//!
//! Only conditions that invalidate the whole experiment end up here. A run
//! that crashes or prints nothing useful is recorded as data (see
//! [`crate::executor::RunStatus`]) and never surfaces as an `Err`.

use crate::executor::MeasurementRecord;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SweepError>;

#[derive(Error, Debug)]
pub enum SweepError {
    /// The configuration object is unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Reading or writing a file failed.
    #[error("I/O error for '{path}': {message}")]
    Io {
        path: PathBuf,
        message: String,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The compiler rejected a target. Fatal: every measurement of that
    /// target would be taken against a stale or missing binary.
    #[error("build of '{target}' failed (exit {code:?}): {diagnostic}")]
    BuildFailed {
        target: String,
        code: Option<i32>,
        diagnostic: String,
    },

    /// A collaborator process could not be started at all.
    #[error("could not start '{program}': {message}")]
    Spawn { program: String, message: String },

    /// The sweep stopped early. `completed` holds every record measured
    /// before the failure, in sweep order.
    #[error("sweep aborted after {} completed run(s): {source}", .completed.len())]
    SweepAborted {
        completed: Vec<MeasurementRecord>,
        #[source]
        source: Box<SweepError>,
    },
}

impl SweepError {
    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        SweepError::Io {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn spawn(program: impl Into<String>, err: std::io::Error) -> Self {
        SweepError::Spawn {
            program: program.into(),
            message: err.to_string(),
        }
    }
}
