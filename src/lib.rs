//! Compile a set of parallel programs, run each over a grid of problem sizes
//! and process counts, and derive speedup and efficiency relative to each
//! group's baseline run.

pub mod build;
pub mod config;
pub mod error;
pub mod executor;
pub mod experiment;
pub mod metrics;
pub mod report;
pub mod sweep;
pub mod toolchain;

pub use config::{CommandTemplate, ExperimentConfig, Target};
pub use error::{Result, SweepError};
pub use executor::{MeasurementRecord, RunStatus};
pub use experiment::Experiment;
pub use metrics::{DerivedRow, MetricsReport};
pub use report::SweepReport;
pub use sweep::ConfigEntry;
