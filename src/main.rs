// Sweep runner: compiles the configured programs, runs every
// (program, problem size, process count) combination once and prints
// speedup/efficiency per group.
//
//   sweep plan  --config demos/mpi.json
//   sweep build --config demos/mpi.json
//   sweep run   --config demos/threads.json --procs 1,2,4 --output results.json

use clap::{Args, Parser, Subcommand};
use scaling_sweep::report::render_table;
use scaling_sweep::sweep::generate;
use scaling_sweep::toolchain::{CommandCompiler, CommandLauncher, LocalFs};
use scaling_sweep::{Experiment, ExperimentConfig, Result, SweepError, SweepReport};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sweep", version, about = "Strong-scaling sweeps for parallel programs")]
struct Cli {
    /// More output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the sweep without building or running anything
    Plan(ConfigArgs),
    /// Compile every target
    Build(ConfigArgs),
    /// Build, run the sweep and report speedup/efficiency
    Run(RunArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// Experiment configuration (JSON)
    #[arg(short, long)]
    config: PathBuf,

    /// Override the configured problem sizes
    #[arg(long, value_delimiter = ',')]
    sizes: Vec<u64>,

    /// Override the configured process counts; the first one is the baseline
    #[arg(long, value_delimiter = ',')]
    procs: Vec<u32>,
}

#[derive(Args)]
struct RunArgs {
    #[command(flatten)]
    config: ConfigArgs,

    /// Kill a run after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Write the full report as JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Use existing executables
    #[arg(long)]
    skip_build: bool,
}

impl ConfigArgs {
    fn load(&self) -> Result<ExperimentConfig> {
        let mut config = ExperimentConfig::load(&self.config)?;
        if !self.sizes.is_empty() {
            config.problem_sizes = self.sizes.clone();
        }
        if !self.procs.is_empty() {
            config.process_counts = self.procs.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("scaling_sweep={level},sweep={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn plan(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let entries = generate(&config.executables(), &config.problem_sizes, &config.process_counts);
    for entry in &entries {
        println!("{} n={} p={}", entry.executable, entry.problem_size, entry.processes);
    }
    println!("{} runs", entries.len());
    Ok(())
}

fn build(args: &ConfigArgs) -> Result<()> {
    let config = args.load()?;
    let compiler = CommandCompiler::new(config.compiler.clone());
    let launcher = CommandLauncher::new(config.launcher.clone());
    let experiment = Experiment {
        config: &config,
        compiler: &compiler,
        launcher: &launcher,
        presence: &LocalFs,
    };
    prepare_artifact_dir(&config)?;
    experiment.build()?;
    Ok(())
}

fn run(args: &RunArgs) -> Result<()> {
    let mut config = args.config.load()?;
    if args.timeout.is_some() {
        config.timeout_secs = args.timeout;
    }

    let compiler = CommandCompiler::new(config.compiler.clone());
    let launcher = CommandLauncher::new(config.launcher.clone())
        .with_timeout(config.timeout_secs.map(Duration::from_secs));
    let experiment = Experiment {
        config: &config,
        compiler: &compiler,
        launcher: &launcher,
        presence: &LocalFs,
    };

    if !args.skip_build {
        prepare_artifact_dir(&config)?;
        experiment.build()?;
    }
    match experiment.measure() {
        Ok(report) => present(&report, args.output.as_deref()),
        // Runs already finished are still worth reporting.
        Err(SweepError::SweepAborted { completed, source }) => {
            let partial = SweepReport::from_records(completed);
            present(&partial, args.output.as_deref())?;
            Err(SweepError::SweepAborted {
                completed: partial.records,
                source,
            })
        }
        Err(e) => Err(e),
    }
}

fn present(report: &SweepReport, output: Option<&Path>) -> Result<()> {
    println!("--- Results ---");
    print!("{}", render_table(&report.metrics));

    if let Some(path) = output {
        report.write_json(path)?;
        tracing::info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn prepare_artifact_dir(config: &ExperimentConfig) -> Result<()> {
    std::fs::create_dir_all(&config.artifact_dir)
        .map_err(|e| SweepError::io(&config.artifact_dir, e))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Command::Plan(args) => plan(args),
        Command::Build(args) => build(args),
        Command::Run(args) => run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
