// Shared setup for the workload binaries: argument parsing, the worker pool
// and input generation.
//
// Every workload takes the problem size as its only positional argument and
// reads its worker count from RAYON_NUM_THREADS, which the thread launcher
// template sets to {procs}. Output must not contain a decimal number before
// the timing line; the sweep picks up the first one it sees.

use clap::Parser;
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Parser)]
pub struct WorkloadArgs {
    /// Matrix dimension n (the matrix is n x n)
    pub n: usize,

    /// Worker threads (defaults to the number of cores)
    #[arg(long, env = "RAYON_NUM_THREADS")]
    pub threads: Option<usize>,

    /// Pin each worker to its own core
    #[arg(long)]
    pub pin: bool,
}

impl WorkloadArgs {
    pub fn workers(&self) -> usize {
        self.threads
            .filter(|&t| t > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }
}

// Next core handed out when pinning
static NEXT_CORE: AtomicUsize = AtomicUsize::new(0);

fn pin_current_thread() {
    let slot = NEXT_CORE.fetch_add(1, Ordering::SeqCst);
    if let Some(core_ids) = core_affinity::get_core_ids() {
        if slot < core_ids.len() {
            core_affinity::set_for_current(core_ids[slot]);
        }
    }
}

pub fn build_pool(workers: usize, pin: bool) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    NEXT_CORE.store(0, Ordering::SeqCst);
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .start_handler(move |_| {
            if pin {
                pin_current_thread();
            }
        })
        .build()
}

/// Rows are split evenly between workers, so n must divide.
pub fn rows_per_worker(n: usize, workers: usize) -> Option<usize> {
    if n == 0 || workers == 0 || n % workers != 0 {
        None
    } else {
        Some(n / workers)
    }
}

pub fn random_values(len: usize, modulo: i64) -> Vec<i64> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(0..modulo)).collect()
}

/// Parses arguments, checks n against the worker count and builds the pool.
/// Exits with status 1 on bad input, like the sweep expects from a failed run.
pub fn setup(program: &str) -> (WorkloadArgs, usize, rayon::ThreadPool) {
    let args = WorkloadArgs::parse();
    let workers = args.workers();

    let Some(rows) = rows_per_worker(args.n, workers) else {
        eprintln!(
            "{}: n ({}) must be positive and divisible by the number of workers ({})",
            program, args.n, workers
        );
        std::process::exit(1);
    };

    let pool = match build_pool(workers, args.pin) {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("{}: could not start {} workers: {}", program, workers, e);
            std::process::exit(1);
        }
    };

    (args, rows, pool)
}
