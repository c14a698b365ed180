// Largest value of an n x n matrix via a parallel max reduction.
//
// Usage:
//   RAYON_NUM_THREADS=<workers> ./matrix_max <n> [--pin]
//
// Values are drawn from [0, n*n).

mod common;

use rayon::prelude::*;
use std::time::Instant;

fn max_reduce(pool: &rayon::ThreadPool, data: &[i64], block: usize) -> i64 {
    pool.install(|| {
        data.par_chunks(block)
            .map(|chunk| chunk.iter().copied().max().unwrap_or(i64::MIN))
            .reduce(|| i64::MIN, i64::max)
    })
}

fn main() {
    let (args, rows, pool) = common::setup("matrix_max");
    let n = args.n;

    let modulo = (n as i64).saturating_mul(n as i64).max(1);
    let data = common::random_values(n * n, modulo);

    let start = Instant::now();
    let max = max_reduce(&pool, &data, rows * n);
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "matrix_max n={} workers={} time: {:.6} seconds",
        n,
        pool.current_num_threads(),
        elapsed
    );
    println!("max value: {}", max);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_matches_sequential() {
        let data = common::random_values(64, 1000);
        let pool = common::build_pool(2, false).unwrap();
        assert_eq!(max_reduce(&pool, &data, 32), *data.iter().max().unwrap());
    }

    #[test]
    fn test_max_single_block() {
        let pool = common::build_pool(1, false).unwrap();
        assert_eq!(max_reduce(&pool, &[3, -7, 12, 5], 4), 12);
    }
}
