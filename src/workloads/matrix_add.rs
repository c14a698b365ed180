// Element-wise sum of two n x n matrices.
//
// Usage:
//   RAYON_NUM_THREADS=<workers> ./matrix_add <n> [--pin]
//
// Each worker owns a contiguous block of n / workers rows.

mod common;

use rayon::prelude::*;
use std::time::Instant;

fn add_blocks(pool: &rayon::ThreadPool, a: &[i64], b: &[i64], block: usize) -> Vec<i64> {
    let mut c = vec![0i64; a.len()];
    pool.install(|| {
        c.par_chunks_mut(block)
            .zip(a.par_chunks(block).zip(b.par_chunks(block)))
            .for_each(|(out, (sub_a, sub_b))| {
                for i in 0..out.len() {
                    out[i] = sub_a[i] + sub_b[i];
                }
            });
    });
    c
}

fn main() {
    let (args, rows, pool) = common::setup("matrix_add");
    let n = args.n;

    let a = common::random_values(n * n, 10);
    let b = common::random_values(n * n, 10);

    let start = Instant::now();
    let c = add_blocks(&pool, &a, &b, rows * n);
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "matrix_add n={} workers={} time: {:.6} seconds",
        n,
        pool.current_num_threads(),
        elapsed
    );
    let checksum: i64 = c.iter().sum();
    println!("checksum: {}", checksum);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_matches_sequential() {
        let n = 8;
        let a = common::random_values(n * n, 10);
        let b = common::random_values(n * n, 10);
        let pool = common::build_pool(4, false).unwrap();
        let c = add_blocks(&pool, &a, &b, common::rows_per_worker(n, 4).unwrap() * n);
        let expected: Vec<i64> = a.iter().zip(&b).map(|(x, y)| x + y).collect();
        assert_eq!(c, expected);
    }

    #[test]
    fn test_rows_per_worker() {
        assert_eq!(common::rows_per_worker(1024, 4), Some(256));
        assert_eq!(common::rows_per_worker(10, 4), None);
        assert_eq!(common::rows_per_worker(0, 1), None);
    }
}
