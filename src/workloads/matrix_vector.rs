// Matrix-vector product c = A * b for an n x n matrix A.
//
// Usage:
//   RAYON_NUM_THREADS=<workers> ./matrix_vector <n> [--pin]
//
// Every worker reads all of b and produces n / workers entries of c.

mod common;

use rayon::prelude::*;
use std::time::Instant;

fn multiply(pool: &rayon::ThreadPool, a: &[i64], b: &[i64], n: usize, rows: usize) -> Vec<i64> {
    let mut c = vec![0i64; n];
    pool.install(|| {
        c.par_chunks_mut(rows)
            .zip(a.par_chunks(rows * n))
            .for_each(|(out, block)| {
                for (i, row) in block.chunks(n).enumerate() {
                    out[i] = row.iter().zip(b).map(|(x, y)| x * y).sum();
                }
            });
    });
    c
}

fn main() {
    let (args, rows, pool) = common::setup("matrix_vector");
    let n = args.n;

    let a = common::random_values(n * n, 10);
    let b = common::random_values(n, 10);

    let start = Instant::now();
    let c = multiply(&pool, &a, &b, n, rows);
    let elapsed = start.elapsed().as_secs_f64();

    println!(
        "matrix_vector n={} workers={} time: {:.6} seconds",
        n,
        pool.current_num_threads(),
        elapsed
    );
    if n <= 20 {
        println!("result: {:?}", c);
    } else {
        println!("result has {} entries, not printed", n);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_matrix() {
        let n = 4;
        let mut a = vec![0i64; n * n];
        for i in 0..n {
            a[i * n + i] = 1;
        }
        let b = vec![3, 1, 4, 1];
        let pool = common::build_pool(2, false).unwrap();
        assert_eq!(multiply(&pool, &a, &b, n, 2), b);
    }

    #[test]
    fn test_matches_sequential() {
        let n = 6;
        let a = common::random_values(n * n, 10);
        let b = common::random_values(n, 10);
        let pool = common::build_pool(3, false).unwrap();
        let expected: Vec<i64> = (0..n)
            .map(|i| (0..n).map(|j| a[i * n + j] * b[j]).sum())
            .collect();
        assert_eq!(multiply(&pool, &a, &b, n, 2), expected);
    }
}
