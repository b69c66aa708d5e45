//! Connection pool benchmark suite.
//!
//! Measures checkout/return cost of the pool:
//! - Uncontended acquire + release on a warm pool
//! - Thread counts: 2, 8, 32 sharing pools of 1, 4, 15 connections
//!
//! Run with: cargo bench --bench pool_contention
//! Results saved to: target/criterion/

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use sl4a_rpc::{ConnectionPool, PoolConnection};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const THREAD_COUNTS: &[usize] = &[2, 8, 32];
const POOL_SIZES: &[usize] = &[1, 4, 15];
const CHECKOUTS_PER_THREAD: usize = 200;

// ============================================================================
// Fixtures
// ============================================================================

/// Connection stand-in with no I/O.
struct NullConnection;

impl PoolConnection for NullConnection {
    fn close(&self) {}
}

fn pool(max: usize) -> ConnectionPool<NullConnection> {
    ConnectionPool::new(max, Duration::from_micros(50), Box::new(|| Ok(NullConnection)))
        .expect("pool creation")
}

// ============================================================================
// Benchmark: Uncontended Checkout
// ============================================================================

fn bench_uncontended(c: &mut Criterion) {
    let pool = pool(1);

    c.bench_function("acquire_release_warm", |b| {
        b.iter(|| {
            let conn = pool.acquire().expect("acquire");
            pool.release(conn).expect("release");
        });
    });
}

// ============================================================================
// Benchmark: Contended Checkout
// ============================================================================

fn bench_contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("contended_checkout");
    group.sample_size(10);

    for &size in POOL_SIZES {
        for &threads in THREAD_COUNTS {
            let id = format!("{size}c_{threads}t");
            group.bench_with_input(
                BenchmarkId::new("checkout", &id),
                &(size, threads),
                |b, &(pool_size, thread_count)| {
                    b.iter(|| run_contended(pool_size, thread_count));
                },
            );
        }
    }

    group.finish();
}

fn run_contended(pool_size: usize, thread_count: usize) {
    let pool = Arc::new(pool(pool_size));

    let workers: Vec<_> = (0..thread_count)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for _ in 0..CHECKOUTS_PER_THREAD {
                    let conn = pool.acquire().expect("acquire");
                    pool.release(conn).expect("release");
                }
            })
        })
        .collect();

    for worker in workers {
        worker.join().expect("worker panicked");
    }
}

// ============================================================================
// Criterion Setup
// ============================================================================

criterion_group!(benches, bench_uncontended, bench_contended);
criterion_main!(benches);
