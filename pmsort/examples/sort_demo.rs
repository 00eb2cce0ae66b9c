/// # Parallel Merge Sort Demo
///
/// Sorts a random vector on a worker pool and checks the result against the
/// standard library sort.
///
/// ```text
/// cargo run -p pmsort --example sort_demo -- [len] [workers] [max_depth] [debug|normal|silent]
/// ```
use std::time::Instant;

use anyhow::{bail, Context};
use pmsort::Sorter;
use pmsort_pool::logging::{self, LogConfig, Verbosity};
use pmsort_pool::{PoolConfig, WorkerPool, DEFAULT_MAX_DEPTH};
use rand::Rng;

fn parse_verbosity(arg: &str) -> anyhow::Result<Verbosity> {
    match arg {
        "debug" => Ok(Verbosity::Debug),
        "normal" => Ok(Verbosity::Normal),
        "silent" => Ok(Verbosity::Silent),
        other => bail!("unknown verbosity '{}', expected debug, normal or silent", other),
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let len: usize = match args.first() {
        Some(arg) => arg.parse().context("len must be a number")?,
        None => 100_000,
    };
    let workers: usize = match args.get(1) {
        Some(arg) => arg.parse().context("workers must be a number")?,
        None => PoolConfig::default().worker_count,
    };
    let max_depth: usize = match args.get(2) {
        Some(arg) => arg.parse().context("max_depth must be a number")?,
        None => DEFAULT_MAX_DEPTH,
    };
    let verbosity = match args.get(3) {
        Some(arg) => parse_verbosity(arg)?,
        None => Verbosity::Normal,
    };
    logging::init(LogConfig::from(verbosity));

    let mut rng = rand::thread_rng();
    let original: Vec<i64> = (0..len).map(|_| rng.gen_range(-1_000_000..1_000_000)).collect();

    let pool = WorkerPool::new(PoolConfig::new(workers, 4 * workers))?;
    let sorter = Sorter::new().with_pool(&pool).with_max_depth(max_depth);

    let mut data = original.clone();
    let started = Instant::now();
    sorter.sort(&mut data);
    let parallel = started.elapsed();

    let mut expected = original;
    let started = Instant::now();
    expected.sort();
    let std_sort = started.elapsed();

    if data != expected {
        bail!("parallel sort disagrees with slice::sort");
    }

    let metrics = pool.metrics();
    logging::info!(
        len,
        workers,
        max_depth,
        offered = metrics.offered(),
        rejected = metrics.rejected,
        helped = metrics.executed_by_helpers,
        "sort verified"
    );
    println!("pmsort:     {:?}", parallel);
    println!("slice::sort {:?}", std_sort);

    let report = pool.shutdown();
    logging::info!(drained = report.drained, joined = report.workers_joined, "pool closed");
    Ok(())
}
