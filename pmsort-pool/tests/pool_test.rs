// Integration tests for pmsort_pool::pool

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

use pmsort_pool::{
    logging, AwaitError, PoolConfig, PoolError, PoolStatus, SubmitError, Unit, UnitStatus, WorkerPool,
    WorkerStatus,
};

#[test]
fn test_submit_and_await() {
    logging::init_test();
    let pool = WorkerPool::with_capacity(2, 8).unwrap();
    let units: Vec<_> = (0..8).map(|i| Unit::new(move || i * i)).collect();
    for unit in &units {
        pool.submit(unit).unwrap();
    }
    let results: Vec<_> = units.iter().map(|u| pool.await_completion(u).unwrap()).collect();
    assert_eq!(results, vec![0, 1, 4, 9, 16, 25, 36, 49]);
}

#[test]
fn test_units_execute_exactly_once() {
    let pool = WorkerPool::with_capacity(4, 16).unwrap();
    let runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..50 {
        let units: Vec<_> = (0..16)
            .map(|_| {
                let runs = runs.clone();
                Unit::new(move || {
                    runs.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        for unit in &units {
            pool.submit(unit).unwrap();
        }
        for unit in &units {
            pool.await_completion(unit).unwrap();
            assert_eq!(unit.status(), UnitStatus::Done);
        }
    }

    assert_eq!(runs.load(Ordering::SeqCst), 50 * 16);
    assert_eq!(pool.metrics().executed(), 50 * 16);
}

#[test]
fn test_await_does_not_return_early() {
    let pool = WorkerPool::with_capacity(1, 2).unwrap();
    let finished = Arc::new(AtomicUsize::new(0));
    let unit = {
        let finished = finished.clone();
        Unit::new(move || {
            thread::sleep(Duration::from_millis(100));
            finished.store(1, Ordering::SeqCst);
            "slow"
        })
    };

    pool.submit(&unit).unwrap();
    assert_eq!(pool.await_completion(&unit).unwrap(), "slow");
    assert_eq!(finished.load(Ordering::SeqCst), 1);
}

#[test]
fn test_queue_full_is_reported() {
    let pool = WorkerPool::with_capacity(1, 1).unwrap();
    let gate = Arc::new(Barrier::new(2));

    let blocker = {
        let gate = gate.clone();
        Unit::new(move || {
            gate.wait();
        })
    };
    pool.submit(&blocker).unwrap();

    let refused = Unit::new(|| ());
    assert_eq!(pool.submit(&refused), Err(SubmitError::QueueFull { capacity: 1 }));
    assert_eq!(refused.status(), UnitStatus::Idle);
    assert_eq!(pool.await_completion(&refused), Err(AwaitError::NotSubmitted));

    gate.wait();
    pool.await_completion(&blocker).unwrap();
    assert!(pool.submit(&refused).is_ok());
    pool.await_completion(&refused).unwrap();

    let metrics = pool.metrics();
    assert_eq!(metrics.rejected, 1);
    assert_eq!(metrics.submitted, 2);
    assert_eq!(metrics.peak_active, 1);
}

#[test]
fn test_malformed_unit() {
    let pool = WorkerPool::with_capacity(1, 4).unwrap();
    let unit = Unit::<u8>::empty();
    assert_eq!(pool.submit(&unit), Err(SubmitError::InvalidUnit));
    assert_eq!(pool.await_completion(&unit), Err(AwaitError::InvalidUnit));
}

#[test]
fn test_panic_is_reported_and_pool_survives() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    let bad = Unit::<u32>::new(|| panic!("unit exploded"));
    pool.submit(&bad).unwrap();
    assert_eq!(
        pool.await_completion(&bad),
        Err(AwaitError::Panicked("unit exploded".to_string()))
    );

    let good = Unit::new(|| 5u32);
    pool.submit(&good).unwrap();
    assert_eq!(pool.await_completion(&good), Ok(5));
}

#[test]
fn test_output_taken_once() {
    let pool = WorkerPool::with_capacity(1, 4).unwrap();
    let unit = Unit::new(|| String::from("once"));
    pool.submit(&unit).unwrap();
    assert_eq!(pool.await_completion(&unit).unwrap(), "once");
    assert_eq!(pool.await_completion(&unit), Err(AwaitError::OutputTaken));
}

#[test]
fn test_nested_await_on_single_worker() {
    // The only worker awaits units it submitted itself; it must run them
    // while waiting instead of deadlocking.
    let pool = Arc::new(WorkerPool::with_capacity(1, 8).unwrap());
    let outer = {
        let pool = pool.clone();
        Unit::new(move || {
            let inner: Vec<_> = (1..=4).map(|i| Unit::new(move || i * 10)).collect();
            for unit in &inner {
                pool.submit(unit).unwrap();
            }
            inner.iter().map(|u| pool.await_completion(u).unwrap()).sum::<i32>()
        })
    };

    pool.submit(&outer).unwrap();
    assert_eq!(pool.await_completion(&outer).unwrap(), 100);
    let metrics = pool.metrics();
    assert_eq!(metrics.executed(), 5);
    assert!(metrics.executed_by_helpers >= 1);
}

#[test]
fn test_shutdown_drains_queued_units() {
    let pool = WorkerPool::with_capacity(1, 8).unwrap();
    let gate = Arc::new(Barrier::new(2));
    let ran = Arc::new(Mutex::new(Vec::new()));

    let blocker = {
        let gate = gate.clone();
        Unit::new(move || {
            gate.wait();
        })
    };
    pool.submit(&blocker).unwrap();
    // Wait for the worker to pick up the blocker so the rest stay queued.
    while pool.metrics().queued != 0 {
        thread::yield_now();
    }

    let queued: Vec<_> = (0..3)
        .map(|i| {
            let ran = ran.clone();
            Unit::new(move || ran.lock().unwrap().push(i))
        })
        .collect();
    for unit in &queued {
        pool.submit(unit).unwrap();
    }

    let shutdown = {
        let gate = gate.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            gate.wait();
        })
    };
    let report = pool.shutdown();
    shutdown.join().unwrap();

    assert_eq!(report.drained, 3);
    assert_eq!(report.workers_joined, 1);
    // LIFO: the last submitted unit ran first.
    assert_eq!(*ran.lock().unwrap(), vec![2, 1, 0]);
    for unit in &queued {
        assert_eq!(unit.status(), UnitStatus::Done);
    }
    assert_eq!(pool.status(), PoolStatus::Shutdown);
    assert_eq!(pool.worker_statuses(), vec![WorkerStatus::Stopped]);
}

#[test]
fn test_submit_after_shutdown() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    pool.shutdown();
    let unit = Unit::new(|| 1);
    assert_eq!(pool.submit(&unit), Err(SubmitError::ShuttingDown));
    assert_eq!(pool.metrics().rejected, 1);
}

#[test]
fn test_shutdown_is_idempotent() {
    let pool = WorkerPool::with_capacity(3, 4).unwrap();
    let first = pool.shutdown();
    assert_eq!(first.workers_joined, 3);
    let second = pool.shutdown();
    assert_eq!(second.workers_joined, 0);
    assert_eq!(second.drained, 0);
}

#[test]
fn test_invalid_config() {
    assert!(matches!(WorkerPool::with_capacity(0, 4), Err(PoolError::Config(_))));
    assert!(matches!(WorkerPool::with_capacity(2, 0), Err(PoolError::Config(_))));
}

#[test]
fn test_worker_threads_are_named() {
    let config = PoolConfig::new(2, 4).with_thread_name_prefix("sorter");
    let pool = WorkerPool::new(config).unwrap();
    let names = Arc::new(Mutex::new(Vec::new()));

    let gate = Arc::new(Barrier::new(2));
    let units: Vec<_> = (0..2)
        .map(|_| {
            let names = names.clone();
            let gate = gate.clone();
            Unit::new(move || {
                names.lock().unwrap().push(thread::current().name().map(str::to_string));
                // Hold both workers so each unit lands on a different one.
                gate.wait();
            })
        })
        .collect();
    for unit in &units {
        pool.submit(unit).unwrap();
    }
    // Poll instead of awaiting so this thread never runs either unit.
    while pool.metrics().executed() < 2 {
        thread::yield_now();
    }

    let mut names: Vec<String> = names.lock().unwrap().iter().flatten().cloned().collect();
    names.sort();
    assert_eq!(names, vec!["sorter-0".to_string(), "sorter-1".to_string()]);
}

#[test]
fn test_metrics_snapshot() {
    let pool = WorkerPool::with_capacity(2, 6).unwrap();
    let metrics = pool.metrics();
    assert_eq!(metrics.worker_count, 2);
    assert_eq!(metrics.capacity, 6);
    assert_eq!(metrics.active, 0);
    assert_eq!(metrics.offered(), 0);
    assert_eq!(metrics.status, PoolStatus::Running);
    assert_eq!(pool.worker_count(), 2);
    assert_eq!(pool.capacity(), 6);
}
