// Integration tests for pmsort_pool::scope

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use pmsort_pool::{SubmitError, WorkerPool};

#[test]
fn test_scope_borrows_stack_data() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    let mut data = vec![9, 8, 7, 6, 5, 4];
    let (left, right) = data.split_at_mut(3);

    pool.scope(|s| {
        let a = s.spawn(|| {
            left.sort();
            left.len()
        });
        let b = s.spawn(|| {
            right.sort();
            right.len()
        });
        assert_eq!(a.join().unwrap() + b.join().unwrap(), 6);
    });

    assert_eq!(data, vec![7, 8, 9, 4, 5, 6]);
}

#[test]
fn test_refused_fork_runs_inline() {
    let pool = WorkerPool::with_capacity(1, 1).unwrap();
    let gate = Arc::new(Barrier::new(2));
    let counter = AtomicUsize::new(0);

    pool.scope(|s| {
        let held = {
            let gate = gate.clone();
            s.spawn(move || {
                gate.wait();
            })
        };
        assert!(held.is_queued());

        let caller = std::thread::current().id();
        let inline = s.spawn(|| {
            counter.fetch_add(1, Ordering::SeqCst);
            std::thread::current().id()
        });
        assert!(!inline.is_queued());
        assert_eq!(inline.rejection(), Some(&SubmitError::QueueFull { capacity: 1 }));
        // Refused closures have not run yet.
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        assert_eq!(inline.join().unwrap(), caller);
        gate.wait();
        held.join().unwrap();
    });

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    let metrics = pool.metrics();
    assert_eq!(metrics.submitted, 1);
    assert_eq!(metrics.rejected, 1);
}

#[test]
fn test_unjoined_forks_finish_before_scope_returns() {
    let pool = WorkerPool::with_capacity(2, 16).unwrap();
    let counter = AtomicUsize::new(0);

    pool.scope(|s| {
        for _ in 0..10 {
            s.spawn(|| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
    });

    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_nested_scopes_on_one_worker() {
    let pool = WorkerPool::with_capacity(1, 4).unwrap();

    fn depth_sum(pool: &WorkerPool, depth: u32) -> u32 {
        if depth == 0 {
            return 1;
        }
        pool.scope(|s| {
            let a = s.spawn(|| depth_sum(pool, depth - 1));
            let b = s.spawn(|| depth_sum(pool, depth - 1));
            a.join().unwrap() + b.join().unwrap()
        })
    }

    assert_eq!(depth_sum(&pool, 6), 64);
}

#[test]
fn test_join_returns_panic_payload() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    let err = pool.scope(|s| {
        let fork = s.spawn(|| -> u8 { panic!("fork failed") });
        fork.join().unwrap_err()
    });
    assert_eq!(err.downcast_ref::<&str>(), Some(&"fork failed"));
}

#[test]
fn test_unjoined_panic_fails_the_scope() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pool.scope(|s| {
            s.spawn(|| panic!("nobody joins me"));
        })
    }));
    assert!(result.is_err());

    // The pool is still usable afterwards.
    let value = pool.scope(|s| s.spawn(|| 3).join().unwrap());
    assert_eq!(value, 3);
}

#[test]
fn test_install_runs_root_unit() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    let mut total = 0;
    let doubled = pool.install(|| {
        total = (1..=10).sum::<i32>();
        total * 2
    });
    assert_eq!(total, 55);
    assert_eq!(doubled, 110);
    assert_eq!(pool.metrics().submitted, 1);
}

#[test]
fn test_install_after_shutdown_runs_inline() {
    let pool = WorkerPool::with_capacity(2, 4).unwrap();
    pool.shutdown();
    assert_eq!(pool.install(|| "still works"), "still works");
    assert_eq!(pool.metrics().rejected, 1);
}
