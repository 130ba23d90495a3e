//! End-to-end lifecycle tests: handles backed by an injected pool, the
//! eviction bound, timed reclamation through the real background sweep,
//! and sweep cancellation.
//!
//! Every test builds its own `Settings` and `AllocationPool`, so nothing
//! here races against the process-wide instances.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use offheap::{AllocationPool, Settings, UnmanagedObject};

fn pool_with(configure: impl FnOnce(&Settings)) -> Arc<AllocationPool> {
    let settings = Arc::new(Settings::new());
    settings.set_pooling_enabled(true);
    configure(&settings);
    Arc::new(AllocationPool::new(settings))
}

/// Poll `condition` for up to five seconds before declaring failure.
fn wait_for(condition: impl Fn() -> bool, what: &str) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("timed out waiting for {what}");
}

#[test]
fn eviction_bound_with_four_handles_and_a_limit_of_three() {
    let pool = pool_with(|s| s.set_max_allocations(3));

    let mut handles: Vec<UnmanagedObject<u64>> = (0..4)
        .map(|i| UnmanagedObject::with_value_in(&pool, i).unwrap())
        .collect();
    assert_eq!(pool.tracked_count(), 4);

    for handle in &mut handles {
        handle.dispose();
    }

    // The first dispose tripped the eviction pass and physically freed its
    // block; the other three were deposited for reuse.
    assert_eq!(pool.tracked_count(), 3);
    assert_eq!(pool.reusable_count(), 3);
}

#[test]
fn disposed_blocks_are_reused_not_reallocated() {
    let pool = pool_with(|_| {});

    let addr = {
        let handle = UnmanagedObject::<u64>::with_value_in(&pool, 41).unwrap();
        handle.as_raw().unwrap().as_ptr() as usize
        // dropped here: deposited
    };

    let next = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    assert_eq!(next.as_raw().unwrap().as_ptr() as usize, addr);
    assert_eq!(next.value().unwrap(), 0);
    assert_eq!(pool.tracked_count(), 1);
}

#[test]
fn background_sweep_reclaims_expired_blocks() {
    let pool = pool_with(|s| {
        s.set_max_allocation_lifetime(Duration::from_millis(20));
        s.set_expired_check_interval(Duration::from_millis(10));
    });

    // Allocate and deposit; the deposit stamps a 20ms horizon.
    let mut handle = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    handle.dispose();
    assert_eq!(pool.tracked_count(), 1);
    assert!(pool.sweeper_running());

    wait_for(|| pool.tracked_count() == 0, "the sweep to free the block");
    assert_eq!(pool.reusable_count(), 0);
}

#[test]
fn manual_sweep_is_deterministic() {
    let pool = pool_with(|s| {
        s.set_max_allocation_lifetime(Duration::from_secs(0));
        // Keep the background sweep out of the way.
        s.set_expired_check_interval(Duration::from_secs(3600));
    });

    let mut handle = UnmanagedObject::<u32>::new_in(&pool).unwrap();
    handle.dispose();

    assert_eq!(pool.sweep_expired(), 1);
    assert_eq!(pool.tracked_count(), 0);
}

#[test]
fn disabling_pooling_stops_the_sweep_within_a_tick() {
    let settings = Arc::new(Settings::new());
    settings.set_pooling_enabled(true);
    settings.set_expired_check_interval(Duration::from_millis(10));
    let pool = Arc::new(AllocationPool::new(Arc::clone(&settings)));

    let _handle = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    assert!(pool.sweeper_running());

    settings.set_pooling_enabled(false);
    wait_for(|| !pool.sweeper_running(), "the sweep loop to exit");

    // Re-enabling restarts it on the next allocation request.
    settings.set_pooling_enabled(true);
    let _second = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    assert!(pool.sweeper_running());
}

#[test]
fn stop_sweeper_is_deterministic_and_allocation_restarts_it() {
    let pool = pool_with(|s| s.set_expired_check_interval(Duration::from_millis(10)));

    let _first = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    assert!(pool.sweeper_running());

    pool.stop_sweeper();
    assert!(!pool.sweeper_running());

    let _second = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    assert!(pool.sweeper_running());
}

#[test]
fn clean_all_invalidates_the_pool_but_disposal_stays_safe() {
    let pool = pool_with(|_| {});

    let mut a = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    let mut b = UnmanagedObject::<u64>::new_in(&pool).unwrap();
    assert_eq!(pool.tracked_count(), 2);

    // Maintenance teardown: every tracked block is freed; `a` and `b` now
    // dangle and must not be read again.
    unsafe { pool.clean_all() };
    assert_eq!(pool.tracked_count(), 0);

    // Disposing the dangling handles is still safe: the pool ignores ids
    // it no longer tracks.
    a.dispose();
    b.dispose();
    assert_eq!(pool.tracked_count(), 0);
}

#[test]
fn concurrent_allocate_and_release_keep_the_pool_consistent() {
    let pool = pool_with(|s| s.set_max_allocations(8));

    let workers: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for round in 0..200u64 {
                    let mut handle = UnmanagedObject::with_value_in(&pool, round).unwrap();
                    assert_eq!(handle.value().unwrap(), round);
                    handle.dispose();
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    // Eviction passes may have run, but the pool can never exceed its
    // threshold by more than the in-flight handles of a single round.
    assert!(pool.tracked_count() <= 8 + 4);
    assert_eq!(pool.reusable_count(), pool.tracked_count());
}
