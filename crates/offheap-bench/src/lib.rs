//! Benchmark fixtures for the offheap manual memory layer.
//!
//! Provides the value types and pre-configured pools the criterion
//! benchmarks exercise: a pooled setup mirroring the recommended
//! high-throughput configuration, and a `Person`-style fixture struct
//! matching the layout the handle layer is designed around.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::Arc;
use std::time::Duration;

use offheap::AllocationPool;
use offheap_core::Settings;

/// A small fixed-layout record, the canonical handle payload.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Person {
    /// Stable identity, used to observe sort behavior.
    pub id: u64,
    /// Sort key for the projection benchmarks.
    pub age: u8,
}

/// Build `n` people with descending ages so sorts do real work.
pub fn make_people(n: usize) -> Vec<Person> {
    (0..n)
        .map(|i| Person {
            id: i as u64,
            age: (n - i) as u8,
        })
        .collect()
}

/// A pool tuned for allocation-heavy benchmarks: pooling on, a deep
/// eviction threshold, and the sweep effectively parked.
pub fn bench_pool() -> Arc<AllocationPool> {
    let settings = Arc::new(Settings::new());
    settings.set_pooling_enabled(true);
    settings.set_max_allocations(1024);
    settings.set_expired_check_interval(Duration::from_secs(3600));
    Arc::new(AllocationPool::new(settings))
}
