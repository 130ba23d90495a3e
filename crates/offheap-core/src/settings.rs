//! Process-wide allocator knobs.
//!
//! Every field is runtime-mutable and re-read at each allocator decision
//! point, so flipping [`Settings::set_pooling_enabled`] takes effect on the
//! next allocation and the background sweep observes it within one tick.
//! Storage is plain atomics — readers never block writers.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// Knobs read by the allocation pool and the scalar handles.
///
/// The process-wide instance lives behind [`Settings::global`]. Pools under
/// test construct their own instance instead, so tests never race on shared
/// configuration.
#[derive(Debug)]
pub struct Settings {
    pooling_enabled: AtomicBool,
    max_allocations: AtomicUsize,
    max_allocation_lifetime_ms: AtomicU64,
    expired_check_interval_ms: AtomicU64,
}

impl Settings {
    /// Default eviction threshold: pool size above this triggers an
    /// eviction pass on release.
    pub const DEFAULT_MAX_ALLOCATIONS: usize = 16;

    /// Default per-block expiry horizon: 2 minutes.
    pub const DEFAULT_MAX_ALLOCATION_LIFETIME: Duration = Duration::from_secs(120);

    /// Default sweep tick period: 5 seconds.
    pub const DEFAULT_EXPIRED_CHECK_INTERVAL: Duration = Duration::from_secs(5);

    /// Create a settings instance with all defaults (pooling disabled).
    pub fn new() -> Self {
        Self {
            pooling_enabled: AtomicBool::new(false),
            max_allocations: AtomicUsize::new(Self::DEFAULT_MAX_ALLOCATIONS),
            max_allocation_lifetime_ms: AtomicU64::new(
                Self::DEFAULT_MAX_ALLOCATION_LIFETIME.as_millis() as u64,
            ),
            expired_check_interval_ms: AtomicU64::new(
                Self::DEFAULT_EXPIRED_CHECK_INTERVAL.as_millis() as u64,
            ),
        }
    }

    /// The process-wide settings instance, created on first use.
    pub fn global() -> &'static Arc<Settings> {
        static GLOBAL: OnceLock<Arc<Settings>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(Settings::new()))
    }

    /// Whether scalar handles route allocation and disposal through the
    /// allocation pool. Default: `false`.
    pub fn pooling_enabled(&self) -> bool {
        self.pooling_enabled.load(Ordering::Acquire)
    }

    /// Enable or disable pooling.
    ///
    /// Disabling does not cancel in-flight allocations; it only stops
    /// future pooled allocations and lets the sweep loop exit at its
    /// next tick.
    pub fn set_pooling_enabled(&self, enabled: bool) {
        self.pooling_enabled.store(enabled, Ordering::Release);
    }

    /// Eviction threshold for the pool. Default: 16.
    pub fn max_allocations(&self) -> usize {
        self.max_allocations.load(Ordering::Acquire)
    }

    /// Set the eviction threshold.
    pub fn set_max_allocations(&self, max: usize) {
        self.max_allocations.store(max, Ordering::Release);
    }

    /// Per-block expiry horizon, stamped at allocation and refreshed on
    /// each deposit back into the pool. Default: 2 minutes.
    pub fn max_allocation_lifetime(&self) -> Duration {
        Duration::from_millis(self.max_allocation_lifetime_ms.load(Ordering::Acquire))
    }

    /// Set the per-block expiry horizon (millisecond granularity).
    pub fn set_max_allocation_lifetime(&self, lifetime: Duration) {
        self.max_allocation_lifetime_ms
            .store(lifetime.as_millis() as u64, Ordering::Release);
    }

    /// Sweep loop tick period. Default: 5 seconds.
    pub fn expired_check_interval(&self) -> Duration {
        Duration::from_millis(self.expired_check_interval_ms.load(Ordering::Acquire))
    }

    /// Set the sweep tick period (millisecond granularity).
    pub fn set_expired_check_interval(&self, interval: Duration) {
        self.expired_check_interval_ms
            .store(interval.as_millis() as u64, Ordering::Release);
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new()
    }
}
