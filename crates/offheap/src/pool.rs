//! Process-wide pooling allocator.
//!
//! The pool amortizes allocation cost for [`UnmanagedObject`] by recycling
//! freed blocks of the exact same byte size instead of returning them to
//! the OS immediately. Growth is bounded two ways: an eviction pass prunes
//! the pool when it exceeds `max_allocations`, and a background sweep frees
//! blocks past their expiry horizon.
//!
//! The free stack and the per-block state map are the only shared mutable
//! state in the crate. Both live behind a single mutex, so reuse lookup,
//! eviction rebuild, deposit, and sweep are mutually exclusive — a block
//! can never be matched for reuse while another thread is mid-rebuild.
//!
//! [`UnmanagedObject`]: crate::object::UnmanagedObject

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Instant;

use indexmap::IndexMap;

use offheap_core::{BlockId, BlockState, MemoryError, RawBlock, Settings};

use crate::alloc;
use crate::sweep::Sweeper;

/// Registry of allocated blocks with same-size recycling and timed
/// reclamation.
///
/// Most callers use the process-wide instance from
/// [`AllocationPool::global`], reached implicitly by
/// [`UnmanagedObject::new`] when [`Settings::pooling_enabled`] is set.
/// Tests and embedded uses construct their own pool with their own
/// [`Settings`] and inject it via [`UnmanagedObject::new_in`].
///
/// # Lifetime hazards
///
/// The pool tracks every block it ever handed out, including blocks
/// currently backing live handles. The expiry sweep and
/// [`AllocationPool::clean_all`] free tracked blocks unconditionally, so a
/// pooled handle held past `max_allocation_lifetime` is left dangling.
/// That is the pool's maintenance contract, not an accident.
///
/// [`UnmanagedObject::new`]: crate::object::UnmanagedObject::new
/// [`UnmanagedObject::new_in`]: crate::object::UnmanagedObject::new_in
#[derive(Debug)]
pub struct AllocationPool {
    settings: Arc<Settings>,
    state: Mutex<PoolState>,
    sweeper: Mutex<Option<Sweeper>>,
}

#[derive(Debug)]
struct PoolState {
    /// Tracked blocks in stack order (newest at the tail).
    blocks: Vec<RawBlock>,
    /// Per-block lifecycle state, updated under the same lock as `blocks`.
    states: IndexMap<BlockId, BlockState>,
}

impl AllocationPool {
    /// Create a pool driven by the given settings.
    pub fn new(settings: Arc<Settings>) -> Self {
        Self {
            settings,
            state: Mutex::new(PoolState {
                blocks: Vec::new(),
                states: IndexMap::new(),
            }),
            sweeper: Mutex::new(None),
        }
    }

    /// The process-wide pool, created on first use and driven by
    /// [`Settings::global`].
    pub fn global() -> &'static Arc<AllocationPool> {
        static GLOBAL: OnceLock<Arc<AllocationPool>> = OnceLock::new();
        GLOBAL.get_or_init(|| Arc::new(AllocationPool::new(Arc::clone(Settings::global()))))
    }

    /// The settings driving this pool.
    pub fn settings(&self) -> &Arc<Settings> {
        &self.settings
    }

    /// Allocate a zero-filled block of exactly `size` bytes.
    ///
    /// Reuses the most recently tracked reusable block of the same size if
    /// one exists; otherwise allocates fresh from the OS, stamps its expiry
    /// at `now + max_allocation_lifetime`, and starts tracking it. Lazily
    /// (re)starts the background sweep when pooling is enabled.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AllocationFailed`] if the OS allocator cannot satisfy
    /// the request. Not retried.
    pub fn allocate(self: &Arc<Self>, size: usize) -> Result<BlockId, MemoryError> {
        debug_assert!(size > 0, "zero-sized blocks are never pooled");
        if self.settings.pooling_enabled() {
            self.ensure_sweeper();
        }

        let mut state = self.lock_state();
        let PoolState { blocks, states } = &mut *state;

        // Reuse path: newest deposited block of the exact size.
        if let Some(pos) = blocks
            .iter()
            .rposition(|b| b.size == size && states.get(&b.id) == Some(&BlockState::Reusable))
        {
            let id = blocks[pos].id;
            states.insert(id, BlockState::InUse);
            // The recycled bytes are stale; hand them out zeroed.
            // SAFETY: the block is tracked, so its allocation of `size`
            // bytes is live, and no handle aliases it while it is Reusable.
            unsafe { alloc::zero(id.as_mut_ptr(), size) };
            return Ok(id);
        }

        let ptr = alloc::alloc_zeroed(size, alloc::BLOCK_ALIGN)?;
        let id = BlockId::from_ptr(ptr.as_ptr());
        let expires_at = Instant::now() + self.settings.max_allocation_lifetime();
        blocks.push(RawBlock::new(id, size, expires_at));
        states.insert(id, BlockState::InUse);
        Ok(id)
    }

    /// Give a block back to the pool.
    ///
    /// Returns `true` when the block was physically freed and `false` when
    /// it was retained for reuse (its bytes stay valid for a future
    /// same-size [`AllocationPool::allocate`]).
    ///
    /// When the tracked count exceeds `max_allocations` this performs an
    /// eviction pass: the released block is freed unconditionally, every
    /// reusable or expired entry is pruned (and freed), and the survivors
    /// are rebuilt in expiry order with the soonest-expiring block on top
    /// of the stack.
    ///
    /// Ids the pool does not recognize (already evicted, or the pool was
    /// torn down with [`AllocationPool::clean_all`]) are a no-op returning
    /// `true`.
    pub fn release(&self, id: BlockId) -> bool {
        let mut state = self.lock_state();
        let PoolState { blocks, states } = &mut *state;

        if !states.contains_key(&id) {
            return true;
        }

        if blocks.len() > self.settings.max_allocations() {
            let now = Instant::now();
            let mut kept = Vec::with_capacity(blocks.len());
            for block in blocks.drain(..) {
                let reusable = states.get(&block.id) == Some(&BlockState::Reusable);
                if block.id == id || reusable || block.is_expired(now) {
                    states.swap_remove(&block.id);
                    // SAFETY: the block was tracked, so its allocation is
                    // live and sized `block.size`; it is removed from the
                    // registry before the lock is released.
                    unsafe { alloc::free(block.id.as_mut_ptr(), block.size, alloc::BLOCK_ALIGN) };
                } else {
                    kept.push(block);
                }
            }
            // Latest-expiring survivors at the bottom, soonest on top.
            kept.sort_by(|a, b| b.expires_at.cmp(&a.expires_at));
            *blocks = kept;
            true
        } else {
            states.insert(id, BlockState::Reusable);
            // Deposit refreshes the expiry horizon.
            let expires_at = Instant::now() + self.settings.max_allocation_lifetime();
            if let Some(block) = blocks.iter_mut().find(|b| b.id == id) {
                block.expires_at = expires_at;
            }
            false
        }
    }

    /// Free every tracked block whose expiry horizon has passed.
    ///
    /// Returns the number of blocks freed. Normally driven by the
    /// background sweep; exposed for deterministic testing and manual
    /// maintenance.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut state = self.lock_state();
        let PoolState { blocks, states } = &mut *state;
        let mut freed = 0;
        blocks.retain(|block| {
            if block.is_expired(now) {
                states.swap_remove(&block.id);
                // SAFETY: as in `release` — tracked block, removed from the
                // registry under the lock before the bytes are freed.
                unsafe { alloc::free(block.id.as_mut_ptr(), block.size, alloc::BLOCK_ALIGN) };
                freed += 1;
                false
            } else {
                true
            }
        });
        freed
    }

    /// Free every tracked block unconditionally and empty the pool.
    ///
    /// Maintenance operation, not part of the normal lifecycle.
    ///
    /// # Safety
    ///
    /// Every pool-backed handle still alive after this call dangles: any
    /// later access through such a handle (including a read before its own
    /// `dispose`) is undefined behavior. The caller must guarantee that no
    /// outstanding handle touches its memory again; disposing them remains
    /// safe, since the pool ignores unknown ids.
    pub unsafe fn clean_all(&self) {
        let mut state = self.lock_state();
        let PoolState { blocks, states } = &mut *state;
        for block in blocks.drain(..) {
            // SAFETY: tracked blocks are live allocations of `block.size`
            // bytes; the caller upholds the no-further-access contract.
            unsafe { alloc::free(block.id.as_mut_ptr(), block.size, alloc::BLOCK_ALIGN) };
        }
        states.clear();
    }

    /// Number of blocks currently tracked (in use or reusable).
    pub fn tracked_count(&self) -> usize {
        self.lock_state().blocks.len()
    }

    /// Number of tracked blocks deposited and awaiting reuse.
    pub fn reusable_count(&self) -> usize {
        self.lock_state()
            .states
            .values()
            .filter(|&&s| s == BlockState::Reusable)
            .count()
    }

    /// Whether the background sweep thread is currently alive.
    pub fn sweeper_running(&self) -> bool {
        self.lock_sweeper().as_ref().is_some_and(Sweeper::is_running)
    }

    /// Stop the background sweep deterministically: signal it and join.
    ///
    /// A later [`AllocationPool::allocate`] restarts it if pooling is still
    /// enabled.
    pub fn stop_sweeper(&self) {
        // Dropping the Sweeper signals the stop channel and joins.
        drop(self.lock_sweeper().take());
    }

    /// Start the sweeper if it is not alive, replacing one that exited on
    /// its own after pooling was disabled.
    fn ensure_sweeper(self: &Arc<Self>) {
        let mut slot = self.lock_sweeper();
        if !slot.as_ref().is_some_and(Sweeper::is_running) {
            *slot = Some(Sweeper::spawn(
                Arc::downgrade(self),
                Arc::clone(&self.settings),
            ));
        }
    }

    // No operation panics while holding either lock, so poisoning can only
    // be observed, never caused, here; recover the guard.
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_sweeper(&self) -> MutexGuard<'_, Option<Sweeper>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for AllocationPool {
    fn drop(&mut self) {
        self.stop_sweeper();
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for block in state.blocks.drain(..) {
            // SAFETY: the pool is dropping, so no handle holds an Arc to it
            // and no pooled handle can touch these blocks again.
            unsafe { alloc::free(block.id.as_mut_ptr(), block.size, alloc::BLOCK_ALIGN) };
        }
        state.states.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pooled_settings() -> Arc<Settings> {
        let settings = Arc::new(Settings::new());
        settings.set_pooling_enabled(true);
        settings
    }

    #[test]
    fn fresh_allocation_is_tracked_in_use() {
        let pool = Arc::new(AllocationPool::new(pooled_settings()));
        let id = pool.allocate(32).unwrap();
        assert_eq!(pool.tracked_count(), 1);
        assert_eq!(pool.reusable_count(), 0);
        assert!(!pool.release(id));
        assert_eq!(pool.reusable_count(), 1);
    }

    #[test]
    fn same_size_release_then_allocate_reuses_the_block() {
        let pool = Arc::new(AllocationPool::new(pooled_settings()));
        let first = pool.allocate(64).unwrap();
        assert!(!pool.release(first));

        let second = pool.allocate(64).unwrap();
        assert_eq!(first, second);
        assert_eq!(pool.tracked_count(), 1);
        assert_eq!(pool.reusable_count(), 0);
    }

    #[test]
    fn reused_block_is_zero_filled() {
        let pool = Arc::new(AllocationPool::new(pooled_settings()));
        let id = pool.allocate(16).unwrap();
        unsafe { id.as_mut_ptr().write_bytes(0xCD, 16) };
        pool.release(id);

        let reused = pool.allocate(16).unwrap();
        let bytes = unsafe { std::slice::from_raw_parts(reused.as_mut_ptr(), 16) };
        assert!(bytes.iter().all(|&b| b == 0));
    }

    #[test]
    fn different_size_is_never_recycled() {
        let pool = Arc::new(AllocationPool::new(pooled_settings()));
        let small = pool.allocate(16).unwrap();
        pool.release(small);

        let large = pool.allocate(32).unwrap();
        assert_ne!(small, large);
        assert_eq!(pool.tracked_count(), 2);
    }

    #[test]
    fn release_over_threshold_runs_an_eviction_pass() {
        let settings = pooled_settings();
        settings.set_max_allocations(3);
        let pool = Arc::new(AllocationPool::new(settings));

        let ids: Vec<_> = (0..4).map(|_| pool.allocate(8).unwrap()).collect();
        assert_eq!(pool.tracked_count(), 4);

        // 4 tracked > 3: the first release evicts the released block and
        // keeps the three in-use survivors.
        assert!(pool.release(ids[0]));
        assert_eq!(pool.tracked_count(), 3);

        // Remaining releases stay under the threshold and deposit.
        for &id in &ids[1..] {
            assert!(!pool.release(id));
        }
        assert_eq!(pool.tracked_count(), 3);
        assert_eq!(pool.reusable_count(), 3);
    }

    #[test]
    fn eviction_pass_prunes_deposited_blocks() {
        let settings = pooled_settings();
        settings.set_max_allocations(2);
        let pool = Arc::new(AllocationPool::new(settings));

        let a = pool.allocate(8).unwrap();
        assert!(!pool.release(a)); // deposited, tracked = 1
        let b = pool.allocate(16).unwrap();
        let c = pool.allocate(16).unwrap();
        assert_eq!(pool.tracked_count(), 3);

        // 3 > 2: frees b and prunes the deposited a; only c survives.
        assert!(pool.release(b));
        assert_eq!(pool.tracked_count(), 1);
        assert_eq!(pool.reusable_count(), 0);

        // The pruned deposit is gone — a same-size allocate is fresh.
        let d = pool.allocate(8).unwrap();
        assert_eq!(pool.tracked_count(), 2);
        let _ = (c, d);
    }

    #[test]
    fn unknown_id_release_is_a_noop() {
        let pool = Arc::new(AllocationPool::new(pooled_settings()));
        let stale = BlockId::from_ptr(0xDEAD_0usize as *mut u8);
        assert!(pool.release(stale));
        assert_eq!(pool.tracked_count(), 0);
    }

    #[test]
    fn sweep_frees_expired_blocks_only() {
        let settings = pooled_settings();
        settings.set_max_allocation_lifetime(Duration::from_secs(0));
        let pool = Arc::new(AllocationPool::new(Arc::clone(&settings)));

        let _expired = pool.allocate(8).unwrap();
        settings.set_max_allocation_lifetime(Duration::from_secs(300));
        let _fresh = pool.allocate(8).unwrap();

        assert_eq!(pool.sweep_expired(), 1);
        assert_eq!(pool.tracked_count(), 1);
    }

    #[test]
    fn deposit_refreshes_the_expiry_horizon() {
        let settings = pooled_settings();
        settings.set_max_allocation_lifetime(Duration::from_secs(0));
        let pool = Arc::new(AllocationPool::new(Arc::clone(&settings)));

        let id = pool.allocate(8).unwrap();
        // Expired as allocated; the deposit re-stamps it far in the future.
        settings.set_max_allocation_lifetime(Duration::from_secs(300));
        pool.release(id);

        assert_eq!(pool.sweep_expired(), 0);
        assert_eq!(pool.tracked_count(), 1);
    }

    #[test]
    fn clean_all_empties_the_pool_and_later_disposal_is_safe() {
        let pool = Arc::new(AllocationPool::new(pooled_settings()));
        let a = pool.allocate(8).unwrap();
        let b = pool.allocate(8).unwrap();
        unsafe { pool.clean_all() };
        assert_eq!(pool.tracked_count(), 0);

        // Handles disposed after the teardown hit the unknown-id path.
        assert!(pool.release(a));
        assert!(pool.release(b));
    }
}
