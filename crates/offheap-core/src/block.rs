//! Block identities and bookkeeping records.
//!
//! A [`RawBlock`] is the atomic unit the pool tracks: an opaque address, a
//! byte length, and an expiry horizon. The address is the block's only
//! identity — two blocks are the same iff their [`BlockId`]s match.

use std::fmt;
use std::time::Instant;

/// Opaque identity of an allocated block.
///
/// Wraps the block's base address. Comparing ids is the only way to decide
/// whether two records refer to the same block; the pool never inspects the
/// address beyond converting it back to a pointer when freeing or zeroing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct BlockId(usize);

impl BlockId {
    /// Create an id from a block's base pointer.
    pub fn from_ptr(ptr: *mut u8) -> Self {
        Self(ptr as usize)
    }

    /// The base address as a raw pointer.
    ///
    /// Validity is the caller's concern: the id may outlive the block it
    /// once named (the pool trusts its caller's block ids).
    pub fn as_mut_ptr(self) -> *mut u8 {
        self.0 as *mut u8
    }

    /// The base address as an integer.
    pub fn addr(self) -> usize {
        self.0
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:x}", self.0)
    }
}

/// Bookkeeping record for one tracked block.
///
/// Created when the block is allocated, its `expires_at` is refreshed on
/// each deposit back into the pool, and the record is removed when the
/// block is physically freed.
#[derive(Clone, Copy, Debug)]
pub struct RawBlock {
    /// The block's identity (base address).
    pub id: BlockId,
    /// Byte length of the allocation. Recycling matches on this exactly.
    pub size: usize,
    /// Point in time after which the sweep may free this block.
    pub expires_at: Instant,
}

impl RawBlock {
    /// Create a record for a freshly allocated block.
    pub fn new(id: BlockId, size: usize, expires_at: Instant) -> Self {
        Self {
            id,
            size,
            expires_at,
        }
    }

    /// Whether the block's expiry horizon has passed at `now`.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

impl PartialEq for RawBlock {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for RawBlock {}

/// Lifecycle state of a tracked block, keyed by [`BlockId`] in the pool.
///
/// The state map and the free stack are updated under one lock, so a block
/// can never be matched for reuse while an eviction pass is rebuilding the
/// stack on another thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockState {
    /// Allocated and backing a live handle (or just handed out).
    InUse,
    /// Deposited by a disposed handle; eligible for same-size reuse.
    Reusable,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn id_round_trips_through_pointer() {
        let addr = 0x1000usize;
        let id = BlockId::from_ptr(addr as *mut u8);
        assert_eq!(id.addr(), addr);
        assert_eq!(id.as_mut_ptr() as usize, addr);
    }

    #[test]
    fn block_identity_is_the_id_only() {
        let now = Instant::now();
        let a = RawBlock::new(BlockId::from_ptr(0x10 as *mut u8), 8, now);
        let b = RawBlock::new(BlockId::from_ptr(0x10 as *mut u8), 64, now);
        let c = RawBlock::new(BlockId::from_ptr(0x20 as *mut u8), 8, now);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn expiry_is_inclusive_at_the_horizon() {
        let now = Instant::now();
        let block = RawBlock::new(BlockId::from_ptr(0x10 as *mut u8), 8, now);
        assert!(block.is_expired(now));
        assert!(!block.is_expired(now - Duration::from_millis(1)));
        assert!(block.is_expired(now + Duration::from_millis(1)));
    }
}
