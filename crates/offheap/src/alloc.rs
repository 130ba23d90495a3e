//! Thin wrappers over the global allocator.
//!
//! Everything the crate allocates or frees goes through these helpers, so
//! layout handling lives in exactly one place. Zero-sized requests never
//! reach this module — handles use dangling pointers for those.

use std::alloc::{self, Layout};
use std::ptr::NonNull;

use offheap_core::MemoryError;

/// Alignment of every pool-managed block.
///
/// The pool recycles blocks by byte size alone, so all pooled blocks share
/// one alignment large enough for the common fixed-layout types. Types
/// aligned stricter than this bypass the pool and allocate directly.
pub(crate) const BLOCK_ALIGN: usize = 16;

fn layout(bytes: usize, align: usize) -> Result<Layout, MemoryError> {
    Layout::from_size_align(bytes, align).map_err(|_| MemoryError::AllocationFailed { bytes })
}

/// Allocate `bytes` zero-filled bytes at the given alignment.
pub(crate) fn alloc_zeroed(bytes: usize, align: usize) -> Result<NonNull<u8>, MemoryError> {
    debug_assert!(bytes > 0);
    let layout = layout(bytes, align)?;
    // SAFETY: the layout has non-zero size.
    let ptr = unsafe { alloc::alloc_zeroed(layout) };
    NonNull::new(ptr).ok_or(MemoryError::AllocationFailed { bytes })
}

/// Reallocate a block in place if possible, preserving the first
/// `old_bytes` bytes. The tail beyond `old_bytes` is uninitialized; the
/// caller is responsible for writing it before any read.
///
/// # Safety
///
/// `ptr` must have been returned by [`alloc_zeroed`] (or a prior `grow`)
/// with exactly `old_bytes` and `align`, and must not be used afterwards.
pub(crate) unsafe fn grow(
    ptr: NonNull<u8>,
    old_bytes: usize,
    new_bytes: usize,
    align: usize,
) -> Result<NonNull<u8>, MemoryError> {
    debug_assert!(new_bytes > old_bytes);
    let old_layout = layout(old_bytes, align)?;
    // SAFETY: per this function's contract, `ptr` was allocated with
    // `old_layout`; `new_bytes` is non-zero because it exceeds `old_bytes`.
    let new_ptr = unsafe { alloc::realloc(ptr.as_ptr(), old_layout, new_bytes) };
    NonNull::new(new_ptr).ok_or(MemoryError::AllocationFailed { bytes: new_bytes })
}

/// Free a block.
///
/// # Safety
///
/// `ptr` must have been returned by [`alloc_zeroed`] or [`grow`] with
/// exactly `bytes` and `align`, and must not be used afterwards.
pub(crate) unsafe fn free(ptr: *mut u8, bytes: usize, align: usize) {
    debug_assert!(bytes > 0);
    if let Ok(layout) = Layout::from_size_align(bytes, align) {
        // SAFETY: per this function's contract.
        unsafe { alloc::dealloc(ptr, layout) };
    }
}

/// Zero-fill `bytes` bytes starting at `ptr`.
///
/// # Safety
///
/// `ptr` must be valid for writes of `bytes` bytes.
pub(crate) unsafe fn zero(ptr: *mut u8, bytes: usize) {
    // SAFETY: per this function's contract.
    unsafe { ptr.write_bytes(0, bytes) };
}
