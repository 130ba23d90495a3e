//! Single-value unmanaged handle.
//!
//! An [`UnmanagedObject<T>`] owns exactly one block sized for `T`, created
//! eagerly with `T::default()` and valid until `dispose()`. Every accessor
//! reports [`MemoryError::Disposed`] afterwards; disposing twice is a
//! legal no-op. The handle state machine is strictly
//! `Allocated → Disposed` with no way back.

use std::fmt;
use std::mem;
use std::ptr::NonNull;
use std::sync::Arc;

use offheap_core::{BlockId, MemoryError, Settings};

use crate::alloc;
use crate::pool::AllocationPool;

/// Who owns the memory behind a handle built from a raw pointer.
///
/// Made explicit and mandatory at construction: freeing foreign memory is
/// undefined behavior, so the handle must be told whether disposal may
/// free at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ownership {
    /// The handle owns the allocation and frees it on dispose.
    Owned,
    /// The memory belongs to someone else; dispose only marks the handle.
    Borrowed,
}

/// How a live handle's block is released on dispose.
#[derive(Debug)]
enum Backing {
    /// Freed directly through the global allocator.
    Direct,
    /// Given back to the pool it was allocated from.
    Pooled(Arc<AllocationPool>),
    /// Never freed (foreign memory, or a zero-sized `T`).
    Borrowed,
}

/// A single `T` stored in manually managed memory.
///
/// The handle exclusively owns its block until disposed; the API never
/// creates aliasing handles (raw pointers obtained via
/// [`UnmanagedObject::as_raw`] can alias — that is the caller's
/// responsibility). Dropping the handle disposes it, but `dispose()` is
/// the intended surface: the point of the type is an explicit lifetime.
pub struct UnmanagedObject<T: Copy + Default> {
    /// `None` iff the handle is disposed.
    ptr: Option<NonNull<T>>,
    backing: Backing,
}

// SAFETY: the handle is exclusively owned and provides no shared-access
// API; moving it between threads moves sole access to its block.
unsafe impl<T: Copy + Default + Send> Send for UnmanagedObject<T> {}

impl<T: Copy + Default> UnmanagedObject<T> {
    /// Allocate a handle holding `T::default()`.
    ///
    /// Routes through the process-wide [`AllocationPool`] when
    /// [`Settings::pooling_enabled`] is set (and `T` fits the pool's block
    /// alignment), otherwise allocates directly.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AllocationFailed`] on allocator exhaustion.
    pub fn new() -> Result<Self, MemoryError> {
        if Self::pool_compatible() && Settings::global().pooling_enabled() {
            Self::new_in(AllocationPool::global())
        } else {
            Self::new_direct()
        }
    }

    /// Allocate a handle holding `value`.
    pub fn with_value(value: T) -> Result<Self, MemoryError> {
        let mut handle = Self::new()?;
        handle.set_value(value)?;
        Ok(handle)
    }

    /// Allocate a handle holding `T::default()` from the given pool.
    ///
    /// Falls back to direct allocation when `T` cannot be pooled (zero
    /// size, or alignment stricter than the pool's block alignment).
    pub fn new_in(pool: &Arc<AllocationPool>) -> Result<Self, MemoryError> {
        if !Self::pool_compatible() {
            return Self::new_direct();
        }
        let id = pool.allocate(mem::size_of::<T>())?;
        let ptr = NonNull::new(id.as_mut_ptr().cast::<T>()).ok_or(MemoryError::NullPointer)?;
        // SAFETY: the pool handed out a live zeroed block of
        // `size_of::<T>()` bytes at the pool's block alignment, which
        // `pool_compatible` checked is enough for `T`.
        unsafe { ptr.as_ptr().write(T::default()) };
        Ok(Self {
            ptr: Some(ptr),
            backing: Backing::Pooled(Arc::clone(pool)),
        })
    }

    /// Allocate a handle holding `value` from the given pool.
    pub fn with_value_in(pool: &Arc<AllocationPool>, value: T) -> Result<Self, MemoryError> {
        let mut handle = Self::new_in(pool)?;
        handle.set_value(value)?;
        Ok(handle)
    }

    fn new_direct() -> Result<Self, MemoryError> {
        if mem::size_of::<T>() == 0 {
            // Nothing to allocate or free for a zero-sized type.
            return Ok(Self {
                ptr: Some(NonNull::dangling()),
                backing: Backing::Borrowed,
            });
        }
        let raw = alloc::alloc_zeroed(mem::size_of::<T>(), mem::align_of::<T>())?;
        let ptr = raw.cast::<T>();
        // SAFETY: freshly allocated, properly sized and aligned for `T`.
        unsafe { ptr.as_ptr().write(T::default()) };
        Ok(Self {
            ptr: Some(ptr),
            backing: Backing::Direct,
        })
    }

    /// Wrap an externally allocated `T` without allocating.
    ///
    /// Ownership is explicit: [`Ownership::Borrowed`] handles never free
    /// the memory (dispose only marks the handle), while
    /// [`Ownership::Owned`] handles free it directly on dispose.
    ///
    /// # Safety
    ///
    /// `ptr` must point to a live, properly aligned `T` that no other
    /// handle owns. For [`Ownership::Owned`] the memory must have been
    /// allocated by the global allocator with `Layout::new::<T>()`, and
    /// nothing else may free it.
    pub unsafe fn from_raw(ptr: NonNull<T>, ownership: Ownership) -> Self {
        let backing = match ownership {
            Ownership::Owned if mem::size_of::<T>() > 0 => Backing::Direct,
            _ => Backing::Borrowed,
        };
        Self {
            ptr: Some(ptr),
            backing,
        }
    }

    /// Copy the current value out of the block.
    ///
    /// # Errors
    ///
    /// [`MemoryError::Disposed`] after `dispose()`.
    pub fn value(&self) -> Result<T, MemoryError> {
        let ptr = self.live_ptr()?;
        // SAFETY: a non-disposed handle owns a valid, initialized `T`.
        Ok(unsafe { ptr.as_ptr().read() })
    }

    /// Overwrite the block in place.
    ///
    /// # Errors
    ///
    /// [`MemoryError::Disposed`] after `dispose()`.
    pub fn set_value(&mut self, value: T) -> Result<(), MemoryError> {
        let ptr = self.live_ptr()?;
        // SAFETY: as in `value`; `&mut self` excludes other writers.
        unsafe { ptr.as_ptr().write(value) };
        Ok(())
    }

    /// Direct in-place mutation without copying.
    ///
    /// The reference must not be retained past `dispose()`; the borrow
    /// checker enforces that for safe callers.
    ///
    /// # Errors
    ///
    /// [`MemoryError::Disposed`] after `dispose()`.
    pub fn value_mut(&mut self) -> Result<&mut T, MemoryError> {
        let ptr = self.live_ptr()?;
        // SAFETY: valid initialized `T`, exclusively borrowed via
        // `&mut self` for the returned lifetime.
        Ok(unsafe { &mut *ptr.as_ptr() })
    }

    /// Explicit in-place overwrite; equivalent to
    /// [`UnmanagedObject::set_value`].
    pub fn update(&mut self, value: T) -> Result<(), MemoryError> {
        self.set_value(value)
    }

    /// Overwrite the block from an external pointer.
    ///
    /// # Errors
    ///
    /// [`MemoryError::NullPointer`] for a null `src`,
    /// [`MemoryError::Disposed`] after `dispose()`.
    ///
    /// # Safety
    ///
    /// A non-null `src` must point to a live, properly aligned `T` not
    /// overlapping this handle's block.
    pub unsafe fn update_from_ptr(&mut self, src: *const T) -> Result<(), MemoryError> {
        if src.is_null() {
            return Err(MemoryError::NullPointer);
        }
        let dst = self.live_ptr()?;
        // SAFETY: `src` is valid per this function's contract and does not
        // overlap the destination; `dst` is this handle's live block.
        unsafe { dst.as_ptr().copy_from_nonoverlapping(src, 1) };
        Ok(())
    }

    /// Escape hatch: the underlying pointer, or `None` once disposed.
    ///
    /// Reads and writes through the pointer bypass the handle's checks;
    /// the caller must not use it past `dispose()`.
    pub fn as_raw(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Whether the handle has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.ptr.is_none()
    }

    /// Release the block and mark the handle disposed. Idempotent.
    ///
    /// Pooled blocks are given back to their pool for reuse (the pool
    /// decides whether to retain or physically free them); directly
    /// allocated blocks are freed immediately; borrowed memory is left
    /// untouched.
    pub fn dispose(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };
        match &self.backing {
            Backing::Borrowed => {}
            Backing::Direct => {
                // SAFETY: the handle exclusively owned this direct
                // allocation of `size_of::<T>()` bytes.
                unsafe {
                    alloc::free(
                        ptr.as_ptr().cast::<u8>(),
                        mem::size_of::<T>(),
                        mem::align_of::<T>(),
                    );
                }
            }
            Backing::Pooled(pool) => {
                let _ = pool.release(BlockId::from_ptr(ptr.as_ptr().cast::<u8>()));
            }
        }
    }

    /// Whether `T` can live in a pooled block.
    fn pool_compatible() -> bool {
        mem::size_of::<T>() > 0 && mem::align_of::<T>() <= alloc::BLOCK_ALIGN
    }

    fn live_ptr(&self) -> Result<NonNull<T>, MemoryError> {
        self.ptr.ok_or(MemoryError::Disposed)
    }
}

impl<T: Copy + Default> Drop for UnmanagedObject<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Copy + Default> fmt::Debug for UnmanagedObject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let backing = match self.backing {
            Backing::Direct => "direct",
            Backing::Pooled(_) => "pooled",
            Backing::Borrowed => "borrowed",
        };
        f.debug_struct("UnmanagedObject")
            .field("disposed", &self.is_disposed())
            .field("backing", &backing)
            .finish()
    }
}
