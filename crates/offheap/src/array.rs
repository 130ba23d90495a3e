//! Contiguous unmanaged buffer.
//!
//! An [`UnmanagedArray<T>`] owns one block of `len * size_of::<T>()` bytes
//! partitioned into `len` slots. It grows by a prefix-preserving
//! reallocation and shrinks by truncating the logical length immediately,
//! without touching the allocation. Buffers are never pool-backed — they
//! allocate and free directly.

use std::cmp::Ordering;
use std::fmt;
use std::mem;
use std::ptr::NonNull;

use offheap_core::MemoryError;

use crate::alloc;

/// A fixed-layout `T` buffer in manually managed memory.
///
/// Accessors are bounds-checked against the logical length and report
/// [`MemoryError::Disposed`] after `dispose()`. `len == 0` is a legal,
/// immediately valid buffer.
pub struct UnmanagedArray<T: Copy + Default> {
    /// `None` iff the buffer is disposed.
    ptr: Option<NonNull<T>>,
    /// Logical number of slots.
    len: usize,
    /// Slots the backing allocation holds; `len <= capacity`. Shrinking
    /// leaves the allocation at its former size, so a later grow within
    /// `capacity` needs no reallocation.
    capacity: usize,
}

// SAFETY: exclusively owned, no shared-access API; moving the buffer moves
// sole access to its block.
unsafe impl<T: Copy + Default + Send> Send for UnmanagedArray<T> {}

impl<T: Copy + Default> UnmanagedArray<T> {
    /// Allocate a buffer of `len` slots, each holding `T::default()`.
    ///
    /// # Errors
    ///
    /// [`MemoryError::AllocationFailed`] on allocator exhaustion.
    pub fn new(len: usize) -> Result<Self, MemoryError> {
        let ptr = if Self::byte_len(len)? == 0 {
            NonNull::dangling()
        } else {
            alloc::alloc_zeroed(Self::byte_len(len)?, mem::align_of::<T>())?.cast::<T>()
        };
        let mut array = Self {
            ptr: Some(ptr),
            len,
            capacity: len,
        };
        array.write_defaults(0, len);
        Ok(array)
    }

    /// Allocate a buffer holding a copy of `values`.
    pub fn from_slice(values: &[T]) -> Result<Self, MemoryError> {
        let mut array = Self::new(values.len())?;
        for (index, value) in values.iter().enumerate() {
            array.set(index, *value)?;
        }
        Ok(array)
    }

    /// Logical number of slots.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the buffer has no slots.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slots the backing allocation currently holds.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the buffer has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.ptr.is_none()
    }

    /// Copy the element at `index` out of the buffer.
    ///
    /// # Errors
    ///
    /// [`MemoryError::Disposed`] after `dispose()`;
    /// [`MemoryError::IndexOutOfRange`] when `index >= len`.
    pub fn get(&self, index: usize) -> Result<T, MemoryError> {
        let ptr = self.checked_slot(index)?;
        // SAFETY: `checked_slot` guarantees a live in-bounds slot.
        Ok(unsafe { ptr.read() })
    }

    /// Overwrite the element at `index`.
    ///
    /// # Errors
    ///
    /// As for [`UnmanagedArray::get`].
    pub fn set(&mut self, index: usize, value: T) -> Result<(), MemoryError> {
        let ptr = self.checked_slot(index)?;
        // SAFETY: as in `get`; `&mut self` excludes other writers.
        unsafe { ptr.write(value) };
        Ok(())
    }

    /// Materialize a fresh copy of all elements. O(len).
    ///
    /// # Errors
    ///
    /// [`MemoryError::Disposed`] after `dispose()`.
    pub fn to_vec(&self) -> Result<Vec<T>, MemoryError> {
        Ok(self.as_slice()?.to_vec())
    }

    /// Enlarge the buffer to `new_len` slots, preserving existing elements
    /// and filling the new tail with `T::default()`.
    ///
    /// Reuses spare capacity left by an earlier shrink when possible;
    /// otherwise reallocates with the prefix preserved.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidGrow`] unless `new_len > len`;
    /// [`MemoryError::Disposed`] after `dispose()`;
    /// [`MemoryError::AllocationFailed`] on allocator exhaustion.
    pub fn grow(&mut self, new_len: usize) -> Result<(), MemoryError> {
        let ptr = self.live_ptr()?;
        if new_len <= self.len {
            return Err(MemoryError::InvalidGrow {
                current: self.len,
                requested: new_len,
            });
        }

        if new_len > self.capacity && mem::size_of::<T>() > 0 {
            let new_bytes = Self::byte_len(new_len)?;
            let grown = if self.capacity == 0 {
                alloc::alloc_zeroed(new_bytes, mem::align_of::<T>())?
            } else {
                // SAFETY: `ptr` backs `capacity` slots allocated through
                // this module with `T`'s alignment.
                unsafe {
                    alloc::grow(
                        ptr.cast::<u8>(),
                        Self::byte_len(self.capacity)?,
                        new_bytes,
                        mem::align_of::<T>(),
                    )?
                }
            };
            self.ptr = Some(grown.cast::<T>());
            self.capacity = new_len;
        } else if mem::size_of::<T>() == 0 {
            self.capacity = new_len;
        }

        let old_len = self.len;
        self.len = new_len;
        self.write_defaults(old_len, new_len);
        Ok(())
    }

    /// Truncate the logical length to `new_len`, immediately and
    /// unconditionally. The allocation keeps its former size.
    ///
    /// # Errors
    ///
    /// [`MemoryError::InvalidShrink`] when `new_len > len`;
    /// [`MemoryError::Disposed`] after `dispose()`.
    pub fn shrink(&mut self, new_len: usize) -> Result<(), MemoryError> {
        self.live_ptr()?;
        if new_len > self.len {
            return Err(MemoryError::InvalidShrink {
                current: self.len,
                requested: new_len,
            });
        }
        self.len = new_len;
        Ok(())
    }

    /// Sort elements ascending by a projected key, in place and stably.
    ///
    /// Bubble sort: O(n²) worst case, O(n) on nearly-sorted input, no
    /// extra memory beyond one temporary element. Swaps happen only on a
    /// strictly-greater comparison, so elements with equal keys keep their
    /// relative order. Keys that do not compare (NaN) leave their pair in
    /// place.
    ///
    /// # Errors
    ///
    /// [`MemoryError::Disposed`] after `dispose()`.
    pub fn sort_by_key<K, F>(&mut self, key: F) -> Result<(), MemoryError>
    where
        K: PartialOrd,
        F: Fn(&T) -> K,
    {
        let slice = self.as_slice_mut()?;
        let n = slice.len();
        for pass in 0..n.saturating_sub(1) {
            let mut swapped = false;
            for j in 0..n - pass - 1 {
                let ordering = key(&slice[j]).partial_cmp(&key(&slice[j + 1]));
                if ordering == Some(Ordering::Greater) {
                    slice.swap(j, j + 1);
                    swapped = true;
                }
            }
            if !swapped {
                break;
            }
        }
        Ok(())
    }

    /// Escape hatch: the base pointer, or `None` once disposed.
    ///
    /// Reads and writes through the pointer bypass the bounds checks; the
    /// caller must not use it past `dispose()`.
    pub fn as_raw(&self) -> Option<NonNull<T>> {
        self.ptr
    }

    /// Free the block and mark the buffer disposed. Idempotent.
    ///
    /// Buffers are never pool-backed, so the memory goes straight back to
    /// the allocator. The logical length drops to zero.
    pub fn dispose(&mut self) {
        let Some(ptr) = self.ptr.take() else {
            return;
        };
        if self.capacity > 0 && mem::size_of::<T>() > 0 {
            // SAFETY: the buffer exclusively owned this allocation of
            // `capacity` slots.
            unsafe {
                alloc::free(
                    ptr.as_ptr().cast::<u8>(),
                    self.capacity * mem::size_of::<T>(),
                    mem::align_of::<T>(),
                );
            }
        }
        self.len = 0;
        self.capacity = 0;
    }

    fn as_slice(&self) -> Result<&[T], MemoryError> {
        let ptr = self.live_ptr()?;
        // SAFETY: a non-disposed buffer owns `len` initialized slots.
        Ok(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) })
    }

    fn as_slice_mut(&mut self) -> Result<&mut [T], MemoryError> {
        let ptr = self.live_ptr()?;
        // SAFETY: as in `as_slice`; `&mut self` makes the borrow unique.
        Ok(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len) })
    }

    /// Write `T::default()` into slots `[from, to)`.
    fn write_defaults(&mut self, from: usize, to: usize) {
        let Some(ptr) = self.ptr else { return };
        for index in from..to {
            // SAFETY: `to <= len <= capacity`, so every slot is in bounds
            // of the live allocation (or a no-op write for zero-sized `T`).
            unsafe { ptr.as_ptr().add(index).write(T::default()) };
        }
    }

    fn checked_slot(&self, index: usize) -> Result<*mut T, MemoryError> {
        let ptr = self.live_ptr()?;
        if index >= self.len {
            return Err(MemoryError::IndexOutOfRange {
                index,
                len: self.len,
            });
        }
        // SAFETY: `index < len <= capacity` keeps the offset in bounds.
        Ok(unsafe { ptr.as_ptr().add(index) })
    }

    fn live_ptr(&self) -> Result<NonNull<T>, MemoryError> {
        self.ptr.ok_or(MemoryError::Disposed)
    }

    fn byte_len(len: usize) -> Result<usize, MemoryError> {
        len.checked_mul(mem::size_of::<T>())
            .ok_or(MemoryError::AllocationFailed { bytes: usize::MAX })
    }
}

impl<T: Copy + Default> Drop for UnmanagedArray<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T: Copy + Default> fmt::Debug for UnmanagedArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnmanagedArray")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
