//! Manual memory handles with block pooling and timed reclamation.
//!
//! Gives fixed-layout value types (`T: Copy + Default`) an explicit,
//! out-of-band lifetime: handles allocate raw memory eagerly, expose the
//! value in place, and give it back only when `dispose()` is called (or the
//! handle is dropped — drop is a safety net, not a collector).
//!
//! # Architecture
//!
//! ```text
//! UnmanagedObject<T> ──┬── AllocationPool (opt-in; recycles freed blocks
//!                      │     by exact byte size, sweeps expired ones on a
//!                      │     background tick)
//!                      └── raw allocator (direct alloc/free)
//! UnmanagedArray<T> ──────  raw allocator only (never pool-backed)
//! Settings ──────────────  process-wide knobs, re-read at every
//!                           allocator decision point
//! ```
//!
//! # Safety
//!
//! This is the one crate in the workspace that contains `unsafe` code, all
//! of it confined to the raw-allocation plumbing and the in-place typed
//! reads/writes behind the handle invariants: a non-disposed handle always
//! owns a valid block of the advertised size, and disposal is idempotent.
//!
//! Two operations deliberately break handles and say so in their contracts:
//! [`AllocationPool::clean_all`] frees every tracked block, and the expiry
//! sweep frees any pooled block past its lifetime horizon even if a handle
//! still points at it. Pooled handles must not be held longer than
//! `max_allocation_lifetime`.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_op_in_unsafe_fn)]

mod alloc;
pub mod array;
pub mod object;
pub mod pool;
mod sweep;

pub use array::UnmanagedArray;
pub use object::{Ownership, UnmanagedObject};
pub use offheap_core::{BlockId, BlockState, MemoryError, RawBlock, Settings};
pub use pool::AllocationPool;
