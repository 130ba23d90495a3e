//! Core types for the offheap manual memory layer.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! fundamental abstractions shared across the offheap workspace: block
//! identities and bookkeeping records, the error taxonomy, and the
//! process-wide settings read by the allocator at every decision point.
//!
//! No memory is allocated or freed here — the raw-allocation plumbing lives
//! in the `offheap` crate, which is the only crate permitted `unsafe` code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod block;
pub mod error;
pub mod settings;

pub use block::{BlockId, BlockState, RawBlock};
pub use error::MemoryError;
pub use settings::Settings;
