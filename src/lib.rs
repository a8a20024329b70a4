//! Two cooperating allocation disciplines over heap-backed byte buffers.
//!
//! [`arena::Arena`] is a chained bump allocator: requests advance a pointer,
//! individual frees do not exist. [`pool::Pool`] is a block-quantized best-fit
//! allocator with coalescing on free; it keeps its free-region bookkeeping in
//! a private `Arena`, which is why the two live in one crate.
//!
//! Both grow by chaining fixed-size backing buffers up to a caller-given cap,
//! and both prefix every allocation with a word-sized header holding the
//! requested byte count, so `free` and `realloc` never need an external
//! ledger.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

mod raw;

pub mod arena;
pub mod pool;

#[cfg(feature = "allocator")]
pub mod allocator;

pub use arena::{Arena, ArenaAllocError};
pub use pool::{Pool, PoolAllocError};
