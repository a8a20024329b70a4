//! [`Allocator`] adapter so collection types can allocate straight from a
//! [`Pool`].
//!
//! The pool hands out `WORD`-aligned payloads only (every payload sits one
//! header past a slot boundary), so alignment requests above `WORD` are
//! refused rather than silently misaligned.
//!
//! Limitations:
//! - single-threaded only; `RefCell` panics on aliasing
//! - `WORD`-byte alignment ceiling
//! - every allocation is rounded up to whole pool blocks

use core::cell::RefCell;
use core::ptr::NonNull;

use allocator_api2::alloc::{AllocError, Allocator, Layout};
use hashbrown::HashMap;

use crate::pool::Pool;
use crate::raw::WORD;

const MAX_POOL_ALIGN: usize = WORD;

/// [`Allocator`]-compatible handle over a shared [`Pool`].
///
/// The `'pool` lifetime ties the handle to the `RefCell` owning the pool so
/// no allocation can outlive its backing buffers.
pub struct PoolAllocator<'pool> {
    // shared borrow of the owning pool
    inner: &'pool RefCell<Pool>,

    // (ptr address -> size), tracks live allocations for the debug
    // accessors below
    records: RefCell<HashMap<usize, usize>>,
}

impl<'pool> PoolAllocator<'pool> {
    /// Construct a `PoolAllocator` that allocates into `pool`.
    pub fn from_pool(pool: &'pool RefCell<Pool>) -> Self {
        Self {
            inner: pool,
            records: RefCell::new(HashMap::new()),
        }
    }

    /// Number of allocations handed out and not yet returned.
    pub fn outstanding_allocs(&self) -> usize {
        self.records.borrow().len()
    }

    /// Total bytes currently tracked across all live allocations.
    ///
    /// O(n) over live allocations, meant for debugging.
    pub fn total_allocated_bytes(&self) -> usize {
        self.records.borrow().values().sum()
    }
}

// SAFETY: `Allocator` needs valid, aligned, exclusively owned pointers.
// `Pool::try_alloc` returns exactly that for alignments up to `WORD`, and
// the `RefCell` keeps the single-threaded borrows honest.
unsafe impl<'pool> Allocator for PoolAllocator<'pool> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        // ZSTs: a dangling but aligned pointer, without touching the pool.
        //
        // SAFETY: `layout.align()` is non-zero for any valid `Layout`.
        if layout.size() == 0 {
            let dangling = unsafe { NonNull::new_unchecked(layout.align() as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        if layout.align() > MAX_POOL_ALIGN {
            return Err(AllocError);
        }

        // Borrow the pool, allocate, and drop the borrow before touching
        // `records` so the two RefCells never overlap.
        let block = self
            .inner
            .borrow_mut()
            .try_alloc(layout.size())
            .map_err(|_| AllocError)?;

        let addr = block.as_ptr() as *const u8 as usize;
        self.records.borrow_mut().insert(addr, layout.size());

        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // ZSTs were never given pool memory.
        if layout.size() == 0 {
            return;
        }

        self.records.borrow_mut().remove(&(ptr.as_ptr() as usize));

        // SAFETY: the `Allocator` contract says `ptr` came from `allocate`
        // on this handle, so it is a live payload pointer of this pool.
        let _ = unsafe { self.inner.borrow_mut().free(ptr) };
    }

    fn allocate_zeroed(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        let block = self.allocate(layout)?;
        // Pool memory is only guaranteed zero at create/reset/free time, so
        // zero explicitly (skipping ZST danglings).
        if layout.size() > 0 {
            // SAFETY: `allocate` succeeded, `block` is ours and writable.
            unsafe {
                core::ptr::write_bytes(block.as_ptr() as *mut u8, 0, layout.size());
            }
        }
        Ok(block)
    }
}
