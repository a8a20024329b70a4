//! Size-sorted free-region bookkeeping for the pool allocator.
//!
//! Each [`FreeRegion`] describes one maximal run of free blocks inside a
//! pool node. Regions form a doubly-linked list ordered by ascending run
//! length, so the first region that can hold a request is also the smallest
//! one that can (best-fit). Descriptors are bump-allocated out of the pool
//! node's private arena and never individually returned; unlinked
//! descriptors stay dead in that arena until the pool is reset.

use core::ptr;

use crate::arena::{Arena, ArenaAllocError};

use super::PoolAllocError;

/// Descriptor of one contiguous run of free blocks.
#[repr(C)]
struct FreeRegion {
    /// Block index of the first free block in the run.
    start_block: usize,
    /// Run length in blocks; never zero while linked.
    blocks: usize,
    prev: *mut FreeRegion,
    next: *mut FreeRegion,
}

/// Head of the size-ascending region list for one pool node.
///
/// Invariants while the owning node is live:
/// - walking `next` yields non-decreasing `blocks`;
/// - `prev`/`next` are mutually consistent, head's `prev` and tail's
///   `next` are null;
/// - regions are disjoint and never adjacent (adjacency is merged on
///   release).
pub(crate) struct FreeList {
    head: *mut FreeRegion,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self {
            head: ptr::null_mut(),
        }
    }

    /// Allocate a descriptor for `[start_block, start_block + blocks)` out
    /// of `fl_arena` and link it in sorted position.
    pub(crate) fn push_region(
        &mut self,
        fl_arena: &mut Arena,
        start_block: usize,
        blocks: usize,
    ) -> Result<(), PoolAllocError> {
        let region = new_region(fl_arena, start_block, blocks)?;
        // SAFETY: `region` is freshly written and not yet linked.
        unsafe { self.insert_sorted(region) };
        Ok(())
    }

    /// Drop every link. Descriptor memory stays behind in the arena; the
    /// caller is about to reset it.
    pub(crate) fn clear(&mut self) {
        self.head = ptr::null_mut();
    }

    /// Best-fit: carve `blocks` from the first (smallest) region that can
    /// hold them. Returns the start block of the carved run.
    ///
    /// The hit region is shrunk in place. A region shrunk to zero is
    /// unlinked; otherwise it may now be smaller than its left neighbor
    /// and is bubbled left by content swap until the ascending order is
    /// restored. Swapping contents instead of relinking keeps every other
    /// node's links untouched.
    pub(crate) fn take(&mut self, blocks: usize) -> Option<usize> {
        debug_assert!(blocks > 0);

        // SAFETY: all pointers reached from `head` are live descriptors in
        // the owning node's fl_arena.
        unsafe {
            let mut curr = self.head;
            while !curr.is_null() && (*curr).blocks < blocks {
                curr = (*curr).next;
            }
            let region = curr;
            if region.is_null() {
                return None;
            }

            let start = (*region).start_block;
            (*region).start_block += blocks;
            (*region).blocks -= blocks;

            if (*region).blocks == 0 {
                // Exact fit; the descriptor leaks until reset.
                self.unlink(region);
            } else {
                self.bubble_left(region);
            }
            Some(start)
        }
    }

    /// Merge the freed run `[start_block, start_block + blocks)` back in,
    /// coalescing with an adjacent region on either side.
    pub(crate) fn release(
        &mut self,
        fl_arena: &mut Arena,
        start_block: usize,
        blocks: usize,
    ) -> Result<(), PoolAllocError> {
        debug_assert!(blocks > 0);
        let end = start_block + blocks;

        // Adjacency scan. Order is irrelevant here, so walk once and stop
        // as soon as both neighbors are known.
        let mut left: *mut FreeRegion = ptr::null_mut();
        let mut right: *mut FreeRegion = ptr::null_mut();
        // SAFETY: as in `take`, every reachable descriptor is live.
        unsafe {
            let mut curr = self.head;
            while !curr.is_null() && (left.is_null() || right.is_null()) {
                if (*curr).start_block + (*curr).blocks == start_block {
                    left = curr;
                }
                if (*curr).start_block == end {
                    right = curr;
                }
                curr = (*curr).next;
            }

            match (!left.is_null(), !right.is_null()) {
                (true, true) => {
                    // Freed run bridges two regions: fold everything into
                    // `left`; `right`'s descriptor leaks until reset.
                    self.unlink(left);
                    self.unlink(right);
                    (*left).blocks += blocks + (*right).blocks;
                    self.insert_sorted(left);
                }
                (true, false) => {
                    self.unlink(left);
                    (*left).blocks += blocks;
                    self.insert_sorted(left);
                }
                (false, true) => {
                    self.unlink(right);
                    (*right).start_block = start_block;
                    (*right).blocks += blocks;
                    self.insert_sorted(right);
                }
                (false, false) => {
                    let region = new_region(fl_arena, start_block, blocks)?;
                    self.insert_sorted(region);
                }
            }
        }
        Ok(())
    }

    /// Total free blocks across all regions.
    pub(crate) fn free_blocks(&self) -> usize {
        let mut total = 0;
        // SAFETY: list pointers are live descriptors.
        unsafe {
            let mut curr = self.head;
            while !curr.is_null() {
                total += (*curr).blocks;
                curr = (*curr).next;
            }
        }
        total
    }

    /// Number of linked regions.
    pub(crate) fn region_count(&self) -> usize {
        let mut count = 0;
        // SAFETY: list pointers are live descriptors.
        unsafe {
            let mut curr = self.head;
            while !curr.is_null() {
                count += 1;
                curr = (*curr).next;
            }
        }
        count
    }

    /// `(start_block, blocks)` of every region in list order.
    #[cfg(test)]
    pub(crate) fn snapshot(&self) -> alloc::vec::Vec<(usize, usize)> {
        let mut regions = alloc::vec::Vec::new();
        // SAFETY: list pointers are live descriptors.
        unsafe {
            let mut curr = self.head;
            while !curr.is_null() {
                regions.push(((*curr).start_block, (*curr).blocks));
                curr = (*curr).next;
            }
        }
        regions
    }

    /// Splice `region` in before the first entry with strictly more blocks,
    /// so ties land after existing equals.
    ///
    /// # Safety
    ///
    /// `region` must be a live descriptor that is not currently linked.
    unsafe fn insert_sorted(&mut self, region: *mut FreeRegion) {
        // SAFETY: caller guarantees `region` is live and unlinked; the walk
        // only touches live list members.
        unsafe {
            let mut prev: *mut FreeRegion = ptr::null_mut();
            let mut curr = self.head;
            while !curr.is_null() && (*curr).blocks <= (*region).blocks {
                prev = curr;
                curr = (*curr).next;
            }

            (*region).prev = prev;
            (*region).next = curr;
            if !curr.is_null() {
                (*curr).prev = region;
            }
            if prev.is_null() {
                self.head = region;
            } else {
                (*prev).next = region;
            }
        }
    }

    /// Remove `region` from the list without touching its descriptor
    /// memory.
    ///
    /// # Safety
    ///
    /// `region` must currently be linked into this list.
    unsafe fn unlink(&mut self, region: *mut FreeRegion) {
        // SAFETY: caller guarantees membership, so prev/next are either
        // null or live list members.
        unsafe {
            let prev = (*region).prev;
            let next = (*region).next;
            if prev.is_null() {
                self.head = next;
            } else {
                (*prev).next = next;
            }
            if !next.is_null() {
                (*next).prev = prev;
            }
            (*region).prev = ptr::null_mut();
            (*region).next = ptr::null_mut();
        }
    }

    /// Swap region contents leftward until the ascending order holds again.
    ///
    /// Only the shrunk region can be out of place, and only towards the
    /// head, so content swaps along `prev` are enough; no links move.
    ///
    /// # Safety
    ///
    /// `region` must currently be linked into this list.
    unsafe fn bubble_left(&mut self, region: *mut FreeRegion) {
        // SAFETY: caller guarantees membership; `prev` chains stay inside
        // the list.
        unsafe {
            let mut curr = region;
            while !(*curr).prev.is_null() && (*curr).blocks < (*(*curr).prev).blocks {
                let prev = (*curr).prev;
                core::mem::swap(&mut (*curr).start_block, &mut (*prev).start_block);
                core::mem::swap(&mut (*curr).blocks, &mut (*prev).blocks);
                curr = prev;
            }
        }
    }
}

/// Bump a descriptor out of `fl_arena` and initialize it unlinked.
fn new_region(
    fl_arena: &mut Arena,
    start_block: usize,
    blocks: usize,
) -> Result<*mut FreeRegion, PoolAllocError> {
    let slot = fl_arena
        .try_alloc(size_of::<FreeRegion>())
        .map_err(|e| match e {
            ArenaAllocError::OutOfMemory => PoolAllocError::OutOfMemory,
            _ => PoolAllocError::OutOfDescriptors,
        })?;

    let region = slot.cast::<FreeRegion>().as_ptr();
    // Descriptor slots are a whole number of words, so the bump offsets in
    // fl_arena keep every slot word-aligned.
    debug_assert!(region as usize % align_of::<FreeRegion>() == 0);
    // SAFETY: `slot` is a fresh, exclusively owned region of
    // `size_of::<FreeRegion>()` bytes.
    unsafe {
        region.write(FreeRegion {
            start_block,
            blocks,
            prev: ptr::null_mut(),
            next: ptr::null_mut(),
        });
    }
    Ok(region)
}
