use std::{cmp, ptr};

use log::{trace, warn};

use crate::{
  allocator::{SegregatedAllocator, adjusted_size},
  block::{Block, BlockView},
  constants::{DSIZE, MIN_BLOCK_SIZE},
  free_list,
  provider::HeapProvider,
};

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// Resizes the allocation behind `ptr` to hold `size` bytes.
  ///
  /// - A null `ptr` behaves like `allocate(size)`.
  /// - A zero `size` returns null and leaves `ptr` allocated.
  /// - A block that is already big enough is returned as is; it never shrinks.
  /// - Otherwise the block grows in place into a free or not-yet-existing
  ///   neighbour, or moves: the payload is copied to a new block and the old
  ///   one released.
  ///
  /// On failure null is returned and `ptr` is still valid.
  ///
  /// # Safety
  ///
  /// A non-null `ptr` must have been returned by `allocate` or `reallocate` on
  /// this allocator and not released since.
  pub unsafe fn reallocate(
    &mut self,
    ptr: *mut u8,
    size: usize,
  ) -> *mut u8 {
    if ptr.is_null() {
      return self.allocate(size);
    }

    if size == 0 {
      return ptr::null_mut();
    }

    let Some(needed) = adjusted_size(size) else {
      warn!("reallocation to {} bytes overflows", size);
      return ptr::null_mut();
    };

    let Some(block) = self.block_of(ptr) else {
      warn!("reallocate of {:?} outside the heap ignored", ptr);
      return ptr::null_mut();
    };

    let region = self.region();
    let current = block.size(region);

    if current >= needed {
      return ptr;
    }

    // Fresh heap space only lands next to the block when nothing but free
    // space separates it from the epilogue.
    let next_size = match block.next(region).view(region) {
      BlockView::Epilogue => Some(0),
      BlockView::Free(next) => {
        let size = next.size(region);
        let at_end = next.block().next(region).view(region) == BlockView::Epilogue;
        (current + size >= needed || at_end).then_some(size)
      }
      BlockView::Allocated => None,
    };

    match next_size {
      Some(next_size) => {
        if self.grow_in_place(block, current + next_size, needed) {
          trace!("grew offset {:#x} in place to {} bytes", block.offset(), needed);
          ptr
        } else {
          ptr::null_mut()
        }
      }
      None => unsafe { self.relocate(ptr, current - DSIZE, size) },
    }
  }

  /// Absorbs the free block (or fresh heap space) that follows `block` until
  /// it spans at least `needed` bytes. `available` is the size of `block` plus
  /// its free successor.
  fn grow_in_place(
    &mut self,
    block: Block,
    available: usize,
    needed: usize,
  ) -> bool {
    if available < needed {
      let shortfall = needed - available;
      if let Err(err) = self.extend(cmp::max(self.config().chunk_size, shortfall)) {
        warn!("in-place growth of offset {:#x} failed: {}", block.offset(), err);
        return false;
      }
    }

    let region = self.region();
    let Some(next) = block.next(region).as_free(region) else {
      return false;
    };

    let total = block.size(region) + next.size(region);
    free_list::remove(region, next);

    let remainder = total - needed;
    if remainder >= MIN_BLOCK_SIZE {
      block.write_tags(region, needed, true);
      let rest = block.next(region).release(region, remainder);
      free_list::insert(region, rest);
    } else {
      block.write_tags(region, total, true);
    }

    true
  }

  /// Moves a payload of `old_payload` bytes into a fresh block of `size`
  /// bytes.
  unsafe fn relocate(
    &mut self,
    ptr: *mut u8,
    old_payload: usize,
    size: usize,
  ) -> *mut u8 {
    let new_ptr = self.allocate(size);
    if new_ptr.is_null() {
      return new_ptr;
    }

    let region = self.region();
    if let (Some(from), Some(to)) = (region.offset_of(ptr), region.offset_of(new_ptr)) {
      region.copy(from, to, cmp::min(old_payload, size));
    }

    unsafe { self.deallocate(ptr) };

    trace!("moved {:?} to {:?} for {} bytes", ptr, new_ptr, size);
    new_ptr
  }
}
