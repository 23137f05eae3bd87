//! Word-level access to the heap bytes by offset.
//!
//! Every read and write of allocator metadata goes through [`Region`], which
//! asserts that the offset is word aligned and lies inside the bytes the
//! provider has handed out. Offset zero is the alignment pad and is never a
//! valid block, so it doubles as the null link.

use std::ptr::{self, NonNull};

use crate::constants::WSIZE;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Region {
  base: NonNull<u8>,
  len: usize,
}

impl Region {
  /// # Safety
  ///
  /// `base..base + len` must be valid for reads and writes, word aligned, and
  /// exclusively owned by the caller for as long as the region is used.
  pub(crate) unsafe fn new(
    base: NonNull<u8>,
    len: usize,
  ) -> Self {
    debug_assert_eq!(0, base.as_ptr() as usize % WSIZE);
    Self { base, len }
  }

  pub(crate) fn len(self) -> usize {
    self.len
  }

  fn check_word(
    self,
    offset: usize,
  ) {
    assert!(
      offset % WSIZE == 0 && offset <= self.len.saturating_sub(WSIZE),
      "heap word access at {:#x} outside {} byte region",
      offset,
      self.len
    );
  }

  pub(crate) fn word(
    self,
    offset: usize,
  ) -> usize {
    self.check_word(offset);
    unsafe { self.base.as_ptr().add(offset).cast::<usize>().read() }
  }

  pub(crate) fn set_word(
    self,
    offset: usize,
    value: usize,
  ) {
    self.check_word(offset);
    unsafe { self.base.as_ptr().add(offset).cast::<usize>().write(value) }
  }

  /// Address of the byte at `offset`.
  pub(crate) fn ptr_at(
    self,
    offset: usize,
  ) -> *mut u8 {
    assert!(offset <= self.len, "heap offset {:#x} out of bounds", offset);
    unsafe { self.base.as_ptr().add(offset) }
  }

  /// Offset of `ptr` from the base, if it lies inside the region.
  pub(crate) fn offset_of(
    self,
    ptr: *const u8,
  ) -> Option<usize> {
    let offset = (ptr as usize).checked_sub(self.base.as_ptr() as usize)?;
    (offset < self.len).then_some(offset)
  }

  pub(crate) fn contains_word(
    self,
    offset: usize,
  ) -> bool {
    offset % WSIZE == 0 && offset + WSIZE <= self.len
  }

  /// Copies `count` payload bytes between two disjoint ranges of the region.
  pub(crate) fn copy(
    self,
    from: usize,
    to: usize,
    count: usize,
  ) {
    assert!(from + count <= self.len && to + count <= self.len);
    assert!(from + count <= to || to + count <= from, "overlapping heap copy");
    unsafe {
      ptr::copy_nonoverlapping(self.ptr_at(from), self.ptr_at(to), count);
    }
  }
}
