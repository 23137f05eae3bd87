//! Heap geometry and default tuning constants.

use std::mem;

/// Word size: one boundary tag or one free-list link.
pub const WSIZE: usize = mem::size_of::<usize>();

/// Double word. Block sizes and payload addresses are multiples of this.
pub const DSIZE: usize = 2 * WSIZE;

/// Low bits of a tag that are never part of a size.
pub(crate) const TAG_MASK: usize = DSIZE - 1;

/// Header + footer + predecessor link + successor link.
pub const MIN_BLOCK_SIZE: usize = 4 * WSIZE;

/// Number of size classes in the free-list directory.
pub const LIST_COUNT: usize = 16;

/// Bytes the heap is grown by when no free block fits.
pub const CHUNK_SIZE: usize = (1 << 12) + DSIZE;

/// Bytes of free space created by `init`.
pub const INIT_SIZE: usize = (1 << 7) + DSIZE;

/// A split keeps the payload at the front when the remainder is at least this
/// many times the requested block size, and at the back otherwise.
pub const SPLIT_THRESHOLD: usize = 7;

/// Alignment padding, directory slots, prologue header and footer, epilogue
/// header. This is also the first request made to the heap provider.
pub const OVERHEAD: usize = (LIST_COUNT + 4) * WSIZE;

/// Offset of the prologue payload; the prologue header sits one word below.
pub(crate) const PROLOGUE: usize = (LIST_COUNT + 2) * WSIZE;

/// Payload offset of the first real block.
pub(crate) const FIRST_BLOCK: usize = PROLOGUE + DSIZE;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_geometry_is_double_word_aligned() {
    assert_eq!(0, OVERHEAD % DSIZE);
    assert_eq!(0, FIRST_BLOCK % DSIZE);
    assert_eq!(0, CHUNK_SIZE % DSIZE);
    assert_eq!(0, INIT_SIZE % DSIZE);
    assert_eq!(0, MIN_BLOCK_SIZE % DSIZE);
  }

  #[test]
  fn test_first_block_header_is_initial_epilogue() {
    assert_eq!(OVERHEAD, FIRST_BLOCK);
  }
}
