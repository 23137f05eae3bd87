//! The segregated free-list directory.
//!
//! ```text
//!   offset 0      WSIZE   2*WSIZE          LIST_COUNT*WSIZE
//!   ┌─────────┬─────────┬─────────┬─────┬─────────┬──────────┬──────────┬──────────┐
//!   │ padding │ class 0 │ class 1 │ ... │ class15 │ prologue │ prologue │ epilogue │
//!   │         │  head   │  head   │     │  head   │  header  │  footer  │  header  │
//!   └─────────┴─────────┴─────────┴─────┴─────────┴──────────┴──────────┴──────────┘
//! ```
//!
//! Class `i` holds free blocks of size up to `MIN_BLOCK_SIZE << i`; the last
//! class takes everything bigger.

use crate::{
  block::FreeBlock,
  constants::{LIST_COUNT, MIN_BLOCK_SIZE, WSIZE},
  region::Region,
};

/// Maps a block size to the class it is filed under.
pub fn size_class(size: usize) -> usize {
  (0..LIST_COUNT - 1)
    .find(|&class| class_limit(class).is_some_and(|limit| size <= limit))
    .unwrap_or(LIST_COUNT - 1)
}

/// Largest block size filed under `class`, or `None` for the unbounded top
/// class.
pub fn class_limit(class: usize) -> Option<usize> {
  (class < LIST_COUNT - 1).then(|| MIN_BLOCK_SIZE << class)
}

fn slot(class: usize) -> usize {
  debug_assert!(class < LIST_COUNT);
  (class + 1) * WSIZE
}

pub(crate) fn head(
  region: Region,
  class: usize,
) -> Option<FreeBlock> {
  FreeBlock::from_link(region.word(slot(class)))
}

pub(crate) fn set_head(
  region: Region,
  class: usize,
  block: Option<FreeBlock>,
) {
  region.set_word(slot(class), block.map_or(0, FreeBlock::offset));
}

/// Empties every class.
pub(crate) fn clear(region: Region) {
  for class in 0..LIST_COUNT {
    set_head(region, class, None);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{block::Block, region::tests::Scratch};

  #[test]
  fn test_size_class_boundaries() {
    assert_eq!(0, size_class(MIN_BLOCK_SIZE));
    assert_eq!(1, size_class(MIN_BLOCK_SIZE + 1));
    assert_eq!(1, size_class(2 * MIN_BLOCK_SIZE));
    assert_eq!(2, size_class(2 * MIN_BLOCK_SIZE + 1));
    assert_eq!(14, size_class(MIN_BLOCK_SIZE << 14));
    assert_eq!(15, size_class((MIN_BLOCK_SIZE << 14) + 1));
    assert_eq!(15, size_class(usize::MAX / 2));
  }

  #[test]
  fn test_size_class_is_monotonic() {
    let mut last = 0;
    let mut size = MIN_BLOCK_SIZE;
    while size < MIN_BLOCK_SIZE << 20 {
      let class = size_class(size);
      assert!(class >= last);
      if let Some(limit) = class_limit(class) {
        assert!(size <= limit);
      }
      last = class;
      size += size / 3 + 1;
    }
    assert_eq!(LIST_COUNT - 1, last);
  }

  #[test]
  fn test_class_limit() {
    assert_eq!(Some(MIN_BLOCK_SIZE), class_limit(0));
    assert_eq!(Some(MIN_BLOCK_SIZE << 14), class_limit(14));
    assert_eq!(None, class_limit(LIST_COUNT - 1));
  }

  #[test]
  fn test_limits_are_class_edges() {
    for class in 0..LIST_COUNT - 1 {
      let limit = class_limit(class).unwrap();
      assert_eq!(class, size_class(limit));
      assert_eq!(class + 1, size_class(limit + 1));
    }
  }

  #[test]
  fn test_heads_live_below_prologue() {
    let mut scratch = Scratch::new(512);
    let region = scratch.region();
    let block = FreeBlock::from_link(400).unwrap();

    set_head(region, 3, Some(block));
    assert_eq!(Some(block), head(region, 3));
    assert_eq!(400, region.word(4 * WSIZE));
    assert_eq!(None, head(region, 2));

    clear(region);
    assert_eq!(None, head(region, 3));
    assert_eq!(Block::at(400), block.block());
  }
}
