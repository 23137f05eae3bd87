//! Per-class doubly linked free lists, kept in ascending size order.
//!
//! Because each list is sorted, the first node that fits a request is also the
//! smallest block in that class that fits it.

use crate::{
  block::FreeBlock,
  constants::LIST_COUNT,
  directory::{self, size_class},
  region::Region,
};

/// Files `block` under its size class, before the first node at least as
/// large.
pub(crate) fn insert(
  region: Region,
  block: FreeBlock,
) {
  let size = block.size(region);
  let class = size_class(size);

  let mut pred = None;
  let mut cursor = directory::head(region, class);

  while let Some(node) = cursor {
    if node.size(region) >= size {
      break;
    }
    pred = Some(node);
    cursor = node.succ(region);
  }

  block.set_pred(region, pred);
  block.set_succ(region, cursor);

  match pred {
    Some(pred) => pred.set_succ(region, Some(block)),
    None => directory::set_head(region, class, Some(block)),
  }

  if let Some(succ) = cursor {
    succ.set_pred(region, Some(block));
  }
}

/// Unlinks `block` from the class it was filed under. Its header must still
/// carry the size it was inserted with.
pub(crate) fn remove(
  region: Region,
  block: FreeBlock,
) {
  let class = size_class(block.size(region));

  match (block.pred(region), block.succ(region)) {
    (None, None) => directory::set_head(region, class, None),
    (None, Some(succ)) => {
      directory::set_head(region, class, Some(succ));
      succ.set_pred(region, None);
    }
    (Some(pred), None) => pred.set_succ(region, None),
    (Some(pred), Some(succ)) => {
      pred.set_succ(region, Some(succ));
      succ.set_pred(region, Some(pred));
    }
  }
}

/// Walks one class from its head.
pub(crate) fn iter(
  region: Region,
  class: usize,
) -> Iter {
  Iter {
    region,
    cursor: directory::head(region, class),
  }
}

pub(crate) struct Iter {
  region: Region,
  cursor: Option<FreeBlock>,
}

impl Iterator for Iter {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    let current = self.cursor?;
    self.cursor = current.succ(self.region);
    Some(current)
  }
}

/// Finds the smallest free block of at least `size` bytes in the lowest class
/// that has one.
///
/// Classes below `size_class(size)` only hold smaller blocks, so the scan
/// starts there.
pub(crate) fn find_fit(
  region: Region,
  size: usize,
) -> Option<FreeBlock> {
  (size_class(size)..LIST_COUNT)
    .find_map(|class| iter(region, class).find(|block| block.size(region) >= size))
}
