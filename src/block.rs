//! Boundary-tag block format.
//!
//! ```text
//!   Allocated block                      Free block
//!   ┌──────────────┐ ← header            ┌──────────────┐
//!   │ size | 1     │                     │ size | 0     │
//!   ├──────────────┤ ← payload offset →  ├──────────────┤
//!   │              │                     │ pred link    │
//!   │   payload    │                     │ succ link    │
//!   │              │                     │ (unused)     │
//!   ├──────────────┤ ← footer            ├──────────────┤
//!   │ size | 1     │                     │ size | 0     │
//!   └──────────────┘                     └──────────────┘
//! ```
//!
//! A block is named by the offset of its payload. Everything else (its tags,
//! its physical neighbours) is derived from that offset and the size stored in
//! its own header, so the heap can be walked like an implicit list.

use crate::{
  constants::{DSIZE, TAG_MASK, WSIZE},
  region::Region,
};

/// Encodes a size and an allocation bit into one tag word.
pub(crate) fn pack(
  size: usize,
  allocated: bool,
) -> usize {
  debug_assert_eq!(0, size & TAG_MASK, "block size {} not double-word aligned", size);
  size | allocated as usize
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Block(usize);

impl Block {
  pub(crate) fn at(payload: usize) -> Self {
    Self(payload)
  }

  pub(crate) fn offset(self) -> usize {
    self.0
  }

  pub(crate) fn header(self) -> usize {
    self.0 - WSIZE
  }

  pub(crate) fn size(
    self,
    region: Region,
  ) -> usize {
    region.word(self.header()) & !TAG_MASK
  }

  pub(crate) fn is_allocated(
    self,
    region: Region,
  ) -> bool {
    region.word(self.header()) & 1 == 1
  }

  pub(crate) fn footer(
    self,
    region: Region,
  ) -> usize {
    self.0 + self.size(region) - DSIZE
  }

  /// The physically following block.
  pub(crate) fn next(
    self,
    region: Region,
  ) -> Block {
    Block(self.0 + self.size(region))
  }

  /// The physically preceding block, found through its footer.
  pub(crate) fn prev(
    self,
    region: Region,
  ) -> Block {
    let prev_size = region.word(self.0 - DSIZE) & !TAG_MASK;
    Block(self.0 - prev_size)
  }

  /// Writes matching header and footer tags.
  pub(crate) fn write_tags(
    self,
    region: Region,
    size: usize,
    allocated: bool,
  ) {
    let tag = pack(size, allocated);
    region.set_word(self.header(), tag);
    region.set_word(self.0 + size - DSIZE, tag);
  }

  /// Writes the zero-size epilogue header for a block at this offset.
  pub(crate) fn write_epilogue(
    self,
    region: Region,
  ) {
    region.set_word(self.header(), pack(0, true));
  }

  /// Reads the allocation bit and returns the matching view.
  pub(crate) fn view(
    self,
    region: Region,
  ) -> BlockView {
    match (self.size(region), self.is_allocated(region)) {
      (0, true) => BlockView::Epilogue,
      (_, true) => BlockView::Allocated,
      (_, false) => BlockView::Free(FreeBlock(self)),
    }
  }

  pub(crate) fn as_free(
    self,
    region: Region,
  ) -> Option<FreeBlock> {
    match self.view(region) {
      BlockView::Free(free) => Some(free),
      _ => None,
    }
  }

  /// Marks the block free and hands back the free view. Links are left for
  /// the free list to fill in.
  pub(crate) fn release(
    self,
    region: Region,
    size: usize,
  ) -> FreeBlock {
    self.write_tags(region, size, false);
    FreeBlock(self)
  }
}

/// What a block is, according to its header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockView {
  Allocated,
  Free(FreeBlock),
  Epilogue,
}

/// A block whose header says free. Only this view can read or write the
/// predecessor/successor links that live in the payload area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct FreeBlock(Block);

impl FreeBlock {
  pub(crate) fn block(self) -> Block {
    self.0
  }

  pub(crate) fn offset(self) -> usize {
    self.0.offset()
  }

  pub(crate) fn size(
    self,
    region: Region,
  ) -> usize {
    self.0.size(region)
  }

  /// Reinterprets a stored link. Zero is the null link.
  pub(crate) fn from_link(link: usize) -> Option<FreeBlock> {
    (link != 0).then_some(FreeBlock(Block(link)))
  }

  fn to_link(block: Option<FreeBlock>) -> usize {
    block.map_or(0, FreeBlock::offset)
  }

  pub(crate) fn pred(
    self,
    region: Region,
  ) -> Option<FreeBlock> {
    Self::from_link(region.word(self.offset()))
  }

  pub(crate) fn succ(
    self,
    region: Region,
  ) -> Option<FreeBlock> {
    Self::from_link(region.word(self.offset() + WSIZE))
  }

  pub(crate) fn set_pred(
    self,
    region: Region,
    pred: Option<FreeBlock>,
  ) {
    region.set_word(self.offset(), Self::to_link(pred));
  }

  pub(crate) fn set_succ(
    self,
    region: Region,
    succ: Option<FreeBlock>,
  ) {
    region.set_word(self.offset() + WSIZE, Self::to_link(succ));
  }
}
