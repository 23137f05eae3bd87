//! Heap consistency checker.
//!
//! Not used by the allocation path. Tests call [`SegregatedAllocator::check`]
//! after each operation to confirm that the boundary tags, the physical block
//! sequence and the free-list directory all tell the same story.

use std::fmt;

use log::{error, trace};
use rustc_hash::FxHashSet;

use crate::{
  allocator::SegregatedAllocator,
  block::{Block, BlockView, pack},
  constants::{DSIZE, FIRST_BLOCK, LIST_COUNT, MIN_BLOCK_SIZE, OVERHEAD, PROLOGUE, TAG_MASK, WSIZE},
  directory::{self, size_class},
  provider::HeapProvider,
  region::Region,
};

/// One structural problem found by the checker. Offsets are payload offsets
/// from the heap base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Violation {
  BadPrologue,
  BadEpilogue,
  TagMismatch { offset: usize },
  BadBlockSize { offset: usize, size: usize },
  BlockOverrun { offset: usize, size: usize },
  ListedBlockAllocated { class: usize, offset: usize },
  WrongClass { class: usize, offset: usize, size: usize },
  ListOutOfOrder { class: usize, offset: usize },
  BrokenBackLink { class: usize, offset: usize },
  ListCycle { class: usize },
  DuplicateListing { offset: usize },
  UnlistedFreeBlock { offset: usize },
  AdjacentFreeBlocks { offset: usize },
  FreeCountMismatch { listed: usize, walked: usize },
  FreeBytesMismatch { listed: usize, walked: usize },
  Accounting { accounted: usize, heap_size: usize },
}

impl fmt::Display for Violation {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      Violation::BadPrologue => write!(f, "Bad prologue"),
      Violation::BadEpilogue => write!(f, "Bad epilogue header"),
      Violation::TagMismatch { offset } => {
        write!(f, "Header and footer disagree at {:#x}", offset)
      }
      Violation::BadBlockSize { offset, size } => {
        write!(f, "Block at {:#x} has invalid size {}", offset, size)
      }
      Violation::BlockOverrun { offset, size } => {
        write!(f, "Block at {:#x} of size {} runs past the heap", offset, size)
      }
      Violation::ListedBlockAllocated { class, offset } => write!(
        f,
        "Block {:#x} in free list {} not marked as free",
        offset, class
      ),
      Violation::WrongClass { class, offset, size } => write!(
        f,
        "Block {:#x} of size {} filed in class {} instead of {}",
        offset,
        size,
        class,
        size_class(*size)
      ),
      Violation::ListOutOfOrder { class, offset } => {
        write!(f, "Free list {} out of order at {:#x}", class, offset)
      }
      Violation::BrokenBackLink { class, offset } => write!(
        f,
        "Free list {} predecessor link broken at {:#x}",
        class, offset
      ),
      Violation::ListCycle { class } => write!(f, "Free list {} does not terminate", class),
      Violation::DuplicateListing { offset } => {
        write!(f, "Free block {:#x} duplicated in free lists", offset)
      }
      Violation::UnlistedFreeBlock { offset } => {
        write!(f, "Free block {:#x} not captured in free lists", offset)
      }
      Violation::AdjacentFreeBlocks { offset } => {
        write!(f, "Contiguous free blocks at {:#x}", offset)
      }
      Violation::FreeCountMismatch { listed, walked } => write!(
        f,
        "Free block count inconsistent: {} listed, {} in heap",
        listed, walked
      ),
      Violation::FreeBytesMismatch { listed, walked } => write!(
        f,
        "Total free block size inconsistent: {} listed, {} in heap",
        listed, walked
      ),
      Violation::Accounting {
        accounted,
        heap_size,
      } => write!(
        f,
        "Blocks plus overhead account for {} bytes of a {} byte heap",
        accounted, heap_size
      ),
    }
  }
}

/// Totals gathered while walking the heap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub allocated_blocks: usize,
  pub allocated_bytes: usize,
  pub overhead: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
  pub stats: HeapStats,
  pub violations: Vec<Violation>,
}

impl CheckReport {
  pub fn is_consistent(&self) -> bool {
    self.violations.is_empty()
  }

  fn flag(
    &mut self,
    violation: Violation,
  ) {
    error!("heap check: {}", violation);
    self.violations.push(violation);
  }
}

/// A block seen during a physical heap walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  /// Payload address.
  pub payload: *const u8,
  /// Block size including tags.
  pub size: usize,
  pub allocated: bool,
}

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// Walks the blocks between the prologue and the epilogue in address order.
  /// Stops early at a block whose size would not advance or would leave the
  /// heap.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    let region = self.region();
    let mut cursor = Some(Block::at(FIRST_BLOCK));

    std::iter::from_fn(move || {
      let block = cursor?;
      if !region.contains_word(block.header()) {
        cursor = None;
        return None;
      }

      let size = block.size(region);
      if size == 0 || block.offset() + size > region.len() {
        cursor = None;
        return None;
      }

      cursor = Some(block.next(region));
      Some(BlockInfo {
        payload: region.ptr_at(block.offset()),
        size,
        allocated: block.is_allocated(region),
      })
    })
  }

  /// Validates every heap invariant and reports all violations found.
  pub fn check(&self) -> CheckReport {
    let region = self.region();
    let mut report = CheckReport::default();
    report.stats.heap_size = region.len();
    report.stats.overhead = OVERHEAD;

    let prologue = Block::at(PROLOGUE);
    if region.word(prologue.header()) != pack(DSIZE, true)
      || region.word(PROLOGUE) != pack(DSIZE, true)
    {
      report.flag(Violation::BadPrologue);
    }
    if region.word(region.len() - WSIZE) != pack(0, true) {
      report.flag(Violation::BadEpilogue);
    }

    let listed = self.check_directory(region, &mut report);
    self.check_blocks(region, &listed, &mut report);

    report
  }

  /// Traverses every class list and returns the set of listed offsets with
  /// their total size.
  fn check_directory(
    &self,
    region: Region,
    report: &mut CheckReport,
  ) -> (FxHashSet<usize>, usize) {
    let mut listed = FxHashSet::default();
    let mut bytes = 0;
    let max_nodes = region.len() / MIN_BLOCK_SIZE;

    for class in 0..LIST_COUNT {
      let mut pred = None;
      let mut last_size = 0;
      let mut cursor = directory::head(region, class);
      let mut steps = 0;

      while let Some(node) = cursor {
        steps += 1;
        if steps > max_nodes {
          report.flag(Violation::ListCycle { class });
          break;
        }

        let offset = node.offset();
        if offset < FIRST_BLOCK || offset % DSIZE != 0 || !region.contains_word(offset + WSIZE) {
          report.flag(Violation::BadBlockSize { offset, size: 0 });
          break;
        }

        let block = node.block();
        let size = block.size(region);

        if block.is_allocated(region) {
          report.flag(Violation::ListedBlockAllocated { class, offset });
        }
        if size_class(size) != class {
          report.flag(Violation::WrongClass { class, offset, size });
        }
        if size < last_size {
          report.flag(Violation::ListOutOfOrder { class, offset });
        }
        if node.pred(region) != pred {
          report.flag(Violation::BrokenBackLink { class, offset });
        }
        if !listed.insert(offset) {
          report.flag(Violation::DuplicateListing { offset });
          break;
        }

        trace!("class {:2}: {:#x} size {}", class, offset, size);
        bytes += size;
        last_size = size;
        pred = Some(node);
        cursor = node.succ(region);
      }
    }

    (listed, bytes)
  }

  fn check_blocks(
    &self,
    region: Region,
    (listed, listed_bytes): &(FxHashSet<usize>, usize),
    report: &mut CheckReport,
  ) {
    let mut block = Block::at(FIRST_BLOCK);
    let mut prev_free = false;
    let mut free_blocks = 0;
    let mut free_bytes = 0;
    let mut allocated_blocks = 0;
    let mut allocated_bytes = 0;

    loop {
      let offset = block.offset();
      if !region.contains_word(block.header()) {
        report.flag(Violation::BlockOverrun { offset, size: 0 });
        break;
      }

      let size = block.size(region);
      let view = block.view(region);
      if view == BlockView::Epilogue {
        break;
      }

      if size < MIN_BLOCK_SIZE || size & TAG_MASK != 0 {
        report.flag(Violation::BadBlockSize { offset, size });
        break;
      }
      if offset + size > region.len() {
        report.flag(Violation::BlockOverrun { offset, size });
        break;
      }
      if region.word(block.header()) != region.word(block.footer(region)) {
        report.flag(Violation::TagMismatch { offset });
      }

      match view {
        BlockView::Free(_) => {
          trace!("{:#x}: free {}", offset, size);
          if prev_free {
            report.flag(Violation::AdjacentFreeBlocks { offset });
          }
          if !listed.contains(&offset) {
            report.flag(Violation::UnlistedFreeBlock { offset });
          }
          free_blocks += 1;
          free_bytes += size;
          prev_free = true;
        }
        _ => {
          trace!("{:#x}: allocated {}", offset, size);
          allocated_blocks += 1;
          allocated_bytes += size;
          prev_free = false;
        }
      }

      block = block.next(region);
    }

    if listed.len() != free_blocks {
      report.flag(Violation::FreeCountMismatch {
        listed: listed.len(),
        walked: free_blocks,
      });
    }
    if *listed_bytes != free_bytes {
      report.flag(Violation::FreeBytesMismatch {
        listed: *listed_bytes,
        walked: free_bytes,
      });
    }

    let accounted = free_bytes + allocated_bytes + OVERHEAD;
    if accounted != region.len() {
      report.flag(Violation::Accounting {
        accounted,
        heap_size: region.len(),
      });
    }

    report.stats.free_blocks = free_blocks;
    report.stats.free_bytes = free_bytes;
    report.stats.allocated_blocks = allocated_blocks;
    report.stats.allocated_bytes = allocated_bytes;
  }
}
