use crate::{
  allocator::SegregatedAllocator,
  block::FreeBlock,
  free_list,
  provider::HeapProvider,
};

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// Merges a listed free block with its free physical neighbours and files
  /// the result. Returns the merged block, which starts at the previous
  /// neighbour when that one was free.
  pub(crate) fn coalesce(
    &mut self,
    block: FreeBlock,
  ) -> FreeBlock {
    let region = self.region();
    let prev = block.block().prev(region).as_free(region);
    let next = block.block().next(region).as_free(region);

    if prev.is_none() && next.is_none() {
      return block;
    }

    free_list::remove(region, block);

    let mut start = block.block();
    let mut size = block.size(region);

    if let Some(prev) = prev {
      free_list::remove(region, prev);
      size += prev.size(region);
      start = prev.block();
    }

    if let Some(next) = next {
      free_list::remove(region, next);
      size += next.size(region);
    }

    let merged = start.release(region, size);
    free_list::insert(region, merged);
    merged
  }
}

#[cfg(test)]
mod tests {
  use test_log::test;

  use crate::{
    allocator::SegregatedAllocator,
    block::Block,
    constants::{DSIZE, FIRST_BLOCK, INIT_SIZE, MIN_BLOCK_SIZE},
    provider::MemoryProvider,
  };

  /// Three minimum-size allocations carved from the back of the initial
  /// block, so that physically: free, c, b, a, epilogue.
  fn three_small() -> (SegregatedAllocator<MemoryProvider>, [*mut u8; 3]) {
    let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 16)).unwrap();
    let a = allocator.allocate(DSIZE);
    let b = allocator.allocate(DSIZE);
    let c = allocator.allocate(DSIZE);
    (allocator, [a, b, c])
  }

  fn block_at(
    allocator: &SegregatedAllocator<MemoryProvider>,
    ptr: *mut u8,
  ) -> Block {
    allocator.block_of(ptr).unwrap()
  }

  #[test]
  fn test_layout_of_fixture() {
    let (allocator, [a, b, c]) = three_small();
    assert!(c < b && b < a);
    assert_eq!(unsafe { b.add(MIN_BLOCK_SIZE) }, a);
    assert_eq!(unsafe { c.add(MIN_BLOCK_SIZE) }, b);
    assert!(allocator.check().is_consistent());
  }

  #[test]
  fn test_free_without_free_neighbours() {
    let (mut allocator, [_, b, _]) = three_small();

    unsafe { allocator.deallocate(b) };

    let region = allocator.region();
    let block = block_at(&allocator, b);
    assert!(!block.is_allocated(region));
    assert_eq!(MIN_BLOCK_SIZE, block.size(region));
    assert!(allocator.check().is_consistent());
  }

  #[test]
  fn test_merge_with_next() {
    let (mut allocator, [a, b, _]) = three_small();

    unsafe {
      allocator.deallocate(a);
      allocator.deallocate(b);
    }

    let region = allocator.region();
    let merged = block_at(&allocator, b);
    assert!(!merged.is_allocated(region));
    assert_eq!(2 * MIN_BLOCK_SIZE, merged.size(region));
    assert!(allocator.check().is_consistent());
  }

  #[test]
  fn test_merge_with_prev() {
    let (mut allocator, [a, b, _]) = three_small();

    unsafe {
      allocator.deallocate(b);
      allocator.deallocate(a);
    }

    let region = allocator.region();
    let merged = block_at(&allocator, b);
    assert_eq!(2 * MIN_BLOCK_SIZE, merged.size(region));
    assert!(allocator.check().is_consistent());
  }

  #[test]
  fn test_merge_both_sides() {
    let (mut allocator, [a, b, c]) = three_small();

    unsafe {
      allocator.deallocate(a);
      allocator.deallocate(c);
      allocator.deallocate(b);
    }

    // Everything folds back into the single initial block.
    let region = allocator.region();
    let merged = Block::at(FIRST_BLOCK);
    assert!(!merged.is_allocated(region));
    assert_eq!(INIT_SIZE, merged.size(region));

    let report = allocator.check();
    assert!(report.is_consistent());
    assert_eq!(1, report.stats.free_blocks);
  }

  #[test]
  fn test_extension_merges_with_trailing_free_block() {
    let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 16)).unwrap();
    let chunk = allocator.config().chunk_size;

    let merged = allocator.extend(chunk).unwrap();

    let region = allocator.region();
    assert_eq!(FIRST_BLOCK, merged.offset());
    assert_eq!(INIT_SIZE + chunk, merged.size(region));
    assert!(allocator.check().is_consistent());
  }
}
