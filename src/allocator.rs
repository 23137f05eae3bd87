use std::{cmp, ptr::NonNull};

use log::{debug, error, info, trace, warn};

use crate::{
  align_to,
  block::{Block, FreeBlock},
  config::Config,
  constants::{DSIZE, FIRST_BLOCK, MIN_BLOCK_SIZE, OVERHEAD, PROLOGUE},
  directory,
  error::HeapError,
  free_list,
  provider::HeapProvider,
  region::Region,
};

/// Block size needed to hold a `size` byte payload, or `None` on overflow.
pub(crate) fn adjusted_size(size: usize) -> Option<usize> {
  let with_tags = size.checked_add(DSIZE + DSIZE - 1)?;
  Some(cmp::max(with_tags & !(DSIZE - 1), MIN_BLOCK_SIZE))
}

/// Segregated-fits allocator over a single heap obtained from `P`.
///
/// The directory of free lists, the sentinels and every block tag live inside
/// the provider's memory; this struct only remembers where that memory starts.
pub struct SegregatedAllocator<P: HeapProvider> {
  provider: P,
  base: NonNull<u8>,
  config: Config,
}

impl<P: HeapProvider> SegregatedAllocator<P> {
  /// Lays out the directory and sentinels and creates the initial free block,
  /// using the default [`Config`].
  pub fn init(provider: P) -> Result<Self, HeapError> {
    Self::init_with_config(provider, Config::default())
  }

  pub fn init_with_config(
    mut provider: P,
    config: Config,
  ) -> Result<Self, HeapError> {
    let config = config.validate()?;

    provider.init()?;
    let base = provider.extend(OVERHEAD)?;

    let (lo, _) = provider.bounds();
    if lo != base.as_ptr() {
      return Err(HeapError::Discontiguous {
        expected: lo as usize,
        actual: base.as_ptr() as usize,
      });
    }

    let mut allocator = Self {
      provider,
      base,
      config,
    };

    let region = allocator.region();
    region.set_word(0, 0);
    directory::clear(region);
    Block::at(PROLOGUE).write_tags(region, DSIZE, true);
    Block::at(FIRST_BLOCK).write_epilogue(region);

    allocator.extend(config.initial_size)?;

    info!(
      "heap initialized at {:?}: {} bytes, chunk size {}",
      base,
      allocator.heap_size(),
      config.chunk_size
    );
    Ok(allocator)
  }

  pub(crate) fn region(&self) -> Region {
    unsafe { Region::new(self.base, self.provider.size()) }
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  /// Total bytes obtained from the provider, metadata included.
  pub fn heap_size(&self) -> usize {
    self.provider.size()
  }

  /// Half-open address range of the heap.
  pub fn heap_bounds(&self) -> (*const u8, *const u8) {
    let (lo, hi) = self.provider.bounds();
    (lo as *const u8, hi as *const u8)
  }

  /// Grows the heap by at least `bytes` and returns the resulting free block,
  /// merged with a free block that ended at the old epilogue.
  ///
  /// Nothing in the heap is written unless the provider succeeds.
  pub(crate) fn extend(
    &mut self,
    bytes: usize,
  ) -> Result<FreeBlock, HeapError> {
    let size = bytes
      .checked_add(DSIZE - 1)
      .map(|_| align_to!(bytes, DSIZE))
      .ok_or(HeapError::OutOfMemory {
        requested: bytes,
        available: 0,
      })?;

    let old_size = self.provider.size();
    let start = self.provider.extend(size)?;

    debug_assert_eq!(self.base.as_ptr() as usize + old_size, start.as_ptr() as usize);

    debug!("heap extended by {} bytes to {}", size, old_size + size);

    // The old epilogue header becomes the new block's header.
    let region = self.region();
    let block = Block::at(old_size).release(region, size);
    block.block().next(region).write_epilogue(region);

    free_list::insert(region, block);
    Ok(self.coalesce(block))
  }

  /// Returns a pointer to at least `size` bytes of `DSIZE`-aligned memory, or
  /// null when `size` is zero or the heap cannot grow.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> *mut u8 {
    if size == 0 {
      return std::ptr::null_mut();
    }

    let Some(needed) = adjusted_size(size) else {
      warn!("allocation of {} bytes overflows", size);
      return std::ptr::null_mut();
    };

    let block = match free_list::find_fit(self.region(), needed) {
      Some(block) => block,
      None => match self.extend(cmp::max(needed, self.config.chunk_size)) {
        Ok(block) => block,
        Err(err) => {
          warn!("allocation of {} bytes failed: {}", size, err);
          return std::ptr::null_mut();
        }
      },
    };

    let placed = self.place(block, needed);
    trace!("allocated {} bytes at offset {:#x}", needed, placed.offset());

    self.region().ptr_at(placed.offset())
  }

  /// Carves `size` bytes out of `block` and returns the allocated part.
  ///
  /// A large remainder stays at the back of the block; a small one stays at
  /// the front and the allocation is taken from the back.
  pub(crate) fn place(
    &mut self,
    block: FreeBlock,
    size: usize,
  ) -> Block {
    let region = self.region();
    let total = block.size(region);
    let remainder = total - size;

    free_list::remove(region, block);
    let block = block.block();

    if remainder < MIN_BLOCK_SIZE {
      block.write_tags(region, total, true);
      return block;
    }

    if remainder >= self.config.split_threshold.saturating_mul(size) {
      block.write_tags(region, size, true);
      let rest = block.next(region).release(region, remainder);
      free_list::insert(region, rest);
      block
    } else {
      let rest = block.release(region, remainder);
      free_list::insert(region, rest);
      let carved = block.next(region);
      carved.write_tags(region, size, true);
      carved
    }
  }

  /// Releases the block behind `ptr`. Null is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must have been returned by `allocate` or `reallocate` on this
  /// allocator and not released since.
  pub unsafe fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    let Some(block) = self.block_of(ptr) else {
      error!("deallocate of {:?} outside the heap ignored", ptr);
      return;
    };

    let region = self.region();
    let size = block.size(region);
    let free = block.release(region, size);

    free_list::insert(region, free);
    self.coalesce(free);

    trace!("freed {} bytes at offset {:#x}", size, block.offset());
  }

  /// Bytes the caller may use behind `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` must be a live allocation from this allocator.
  pub unsafe fn usable_size(
    &self,
    ptr: *const u8,
  ) -> usize {
    self
      .block_of(ptr)
      .map_or(0, |block| block.size(self.region()) - DSIZE)
  }

  pub(crate) fn block_of(
    &self,
    ptr: *const u8,
  ) -> Option<Block> {
    let offset = self.region().offset_of(ptr)?;
    (offset >= FIRST_BLOCK && offset % DSIZE == 0).then(|| Block::at(offset))
  }
}
