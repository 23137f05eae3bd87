//! The capability that hands raw memory to the allocator.
//!
//! A provider owns one contiguous byte range that only ever grows at its high
//! end, like a program break. The allocator lays every piece of metadata it
//! has inside that range and never touches bytes outside it.
//!
//! ```text
//!   lo                                                   hi
//!   ├──────────── size() bytes handed out ────────────────┤
//!   │ directory │ prologue │ blocks ...         │ epilogue │ ← extend(n) appends here
//!   └─────────────────────────────────────────────────────┘
//! ```

use std::{
  alloc::{self, Layout},
  ptr::NonNull,
};

use crate::{align_to, constants::DSIZE, error::HeapError};

/// Source of heap memory.
///
/// # Safety
///
/// Implementors must guarantee that after a successful `init`:
///
/// - `bounds()` returns a `DSIZE`-aligned, non-null `lo` and `hi = lo + size()`.
/// - every byte in `lo..hi` is readable and writable and not aliased by
///   anything else for as long as the provider lives.
/// - `extend(n)` on success returns exactly the old `hi`, and the base `lo`
///   never moves.
pub unsafe trait HeapProvider {
  /// Prepares an empty region.
  fn init(&mut self) -> Result<(), HeapError>;

  /// Grows the region by `increment` bytes and returns the start of the new
  /// bytes.
  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, HeapError>;

  /// Half-open address range `[lo, hi)` currently handed out.
  fn bounds(&self) -> (*mut u8, *mut u8);

  /// Bytes currently handed out.
  fn size(&self) -> usize {
    let (lo, hi) = self.bounds();
    hi as usize - lo as usize
  }
}

/// A bounded heap carved from one up-front reservation.
///
/// The whole capacity is reserved (and zeroed) by `init`; `extend` only moves
/// a simulated break forward, so the base never moves and growth fails cleanly
/// once the capacity is used up.
pub struct MemoryProvider {
  base: Option<NonNull<u8>>,
  capacity: usize,
  size: usize,
}

impl MemoryProvider {
  pub fn new(capacity: usize) -> Self {
    Self {
      base: None,
      capacity: align_to!(capacity, DSIZE),
      size: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  fn layout(&self) -> Result<Layout, HeapError> {
    Layout::from_size_align(self.capacity, DSIZE)
      .map_err(|_| HeapError::InvalidConfig("capacity does not form a valid layout"))
  }
}

unsafe impl HeapProvider for MemoryProvider {
  fn init(&mut self) -> Result<(), HeapError> {
    if let Some(base) = self.base {
      unsafe { base.as_ptr().write_bytes(0, self.size) };
      self.size = 0;
      return Ok(());
    }

    if self.capacity == 0 {
      return Err(HeapError::OutOfMemory {
        requested: 0,
        available: 0,
      });
    }

    let layout = self.layout()?;
    let base = NonNull::new(unsafe { alloc::alloc_zeroed(layout) }).ok_or(
      HeapError::OutOfMemory {
        requested: self.capacity,
        available: 0,
      },
    )?;

    self.base = Some(base);
    self.size = 0;
    Ok(())
  }

  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let base = self.base.ok_or(HeapError::NotInitialized)?;
    let available = self.capacity - self.size;

    if increment > available {
      return Err(HeapError::OutOfMemory {
        requested: increment,
        available,
      });
    }

    let old_break = unsafe { base.add(self.size) };
    self.size += increment;
    Ok(old_break)
  }

  fn bounds(&self) -> (*mut u8, *mut u8) {
    match self.base {
      Some(base) => {
        let lo = base.as_ptr();
        (lo, unsafe { lo.add(self.size) })
      }
      None => (std::ptr::null_mut(), std::ptr::null_mut()),
    }
  }

  fn size(&self) -> usize {
    self.size
  }
}

impl Drop for MemoryProvider {
  fn drop(&mut self) {
    if let (Some(base), Ok(layout)) = (self.base, self.layout()) {
      unsafe { alloc::dealloc(base.as_ptr(), layout) };
    }
  }
}
