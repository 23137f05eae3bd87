use std::{io, ptr::NonNull};

use libc::{c_void, intptr_t, sbrk};
use log::debug;

use crate::{constants::DSIZE, error::HeapError, provider::HeapProvider};

/// Heap provider that moves the process's program break with `sbrk(2)`.
///
/// Anything else in the process that also moves the break (the system
/// `malloc` included) can leave a gap between two extensions. Such growth is
/// refused with [`HeapError::Discontiguous`] rather than handed to the
/// allocator.
pub struct SbrkProvider {
  base: *mut u8,
  size: usize,
}

impl SbrkProvider {
  pub fn new() -> Self {
    Self {
      base: std::ptr::null_mut(),
      size: 0,
    }
  }

  /// Current program break as reported by `sbrk(0)`.
  pub fn program_break() -> *mut u8 {
    unsafe { sbrk(0) as *mut u8 }
  }
}

impl Default for SbrkProvider {
  fn default() -> Self {
    Self::new()
  }
}

unsafe fn grow(increment: usize) -> Result<*mut u8, HeapError> {
  if increment > intptr_t::MAX as usize {
    return Err(HeapError::OutOfMemory {
      requested: increment,
      available: intptr_t::MAX as usize,
    });
  }

  let address = unsafe { sbrk(increment as intptr_t) };

  if address == usize::MAX as *mut c_void {
    return Err(HeapError::Os(io::Error::last_os_error()));
  }

  Ok(address as *mut u8)
}

unsafe impl HeapProvider for SbrkProvider {
  fn init(&mut self) -> Result<(), HeapError> {
    let current = unsafe { grow(0)? };
    let padding = current.align_offset(DSIZE);

    let padded = unsafe { grow(padding)? };
    if padded != current {
      return Err(HeapError::Discontiguous {
        expected: current as usize,
        actual: padded as usize,
      });
    }

    self.base = unsafe { current.add(padding) };
    self.size = 0;

    debug!("sbrk heap based at {:?} ({} bytes padding)", self.base, padding);
    Ok(())
  }

  fn extend(
    &mut self,
    increment: usize,
  ) -> Result<NonNull<u8>, HeapError> {
    let base = NonNull::new(self.base).ok_or(HeapError::NotInitialized)?;
    let expected = unsafe { base.add(self.size) };

    let address = unsafe { grow(increment)? };
    if address != expected.as_ptr() {
      return Err(HeapError::Discontiguous {
        expected: expected.as_ptr() as usize,
        actual: address as usize,
      });
    }

    self.size += increment;
    Ok(expected)
  }

  fn bounds(&self) -> (*mut u8, *mut u8) {
    (self.base, self.base.wrapping_add(self.size))
  }

  fn size(&self) -> usize {
    self.size
  }
}
