//! Errors surfaced while setting up or growing the heap.
//!
//! Only the provider and configuration layers produce these. The allocation
//! calls themselves follow the usual allocator contract and report failure as
//! a null pointer.

use std::{fmt, io};

/// Failure to obtain or validate heap memory.
#[derive(Debug)]
pub enum HeapError {
  /// The provider cannot grow by `requested` bytes.
  OutOfMemory { requested: usize, available: usize },

  /// The provider returned memory that does not start at the old heap end.
  Discontiguous { expected: usize, actual: usize },

  /// The provider was asked to grow before `init`.
  NotInitialized,

  /// The operating system refused the request.
  Os(io::Error),

  /// A configuration value is unusable.
  InvalidConfig(&'static str),
}

impl fmt::Display for HeapError {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match self {
      HeapError::OutOfMemory { requested, available } => write!(
        f,
        "Out of memory: requested {} bytes, {} available",
        requested, available
      ),
      HeapError::Discontiguous { expected, actual } => write!(
        f,
        "Heap grew discontiguously: expected region at {:#x}, got {:#x}",
        expected, actual
      ),
      HeapError::NotInitialized => write!(f, "Heap provider used before init"),
      HeapError::Os(err) => write!(f, "Heap provider failed: {}", err),
      HeapError::InvalidConfig(reason) => write!(f, "Invalid configuration: {}", reason),
    }
  }
}

impl std::error::Error for HeapError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      HeapError::Os(err) => Some(err),
      _ => None,
    }
  }
}

impl From<io::Error> for HeapError {
  fn from(err: io::Error) -> Self {
    HeapError::Os(err)
  }
}
