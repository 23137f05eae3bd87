//! Allocator tuning knobs.

use crate::{
  align_to,
  constants::{CHUNK_SIZE, DSIZE, INIT_SIZE, MIN_BLOCK_SIZE, SPLIT_THRESHOLD},
  error::HeapError,
};

/// Tuning parameters fixed for the lifetime of an allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  /// Minimum heap growth when no free block fits a request.
  pub chunk_size: usize,
  /// Free space created right after the sentinels are laid down.
  pub initial_size: usize,
  /// Remainder-to-request ratio at which a split keeps the payload at the
  /// front of the free block instead of the back.
  pub split_threshold: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      chunk_size: CHUNK_SIZE,
      initial_size: INIT_SIZE,
      split_threshold: SPLIT_THRESHOLD,
    }
  }
}

impl Config {
  pub fn with_chunk_size(
    mut self,
    chunk_size: usize,
  ) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_initial_size(
    mut self,
    initial_size: usize,
  ) -> Self {
    self.initial_size = initial_size;
    self
  }

  pub fn with_split_threshold(
    mut self,
    split_threshold: usize,
  ) -> Self {
    self.split_threshold = split_threshold;
    self
  }

  /// Checks the values and rounds the sizes up to the double word.
  pub fn validate(self) -> Result<Self, HeapError> {
    if self.chunk_size < MIN_BLOCK_SIZE {
      return Err(HeapError::InvalidConfig("chunk size below minimum block size"));
    }
    if self.initial_size < MIN_BLOCK_SIZE {
      return Err(HeapError::InvalidConfig("initial size below minimum block size"));
    }
    if self.split_threshold == 0 {
      return Err(HeapError::InvalidConfig("split threshold must be positive"));
    }
    if self.chunk_size > isize::MAX as usize || self.initial_size > isize::MAX as usize {
      return Err(HeapError::InvalidConfig("size exceeds isize::MAX"));
    }

    Ok(Self {
      chunk_size: align_to!(self.chunk_size, DSIZE),
      initial_size: align_to!(self.initial_size, DSIZE),
      split_threshold: self.split_threshold,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_default_is_valid() {
    let config = Config::default();
    assert_eq!(config, config.validate().unwrap());
  }

  #[test]
  fn test_validate_rounds_sizes() {
    let config = Config::default()
      .with_chunk_size(MIN_BLOCK_SIZE + 1)
      .with_initial_size(MIN_BLOCK_SIZE + DSIZE - 1)
      .validate()
      .unwrap();

    assert_eq!(MIN_BLOCK_SIZE + DSIZE, config.chunk_size);
    assert_eq!(MIN_BLOCK_SIZE + DSIZE, config.initial_size);
  }

  #[test]
  fn test_validate_rejects_bad_values() {
    assert!(matches!(
      Config::default().with_chunk_size(DSIZE).validate(),
      Err(HeapError::InvalidConfig(_))
    ));
    assert!(matches!(
      Config::default().with_initial_size(0).validate(),
      Err(HeapError::InvalidConfig(_))
    ));
    assert!(matches!(
      Config::default().with_split_threshold(0).validate(),
      Err(HeapError::InvalidConfig(_))
    ));
  }
}
