//! # segalloc - A Segregated-Fits Memory Allocator
//!
//! This crate provides a general-purpose **segregated free-list allocator**
//! that manages one growable heap obtained from a [`HeapProvider`], such as
//! the program break moved by `sbrk(2)`.
//!
//! ## Overview
//!
//! Free blocks are filed in one of sixteen size classes. Each class is a
//! doubly linked list kept in ascending size order, so the first block that
//! fits a request is also the smallest one in its class:
//!
//! ```text
//!   Free-list directory:
//!
//!   class 0  (≤ 32)     ──► [32] ──► [32]
//!   class 1  (≤ 64)     ──► [48] ──► [64]
//!   class 2  (≤ 128)    ──► (empty)
//!   class 3  (≤ 256)    ──► [144] ──► [160] ──► [240]
//!   ...
//!   class 15 (> 512K)   ──► [1M]
//! ```
//!
//! The directory itself is not a Rust data structure: it lives in the first
//! words of the heap, just below the prologue, so the whole heap describes
//! itself.
//!
//! ## Crate Structure
//!
//! ```text
//!   segalloc
//!   ├── align      - Alignment macro (align_to!)
//!   ├── constants  - Heap geometry and tuning defaults
//!   ├── config     - Config (chunk growth, initial size, split ratio)
//!   ├── error      - HeapError
//!   ├── provider   - HeapProvider trait, MemoryProvider
//!   ├── sbrk       - SbrkProvider
//!   ├── region     - Offset-based word access (internal)
//!   ├── block      - Boundary tags and block views (internal)
//!   ├── directory  - Size classes and list heads
//!   ├── free_list  - Ordered insert / remove (internal)
//!   ├── allocator  - SegregatedAllocator: init, allocate, deallocate
//!   ├── coalesce   - Neighbour merging (internal)
//!   ├── realloc    - reallocate
//!   └── checker    - Heap consistency checker
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use segalloc::{MemoryProvider, SegregatedAllocator};
//!
//! let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 20)).unwrap();
//!
//! unsafe {
//!     let ptr = allocator.allocate(std::mem::size_of::<u64>()) as *mut u64;
//!     *ptr = 42;
//!     assert_eq!(42, *ptr);
//!
//!     let ptr = allocator.reallocate(ptr as *mut u8, 64) as *mut u64;
//!     assert_eq!(42, *ptr);
//!
//!     allocator.deallocate(ptr as *mut u8);
//! }
//!
//! assert!(allocator.check().is_consistent());
//! ```
//!
//! ## How It Works
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬──────────────┬──────────┬─────────────────────────────┬──────────┐
//!   │ pad │  directory   │ prologue │  blocks (free / allocated)  │ epilogue │
//!   │     │ 16 list heads│  hdr|ftr │                             │   hdr    │
//!   └─────┴──────────────┴──────────┴─────────────────────────────┴──────────┘
//!                                                                 ▲
//!                                              extend() turns this header into
//!                                              the header of the new free block
//! ```
//!
//! Every block carries its size and allocation bit in a header and a mirrored
//! footer. The allocated prologue and epilogue sentinels make every neighbour
//! lookup unconditional.
//!
//! - **allocate** searches the directory from the request's class upward,
//!   grows the heap by at least the chunk size on a miss, and splits the chosen
//!   block. A large remainder is left at the back; a small one is left at the
//!   front and the allocation is carved from the back.
//! - **deallocate** clears the allocation bit, files the block and merges it
//!   with free neighbours before returning.
//! - **reallocate** grows in place into a free successor or fresh heap space
//!   when it can, and otherwise moves the payload.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No misuse detection**: Double frees and foreign pointers are not caught
//! - **Never shrinks**: Memory is not returned to the provider
//! - **Linear top class**: The largest class is scanned linearly
//!
//! ## Safety
//!
//! `deallocate` and `reallocate` trust the caller to pass pointers this
//! allocator handed out and that are still live, like `free(3)`.

pub mod align;
mod allocator;
mod block;
mod checker;
mod coalesce;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
mod free_list;
pub mod provider;
mod realloc;
mod region;
mod sbrk;

pub use allocator::SegregatedAllocator;
pub use checker::{BlockInfo, CheckReport, HeapStats, Violation};
pub use config::Config;
pub use error::HeapError;
pub use provider::{HeapProvider, MemoryProvider};
pub use sbrk::SbrkProvider;
