// Heap-wide properties checked through the public API only.

use segalloc::{HeapStats, MemoryProvider, SegregatedAllocator, constants::DSIZE};
use test_log::test;

/// Small deterministic generator so failures replay exactly.
struct XorShift(u64);

impl XorShift {
  fn next(&mut self) -> u64 {
    let mut x = self.0;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    self.0 = x;
    x
  }

  fn below(
    &mut self,
    bound: usize,
  ) -> usize {
    (self.next() % bound as u64) as usize
  }
}

struct Live {
  ptr: *mut u8,
  len: usize,
  seed: u8,
}

fn fill(live: &Live) {
  for i in 0..live.len {
    unsafe { live.ptr.add(i).write(live.seed.wrapping_add(i as u8)) };
  }
}

fn intact(
  live: &Live,
  len: usize,
) -> bool {
  (0..len).all(|i| unsafe { live.ptr.add(i).read() } == live.seed.wrapping_add(i as u8))
}

fn assert_consistent(allocator: &SegregatedAllocator<MemoryProvider>) -> HeapStats {
  let report = allocator.check();
  assert!(report.is_consistent(), "{:?}", report.violations);
  assert_eq!(
    report.stats.heap_size,
    report.stats.free_bytes + report.stats.allocated_bytes + report.stats.overhead
  );

  let mut prev_free = false;
  for block in allocator.blocks() {
    assert!(!(prev_free && !block.allocated), "adjacent free blocks");
    prev_free = !block.allocated;
  }

  report.stats
}

#[test]
fn reuse_does_not_extend() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 20)).unwrap();

  let first = allocator.allocate(100);
  unsafe { allocator.deallocate(first) };
  let size = allocator.heap_size();

  let second = allocator.allocate(50);
  assert!(!second.is_null());
  assert_eq!(size, allocator.heap_size());
  assert_consistent(&allocator);
}

#[test]
fn unsplit_reuse_returns_same_address() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 20)).unwrap();

  // Sizes whose blocks leave too little behind to split, and one that matches.
  for (first_size, second_size) in [(100, 100), (112, 100), (100, 97)] {
    let first = allocator.allocate(first_size);
    unsafe { allocator.deallocate(first) };
    let size = allocator.heap_size();

    let second = allocator.allocate(second_size);
    assert_eq!(first, second);
    assert_eq!(size, allocator.heap_size());
    unsafe { allocator.deallocate(second) };
  }
}

#[test]
fn smaller_reuse_carves_from_the_back_of_the_freed_block() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 20)).unwrap();

  let first = allocator.allocate(100);
  let first_end = first as usize + unsafe { allocator.usable_size(first) };
  unsafe { allocator.deallocate(first) };
  let size = allocator.heap_size();

  // The remainder is too small to leave at the back, so it stays in front.
  let second = allocator.allocate(50);
  let second_end = second as usize + unsafe { allocator.usable_size(second) };

  assert_ne!(first, second);
  assert!(second > first);
  assert_eq!(first_end, second_end);
  assert_eq!(size, allocator.heap_size());
  assert_consistent(&allocator);
}

#[test]
fn freeing_neighbours_merges_them() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 20)).unwrap();

  // The third allocation uses up the free space in front of the pair.
  let a = allocator.allocate(24);
  let b = allocator.allocate(24);
  let _guard = allocator.allocate(24);

  let size_a = unsafe { allocator.usable_size(a) } + DSIZE;
  let size_b = unsafe { allocator.usable_size(b) } + DSIZE;
  let low = a.min(b) as *const u8;
  let free_before = assert_consistent(&allocator).free_blocks;

  unsafe {
    allocator.deallocate(a);
    allocator.deallocate(b);
  }

  let merged = allocator
    .blocks()
    .find(|block| block.payload == low)
    .expect("merged block starts at the lower payload");
  assert!(!merged.allocated);
  assert_eq!(size_a + size_b, merged.size);
  assert_eq!(free_before + 1, assert_consistent(&allocator).free_blocks);
}

#[test]
fn returned_pointers_are_double_word_aligned() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 22)).unwrap();

  for size in 1..600 {
    let ptr = allocator.allocate(size);
    assert_eq!(0, ptr as usize % DSIZE, "allocate({})", size);

    let ptr = unsafe { allocator.reallocate(ptr, size * 3) };
    assert_eq!(0, ptr as usize % DSIZE, "reallocate({})", size * 3);
  }
  assert_consistent(&allocator);
}

#[test]
fn reallocate_zero_keeps_allocation() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 20)).unwrap();
  let live = Live {
    ptr: allocator.allocate(40),
    len: 40,
    seed: 11,
  };
  fill(&live);

  assert!(unsafe { allocator.reallocate(live.ptr, 0) }.is_null());
  assert!(intact(&live, live.len));
  assert_eq!(1, assert_consistent(&allocator).allocated_blocks);

  unsafe { allocator.deallocate(live.ptr) };
  assert_eq!(0, assert_consistent(&allocator).allocated_blocks);
}

#[test]
fn exhausted_provider_returns_null() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 14)).unwrap();
  let mut count = 0;

  loop {
    let ptr = allocator.allocate(1000);
    if ptr.is_null() {
      break;
    }
    count += 1;
    assert_consistent(&allocator);
  }

  assert!(count > 0);
  assert!(allocator.heap_size() <= allocator.provider().capacity());
  assert_consistent(&allocator);
}

#[test]
fn random_workload_keeps_invariants_and_payloads() {
  let mut allocator = SegregatedAllocator::init(MemoryProvider::new(1 << 22)).unwrap();
  let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
  let mut live: Vec<Live> = Vec::new();

  for step in 0..3000 {
    match rng.below(10) {
      0..=4 => {
        let bound = if rng.below(8) == 0 { 5000 } else { 300 };
        let len = 1 + rng.below(bound);
        let ptr = allocator.allocate(len);
        if ptr.is_null() {
          continue;
        }
        let entry = Live {
          ptr,
          len,
          seed: step as u8,
        };
        fill(&entry);
        live.push(entry);
      }
      5..=7 if !live.is_empty() => {
        let entry = live.swap_remove(rng.below(live.len()));
        assert!(intact(&entry, entry.len), "payload corrupted before free");
        unsafe { allocator.deallocate(entry.ptr) };
      }
      8..=9 if !live.is_empty() => {
        let index = rng.below(live.len());
        let len = 1 + rng.below(800);
        let ptr = unsafe { allocator.reallocate(live[index].ptr, len) };
        if ptr.is_null() {
          continue;
        }

        let kept = live[index].len.min(len);
        let moved = Live {
          ptr,
          len,
          seed: live[index].seed,
        };
        assert!(intact(&moved, kept), "payload lost across reallocate");

        live[index] = Live {
          ptr,
          len,
          seed: step as u8,
        };
        fill(&live[index]);
      }
      _ => {}
    }

    let stats = assert_consistent(&allocator);
    assert_eq!(live.len(), stats.allocated_blocks);

    if step % 50 == 0 {
      for entry in &live {
        assert!(intact(entry, entry.len), "payload corrupted at step {}", step);
      }
    }
  }

  for entry in live.drain(..) {
    unsafe { allocator.deallocate(entry.ptr) };
  }
  let stats = assert_consistent(&allocator);
  assert_eq!(0, stats.allocated_blocks);
  assert_eq!(1, stats.free_blocks);
}
