use std::{io::Read, ptr};

use segalloc::{SbrkProvider, SegregatedAllocator};

/// Waits until the user presses ENTER.
/// Useful when you want to inspect memory state with tools like `pmap`, `htop`,
/// `gdb`, or just visually track how allocations change the program break.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints the current program break.
fn print_program_break(label: &str) {
  println!(
    "[{}] PID = {}, program break (sbrk(0)) = {:?}",
    label,
    std::process::id(),
    SbrkProvider::program_break(),
  );
}

fn print_alloc(
  allocator: &SegregatedAllocator<SbrkProvider>,
  size: usize,
  addr: *mut u8,
) {
  println!(
    "Allocated {} bytes ({} usable), address = {:?}, heap size = {}",
    size,
    unsafe { allocator.usable_size(addr) },
    addr,
    allocator.heap_size(),
  );
}

fn print_heap(allocator: &SegregatedAllocator<SbrkProvider>) {
  for block in allocator.blocks() {
    println!(
      "    {:?}: {:>6} bytes {}",
      block.payload,
      block.size,
      if block.allocated { "allocated" } else { "free" }
    );
  }

  let report = allocator.check();
  println!(
    "    {} free blocks / {} bytes free, consistent = {}",
    report.stats.free_blocks,
    report.stats.free_bytes,
    report.is_consistent()
  );
}

fn main() {
  env_logger::init();

  print_program_break("start");

  let mut allocator = match SegregatedAllocator::init(SbrkProvider::new()) {
    Ok(allocator) => allocator,
    Err(err) => {
      eprintln!("could not set up the heap: {}", err);
      return;
    }
  };

  println!("\n[0] Heap initialized");
  print_program_break("after init");
  print_heap(&allocator);
  block_until_enter_pressed();

  unsafe {
    // --------------------------------------------------------------------
    // 1) A u32 is carved from the back of the initial free block.
    // --------------------------------------------------------------------
    let first_block = allocator.allocate(std::mem::size_of::<u32>());
    println!("\n[1] Allocate u32");
    print_alloc(&allocator, 4, first_block);

    let first_ptr = first_block as *mut u32;
    first_ptr.write(0xDEADBEEF);
    println!("[1] Value written to first_block = 0x{:X}", first_ptr.read());
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 2) Twelve bytes still fit in the same free block.
    // --------------------------------------------------------------------
    let second_block = allocator.allocate(12);
    println!("\n[2] Allocate [u8; 12]");
    print_alloc(&allocator, 12, second_block);
    ptr::write_bytes(second_block, 0xAB, 12);
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 3) Nothing fits 512 bytes, so the heap grows by a whole chunk.
    // --------------------------------------------------------------------
    print_program_break("before growth");
    let third_block = allocator.allocate(512);
    println!("\n[3] Allocate [u8; 512]");
    print_alloc(&allocator, 512, third_block);
    print_program_break("after growth");
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 4) Freeing the first block merges it with its free neighbour.
    // --------------------------------------------------------------------
    allocator.deallocate(first_block);
    println!("\n[4] Deallocated first_block at {:?}", first_block);
    print_heap(&allocator);

    block_until_enter_pressed();

    // --------------------------------------------------------------------
    // 5) Growing the 512 byte block absorbs the free space after it.
    // --------------------------------------------------------------------
    let grown = allocator.reallocate(third_block, 2048);
    println!(
      "\n[5] Reallocate to 2048 bytes: {}",
      if grown == third_block {
        "grew in place"
      } else {
        "moved"
      }
    );
    print_alloc(&allocator, 2048, grown);
    print_heap(&allocator);

    block_until_enter_pressed();

    allocator.deallocate(second_block);
    allocator.deallocate(grown);
    println!("\n[6] Everything freed");
    print_heap(&allocator);
  }

  println!("\n[7] End of example. Process will exit and the OS will reclaim all memory.");
}
