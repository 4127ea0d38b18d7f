/*!
 * Dynamic Memory Tests
 * Growth on demand, growth caps and concurrent growth triggers
 */

use ai_os_vmem::core::types::KB;
use ai_os_vmem::memory::vm::DynamicVirtualMemory;
use ai_os_vmem::memory::storage::HeapStorageFactory;
use ai_os_vmem::memory::{DynamicMemoryAllocator, MemoryError, Space, VirtualMemory};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;

#[test]
fn test_growth_consumes_remaining_capacity() {
    let memory = DynamicMemoryAllocator::allocate(20 * KB, 40 * KB, Some(5 * KB)).unwrap();

    let space = memory.allocate(40 * KB).unwrap();
    assert_eq!(space.address(), 0);
    assert_eq!(memory.size(), 40 * KB);
    assert_eq!(memory.free_size(), 0);

    match memory.allocate(1) {
        Err(MemoryError::OutOfMemory { total, .. }) => assert_eq!(total, 40 * KB),
        other => panic!("Expected OutOfMemory, got {:?}", other),
    }
}

#[test]
fn test_growth_after_partial_use() {
    let memory = DynamicMemoryAllocator::allocate(20 * KB, 40 * KB, Some(5 * KB)).unwrap();

    let first = memory.allocate(20 * KB).unwrap();
    assert_eq!(memory.size(), 20 * KB);

    let second = memory.allocate(20 * KB).unwrap();
    assert_eq!(second.address(), 20 * KB);
    assert_eq!(memory.size(), 40 * KB);

    assert!(memory.allocate(30 * KB).unwrap_err().is_out_of_memory());
    assert_eq!(memory.size(), 40 * KB);

    first.free().unwrap();
    second.free().unwrap();
    assert_eq!(memory.free_size(), 40 * KB);
    assert_eq!(memory.statistic().free_blocks_count, 1);
}

#[test]
fn test_default_growth_is_initial_size() {
    let memory = DynamicMemoryAllocator::allocate(10 * KB, 35 * KB, None).unwrap();

    memory.allocate(11 * KB).unwrap();
    assert_eq!(memory.size(), 20 * KB);

    memory.allocate(14 * KB).unwrap();
    assert_eq!(memory.size(), 30 * KB);

    // the final step is capped by the maximum size
    memory.allocate(6 * KB).unwrap();
    assert_eq!(memory.size(), 35 * KB);
}

#[test]
fn test_equal_sizes_build_fixed_memory() {
    let memory = DynamicMemoryAllocator::allocate(8 * KB, 8 * KB, None).unwrap();
    assert!(memory.allocate(9 * KB).unwrap_err().is_out_of_memory());
    assert_eq!(memory.size(), 8 * KB);
}

#[test]
fn test_max_below_size_rejected() {
    let result = DynamicMemoryAllocator::allocate(8 * KB, 4 * KB, None);
    assert!(matches!(result, Err(MemoryError::InvalidGrowth { .. })));
}

#[test]
fn test_data_survives_growth() {
    let memory = DynamicMemoryAllocator::allocate(KB, 4 * KB, Some(KB)).unwrap();
    let early = memory.allocate(KB).unwrap();
    early.write(&[7u8; KB]).unwrap();

    let late = memory.allocate(2 * KB).unwrap();
    late.write(&[9u8; 2 * KB]).unwrap();
    assert_eq!(memory.size(), 3 * KB);

    let mut buf = vec![0u8; KB];
    early.read(&mut buf).unwrap();
    assert!(buf.iter().all(|b| *b == 7));
}

#[test]
fn test_concurrent_growth_never_exceeds_max() {
    let vm = Arc::new(
        DynamicVirtualMemory::new(KB, 16 * KB, KB, Arc::new(HeapStorageFactory)).unwrap(),
    );

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let vm = Arc::clone(&vm);
            thread::spawn(move || {
                let mut blocks = Vec::new();
                for _ in 0..4 {
                    if let Ok(block) = vm.allocate(512) {
                        blocks.push(block);
                    }
                    assert!(vm.size() <= 16 * KB);
                }
                blocks
            })
        })
        .collect();

    let blocks: Vec<_> = handles
        .into_iter()
        .flat_map(|handle| handle.join().unwrap())
        .collect();

    // Every request fits; a failure is only possible once the cap is reached.
    assert!(!blocks.is_empty());
    assert_eq!(vm.size(), 16 * KB);
    assert_eq!(vm.used_size(), blocks.len() * 512);
    assert_eq!(vm.sector_count(), 16);
    for (i, a) in blocks.iter().enumerate() {
        for b in &blocks[i + 1..] {
            assert!(!a.overlaps(b), "{} overlaps {}", a, b);
        }
    }
}

#[test]
fn test_size_is_non_decreasing() {
    let memory = DynamicMemoryAllocator::allocate(KB, 8 * KB, Some(KB)).unwrap();
    let mut previous = memory.size();
    let mut spaces = Vec::new();

    for length in [512, 1024, 700, 2048, 300, 1500] {
        if let Ok(space) = memory.allocate(length) {
            spaces.push(space);
        }
        if spaces.len() >= 2 {
            spaces.remove(0).free().unwrap();
        }
        assert!(memory.size() >= previous);
        assert!(memory.size() <= 8 * KB);
        previous = memory.size();
    }
}
