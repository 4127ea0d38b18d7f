/*!
 * Allocator Tests
 * Fixed memory allocation, reuse, out-of-memory and statistics
 */

use ai_os_vmem::core::types::KB;
use ai_os_vmem::memory::{Block, FixedMemoryAllocator, MemoryError, Space};
use pretty_assertions::assert_eq;

#[test]
fn test_fixed_allocation_reuses_freed_address() {
    let memory = FixedMemoryAllocator::allocate(20 * KB).unwrap();

    let first = memory.allocate(5 * KB).unwrap();
    assert_eq!(first.address(), 0);
    assert_eq!(memory.free_size(), 15 * KB);

    let second = memory.allocate(5 * KB).unwrap();
    assert_eq!(second.address(), 5 * KB);
    assert_eq!(memory.free_size(), 10 * KB);

    first.free().unwrap();
    assert_eq!(memory.free_size(), 15 * KB);

    let third = memory.allocate(5 * KB).unwrap();
    assert_eq!(third.address(), 0, "freed address should be reused");
    assert_eq!(memory.used_size(), 10 * KB);
}

#[test]
fn test_allocation_larger_than_memory_fails() {
    let memory = FixedMemoryAllocator::allocate(20 * KB).unwrap();

    match memory.allocate(25 * KB) {
        Err(MemoryError::OutOfMemory {
            requested,
            available,
            used,
            total,
        }) => {
            assert_eq!(requested, 25 * KB);
            assert_eq!(available, 20 * KB);
            assert_eq!(used, 0);
            assert_eq!(total, 20 * KB);
        }
        other => panic!("Expected OutOfMemory, got {:?}", other),
    }
}

#[test]
fn test_zero_length_allocation_is_bounds_violation() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let error = memory.allocate(0).unwrap_err();
    assert!(error.is_bounds_violation());
    assert_eq!(memory.free_size(), KB);
}

#[test]
fn test_free_space_twice_is_harmless() {
    let memory = FixedMemoryAllocator::allocate(4 * KB).unwrap();
    let space = memory.allocate(KB).unwrap();

    space.free().unwrap();
    space.free().unwrap();

    assert_eq!(space.size(), 0);
    assert_eq!(memory.free_size(), 4 * KB);
    let statistic = memory.statistic();
    assert_eq!(statistic.total_frees, 1);
    assert_eq!(statistic.failed_frees, 0);
}

#[test]
fn test_space_free_after_memory_free() {
    let memory = FixedMemoryAllocator::allocate(4 * KB).unwrap();
    let space = memory.allocate(KB).unwrap();

    memory.free();
    assert_eq!(memory.size(), 0);
    assert_eq!(memory.free_size(), 0);

    space.free().unwrap();
    assert!(space.write(b"late").is_err());
    assert!(memory.allocate(1).unwrap_err().is_out_of_memory());
}

#[test]
fn test_statistic_reports_blocks_and_percentages() {
    let memory = FixedMemoryAllocator::allocate(10 * KB).unwrap();
    let a = memory.allocate(2 * KB).unwrap();
    let _b = memory.allocate(2 * KB).unwrap();
    assert!(memory.allocate(20 * KB).is_err());
    a.free().unwrap();

    let statistic = memory.statistic();
    assert_eq!(statistic.used_size, 2 * KB as u64);
    assert_eq!(statistic.free_size, 8 * KB as u64);
    assert_eq!(statistic.used_blocks_count, 1);
    assert_eq!(statistic.free_blocks_count, 2);
    assert_eq!(statistic.fragmentation, 1);
    assert_eq!(statistic.total_allocations, 3);
    assert_eq!(statistic.success_allocations(), 2);
    assert_eq!(statistic.success_allocations_percentage(), 66.67);
    assert_eq!(statistic.success_frees_percentage(), 100.0);

    let report = statistic.to_string();
    assert!(report.contains("Used size:"));
    assert!(report.contains("66.67%"));
}

#[test]
fn test_space_block_matches_table() {
    let memory = FixedMemoryAllocator::allocate(KB).unwrap();
    let space = memory.allocate(100).unwrap();
    assert_eq!(space.block().block(), Block::new(0, 100));

    let snapshot = memory.metrics_snapshot();
    assert_eq!(snapshot.value("memory.spaces"), 1);
    space.free().unwrap();
    assert_eq!(memory.metrics_snapshot().value("memory.spaces"), 0);
}
