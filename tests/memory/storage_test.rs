/*!
 * Storage Tests
 * Heap and sectored storage through the public API
 */

use ai_os_vmem::memory::storage::{DynamicStorage, HeapStorage, HeapStorageFactory};
use ai_os_vmem::memory::{MemoryError, Storage};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn sectored() -> DynamicStorage {
    let mut storage = DynamicStorage::new(50, 125, 25, Arc::new(HeapStorageFactory)).unwrap();
    for size in [75, 100, 125] {
        storage.increase_size(size).unwrap();
    }
    storage
}

#[test]
fn test_write_spanning_sectors() {
    let mut storage = sectored();
    assert_eq!(storage.sector_sizes(), vec![50, 25, 25, 25]);
    assert_eq!(storage.size(), 125);

    let data: Vec<u8> = (1..=30).collect();
    storage.write_at(&data, 65).unwrap();

    let mut buf = vec![0u8; 30];
    assert_eq!(storage.read_at(&mut buf, 65).unwrap(), 30);
    assert_eq!(buf, data);

    // bytes on either side of the range were left alone
    assert_eq!(storage.read_byte(64).unwrap(), 0);
    assert_eq!(storage.read_byte(95).unwrap(), 0);
}

#[test]
fn test_whole_storage_round_trip() {
    let mut storage = sectored();
    let data: Vec<u8> = (0..125).map(|i| i as u8).collect();
    storage.write(&data).unwrap();

    let mut buf = vec![0u8; 200];
    assert_eq!(storage.read(&mut buf).unwrap(), 125);
    assert_eq!(&buf[..125], &data[..]);
}

#[test]
fn test_growth_limits() {
    let mut storage = DynamicStorage::new(50, 110, 25, Arc::new(HeapStorageFactory)).unwrap();

    assert!(storage.increase_size(50).is_err());
    assert!(storage.increase_size(80).is_err());

    storage.increase_size(75).unwrap();
    storage.increase_size(100).unwrap();
    assert!(storage.increase_size(125).is_err());

    // capped final sector
    storage.increase_size(110).unwrap();
    assert_eq!(storage.sector_sizes(), vec![50, 25, 25, 10]);
    assert!(storage.increase_size(111).is_err());
}

#[test]
fn test_single_byte_bounds() {
    let mut storage = HeapStorage::new(8);
    storage.write_byte(0xFF, 7).unwrap();
    assert_eq!(storage.read_byte(7).unwrap(), 0xFF);

    assert!(matches!(
        storage.write_byte(1, 8),
        Err(MemoryError::OutOfBounds { offset: 8, length: 1, size: 8 })
    ));
    assert!(storage.read_byte(8).is_err());

    // zero-length access at the end is allowed
    storage.write_at(&[], 8).unwrap();
    assert_eq!(storage.read_at(&mut [], 8).unwrap(), 0);
}

#[test]
fn test_free_empties_storage() {
    let mut storage = sectored();
    storage.free();
    assert_eq!(storage.size(), 0);
    assert_eq!(storage.sector_count(), 0);
    assert!(storage.read_byte(0).is_err());
}
