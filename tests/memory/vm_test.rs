/*!
 * Virtual Memory Tests
 * Free listeners and windowed streams
 */

use ai_os_vmem::core::types::KB;
use ai_os_vmem::memory::storage::{HeapStorage, HeapStorageFactory};
use ai_os_vmem::memory::vm::{DynamicVirtualMemory, FixedVirtualMemory};
use ai_os_vmem::memory::{MemoryError, VirtualMemory};
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use std::io::{ErrorKind, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Register a listener recording `(size, free_size)` seen at each call
fn record_frees(vm: &Arc<dyn VirtualMemory>) -> Arc<Mutex<Vec<(usize, usize)>>> {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    let observed = Arc::clone(vm);
    vm.set_free_listener(Box::new(move || {
        recorded.lock().push((observed.size(), observed.free_size()));
    }));
    calls
}

#[test]
fn test_listener_runs_once_after_release() {
    let vm: Arc<dyn VirtualMemory> = Arc::new(FixedVirtualMemory::new(HeapStorage::new(KB)));
    vm.allocate(100).unwrap();
    let calls = record_frees(&vm);

    vm.free();
    vm.free();

    assert_eq!(*calls.lock(), vec![(0, 0)]);
    assert!(vm.read_at(&mut [0u8; 1], 0).is_err());
}

#[test]
fn test_listener_on_dynamic_memory() {
    let vm: Arc<dyn VirtualMemory> = Arc::new(
        DynamicVirtualMemory::new(KB, 4 * KB, KB, Arc::new(HeapStorageFactory)).unwrap(),
    );
    vm.allocate(3 * KB).unwrap();
    let calls = record_frees(&vm);

    vm.free();
    assert_eq!(*calls.lock(), vec![(0, 0)]);
}

#[test]
fn test_closure_listener_counts() {
    let vm: Arc<dyn VirtualMemory> = Arc::new(FixedVirtualMemory::new(HeapStorage::new(KB)));
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    vm.set_free_listener(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
    }));

    assert_eq!(count.load(Ordering::SeqCst), 0);
    vm.free();
    vm.free();
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_window_checked_at_construction() {
    let vm: Arc<dyn VirtualMemory> = Arc::new(FixedVirtualMemory::new(HeapStorage::new(64)));

    match vm.writer_at(60, 8) {
        Err(MemoryError::OutOfBounds { offset, length, size }) => {
            assert_eq!((offset, length, size), (60, 8, 64));
        }
        Err(other) => panic!("Expected OutOfBounds, got {:?}", other),
        Ok(_) => panic!("Expected OutOfBounds, got a writer"),
    }
    assert!(vm.reader_at(usize::MAX, 2).is_err());
    assert!(vm.reader_at(64, 0).is_ok());
}

#[test]
fn test_writer_stops_at_window_end() {
    let vm: Arc<dyn VirtualMemory> = Arc::new(FixedVirtualMemory::new(HeapStorage::new(64)));

    {
        let mut writer = vm.writer_at(56, 8).unwrap();
        writer.write_all(&[7u8; 8]).unwrap();
        assert_eq!(writer.remaining(), 0);
        let err = writer.write(&[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::WriteZero);
    }

    let mut content = Vec::new();
    vm.reader_at(52, 12)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    assert_eq!(content, [0, 0, 0, 0, 7, 7, 7, 7, 7, 7, 7, 7]);
}

#[test]
fn test_whole_memory_streams() {
    let vm: Arc<dyn VirtualMemory> = Arc::new(FixedVirtualMemory::new(HeapStorage::new(16)));
    let written = vm.writer().write(&[3u8; 20]).unwrap();
    assert_eq!(written, 16);

    let mut content = Vec::new();
    vm.reader().read_to_end(&mut content).unwrap();
    assert_eq!(content, vec![3u8; 16]);
}
