/*!
 * Memory Allocators
 * Façades building fixed, dynamic and file-backed memories
 */

use super::manager::Memory;
use super::storage::{BackingFile, HeapStorage, HeapStorageFactory, MappedStorageFactory};
use super::traits::VirtualMemory;
use super::types::{MemoryError, MemoryResult};
use super::vm::{DynamicVirtualMemory, FixedVirtualMemory};
use crate::core::types::Size;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Memory over a fixed heap buffer
pub struct FixedMemoryAllocator;

impl FixedMemoryAllocator {
    pub fn allocate(size: Size) -> MemoryResult<Memory> {
        info!(size, "Allocating fixed memory");
        let vm = FixedVirtualMemory::new(HeapStorage::new(size));
        Ok(Memory::new(Arc::new(vm)))
    }
}

/// Memory over heap sectors that grows on demand
pub struct DynamicMemoryAllocator;

impl DynamicMemoryAllocator {
    /// `growth` of `None` grows by `size`; `size == max_size` yields a fixed memory
    pub fn allocate(size: Size, max_size: Size, growth: Option<Size>) -> MemoryResult<Memory> {
        if max_size < size {
            return Err(MemoryError::InvalidGrowth {
                requested: max_size,
                current: size,
                used: 0,
            });
        }
        if size == max_size {
            return FixedMemoryAllocator::allocate(size);
        }

        let growth = growth.unwrap_or(size);
        info!(size, max_size, growth, "Allocating dynamic memory");
        let vm = DynamicVirtualMemory::new(size, max_size, growth, Arc::new(HeapStorageFactory))?;
        Ok(Memory::new(Arc::new(vm)))
    }
}

/// Memory mapped onto a file
///
/// The file holds the raw address space at offset 0. Freeing the memory
/// syncs and closes the file.
pub struct FileMemoryAllocator;

impl FileMemoryAllocator {
    /// `max_size` above `size` makes the memory grow by `size` per step
    pub fn allocate(
        path: impl AsRef<Path>,
        size: Size,
        max_size: Option<Size>,
    ) -> MemoryResult<Memory> {
        Self::allocate_on(BackingFile::open(path)?, size, max_size)
    }

    /// Memory over an already opened file; the file is closed on free
    pub fn allocate_on(
        file: BackingFile,
        size: Size,
        max_size: Option<Size>,
    ) -> MemoryResult<Memory> {
        info!(path = %file.path().display(), size, ?max_size, "Allocating file memory");

        let vm: Arc<dyn VirtualMemory> = match max_size {
            Some(max) if max < size => {
                return Err(MemoryError::InvalidGrowth {
                    requested: max,
                    current: size,
                    used: 0,
                })
            }
            Some(max) if max > size => {
                let factory = Arc::new(MappedStorageFactory::new(file.clone()));
                Arc::new(DynamicVirtualMemory::new(size, max, size, factory)?)
            }
            _ => Arc::new(FixedVirtualMemory::new(file.map(0, size)?)),
        };

        vm.set_free_listener(Box::new(move || {
            if let Err(e) = file.close() {
                warn!(error = %e, "Failed to close backing file");
            }
        }));

        Ok(Memory::new(vm))
    }
}
