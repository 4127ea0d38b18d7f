/*!
 * Heap Storage
 * Storage over an owned in-memory buffer
 */

use super::check_range;
use crate::core::types::{Address, Size};
use crate::memory::traits::{Storage, StorageFactory};
use crate::memory::types::MemoryResult;

/// Fixed-size buffer on the heap
#[derive(Debug, Clone, Default)]
pub struct HeapStorage {
    data: Vec<u8>,
}

impl HeapStorage {
    /// Zero-filled storage of `size` bytes
    pub fn new(size: Size) -> Self {
        Self {
            data: vec![0u8; size],
        }
    }

    /// Storage over an existing buffer
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }
}

impl Storage for HeapStorage {
    fn size(&self) -> Size {
        self.data.len()
    }

    fn free(&mut self) {
        self.data = Vec::new();
    }

    fn write_at(&mut self, data: &[u8], offset: Address) -> MemoryResult<()> {
        check_range(offset, data.len(), self.data.len())?;
        self.data[offset..offset + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        check_range(offset, buf.len(), self.data.len())?;
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(buf.len())
    }
}

/// Sector factory producing heap buffers
#[derive(Debug, Clone, Copy, Default)]
pub struct HeapStorageFactory;

impl StorageFactory for HeapStorageFactory {
    fn create(&self, _begin: Address, size: Size) -> MemoryResult<Box<dyn Storage>> {
        Ok(Box::new(HeapStorage::new(size)))
    }
}
