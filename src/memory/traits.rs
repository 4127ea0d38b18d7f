/*!
 * Memory Traits
 * Storage, table, virtual memory and space abstractions
 */

use super::block::MemoryBlock;
use super::space::{MemorySpace, ReadOnlySpace};
use super::table::Block;
use super::types::{MemoryError, MemoryResult};
use crate::core::codec::{BincodeCodec, Codec};
use crate::core::types::{Address, Size};
use crate::monitoring::MetricsSnapshot;
use serde::{de::DeserializeOwned, Serialize};
use std::io::{Read, Write};
use std::sync::Arc;

/// Raw fixed-capacity byte container
///
/// Every access outside `[0, size)` fails with `OutOfBounds`, single bytes
/// included. Zero-length accesses at `offset <= size` succeed.
pub trait Storage: Send + Sync {
    /// Current capacity in bytes
    fn size(&self) -> Size;

    /// Release the bytes; size drops to zero
    fn free(&mut self);

    /// Write `data` at `offset`
    fn write_at(&mut self, data: &[u8], offset: Address) -> MemoryResult<()>;

    /// Fill `buf` from `offset`, returning the number of bytes read
    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize>;

    /// Write `data` at the start of the storage
    fn write(&mut self, data: &[u8]) -> MemoryResult<()> {
        self.write_at(data, 0)
    }

    /// Read from the start of the storage, truncated to its size
    fn read(&self, buf: &mut [u8]) -> MemoryResult<usize> {
        let length = buf.len().min(self.size());
        self.read_at(&mut buf[..length], 0)
    }

    fn write_byte(&mut self, value: u8, offset: Address) -> MemoryResult<()> {
        self.write_at(&[value], offset)
    }

    fn read_byte(&self, offset: Address) -> MemoryResult<u8> {
        let mut byte = [0u8; 1];
        self.read_at(&mut byte, offset)?;
        Ok(byte[0])
    }

    /// Push pending writes to the backing medium
    fn flush(&mut self) -> MemoryResult<()> {
        Ok(())
    }
}

impl<S: Storage + ?Sized> Storage for Box<S> {
    fn size(&self) -> Size {
        (**self).size()
    }

    fn free(&mut self) {
        (**self).free()
    }

    fn write_at(&mut self, data: &[u8], offset: Address) -> MemoryResult<()> {
        (**self).write_at(data, offset)
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        (**self).read_at(buf, offset)
    }

    fn flush(&mut self) -> MemoryResult<()> {
        (**self).flush()
    }
}

/// Builds the sectors of a dynamic storage
pub trait StorageFactory: Send + Sync {
    /// Create a sector covering logical addresses `[begin, begin + size)`
    fn create(&self, begin: Address, size: Size) -> MemoryResult<Box<dyn Storage>>;
}

/// Free-list/used-list allocator over a logical address range
pub trait BlockTable: Send + Sync {
    /// Claim a block of `size` bytes; `Ok(None)` when nothing fits
    fn allocate(&self, size: Size) -> MemoryResult<Option<Block>>;

    /// Return a used block; false when the block is unknown
    fn free(&self, block: Block) -> bool;

    fn free_size(&self) -> Size;
    fn used_size(&self) -> Size;

    /// Total size of the address range
    fn size(&self) -> Size;

    fn can_increase_size(&self, new_size: Size) -> bool;

    /// Extend the range with a free block `[size, new_size)`
    fn increase_size(&self, new_size: Size) -> MemoryResult<()>;

    /// Drop every block and start over with one free block `[0, size)`
    fn reset(&self, size: Size);

    fn free_blocks(&self) -> Vec<Block>;
    fn used_blocks(&self) -> Vec<Block>;

    /// Merge address-adjacent free blocks, returning the number of merges
    fn coalesce(&self) -> usize;

    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Invoked once a virtual memory has released its storage
pub trait FreeEventListener: Send + Sync {
    fn on_free(&self);
}

impl<F> FreeEventListener for F
where
    F: Fn() + Send + Sync,
{
    fn on_free(&self) {
        self()
    }
}

/// A storage and a block table presented as one logical address space
pub trait VirtualMemory: Send + Sync {
    fn size(&self) -> Size;
    fn free_size(&self) -> Size;
    fn used_size(&self) -> Size;

    /// Allocate a block, growing first where the memory supports it
    fn allocate(&self, length: Size) -> MemoryResult<Block>;

    /// Return a block to the table; false when it is unknown
    fn free_block(&self, block: Block) -> bool;

    /// Release the storage, reset the table and notify the listener
    fn free(&self);

    fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()>;
    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize>;

    fn write(&self, data: &[u8]) -> MemoryResult<()> {
        self.write_at(data, 0)
    }

    fn read(&self, buf: &mut [u8]) -> MemoryResult<usize> {
        let length = buf.len().min(self.size());
        self.read_at(&mut buf[..length], 0)
    }

    fn set_free_listener(&self, listener: Box<dyn FreeEventListener>);

    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Allocator a space was carved from
pub trait SpaceOwner: Send + Sync {
    /// Allocate a new space of `length` bytes from the same memory
    fn allocate_space(self: Arc<Self>, length: Size) -> MemoryResult<MemorySpace>;

    /// Give the block of a freed space back; false when it was unknown
    fn release(&self, block: &MemoryBlock) -> bool;
}

/// Caller-facing handle over one allocated block
pub trait Space: Send + Sync {
    fn address(&self) -> Address;
    fn size(&self) -> Size;

    fn free(&self) -> MemoryResult<()>;

    fn write(&self, data: &[u8]) -> MemoryResult<()>;
    fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()>;
    fn read(&self, buf: &mut [u8]) -> MemoryResult<usize>;
    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize>;

    fn reader(&self) -> MemoryResult<Box<dyn Read + '_>>;
    fn writer(&self) -> MemoryResult<Box<dyn Write + '_>>;

    /// Copy the whole space into `out`
    fn dump(&self, out: &mut dyn Write) -> MemoryResult<()>;

    /// Allocate a same-size space from the same memory and copy into it
    fn copy(&self) -> MemoryResult<MemorySpace>;

    fn read_only(&self) -> ReadOnlySpace;

    fn write_object<C, T>(&self, codec: &C, value: &T) -> MemoryResult<()>
    where
        Self: Sized,
        C: Codec,
        T: Serialize + ?Sized,
    {
        let mut writer = self.writer()?;
        codec.encode(value, &mut writer)?;
        writer
            .flush()
            .map_err(|e| MemoryError::io("flushing encoded value", e))
    }

    fn read_object<C, T>(&self, codec: &C) -> MemoryResult<T>
    where
        Self: Sized,
        C: Codec,
        T: DeserializeOwned,
    {
        let limit = self.size();
        let mut reader = self.reader()?;
        codec.decode(&mut reader, limit)
    }

    fn write_string(&self, value: &str) -> MemoryResult<()>
    where
        Self: Sized,
    {
        self.write_object(&BincodeCodec, value)
    }

    fn read_string(&self) -> MemoryResult<String>
    where
        Self: Sized,
    {
        self.read_object(&BincodeCodec)
    }
}
