/*!
 * Memory Block
 * Relative-offset handle on one block of a virtual memory
 */

use super::storage::check_range;
use super::table::Block;
use super::traits::VirtualMemory;
use super::types::{MemoryError, MemoryResult};
use super::vm::{VmReader, VmWriter};
use crate::core::limits::DUMP_CHUNK_SIZE;
use crate::core::types::{Address, Size};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Handle on `block` inside `vm`
///
/// Offsets are local to the block and re-derived as `block.address + offset`
/// on every call. The block lock serializes stream writers against readers
/// of the same block; it does not order accesses across blocks.
pub struct MemoryBlock {
    vm: Arc<dyn VirtualMemory>,
    block: Block,
    lock: RwLock<()>,
    detached: AtomicBool,
}

impl MemoryBlock {
    pub fn new(vm: Arc<dyn VirtualMemory>, block: Block) -> Self {
        Self {
            vm,
            block,
            lock: RwLock::new(()),
            detached: AtomicBool::new(false),
        }
    }

    /// The table block this handle covers
    pub fn block(&self) -> Block {
        self.block
    }

    pub fn address(&self) -> Address {
        self.block.address
    }

    /// Block size; zero once the block has been given back
    pub fn size(&self) -> Size {
        if self.is_detached() {
            0
        } else {
            self.block.size
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::Acquire)
    }

    /// Mark the block as given back; true only for the first caller
    pub(crate) fn detach(&self) -> bool {
        !self.detached.swap(true, Ordering::AcqRel)
    }

    pub fn virtual_memory(&self) -> &Arc<dyn VirtualMemory> {
        &self.vm
    }

    /// Absolute address of `[offset, offset + length)`
    fn absolute(&self, offset: Address, length: Size) -> MemoryResult<Address> {
        check_range(offset, length, self.size())?;
        Ok(self.block.address + offset)
    }

    pub fn write(&self, data: &[u8]) -> MemoryResult<()> {
        self.write_at(data, 0)
    }

    pub fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()> {
        let _guard = self.lock.write();
        let address = self.absolute(offset, data.len())?;
        self.vm.write_at(data, address)
    }

    /// Read from the start of the block, truncated to the block size
    pub fn read(&self, buf: &mut [u8]) -> MemoryResult<usize> {
        let length = buf.len().min(self.size());
        self.read_at(&mut buf[..length], 0)
    }

    pub fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        let _guard = self.lock.read();
        let address = self.absolute(offset, buf.len())?;
        self.vm.read_at(buf, address)
    }

    /// Stream over the whole block, holding the block read lock
    pub fn reader(&self) -> MemoryResult<BlockReader<'_>> {
        let guard = self.lock.read();
        let inner = self.vm.reader_at(self.block.address, self.size())?;
        Ok(BlockReader {
            inner,
            _guard: guard,
        })
    }

    /// Stream over the whole block, holding the block write lock
    pub fn writer(&self) -> MemoryResult<BlockWriter<'_>> {
        let guard = self.lock.write();
        let inner = self.vm.writer_at(self.block.address, self.size())?;
        Ok(BlockWriter {
            inner,
            _guard: guard,
        })
    }

    /// Copy the block into `out` in chunks of at most `DUMP_CHUNK_SIZE`
    pub fn dump(&self, out: &mut dyn Write) -> MemoryResult<()> {
        let _guard = self.lock.read();
        let size = self.size();
        let mut chunk = vec![0u8; DUMP_CHUNK_SIZE.min(size)];

        let mut offset = 0;
        while offset < size {
            let count = chunk.len().min(size - offset);
            self.vm
                .read_at(&mut chunk[..count], self.block.address + offset)?;
            out.write_all(&chunk[..count])
                .map_err(|e| MemoryError::io("dumping block", e))?;
            offset += count;
        }

        out.flush().map_err(|e| MemoryError::io("flushing dump", e))
    }
}

impl std::fmt::Debug for MemoryBlock {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemoryBlock")
            .field("block", &self.block)
            .field("detached", &self.is_detached())
            .finish()
    }
}

/// Block reader that keeps the block read lock for its lifetime
pub struct BlockReader<'a> {
    inner: VmReader<'a>,
    _guard: RwLockReadGuard<'a, ()>,
}

impl Read for BlockReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

/// Block writer that keeps the block write lock for its lifetime
pub struct BlockWriter<'a> {
    inner: VmWriter<'a>,
    _guard: RwLockWriteGuard<'a, ()>,
}

impl Write for BlockWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
