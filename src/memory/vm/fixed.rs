/*!
 * Fixed Virtual Memory
 * Virtual memory over a storage that never grows
 */

use super::VmCore;
use crate::core::types::{Address, Size};
use crate::memory::table::Block;
use crate::memory::traits::{BlockTable, FreeEventListener, Storage, VirtualMemory};
use crate::memory::types::MemoryResult;
use crate::monitoring::MetricsSnapshot;

pub struct FixedVirtualMemory<S: Storage> {
    core: VmCore<S>,
}

impl<S: Storage> FixedVirtualMemory<S> {
    /// Virtual memory spanning the whole storage
    pub fn new(storage: S) -> Self {
        Self {
            core: VmCore::new(storage),
        }
    }

    /// Virtual memory with a caller-supplied table
    pub fn with_table(storage: S, table: Box<dyn BlockTable>) -> Self {
        Self {
            core: VmCore::with_table(storage, table),
        }
    }

    pub fn table(&self) -> &dyn BlockTable {
        self.core.table()
    }
}

impl<S: Storage> VirtualMemory for FixedVirtualMemory<S> {
    fn size(&self) -> Size {
        self.core.size()
    }

    fn free_size(&self) -> Size {
        self.core.table().free_size()
    }

    fn used_size(&self) -> Size {
        self.core.table().used_size()
    }

    fn allocate(&self, length: Size) -> MemoryResult<Block> {
        match self.core.try_allocate(length)? {
            Some(block) => Ok(block),
            None => Err(self.core.out_of_memory(length)),
        }
    }

    fn free_block(&self, block: Block) -> bool {
        self.core.free_block(block)
    }

    fn free(&self) {
        self.core.free()
    }

    fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()> {
        self.core.write_at(data, offset)
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        self.core.read_at(buf, offset)
    }

    fn set_free_listener(&self, listener: Box<dyn FreeEventListener>) {
        self.core.set_free_listener(listener)
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.core.metrics_snapshot()
    }
}
