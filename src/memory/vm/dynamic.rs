/*!
 * Dynamic Virtual Memory
 * Virtual memory that grows its storage and table on demand
 *
 * Growth is serialized by one mutex so storage and table always change
 * size together. A thread that waited on the mutex while another grew
 * sees the new size and retries its allocation instead of growing again.
 */

use super::{VmCore, METRIC_INCREASES};
use crate::core::types::{Address, Size};
use crate::memory::storage::DynamicStorage;
use crate::memory::table::Block;
use crate::memory::traits::{BlockTable, FreeEventListener, StorageFactory, VirtualMemory};
use crate::memory::types::MemoryResult;
use crate::monitoring::MetricsSnapshot;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{info, warn};

pub struct DynamicVirtualMemory {
    core: VmCore<DynamicStorage>,
    max_size: Size,
    growth: Size,
    grow_lock: Mutex<()>,
}

impl DynamicVirtualMemory {
    /// Memory of `size` bytes growing by `growth` up to `max_size`
    pub fn new(
        size: Size,
        max_size: Size,
        growth: Size,
        factory: Arc<dyn StorageFactory>,
    ) -> MemoryResult<Self> {
        let storage = DynamicStorage::new(size, max_size, growth, factory)?;
        Ok(Self::from_storage(storage))
    }

    pub fn from_storage(storage: DynamicStorage) -> Self {
        Self {
            max_size: storage.max_size(),
            growth: storage.growth(),
            core: VmCore::new(storage),
            grow_lock: Mutex::new(()),
        }
    }

    pub fn max_size(&self) -> Size {
        self.max_size
    }

    pub fn growth(&self) -> Size {
        self.growth
    }

    pub fn sector_count(&self) -> usize {
        self.core.storage().read().sector_count()
    }

    pub fn table(&self) -> &dyn BlockTable {
        self.core.table()
    }

    /// Grow by one step if nobody else grew since `observed` was read
    ///
    /// Returns false when growth is refused.
    fn extend(&self, observed: Size) -> MemoryResult<bool> {
        let _guard = self.grow_lock.lock();

        if self.core.is_released() {
            return Ok(false);
        }

        let current = self.core.size();
        if current != observed {
            return Ok(true);
        }

        let new_size = current.saturating_add(self.growth).min(self.max_size);
        if !self.core.table().can_increase_size(new_size) {
            warn!(
                current,
                requested = new_size,
                max = self.max_size,
                "Growth refused"
            );
            return Ok(false);
        }

        self.core.storage().write().increase_size(new_size)?;
        self.core.table().increase_size(new_size)?;
        self.core.set_size(new_size);
        self.core.metrics().increment(METRIC_INCREASES);

        info!(from = current, to = new_size, max = self.max_size, "Grew virtual memory");
        Ok(true)
    }
}

impl VirtualMemory for DynamicVirtualMemory {
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
        loop {
            // Read before the attempt so a concurrent growth is never missed.
            let observed = self.core.size();
            if let Some(block) = self.core.try_allocate(length)? {
                return Ok(block);
            }
            if observed >= self.max_size || !self.extend(observed)? {
                break;
            }
        }
        Err(self.core.out_of_memory(length))
    }

    fn free_block(&self, block: Block) -> bool {
        self.core.free_block(block)
    }

    fn free(&self) {
        let _guard = self.grow_lock.lock();
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

impl std::fmt::Debug for DynamicVirtualMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DynamicVirtualMemory")
            .field("size", &self.core.size())
            .field("max_size", &self.max_size)
            .field("growth", &self.growth)
            .finish()
    }
}
