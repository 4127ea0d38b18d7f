/*!
 * Memory Manager
 * Caller-facing memory: allocates spaces and reports statistics
 */

use super::block::MemoryBlock;
use super::space::MemorySpace;
use super::table::{
    METRIC_ALLOCATIONS, METRIC_FAILED_ALLOCATIONS, METRIC_FAILED_FREES, METRIC_FRAGMENTATION,
    METRIC_FREES, METRIC_FREE_BLOCKS, METRIC_FREE_SIZE, METRIC_USED_BLOCKS, METRIC_USED_SIZE,
};
use super::traits::{SpaceOwner, VirtualMemory};
use super::types::{MemoryResult, MemoryStatistic};
use crate::core::types::Size;
use crate::monitoring::{Metrics, MetricsSnapshot};
use std::sync::Arc;
use tracing::debug;

pub const METRIC_SPACES: &str = "memory.spaces";

struct MemoryInner {
    vm: Arc<dyn VirtualMemory>,
    metrics: Metrics,
}

impl SpaceOwner for MemoryInner {
    fn allocate_space(self: Arc<Self>, length: Size) -> MemoryResult<MemorySpace> {
        let block = self.vm.allocate(length)?;
        self.metrics.increment(METRIC_SPACES);
        debug!(block = %block, "Allocated space");

        let vm = Arc::clone(&self.vm);
        Ok(MemorySpace::new(MemoryBlock::new(vm, block), self))
    }

    fn release(&self, block: &MemoryBlock) -> bool {
        let freed = self.vm.free_block(block.block());
        if freed {
            self.metrics.decrement(METRIC_SPACES);
        }
        freed
    }
}

/// Memory handle; clones share one virtual memory
#[derive(Clone)]
pub struct Memory {
    inner: Arc<MemoryInner>,
}

impl Memory {
    pub fn new(vm: Arc<dyn VirtualMemory>) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                vm,
                metrics: Metrics::new(),
            }),
        }
    }

    /// Allocate a space of `length` bytes
    ///
    /// Fails with `OutOfMemory` when nothing fits, after growth on dynamic
    /// memories.
    pub fn allocate(&self, length: Size) -> MemoryResult<MemorySpace> {
        Arc::clone(&self.inner).allocate_space(length)
    }

    /// Release the whole memory; outstanding spaces become unusable
    pub fn free(&self) {
        self.inner.vm.free();
    }

    pub fn size(&self) -> Size {
        self.inner.vm.size()
    }

    pub fn free_size(&self) -> Size {
        self.inner.vm.free_size()
    }

    pub fn used_size(&self) -> Size {
        self.inner.vm.used_size()
    }

    pub fn virtual_memory(&self) -> &Arc<dyn VirtualMemory> {
        &self.inner.vm
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.inner
            .metrics
            .snapshot()
            .merge(self.inner.vm.metrics_snapshot())
    }

    pub fn statistic(&self) -> MemoryStatistic {
        let snapshot = self.metrics_snapshot();
        let value = |name: &str| snapshot.value(name).max(0) as u64;

        MemoryStatistic {
            used_size: value(METRIC_USED_SIZE),
            free_size: value(METRIC_FREE_SIZE),
            used_blocks_count: value(METRIC_USED_BLOCKS),
            free_blocks_count: value(METRIC_FREE_BLOCKS),
            total_allocations: value(METRIC_ALLOCATIONS),
            failed_allocations: value(METRIC_FAILED_ALLOCATIONS),
            total_frees: value(METRIC_FREES),
            failed_frees: value(METRIC_FAILED_FREES),
            fragmentation: value(METRIC_FRAGMENTATION),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Memory")
            .field("size", &self.size())
            .field("free_size", &self.free_size())
            .field("used_size", &self.used_size())
            .finish()
    }
}
