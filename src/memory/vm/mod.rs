/*!
 * Virtual Memory Module
 * A storage and a block table presented as one address space
 */

mod dynamic;
mod fixed;
mod stream;

use super::table::{Block, LinkedBlockTable};
use super::traits::{BlockTable, FreeEventListener, Storage};
use super::types::{MemoryError, MemoryResult};
use crate::core::types::{Address, Size};
use crate::monitoring::{Metrics, MetricsSnapshot};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

// Re-export for convenience
pub use dynamic::DynamicVirtualMemory;
pub use fixed::FixedVirtualMemory;
pub use stream::{VmReader, VmWriter};

pub const METRIC_ALLOCATION_TIME: &str = "vm.allocation_time";
pub const METRIC_FREE_TIME: &str = "vm.free_time";
pub const METRIC_INCREASES: &str = "vm.increases";

/// State shared by the fixed and dynamic virtual memories
///
/// The storage lock is only held for the duration of one storage call.
pub(crate) struct VmCore<S: Storage> {
    storage: RwLock<S>,
    table: Box<dyn BlockTable>,
    size: AtomicUsize,
    released: AtomicBool,
    listener: Mutex<Option<Box<dyn FreeEventListener>>>,
    metrics: Metrics,
}

impl<S: Storage> VmCore<S> {
    pub fn new(storage: S) -> Self {
        let size = storage.size();
        Self::with_table(storage, Box::new(LinkedBlockTable::new(size)))
    }

    pub fn with_table(storage: S, table: Box<dyn BlockTable>) -> Self {
        Self {
            size: AtomicUsize::new(storage.size()),
            storage: RwLock::new(storage),
            table,
            released: AtomicBool::new(false),
            listener: Mutex::new(None),
            metrics: Metrics::new(),
        }
    }

    #[inline]
    pub fn size(&self) -> Size {
        self.size.load(Ordering::Acquire)
    }

    pub fn set_size(&self, size: Size) {
        self.size.store(size, Ordering::Release);
    }

    pub fn table(&self) -> &dyn BlockTable {
        self.table.as_ref()
    }

    pub fn storage(&self) -> &RwLock<S> {
        &self.storage
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Allocate from the table, timing the attempt
    pub fn try_allocate(&self, length: Size) -> MemoryResult<Option<Block>> {
        let start = Instant::now();
        let result = self.table.allocate(length);
        self.metrics
            .record_time(METRIC_ALLOCATION_TIME, start.elapsed());
        result
    }

    pub fn out_of_memory(&self, requested: Size) -> MemoryError {
        let error = MemoryError::OutOfMemory {
            requested,
            available: self.table.free_size(),
            used: self.table.used_size(),
            total: self.size(),
        };
        warn!("{}", error);
        error
    }

    pub fn free_block(&self, block: Block) -> bool {
        self.metrics
            .time(METRIC_FREE_TIME, || self.table.free(block))
    }

    pub fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()> {
        self.storage.write().write_at(data, offset)
    }

    pub fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        self.storage.read().read_at(buf, offset)
    }

    /// Release storage and table, then run the listener once
    pub fn free(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            debug!("Virtual memory already released");
            return;
        }

        let previous = self.size();
        {
            let mut storage = self.storage.write();
            if let Err(e) = storage.flush() {
                warn!(error = %e, "Failed to flush storage before release");
            }
            storage.free();
        }
        self.table.reset(0);
        self.set_size(0);
        info!(size = previous, "Released virtual memory");

        let listener = self.listener.lock().take();
        if let Some(listener) = listener {
            listener.on_free();
        }
    }

    pub fn set_free_listener(&self, listener: Box<dyn FreeEventListener>) {
        *self.listener.lock() = Some(listener);
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot().merge(self.table.metrics_snapshot())
    }
}
