/*!
 * Storage Module
 * Raw byte containers behind a virtual memory
 */

mod dynamic;
mod heap;
mod mapped;

use super::types::{MemoryError, MemoryResult};
use crate::core::types::{Address, Size};

// Re-export for convenience
pub use dynamic::DynamicStorage;
pub use heap::{HeapStorage, HeapStorageFactory};
pub use mapped::{BackingFile, MappedStorage, MappedStorageFactory};

/// Check that `[offset, offset + length)` lies within `[0, size)`
#[inline]
pub(crate) fn check_range(offset: Address, length: Size, size: Size) -> MemoryResult<()> {
    match offset.checked_add(length) {
        Some(end) if end <= size => Ok(()),
        _ => Err(MemoryError::OutOfBounds {
            offset,
            length,
            size,
        }),
    }
}
