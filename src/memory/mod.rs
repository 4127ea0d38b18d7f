/*!
 * Memory Module
 * Storage, block tables, virtual memories and the spaces carved from them
 */

pub mod allocator;
pub mod block;
pub mod manager;
pub mod space;
pub mod storage;
pub mod table;
pub mod traits;
pub mod types;
pub mod vm;

// Re-export for convenience
pub use allocator::{DynamicMemoryAllocator, FileMemoryAllocator, FixedMemoryAllocator};
pub use block::MemoryBlock;
pub use manager::Memory;
pub use space::{MemorySpace, ReadOnlySpace, TransactionState, TransactionalSpace};
pub use table::{Block, LinkedBlockTable};
pub use traits::*;
pub use types::*;
