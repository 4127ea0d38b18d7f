/*!
 * AI-OS Virtual Memory Library
 * In-process memory manager: allocate, read, write and free byte regions
 */

pub mod core;
pub mod memory;
pub mod monitoring;

// Re-exports
pub use crate::core::{BincodeCodec, Codec, JsonCodec, MemoryConfig, MemoryKind};
pub use memory::{
    Block, DynamicMemoryAllocator, FileMemoryAllocator, FixedMemoryAllocator, Memory,
    MemoryError, MemoryResult, MemorySpace, MemoryStatistic, ReadOnlySpace, Space,
    TransactionError, TransactionalSpace,
};
pub use monitoring::{init_tracing, Metrics, MetricsSnapshot};
