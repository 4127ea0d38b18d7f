/*!
 * Block Table Module
 * First-fit block allocation over a logical address range
 */

mod block;
mod linked;

// Re-export for convenience
pub use block::Block;
pub use linked::{
    LinkedBlockTable, METRIC_ALLOCATIONS, METRIC_CLAIM_RETRIES, METRIC_FAILED_ALLOCATIONS,
    METRIC_FAILED_FREES, METRIC_FRAGMENTATION, METRIC_FREES, METRIC_FREE_BLOCKS,
    METRIC_FREE_SIZE, METRIC_INCREASES, METRIC_USED_BLOCKS, METRIC_USED_SIZE,
};
