/*!
 * Space Module
 * Caller-facing handles over allocated blocks
 */

mod memory_space;
mod read_only;
mod transactional;

// Re-export for convenience
pub use memory_space::MemorySpace;
pub use read_only::ReadOnlySpace;
pub use transactional::{TransactionState, TransactionalSpace};
