/*!
 * Core Types
 * Common types used across the memory manager
 */

/// Address type for memory operations (logical offset into a virtual memory)
pub type Address = usize;

/// Size type for memory operations
pub type Size = usize;

/// One kilobyte
pub const KB: Size = 1024;

/// One megabyte
pub const MB: Size = 1024 * KB;

/// One gigabyte
pub const GB: Size = 1024 * MB;
