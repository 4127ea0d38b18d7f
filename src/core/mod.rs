/*!
 * Core Module
 * Fundamental types, limits, codecs and configuration
 */

pub mod codec;
pub mod config;
pub mod limits;
pub mod types;

// Re-export for convenience
pub use codec::{BincodeCodec, Codec, JsonCodec};
pub use config::{MemoryConfig, MemoryKind};
pub use types::*;
