/*!
 * Limits and Constants
 *
 * Centralized location for the tunables used by storage, tables and spaces.
 */

use super::types::{Size, KB};

// =============================================================================
// STORAGE LIMITS
// =============================================================================

/// Sector index batch (32 sectors)
/// The sector array of a dynamic storage grows by this many slots at once
pub const SECTOR_BATCH: usize = 32;

/// Dump chunk size (8KB)
/// Upper bound of the temporary buffer used when dumping a block
/// [PERF] Large blocks never need an equally large buffer
pub const DUMP_CHUNK_SIZE: Size = 8 * KB;

// =============================================================================
// TABLE LIMITS
// =============================================================================

/// Claim retry factor
/// A contended scan restarts at most `free_entries * CLAIM_RETRY_FACTOR` times
pub const CLAIM_RETRY_FACTOR: usize = 16;

/// Minimum claim retry budget, used when the free list is tiny
pub const MIN_CLAIM_RETRIES: usize = 64;

// =============================================================================
// CONFIGURATION DEFAULTS
// =============================================================================

/// Default memory size used by presets (20KB)
pub const DEFAULT_MEMORY_SIZE: Size = 20 * KB;

/// Default maximum size for dynamic presets (40KB)
pub const DEFAULT_MAX_MEMORY_SIZE: Size = 40 * KB;

/// Default growth step for dynamic presets (5KB)
pub const DEFAULT_GROWTH_STEP: Size = 5 * KB;
