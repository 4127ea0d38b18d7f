/*!
 * Memory Types
 * Errors and statistics shared by every memory layer
 */

use crate::core::types::Size;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Memory operation result
pub type MemoryResult<T> = Result<T, MemoryError>;

/// Memory errors
#[derive(Error, Debug, Diagnostic)]
pub enum MemoryError {
    #[error("Out of bounds: offset {offset} + length {length} exceeds size {size}")]
    #[diagnostic(
        code(memory::out_of_bounds),
        help("Offsets are relative to the block or storage being accessed. Check the requested range.")
    )]
    OutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },

    #[error("Invalid allocation size: {0}")]
    #[diagnostic(
        code(memory::invalid_size),
        help("Allocation sizes must be positive.")
    )]
    InvalidSize(Size),

    #[error("Out of memory: requested {requested} bytes, available {available} bytes ({used} used / {total} total)")]
    #[diagnostic(
        code(memory::out_of_memory),
        help("Free unused spaces or configure a larger maximum size, then retry.")
    )]
    OutOfMemory {
        requested: usize,
        available: usize,
        used: usize,
        total: usize,
    },

    #[error("Write not allowed: space is read-only")]
    #[diagnostic(
        code(memory::write_not_allowed),
        help("Read-only projections reject every mutator, including free().")
    )]
    WriteNotAllowed,

    #[error(transparent)]
    #[diagnostic(transparent)]
    Transaction(#[from] TransactionError),

    #[error("Invalid growth: requested {requested} bytes, current {current} bytes, used {used} bytes")]
    #[diagnostic(
        code(memory::invalid_growth),
        help("A memory only grows, never past its maximum size or by more than one growth step.")
    )]
    InvalidGrowth {
        requested: usize,
        current: usize,
        used: usize,
    },

    #[error("I/O error while {context}: {source}")]
    #[diagnostic(
        code(memory::io),
        help("The backing storage failed. Inspect the underlying cause.")
    )]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Codec error: {0}")]
    #[diagnostic(
        code(memory::codec),
        help("The stored bytes do not decode as the requested type.")
    )]
    Codec(String),

    #[error("Invalid configuration: {0}")]
    #[diagnostic(code(memory::config))]
    Config(String),
}

impl MemoryError {
    /// Wrap an I/O error, unwrapping memory errors that travelled through a stream
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        let carries_memory_error = source
            .get_ref()
            .map_or(false, |inner| inner.is::<MemoryError>());
        if !carries_memory_error {
            return MemoryError::Io {
                context: context.into(),
                source,
            };
        }

        let kind = source.kind();
        match source.into_inner().map(|inner| inner.downcast::<MemoryError>()) {
            Some(Ok(inner)) => *inner,
            Some(Err(other)) => MemoryError::Io {
                context: context.into(),
                source: std::io::Error::new(kind, other),
            },
            None => MemoryError::Io {
                context: context.into(),
                source: kind.into(),
            },
        }
    }

    /// Carry a memory error through an `io::Read`/`io::Write` boundary
    pub(crate) fn into_io(self) -> std::io::Error {
        std::io::Error::new(std::io::ErrorKind::Other, self)
    }

    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, MemoryError::OutOfMemory { .. })
    }

    pub fn is_write_not_allowed(&self) -> bool {
        matches!(self, MemoryError::WriteNotAllowed)
    }

    pub fn is_transaction(&self) -> bool {
        matches!(self, MemoryError::Transaction(_))
    }

    pub fn is_bounds_violation(&self) -> bool {
        matches!(
            self,
            MemoryError::OutOfBounds { .. } | MemoryError::InvalidSize(_)
        )
    }
}

/// Transaction protocol errors
#[derive(Error, Debug, Diagnostic)]
pub enum TransactionError {
    #[error("Transaction already started")]
    #[diagnostic(
        code(transaction::already_started),
        help("Commit or roll back the current transaction first.")
    )]
    AlreadyStarted,

    #[error("Transaction not started")]
    #[diagnostic(
        code(transaction::not_started),
        help("Call start() before commit() or rollback().")
    )]
    NotStarted,

    #[error("Failed to start transaction: {source}")]
    #[diagnostic(code(transaction::start_failed))]
    StartFailed {
        #[source]
        source: Box<MemoryError>,
    },

    #[error("Failed to commit transaction: {source}")]
    #[diagnostic(
        code(transaction::commit_failed),
        help("The transaction is still open. Retry commit() or call rollback().")
    )]
    CommitFailed {
        #[source]
        source: Box<MemoryError>,
    },
}

/// Memory statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryStatistic {
    pub used_size: u64,
    pub free_size: u64,
    pub used_blocks_count: u64,
    pub free_blocks_count: u64,
    pub total_allocations: u64,
    pub failed_allocations: u64,
    pub total_frees: u64,
    pub failed_frees: u64,
    pub fragmentation: u64,
}

impl MemoryStatistic {
    pub fn total_size(&self) -> u64 {
        self.used_size + self.free_size
    }

    pub fn success_allocations(&self) -> u64 {
        self.total_allocations.saturating_sub(self.failed_allocations)
    }

    pub fn success_allocations_percentage(&self) -> f64 {
        percent(self.success_allocations(), self.total_allocations)
    }

    pub fn failed_allocations_percentage(&self) -> f64 {
        percent(self.failed_allocations, self.total_allocations)
    }

    pub fn success_frees(&self) -> u64 {
        self.total_frees.saturating_sub(self.failed_frees)
    }

    pub fn success_frees_percentage(&self) -> f64 {
        percent(self.success_frees(), self.total_frees)
    }

    pub fn failed_frees_percentage(&self) -> f64 {
        percent(self.failed_frees, self.total_frees)
    }

    pub fn usage_percentage(&self) -> f64 {
        percent(self.used_size, self.total_size())
    }

    pub fn memory_pressure(&self) -> MemoryPressure {
        let usage = self.usage_percentage();
        if usage >= 95.0 {
            MemoryPressure::Critical
        } else if usage >= 80.0 {
            MemoryPressure::High
        } else if usage >= 60.0 {
            MemoryPressure::Medium
        } else {
            MemoryPressure::Low
        }
    }
}

/// Percentage rounded half-up to two digits; zero when either side is zero
fn percent(num: u64, total: u64) -> f64 {
    if num == 0 || total == 0 {
        return 0.0;
    }
    let value = num as f64 / total as f64 * 100.0;
    (value * 100.0).round() / 100.0
}

impl std::fmt::Display for MemoryStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "Memory statistic")?;
        writeln!(f, "  Used size:        {} bytes", self.used_size)?;
        writeln!(f, "  Free size:        {} bytes", self.free_size)?;
        writeln!(f, "  Used blocks:      {}", self.used_blocks_count)?;
        writeln!(f, "  Free blocks:      {}", self.free_blocks_count)?;
        writeln!(f, "  Fragmentation:    {}", self.fragmentation)?;
        writeln!(
            f,
            "  Allocations:      {} total, {} ok ({:.2}%), {} failed ({:.2}%)",
            self.total_allocations,
            self.success_allocations(),
            self.success_allocations_percentage(),
            self.failed_allocations,
            self.failed_allocations_percentage()
        )?;
        write!(
            f,
            "  Frees:            {} total, {} ok ({:.2}%), {} failed ({:.2}%)",
            self.total_frees,
            self.success_frees(),
            self.success_frees_percentage(),
            self.failed_frees,
            self.failed_frees_percentage()
        )
    }
}

/// Memory pressure levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemoryPressure {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for MemoryPressure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            MemoryPressure::Low => write!(f, "LOW"),
            MemoryPressure::Medium => write!(f, "MEDIUM"),
            MemoryPressure::High => write!(f, "HIGH"),
            MemoryPressure::Critical => write!(f, "CRITICAL"),
        }
    }
}
