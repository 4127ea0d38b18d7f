/*!
 * Blocks
 * Address ranges and the table entries that hold them
 */

use crate::core::types::{Address, Size};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A claimed or free range `[address, address + size)`
///
/// Two blocks are equal only when both address and size match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Block {
    pub address: Address,
    pub size: Size,
}

impl Block {
    pub const fn new(address: Address, size: Size) -> Self {
        Self { address, size }
    }

    /// First address past the block
    #[inline]
    pub const fn end(&self) -> Address {
        self.address + self.size
    }

    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn overlaps(&self, other: &Block) -> bool {
        self.address < other.end() && other.address < self.end()
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "[0x{:x}, 0x{:x})", self.address, self.end())
    }
}

/// Stable, in-place mutable slot of a block list
///
/// The range only changes while the entry is claimed (or while the owning
/// list is held exclusively with the entry unclaimed).
#[derive(Debug)]
pub(super) struct TableEntry {
    claimed: AtomicBool,
    address: AtomicUsize,
    size: AtomicUsize,
}

impl TableEntry {
    pub fn new(block: Block) -> Arc<Self> {
        Arc::new(Self {
            claimed: AtomicBool::new(false),
            address: AtomicUsize::new(block.address),
            size: AtomicUsize::new(block.size),
        })
    }

    #[inline]
    pub fn block(&self) -> Block {
        Block {
            address: self.address.load(Ordering::Acquire),
            size: self.size.load(Ordering::Acquire),
        }
    }

    #[inline]
    pub fn set(&self, block: Block) {
        self.address.store(block.address, Ordering::Release);
        self.size.store(block.size, Ordering::Release);
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    /// Non-blocking claim; `None` when another thread holds it
    pub fn try_claim(self: &Arc<Self>) -> Option<Claim> {
        self.claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Relaxed)
            .ok()
            .map(|_| Claim {
                entry: Arc::clone(self),
            })
    }
}

/// Exclusive hold on a table entry, released on drop
#[derive(Debug)]
pub(super) struct Claim {
    entry: Arc<TableEntry>,
}

impl Claim {
    pub fn entry(&self) -> &Arc<TableEntry> {
        &self.entry
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.entry.claimed.store(false, Ordering::Release);
    }
}
