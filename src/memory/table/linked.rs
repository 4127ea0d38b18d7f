/*!
 * Linked Block Table
 * First-fit free list and used list with per-entry claims
 *
 * Lock discipline:
 * - list structure sits behind a read/write lock per list; scans take the
 *   read side, insertion and removal take the write side
 * - a candidate entry is claimed with a non-blocking CAS before it is
 *   carved, so racing allocations resolve to exactly one winner
 * - the two list locks are never held at the same time, except by reset
 * - a contended claim restarts the scan, bounded by the list length
 */

use super::block::{Block, Claim, TableEntry};
use crate::core::limits::{CLAIM_RETRY_FACTOR, MIN_CLAIM_RETRIES};
use crate::core::types::Size;
use crate::memory::traits::BlockTable;
use crate::memory::types::{MemoryError, MemoryResult};
use crate::monitoring::{Metrics, MetricsSnapshot};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

pub const METRIC_ALLOCATIONS: &str = "table.allocations";
pub const METRIC_FAILED_ALLOCATIONS: &str = "table.failed_allocations";
pub const METRIC_FREES: &str = "table.frees";
pub const METRIC_FAILED_FREES: &str = "table.failed_frees";
pub const METRIC_INCREASES: &str = "table.increases";
pub const METRIC_CLAIM_RETRIES: &str = "table.claim_retries";
pub const METRIC_FRAGMENTATION: &str = "table.fragmentation";
pub const METRIC_FREE_SIZE: &str = "table.free_size";
pub const METRIC_USED_SIZE: &str = "table.used_size";
pub const METRIC_FREE_BLOCKS: &str = "table.free_blocks";
pub const METRIC_USED_BLOCKS: &str = "table.used_blocks";

/// Result of one scan over the free list
enum Scan {
    /// Entry claimed and already carved; the used block was cut from its head
    Carved(Block),
    /// Entry claimed whose whole range becomes the used block
    Exact(Claim),
    /// A candidate was held by another thread
    Contended,
    NoFit,
}

/// Result of one merge attempt while inserting a free range
enum Merge {
    Done,
    Contended,
}

pub struct LinkedBlockTable {
    free: RwLock<VecDeque<Arc<TableEntry>>>,
    used: RwLock<VecDeque<Arc<TableEntry>>>,
    size: AtomicUsize,
    free_size: AtomicUsize,
    used_size: AtomicUsize,
    metrics: Metrics,
}

impl LinkedBlockTable {
    /// Table over `[0, size)`, entirely free
    pub fn new(size: Size) -> Self {
        Self {
            free: RwLock::new(VecDeque::from([TableEntry::new(Block::new(0, size))])),
            used: RwLock::new(VecDeque::new()),
            size: AtomicUsize::new(size),
            free_size: AtomicUsize::new(size),
            used_size: AtomicUsize::new(0),
            metrics: Metrics::new(),
        }
    }

    pub fn free_blocks_count(&self) -> usize {
        self.free.read().len()
    }

    pub fn used_blocks_count(&self) -> usize {
        self.used.read().len()
    }

    /// Free entries beyond the single-entry ideal
    pub fn fragmentation(&self) -> usize {
        self.free_blocks_count().saturating_sub(1)
    }

    fn retry_budget(entries: usize) -> usize {
        (entries.max(1) * CLAIM_RETRY_FACTOR).max(MIN_CLAIM_RETRIES)
    }

    /// Scan front to back for the first fitting entry
    ///
    /// With `skip_contended` a held candidate is passed over instead of
    /// aborting the scan.
    fn scan_free(&self, size: Size, skip_contended: bool) -> Scan {
        let free = self.free.read();
        let mut contended = false;

        for entry in free.iter() {
            if entry.block().size < size {
                continue;
            }

            let claim = match entry.try_claim() {
                Some(claim) => claim,
                None if skip_contended => {
                    contended = true;
                    continue;
                }
                None => return Scan::Contended,
            };

            // The range may have changed between the size probe and the claim.
            let block = claim.entry().block();
            if block.size < size {
                continue;
            }

            if block.size == size {
                return Scan::Exact(claim);
            }

            claim
                .entry()
                .set(Block::new(block.address + size, block.size - size));
            return Scan::Carved(Block::new(block.address, size));
        }

        if contended {
            Scan::Contended
        } else {
            Scan::NoFit
        }
    }

    /// Find a used entry equal to `block`, claim it and unlink it
    fn take_used(&self, block: Block) -> Option<Claim> {
        let budget = Self::retry_budget(self.used_blocks_count());
        let mut retries = 0;

        loop {
            let claim = {
                let used = self.used.read();
                let entry = used.iter().find(|entry| entry.block() == block)?;
                entry.try_claim()
            };

            match claim {
                Some(claim) => {
                    let mut used = self.used.write();
                    let position = used
                        .iter()
                        .position(|entry| Arc::ptr_eq(entry, claim.entry()))?;
                    used.remove(position);
                    return Some(claim);
                }
                None => {
                    // Another free of the same block is in flight.
                    retries += 1;
                    self.metrics.increment(METRIC_CLAIM_RETRIES);
                    if retries > budget {
                        return None;
                    }
                    std::thread::yield_now();
                }
            }
        }
    }

    /// Insert a free range, merging it with its free neighbours
    ///
    /// Up to three ranges become one: the tail ending where `block` starts,
    /// `block` itself and the head starting where `block` ends.
    fn insert_free(&self, block: Block) {
        let budget = Self::retry_budget(self.free_blocks_count());

        for _ in 0..budget {
            match self.try_merge(block) {
                Merge::Done => return,
                Merge::Contended => {
                    self.metrics.increment(METRIC_CLAIM_RETRIES);
                    std::thread::yield_now();
                }
            }
        }

        warn!(
            block = %block,
            "Neighbour claims stayed contended, inserting free block without merge"
        );
        self.free.write().push_front(TableEntry::new(block));
    }

    fn try_merge(&self, block: Block) -> Merge {
        let mut free = self.free.write();
        // An empty placeholder left by reset(0) gives way to real ranges.
        free.retain(|entry| entry.is_claimed() || !entry.block().is_empty());

        let tail = free
            .iter()
            .position(|entry| entry.block().end() == block.address);
        let head = free
            .iter()
            .position(|entry| entry.block().address == block.end());

        // Claimed entries under the write lock are exact allocations waiting
        // to be unlinked; they are no longer free.
        let tail_claim = match tail.map(|index| free[index].try_claim()) {
            Some(None) => return Merge::Contended,
            Some(Some(claim)) => Some(claim),
            None => None,
        };
        let head_claim = match head.map(|index| free[index].try_claim()) {
            Some(None) => return Merge::Contended,
            Some(Some(claim)) => Some(claim),
            None => None,
        };

        match (tail_claim, head_claim) {
            (Some(tail), Some(head)) => {
                let low = tail.entry().block();
                let high = head.entry().block();
                tail.entry()
                    .set(Block::new(low.address, low.size + block.size + high.size));
                free.retain(|entry| !Arc::ptr_eq(entry, head.entry()));
            }
            (Some(tail), None) => {
                let low = tail.entry().block();
                tail.entry()
                    .set(Block::new(low.address, low.size + block.size));
            }
            (None, Some(head)) => {
                let high = head.entry().block();
                head.entry()
                    .set(Block::new(block.address, block.size + high.size));
            }
            (None, None) => {
                free.push_front(TableEntry::new(block));
            }
        }
        Merge::Done
    }
}

impl BlockTable for LinkedBlockTable {
    fn allocate(&self, size: Size) -> MemoryResult<Option<Block>> {
        if size == 0 {
            return Err(MemoryError::InvalidSize(size));
        }

        let budget = Self::retry_budget(self.free_blocks_count());
        let mut retries = 0;

        loop {
            let skip_contended = retries >= budget;
            match self.scan_free(size, skip_contended) {
                Scan::Carved(block) => {
                    self.used.write().push_front(TableEntry::new(block));
                    self.account_allocation(block);
                    return Ok(Some(block));
                }
                Scan::Exact(claim) => {
                    let entry = Arc::clone(claim.entry());
                    self.free.write().retain(|e| !Arc::ptr_eq(e, &entry));
                    let block = entry.block();
                    self.used.write().push_front(entry);
                    drop(claim);
                    self.account_allocation(block);
                    return Ok(Some(block));
                }
                Scan::Contended if !skip_contended => {
                    retries += 1;
                    self.metrics.increment(METRIC_CLAIM_RETRIES);
                    std::thread::yield_now();
                }
                Scan::Contended | Scan::NoFit => {
                    self.metrics.increment(METRIC_ALLOCATIONS);
                    self.metrics.increment(METRIC_FAILED_ALLOCATIONS);
                    debug!(size, free = self.free_size(), "No free block fits");
                    return Ok(None);
                }
            }
        }
    }

    fn free(&self, block: Block) -> bool {
        let claim = match self.take_used(block) {
            Some(claim) => claim,
            None => {
                self.metrics.increment(METRIC_FREES);
                self.metrics.increment(METRIC_FAILED_FREES);
                debug!(block = %block, "Free of unknown block");
                return false;
            }
        };

        self.used_size.fetch_sub(block.size, Ordering::AcqRel);
        self.insert_free(block);
        self.free_size.fetch_add(block.size, Ordering::AcqRel);
        drop(claim);

        self.metrics.increment(METRIC_FREES);
        debug!(block = %block, "Freed block");
        true
    }

    fn free_size(&self) -> Size {
        self.free_size.load(Ordering::Acquire)
    }

    fn used_size(&self) -> Size {
        self.used_size.load(Ordering::Acquire)
    }

    fn size(&self) -> Size {
        self.size.load(Ordering::Acquire)
    }

    fn can_increase_size(&self, new_size: Size) -> bool {
        new_size > self.size() && new_size >= self.used_size()
    }

    fn increase_size(&self, new_size: Size) -> MemoryResult<()> {
        let current = self.size();
        if !self.can_increase_size(new_size) {
            return Err(MemoryError::InvalidGrowth {
                requested: new_size,
                current,
                used: self.used_size(),
            });
        }

        let extra = Block::new(current, new_size - current);
        self.insert_free(extra);
        self.free_size.fetch_add(extra.size, Ordering::AcqRel);
        self.size.store(new_size, Ordering::Release);
        self.metrics.increment(METRIC_INCREASES);
        debug!(from = current, to = new_size, "Table size increased");
        Ok(())
    }

    fn reset(&self, size: Size) {
        let mut free = self.free.write();
        let mut used = self.used.write();

        free.clear();
        used.clear();
        free.push_back(TableEntry::new(Block::new(0, size)));

        self.size.store(size, Ordering::Release);
        self.free_size.store(size, Ordering::Release);
        self.used_size.store(0, Ordering::Release);
        self.metrics.reset();
    }

    fn free_blocks(&self) -> Vec<Block> {
        self.free.read().iter().map(|entry| entry.block()).collect()
    }

    fn used_blocks(&self) -> Vec<Block> {
        self.used.read().iter().map(|entry| entry.block()).collect()
    }

    /// Merge address-adjacent free entries, keeping the survivors' order
    fn coalesce(&self) -> usize {
        let mut free = self.free.write();
        if free.len() < 2 {
            return 0;
        }

        // Claims keep concurrent scanners away from the entries being merged.
        let claims: Vec<Claim> = free.iter().filter_map(|entry| entry.try_claim()).collect();
        let mut sorted: Vec<&Claim> = claims.iter().collect();
        sorted.sort_by_key(|claim| claim.entry().block().address);

        let mut merged: Vec<Arc<TableEntry>> = Vec::new();
        let mut current: Option<&Claim> = None;
        for claim in sorted {
            let block = claim.entry().block();
            match current {
                Some(run) if run.entry().block().end() == block.address => {
                    let low = run.entry().block();
                    run.entry().set(Block::new(low.address, low.size + block.size));
                    merged.push(Arc::clone(claim.entry()));
                }
                _ => current = Some(claim),
            }
        }

        free.retain(|entry| !merged.iter().any(|gone| Arc::ptr_eq(gone, entry)));
        drop(claims);

        if !merged.is_empty() {
            debug!(merges = merged.len(), remaining = free.len(), "Coalesced free blocks");
        }
        merged.len()
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        let free_blocks = self.free_blocks_count() as i64;
        self.metrics
            .snapshot()
            .with(METRIC_FRAGMENTATION, (free_blocks - 1).max(0))
            .with(METRIC_FREE_SIZE, self.free_size() as i64)
            .with(METRIC_USED_SIZE, self.used_size() as i64)
            .with(METRIC_FREE_BLOCKS, free_blocks)
            .with(METRIC_USED_BLOCKS, self.used_blocks_count() as i64)
    }
}

impl LinkedBlockTable {
    fn account_allocation(&self, block: Block) {
        self.used_size.fetch_add(block.size, Ordering::AcqRel);
        self.free_size.fetch_sub(block.size, Ordering::AcqRel);
        self.metrics.increment(METRIC_ALLOCATIONS);
        debug!(block = %block, "Allocated block");
    }
}

impl std::fmt::Debug for LinkedBlockTable {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LinkedBlockTable")
            .field("size", &self.size())
            .field("free_size", &self.free_size())
            .field("used_size", &self.used_size())
            .field("free", &self.free_blocks())
            .field("used", &self.used_blocks())
            .finish()
    }
}
