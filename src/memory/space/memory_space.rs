/*!
 * Memory Space
 * Space over a block, freed through the memory that allocated it
 */

use super::{ReadOnlySpace, TransactionalSpace};
use crate::core::types::{Address, Size};
use crate::memory::block::MemoryBlock;
use crate::memory::traits::{Space, SpaceOwner};
use crate::memory::types::MemoryResult;
use std::io::{Read, Write};
use std::sync::Arc;
use tracing::{debug, error};

/// Clonable handle; clones share the same block
#[derive(Clone)]
pub struct MemorySpace {
    block: Arc<MemoryBlock>,
    owner: Arc<dyn SpaceOwner>,
}

impl MemorySpace {
    pub fn new(block: MemoryBlock, owner: Arc<dyn SpaceOwner>) -> Self {
        Self {
            block: Arc::new(block),
            owner,
        }
    }

    pub fn block(&self) -> &MemoryBlock {
        &self.block
    }

    pub fn is_freed(&self) -> bool {
        self.block.is_detached()
    }

    /// Wrap this space for copy-on-write transactions
    pub fn transactional(&self) -> TransactionalSpace {
        TransactionalSpace::new(self.clone())
    }

    /// Give the block back to its owner; false if already freed or unknown
    pub(crate) fn release(&self) -> bool {
        if !self.block.detach() {
            return false;
        }
        self.owner.release(&self.block)
    }
}

impl Space for MemorySpace {
    fn address(&self) -> Address {
        self.block.address()
    }

    fn size(&self) -> Size {
        self.block.size()
    }

    fn free(&self) -> MemoryResult<()> {
        let block = self.block.block();
        if !self.release() {
            debug!(block = %block, "Space was already freed");
        }
        Ok(())
    }

    fn write(&self, data: &[u8]) -> MemoryResult<()> {
        self.block.write(data)
    }

    fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()> {
        self.block.write_at(data, offset)
    }

    fn read(&self, buf: &mut [u8]) -> MemoryResult<usize> {
        self.block.read(buf)
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        self.block.read_at(buf, offset)
    }

    fn reader(&self) -> MemoryResult<Box<dyn Read + '_>> {
        Ok(Box::new(self.block.reader()?))
    }

    fn writer(&self) -> MemoryResult<Box<dyn Write + '_>> {
        Ok(Box::new(self.block.writer()?))
    }

    fn dump(&self, out: &mut dyn Write) -> MemoryResult<()> {
        self.block.dump(out)
    }

    fn copy(&self) -> MemoryResult<MemorySpace> {
        let copy = Arc::clone(&self.owner).allocate_space(self.size())?;

        let outcome = copy
            .block
            .writer()
            .and_then(|mut writer| self.block.dump(&mut writer));

        if let Err(e) = outcome {
            error!(error = %e, block = %self.block.block(), "Copy failed, freeing partial copy");
            copy.release();
            return Err(e);
        }
        Ok(copy)
    }

    fn read_only(&self) -> ReadOnlySpace {
        ReadOnlySpace::new(Arc::new(self.clone()))
    }
}

impl std::fmt::Debug for MemorySpace {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("MemorySpace")
            .field("block", &self.block)
            .finish()
    }
}
