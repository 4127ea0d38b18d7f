/*!
 * Read-Only Space
 * Live read projection of another space
 */

use super::MemorySpace;
use crate::core::types::{Address, Size};
use crate::memory::traits::Space;
use crate::memory::types::{MemoryError, MemoryResult};
use std::io::{Read, Write};
use std::sync::Arc;

/// Forwards reads to the wrapped space; every mutator, `free()` included,
/// fails with `WriteNotAllowed`
#[derive(Clone)]
pub struct ReadOnlySpace {
    space: Arc<dyn Space>,
}

impl ReadOnlySpace {
    pub fn new(space: Arc<dyn Space>) -> Self {
        Self { space }
    }
}

impl Space for ReadOnlySpace {
    fn address(&self) -> Address {
        self.space.address()
    }

    fn size(&self) -> Size {
        self.space.size()
    }

    fn free(&self) -> MemoryResult<()> {
        Err(MemoryError::WriteNotAllowed)
    }

    fn write(&self, _data: &[u8]) -> MemoryResult<()> {
        Err(MemoryError::WriteNotAllowed)
    }

    fn write_at(&self, _data: &[u8], _offset: Address) -> MemoryResult<()> {
        Err(MemoryError::WriteNotAllowed)
    }

    fn read(&self, buf: &mut [u8]) -> MemoryResult<usize> {
        self.space.read(buf)
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        self.space.read_at(buf, offset)
    }

    fn reader(&self) -> MemoryResult<Box<dyn Read + '_>> {
        self.space.reader()
    }

    fn writer(&self) -> MemoryResult<Box<dyn Write + '_>> {
        Err(MemoryError::WriteNotAllowed)
    }

    fn dump(&self, out: &mut dyn Write) -> MemoryResult<()> {
        self.space.dump(out)
    }

    /// The copy is an ordinary writable space
    fn copy(&self) -> MemoryResult<MemorySpace> {
        self.space.copy()
    }

    fn read_only(&self) -> ReadOnlySpace {
        self.clone()
    }
}
