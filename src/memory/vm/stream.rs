/*!
 * Virtual Memory Streams
 * `io::Read`/`io::Write` views over a window of a virtual memory
 */

use crate::core::types::{Address, Size};
use crate::memory::storage::check_range;
use crate::memory::traits::VirtualMemory;
use crate::memory::types::MemoryResult;
use std::io;

/// Reader over `[offset, offset + length)`
pub struct VmReader<'a> {
    vm: &'a dyn VirtualMemory,
    position: Address,
    end: Address,
}

impl<'a> VmReader<'a> {
    /// The window is checked against the current size here, once
    pub fn new(vm: &'a dyn VirtualMemory, offset: Address, length: Size) -> MemoryResult<Self> {
        check_range(offset, length, vm.size())?;
        Ok(Self {
            vm,
            position: offset,
            end: offset + length,
        })
    }

    pub fn remaining(&self) -> Size {
        self.end - self.position
    }
}

impl io::Read for VmReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.remaining());
        if count == 0 {
            return Ok(0);
        }
        self.vm
            .read_at(&mut buf[..count], self.position)
            .map_err(|e| e.into_io())?;
        self.position += count;
        Ok(count)
    }
}

/// Writer over `[offset, offset + length)`
///
/// Writing past the window fails with `WriteZero`.
pub struct VmWriter<'a> {
    vm: &'a dyn VirtualMemory,
    position: Address,
    end: Address,
}

impl<'a> VmWriter<'a> {
    pub fn new(vm: &'a dyn VirtualMemory, offset: Address, length: Size) -> MemoryResult<Self> {
        check_range(offset, length, vm.size())?;
        Ok(Self {
            vm,
            position: offset,
            end: offset + length,
        })
    }

    pub fn remaining(&self) -> Size {
        self.end - self.position
    }
}

impl io::Write for VmWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(self.remaining());
        if count == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "stream is ended"));
        }
        self.vm
            .write_at(&buf[..count], self.position)
            .map_err(|e| e.into_io())?;
        self.position += count;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl dyn VirtualMemory {
    /// Reader over the whole memory
    pub fn reader(&self) -> VmReader<'_> {
        VmReader {
            vm: self,
            position: 0,
            end: self.size(),
        }
    }

    pub fn reader_at(&self, offset: Address, length: Size) -> MemoryResult<VmReader<'_>> {
        VmReader::new(self, offset, length)
    }

    /// Writer over the whole memory
    pub fn writer(&self) -> VmWriter<'_> {
        VmWriter {
            vm: self,
            position: 0,
            end: self.size(),
        }
    }

    pub fn writer_at(&self, offset: Address, length: Size) -> MemoryResult<VmWriter<'_>> {
        VmWriter::new(self, offset, length)
    }
}
