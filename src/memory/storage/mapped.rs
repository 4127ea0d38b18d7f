/*!
 * Mapped Storage
 * Storage over a memory-mapped file region
 *
 * Bytes land verbatim at their logical address in the file. No header or
 * allocator metadata is written, so reopening a file replays its content
 * but not its allocations.
 */

use super::check_range;
use crate::core::types::{Address, Size};
use crate::memory::traits::{Storage, StorageFactory};
use crate::memory::types::{MemoryError, MemoryResult};
use memmap::{MmapMut, MmapOptions};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Storage over `[begin, begin + size)` of a file
pub struct MappedStorage {
    map: Option<MmapMut>,
}

impl MappedStorage {
    /// Map a region of `file`, extending the file when it is too short
    pub fn map(file: &File, begin: Address, size: Size) -> MemoryResult<Self> {
        if size == 0 {
            return Ok(Self { map: None });
        }

        let end = (begin + size) as u64;
        let len = file
            .metadata()
            .map_err(|e| MemoryError::io("reading backing file metadata", e))?
            .len();
        if len < end {
            file.set_len(end)
                .map_err(|e| MemoryError::io("extending backing file", e))?;
        }

        // SAFETY: the region is owned by this storage alone and the file is
        // opened read-write and sized to cover it.
        let map = unsafe {
            MmapOptions::new()
                .offset(begin as u64)
                .len(size)
                .map_mut(file)
        }
        .map_err(|e| MemoryError::io("mapping backing file", e))?;

        debug!(begin, size, "Mapped file region");
        Ok(Self { map: Some(map) })
    }
}

impl Storage for MappedStorage {
    fn size(&self) -> Size {
        self.map.as_ref().map_or(0, |map| map.len())
    }

    fn free(&mut self) {
        if let Some(map) = self.map.take() {
            if let Err(e) = map.flush() {
                warn!(error = %e, "Failed to flush mapped region on free");
            }
        }
    }

    fn write_at(&mut self, data: &[u8], offset: Address) -> MemoryResult<()> {
        check_range(offset, data.len(), self.size())?;
        if let Some(map) = self.map.as_mut() {
            map[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        check_range(offset, buf.len(), self.size())?;
        if let Some(map) = self.map.as_ref() {
            buf.copy_from_slice(&map[offset..offset + buf.len()]);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> MemoryResult<()> {
        match self.map.as_ref() {
            Some(map) => map
                .flush()
                .map_err(|e| MemoryError::io("flushing mapped region", e)),
            None => Ok(()),
        }
    }
}

/// Shared handle on the file behind a file-backed memory
///
/// Closing it drops the descriptor; later mappings fail.
#[derive(Debug, Clone)]
pub struct BackingFile {
    file: Arc<Mutex<Option<File>>>,
    path: PathBuf,
}

impl BackingFile {
    /// Open `path` read-write, creating it when missing
    pub fn open(path: impl AsRef<Path>) -> MemoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| MemoryError::io(format!("opening {}", path.display()), e))?;

        Ok(Self {
            file: Arc::new(Mutex::new(Some(file))),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Map `[begin, begin + size)` of the file
    pub fn map(&self, begin: Address, size: Size) -> MemoryResult<MappedStorage> {
        let guard = self.file.lock();
        let file = guard.as_ref().ok_or_else(|| {
            MemoryError::io(
                format!("mapping {}", self.path.display()),
                io::Error::new(io::ErrorKind::NotConnected, "backing file is closed"),
            )
        })?;
        MappedStorage::map(file, begin, size)
    }

    /// Sync and drop the descriptor
    pub fn close(&self) -> MemoryResult<()> {
        match self.file.lock().take() {
            Some(file) => file
                .sync_all()
                .map_err(|e| MemoryError::io(format!("closing {}", self.path.display()), e)),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.file.lock().is_none()
    }
}

/// Sector factory mapping consecutive regions of one file
#[derive(Debug, Clone)]
pub struct MappedStorageFactory {
    file: BackingFile,
}

impl MappedStorageFactory {
    pub fn new(file: BackingFile) -> Self {
        Self { file }
    }
}

impl StorageFactory for MappedStorageFactory {
    fn create(&self, begin: Address, size: Size) -> MemoryResult<Box<dyn Storage>> {
        Ok(Box::new(self.file.map(begin, size)?))
    }
}
