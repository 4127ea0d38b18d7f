/*!
 * Dynamic Storage
 * Growable storage composed of logically concatenated sectors
 *
 * Sector 0 holds the initial size. Every later sector is one growth step
 * long, except the last one which may be shorter when capped by the
 * maximum size. Growth appends a sector and never moves existing bytes.
 */

use super::check_range;
use crate::core::limits::SECTOR_BATCH;
use crate::core::types::{Address, Size};
use crate::memory::traits::{Storage, StorageFactory};
use crate::memory::types::{MemoryError, MemoryResult};
use std::sync::Arc;
use tracing::debug;

pub struct DynamicStorage {
    sectors: Vec<Box<dyn Storage>>,
    size: Size,
    initial: Size,
    growth: Size,
    max_size: Size,
    factory: Arc<dyn StorageFactory>,
}

impl DynamicStorage {
    /// Create a storage of `size` bytes growing by `growth` up to `max_size`
    ///
    /// A zero growth step is treated as one byte.
    pub fn new(
        size: Size,
        max_size: Size,
        growth: Size,
        factory: Arc<dyn StorageFactory>,
    ) -> MemoryResult<Self> {
        if max_size < size {
            return Err(MemoryError::InvalidGrowth {
                requested: max_size,
                current: size,
                used: 0,
            });
        }

        let mut sectors = Vec::with_capacity(SECTOR_BATCH);
        sectors.push(factory.create(0, size)?);

        Ok(Self {
            sectors,
            size,
            initial: size,
            growth: growth.max(1),
            max_size,
            factory,
        })
    }

    pub fn max_size(&self) -> Size {
        self.max_size
    }

    pub fn growth(&self) -> Size {
        self.growth
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    pub fn sector_sizes(&self) -> Vec<Size> {
        self.sectors.iter().map(|sector| sector.size()).collect()
    }

    /// Index of the sector holding `offset`, clamped to the last sector
    fn sector_index(&self, offset: Address) -> usize {
        let last = self.sectors.len().saturating_sub(1);
        if offset < self.initial {
            return 0;
        }
        ((offset - self.initial) / self.growth + 1).min(last)
    }

    /// Logical address of the first byte of sector `index`
    fn sector_start(&self, index: usize) -> Address {
        match index {
            0 => 0,
            1 => self.initial,
            n => self.initial + (n - 1) * self.growth,
        }
    }

    /// Append one sector so the storage spans `new_size` bytes
    pub fn increase_size(&mut self, new_size: Size) -> MemoryResult<()> {
        let refused = MemoryError::InvalidGrowth {
            requested: new_size,
            current: self.size,
            used: 0,
        };

        // A short sector may only ever be the last one.
        let aligned = self.sector_start(self.sectors.len()) == self.size;
        if new_size <= self.size
            || new_size > self.max_size
            || new_size - self.size > self.growth
            || !aligned
        {
            return Err(refused);
        }

        if self.sectors.len() == self.sectors.capacity() {
            self.sectors.reserve_exact(SECTOR_BATCH);
        }

        let sector = self.factory.create(self.size, new_size - self.size)?;
        self.sectors.push(sector);
        debug!(
            from = self.size,
            to = new_size,
            sectors = self.sectors.len(),
            "Appended storage sector"
        );
        self.size = new_size;
        Ok(())
    }

    /// Visit each `(sector, local offset, range in request)` spanned by a request
    fn for_each_span<F>(&self, offset: Address, length: Size, mut visit: F) -> MemoryResult<()>
    where
        F: FnMut(usize, Address, std::ops::Range<usize>) -> MemoryResult<()>,
    {
        check_range(offset, length, self.size)?;

        let mut done = 0;
        while done < length {
            let position = offset + done;
            let index = self.sector_index(position);
            let local = position - self.sector_start(index);
            let available = self.sectors[index].size().saturating_sub(local);
            if available == 0 {
                return Err(MemoryError::OutOfBounds {
                    offset,
                    length,
                    size: self.size,
                });
            }

            let count = available.min(length - done);
            visit(index, local, done..done + count)?;
            done += count;
        }
        Ok(())
    }
}

impl Storage for DynamicStorage {
    fn size(&self) -> Size {
        self.size
    }

    fn free(&mut self) {
        for sector in self.sectors.iter_mut() {
            sector.free();
        }
        self.sectors.clear();
        self.size = 0;
        self.initial = 0;
    }

    fn write_at(&mut self, data: &[u8], offset: Address) -> MemoryResult<()> {
        let mut spans = Vec::new();
        self.for_each_span(offset, data.len(), |index, local, range| {
            spans.push((index, local, range));
            Ok(())
        })?;

        for (index, local, range) in spans {
            self.sectors[index].write_at(&data[range], local)?;
        }
        Ok(())
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        let length = buf.len();
        self.for_each_span(offset, length, |index, local, range| {
            self.sectors[index].read_at(&mut buf[range], local).map(|_| ())
        })?;
        Ok(length)
    }

    fn flush(&mut self) -> MemoryResult<()> {
        for sector in self.sectors.iter_mut() {
            sector.flush()?;
        }
        Ok(())
    }
}
