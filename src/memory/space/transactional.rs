/*!
 * Transactional Space
 * Copy-on-write transactions over a space
 *
 * start() copies the base into a private shadow allocated from the same
 * memory. While started, every read and write hits the shadow and the base
 * stays untouched. commit() dumps the shadow over the base; rollback()
 * drops it. Either way the shadow is freed and the base becomes current
 * again. Wrappers created separately over one base never share a shadow.
 */

use super::{MemorySpace, ReadOnlySpace};
use crate::core::types::{Address, Size};
use crate::memory::traits::Space;
use crate::memory::types::{MemoryError, MemoryResult, TransactionError};
use arc_swap::ArcSwapOption;
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Transaction lifecycle: `None -> Starting -> Started -> Ending -> None`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionState {
    None = 0,
    Starting = 1,
    Started = 2,
    Ending = 3,
}

impl TransactionState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => TransactionState::Starting,
            2 => TransactionState::Started,
            3 => TransactionState::Ending,
            _ => TransactionState::None,
        }
    }
}

struct TransactionInner {
    base: MemorySpace,
    shadow: ArcSwapOption<MemorySpace>,
    state: AtomicU8,
}

/// Clones share one transaction; `new` over the same base starts an
/// independent one
#[derive(Clone)]
pub struct TransactionalSpace {
    inner: Arc<TransactionInner>,
}

impl TransactionalSpace {
    pub fn new(base: MemorySpace) -> Self {
        Self {
            inner: Arc::new(TransactionInner {
                base,
                shadow: ArcSwapOption::empty(),
                state: AtomicU8::new(TransactionState::None as u8),
            }),
        }
    }

    pub fn base(&self) -> &MemorySpace {
        &self.inner.base
    }

    pub fn state(&self) -> TransactionState {
        TransactionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_started(&self) -> bool {
        self.state() == TransactionState::Started
    }

    fn transition(&self, from: TransactionState, to: TransactionState) -> bool {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set_state(&self, state: TransactionState) {
        self.inner.state.store(state as u8, Ordering::Release);
    }

    /// The shadow while started, the base otherwise
    fn current(&self) -> MemorySpace {
        match self.inner.shadow.load_full() {
            Some(shadow) => MemorySpace::clone(&shadow),
            None => self.inner.base.clone(),
        }
    }

    /// Open a transaction by copying the base into a fresh shadow
    pub fn start(&self) -> MemoryResult<()> {
        if !self.transition(TransactionState::None, TransactionState::Starting) {
            return Err(TransactionError::AlreadyStarted.into());
        }

        match self.inner.base.copy() {
            Ok(shadow) => {
                debug!(
                    base = %self.inner.base.block().block(),
                    shadow = %shadow.block().block(),
                    "Transaction started"
                );
                self.inner.shadow.store(Some(Arc::new(shadow)));
                self.set_state(TransactionState::Started);
                Ok(())
            }
            Err(e) => {
                self.inner.shadow.store(None);
                self.set_state(TransactionState::None);
                warn!(error = %e, "Failed to start transaction");
                Err(TransactionError::StartFailed {
                    source: Box::new(e),
                }
                .into())
            }
        }
    }

    /// Write the shadow over the base and close the transaction
    ///
    /// On failure the transaction stays open so commit can be retried or
    /// the transaction rolled back.
    pub fn commit(&self) -> MemoryResult<()> {
        if !self.transition(TransactionState::Started, TransactionState::Ending) {
            return Err(TransactionError::NotStarted.into());
        }

        let shadow = match self.inner.shadow.load_full() {
            Some(shadow) => shadow,
            None => {
                self.set_state(TransactionState::None);
                return Ok(());
            }
        };

        let outcome = self
            .inner
            .base
            .block()
            .writer()
            .and_then(|mut writer| shadow.dump(&mut writer));

        if let Err(e) = outcome {
            self.set_state(TransactionState::Started);
            warn!(error = %e, "Commit failed, transaction left open");
            return Err(TransactionError::CommitFailed {
                source: Box::new(e),
            }
            .into());
        }

        self.inner.shadow.store(None);
        shadow.release();
        self.set_state(TransactionState::None);
        debug!(base = %self.inner.base.block().block(), "Transaction committed");
        Ok(())
    }

    /// Drop the shadow and close the transaction
    pub fn rollback(&self) -> MemoryResult<()> {
        if !self.transition(TransactionState::Started, TransactionState::Ending) {
            return Err(TransactionError::NotStarted.into());
        }

        if let Some(shadow) = self.inner.shadow.swap(None) {
            shadow.release();
        }
        self.set_state(TransactionState::None);
        debug!(base = %self.inner.base.block().block(), "Transaction rolled back");
        Ok(())
    }
}

impl Space for TransactionalSpace {
    fn address(&self) -> Address {
        self.current().address()
    }

    fn size(&self) -> Size {
        self.current().size()
    }

    /// Frees the shadow if there is one; the base is never freed here
    fn free(&self) -> MemoryResult<()> {
        if self.transition(TransactionState::Started, TransactionState::Ending) {
            if let Some(shadow) = self.inner.shadow.swap(None) {
                shadow.release();
            }
            self.set_state(TransactionState::None);
        }
        Ok(())
    }

    fn write(&self, data: &[u8]) -> MemoryResult<()> {
        self.current().write(data)
    }

    fn write_at(&self, data: &[u8], offset: Address) -> MemoryResult<()> {
        self.current().write_at(data, offset)
    }

    fn read(&self, buf: &mut [u8]) -> MemoryResult<usize> {
        self.current().read(buf)
    }

    fn read_at(&self, buf: &mut [u8], offset: Address) -> MemoryResult<usize> {
        self.current().read_at(buf, offset)
    }

    fn reader(&self) -> MemoryResult<Box<dyn Read + '_>> {
        Ok(Box::new(SpaceCursor::new(self.current())))
    }

    fn writer(&self) -> MemoryResult<Box<dyn Write + '_>> {
        Ok(Box::new(SpaceCursor::new(self.current())))
    }

    fn dump(&self, out: &mut dyn Write) -> MemoryResult<()> {
        self.current().dump(out)
    }

    fn copy(&self) -> MemoryResult<MemorySpace> {
        self.current().copy()
    }

    fn read_only(&self) -> ReadOnlySpace {
        ReadOnlySpace::new(Arc::new(self.clone()))
    }
}

/// Owned stream over a space, pinned to the space current at creation
struct SpaceCursor {
    space: MemorySpace,
    position: Address,
}

impl SpaceCursor {
    fn new(space: MemorySpace) -> Self {
        Self { space, position: 0 }
    }

    fn remaining(&self) -> Size {
        self.space.size().saturating_sub(self.position)
    }
}

impl Read for SpaceCursor {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = buf.len().min(self.remaining());
        if count == 0 {
            return Ok(0);
        }
        self.space
            .read_at(&mut buf[..count], self.position)
            .map_err(MemoryError::into_io)?;
        self.position += count;
        Ok(count)
    }
}

impl Write for SpaceCursor {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let count = buf.len().min(self.remaining());
        if count == 0 {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "stream is ended"));
        }
        self.space
            .write_at(&buf[..count], self.position)
            .map_err(MemoryError::into_io)?;
        self.position += count;
        Ok(count)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
