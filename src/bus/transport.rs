//! Transport abstraction for PIF command buffer transfers

use tracing::trace;

use crate::error::Result;
use crate::pif::protocol::PifFrame;

/// DMA direction, seen from the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Host buffer to PIF RAM (the PIF executes it)
    Write,
    /// PIF RAM back into the host buffer
    Read,
}

/// Moves command buffers between the host and a PIF
///
/// Every physical transfer is a `start_dma` followed by `wait_complete`.
/// Callers bracket a sequence of transfers with [`BusAccess`] rather than
/// calling `acquire`/`release` directly.
#[cfg_attr(test, mockall::automock)]
pub trait Transport {
    /// Takes exclusive access to the bus.
    fn acquire(&mut self) -> Result<()>;

    /// Gives up bus access.
    fn release(&mut self);

    /// Starts one transfer. On `Read` the frame is overwritten in place.
    fn start_dma(&mut self, direction: Direction, frame: &mut PifFrame) -> Result<()>;

    /// Blocks until the last transfer has completed.
    fn wait_complete(&mut self) -> Result<()>;
}

/// Scoped bus access
///
/// Acquires on creation and releases on drop, so `?` early returns cannot
/// leave the bus held.
pub struct BusAccess<'a, T: Transport + ?Sized> {
    transport: &'a mut T,
}

impl<'a, T: Transport + ?Sized> BusAccess<'a, T> {
    pub fn new(transport: &'a mut T) -> Result<Self> {
        transport.acquire()?;
        Ok(Self { transport })
    }

    /// Writes `frame` to the PIF and waits for execution.
    pub fn write(&mut self, frame: &mut PifFrame) -> Result<()> {
        trace!("PIF write: {:?}", frame);
        self.transport.start_dma(Direction::Write, frame)?;
        self.transport.wait_complete()
    }

    /// Reads PIF RAM into `frame` and waits for completion.
    pub fn read(&mut self, frame: &mut PifFrame) -> Result<()> {
        self.transport.start_dma(Direction::Read, frame)?;
        self.transport.wait_complete()?;
        trace!("PIF read: {:?}", frame);
        Ok(())
    }

    /// Write followed by read, leaving the executed result in `frame`.
    pub fn exchange(&mut self, frame: &mut PifFrame) -> Result<()> {
        self.write(frame)?;
        self.read(frame)
    }
}

impl<T: Transport + ?Sized> Drop for BusAccess<'_, T> {
    fn drop(&mut self) {
        self.transport.release();
    }
}

/// Hook fired when a polled controller stops answering
#[cfg_attr(test, mockall::automock)]
pub trait RescanTrigger {
    fn begin_rescan(&mut self);
}

impl<F: FnMut()> RescanTrigger for F {
    fn begin_rescan(&mut self) {
        self()
    }
}
