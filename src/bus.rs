//! Non-blocking bus transaction substrate.
//!
//! The TWI/I2C master hardware driver is fire-and-poll: a transfer is
//! started, the driver's own interrupt machinery clocks it out, and the
//! caller polls `is_busy` until the result can be fetched. Multi-step
//! protocols on top of it (set register pointer, start read, fetch
//! bytes) are expressed as explicit resumable state machines: an
//! operation is a function that is safe to call every tick, never
//! blocks, and resumes from a [`Phase`] it left behind.

use crate::error::Error;

/// Contract of the underlying bus master driver.
///
/// The first byte of every transfer buffer is the destination/source
/// device address with the direction bit already folded in.
pub trait BusDriver {
    /// Whether a transfer is currently in flight.
    fn is_busy(&self) -> bool;

    /// Begin a transfer. Must only be called when not busy. For a read,
    /// `msg[0]` carries the address+read bit and `msg.len() - 1` data
    /// bytes will be clocked in.
    fn start_transfer(&mut self, msg: &[u8]);

    /// Copy the received bytes of the last transfer into `buf` (element
    /// 0 is the address byte, data follows). Returns `false` if the
    /// transfer failed.
    fn fetch_result(&mut self, buf: &mut [u8]) -> bool;
}

/// Resume point of a multi-step bus operation.
///
/// Must be reset to [`Phase::SetPointer`] before a *different* logical
/// operation reuses it; resuming a fresh operation at a stale phase is
/// the classic hazard of this pattern. [`crate::sensor::SensorSession`]
/// defends against it by construction with a per-session operation tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Write the device's internal register pointer.
    SetPointer,
    /// Start the data transfer proper.
    StartTransfer,
    /// Transfer finished; fetch and decode the result.
    FetchResult,
}

/// Outcome of polling a step-machine operation once.
///
/// Callers poll until the outcome is not [`Step::Busy`]. Polling while
/// the bus is busy has no side effects whatsoever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Step<T> {
    /// Still working; poll again next tick.
    Busy,
    /// Operation finished with a result.
    Done(T),
    /// Operation failed; the phase has been reset.
    Failed(Error),
}

impl<T> Step<T> {
    pub fn is_busy(&self) -> bool {
        matches!(self, Step::Busy)
    }
}
