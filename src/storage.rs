//! Write-back cache for a slow, write-limited persistent byte store.
//!
//! Byte-wise EEPROM writes are slow (milliseconds each) and the cells
//! have a limited write-endurance budget. Instead of stalling callers,
//! writes land in a small associative buffer and are committed one byte
//! at a time from the store-ready completion interrupt while the device
//! is otherwise idle. Repeated writes to the same address coalesce into
//! a single pending slot, which also spares cell wear.
//!
//! Layout:
//!   - Two parallel fixed-size arrays (addresses, values) indexed by
//!     buffer slot; `len` gives the number of valid prefix entries.
//!   - Slots are appended in arrival order and always drained from the
//!     *end* (LIFO). Ordering among distinct addresses is therefore
//!     unspecified; each address has at most one pending value, so the
//!     only guarantee callers get - and need - is "eventually written".
//!
//! Concurrency: the slot arrays are the one shared-mutable resource that
//! crosses the interrupt boundary. [`SharedStore`] wraps the cache in a
//! critical-section mutex so scans never observe a torn state while the
//! completion handler removes the highest slot.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;

use crate::error::Error;

/// Contract of the underlying persistent byte store.
///
/// `begin_write` is fire-and-forget: the device raises its ready signal
/// when the cell has been programmed, and must only be handed a new byte
/// once ready (i.e. from the completion handler, or before any write is
/// in flight).
pub trait EepromDevice {
    /// Synchronously read one byte. Only used on a cache miss.
    fn read_byte(&mut self, address: u16) -> u8;

    /// Start programming one byte. Completion is signalled later.
    fn begin_write(&mut self, address: u16, value: u8);

    /// Enable delivery of the store-ready completion signal. On the
    /// target this also downgrades any deep sleep mode that would keep
    /// the signal from firing; the previous mode is restored on disarm.
    fn arm_ready_signal(&mut self);

    /// Stop delivery of the completion signal.
    fn disarm_ready_signal(&mut self);
}

/// Fixed-capacity associative write buffer over an [`EepromDevice`].
///
/// Not interrupt-safe by itself - wrap it in a [`SharedStore`] when the
/// completion signal is delivered from an interrupt context.
pub struct WriteBackCache<D: EepromDevice, const N: usize> {
    device: D,
    addresses: [u16; N],
    values: [u8; N],
    len: usize,
    armed: bool,
}

impl<D: EepromDevice, const N: usize> WriteBackCache<D, N> {
    pub const fn new(device: D) -> Self {
        Self {
            device,
            addresses: [0; N],
            values: [0; N],
            len: 0,
            armed: false,
        }
    }

    /// Read one byte, preferring a pending buffered value.
    ///
    /// A buffered hit is authoritative: addresses among occupied slots
    /// are pairwise distinct, so the first match is the only match.
    pub fn read(&mut self, address: u16) -> u8 {
        for i in 0..self.len {
            if self.addresses[i] == address {
                return self.values[i];
            }
        }
        self.device.read_byte(address)
    }

    /// Buffer one byte write.
    ///
    /// If the address is already pending its value is overwritten in
    /// place - a second write to an un-drained address never creates a
    /// duplicate slot. Returns [`Error::StoreFull`] when no slot is
    /// free; the caller retries once the drain has run (see
    /// [`SharedStore::write`]).
    pub fn try_write(&mut self, address: u16, value: u8) -> Result<(), Error> {
        for i in 0..self.len {
            if self.addresses[i] == address {
                self.values[i] = value;
                return Ok(());
            }
        }

        if self.len == N {
            return Err(Error::StoreFull);
        }

        self.addresses[self.len] = address;
        self.values[self.len] = value;
        self.len += 1;

        // A successful insert must always leave the drain armed,
        // otherwise the buffered byte would never reach the device.
        if !self.armed {
            self.device.arm_ready_signal();
            self.armed = true;
        }
        Ok(())
    }

    /// Completion handler: commit the newest pending slot to the device
    /// and free it. Call this from the store-ready interrupt.
    ///
    /// Disarms the signal once the buffer is empty, so no spurious
    /// completions occur until a new write re-arms it. A call with an
    /// empty buffer is a no-op.
    pub fn service_ready(&mut self) {
        if self.len == 0 {
            return;
        }

        let slot = self.len - 1;
        self.device
            .begin_write(self.addresses[slot], self.values[slot]);
        self.len = slot;

        if self.len == 0 {
            self.device.disarm_ready_signal();
            self.armed = false;
        }
    }

    /// Number of pending (not yet drained) writes.
    pub fn pending(&self) -> usize {
        self.len
    }

    /// Whether the completion signal is currently armed.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Pending value for `address`, if one is buffered.
    pub fn pending_value(&self, address: u16) -> Option<u8> {
        (0..self.len)
            .find(|&i| self.addresses[i] == address)
            .map(|i| self.values[i])
    }

    pub fn device(&self) -> &D {
        &self.device
    }
}

/// Interrupt-safe wrapper around a [`WriteBackCache`].
///
/// Every operation takes the critical section for the whole buffer scan:
/// the completion handler mutates the same slot arrays, and an unmasked
/// scan could observe an address cleared with its value still present,
/// or miss a slot mid-removal.
pub struct SharedStore<D: EepromDevice, const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<WriteBackCache<D, N>>>,
}

impl<D: EepromDevice, const N: usize> SharedStore<D, N> {
    pub const fn new(device: D) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(WriteBackCache::new(device))),
        }
    }

    /// Read one byte (buffered value wins over the device).
    pub fn read(&self, address: u16) -> u8 {
        self.inner.lock(|c| c.borrow_mut().read(address))
    }

    /// Non-blocking write; [`Error::StoreFull`] when no slot is free.
    pub fn try_write(&self, address: u16, value: u8) -> Result<(), Error> {
        self.inner.lock(|c| c.borrow_mut().try_write(address, value))
    }

    /// Buffer one byte write, busy-waiting while the buffer is full.
    ///
    /// The critical section is released between attempts so the
    /// completion interrupt can drain a slot; only the calling context
    /// blocks, and only until the (armed, hence live) drain frees one.
    pub fn write(&self, address: u16, value: u8) {
        loop {
            if self.try_write(address, value).is_ok() {
                return;
            }
            core::hint::spin_loop();
        }
    }

    /// Write a contiguous record through the cache.
    ///
    /// Readers see the new bytes immediately (read-after-write through
    /// the buffer) even while the physical writes are still landing.
    /// May busy-wait like [`Self::write`] when the record is larger than
    /// the free buffer space.
    pub fn write_record(&self, start: u16, bytes: &[u8]) {
        for (i, &b) in bytes.iter().enumerate() {
            self.write(start + i as u16, b);
        }
    }

    /// Completion handler; call from the store-ready interrupt (or the
    /// drain task standing in for it on a hosted build).
    pub fn on_ready(&self) {
        self.inner.lock(|c| c.borrow_mut().service_ready());
    }

    pub fn pending(&self) -> usize {
        self.inner.lock(|c| c.borrow().pending())
    }

    pub fn is_armed(&self) -> bool {
        self.inner.lock(|c| c.borrow().is_armed())
    }

    /// Run `f` with exclusive access to the cache.
    pub fn with<R>(&self, f: impl FnOnce(&mut WriteBackCache<D, N>) -> R) -> R {
        self.inner.lock(|c| f(&mut c.borrow_mut()))
    }
}
