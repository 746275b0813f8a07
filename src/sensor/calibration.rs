//! Persistent sensor calibration record.
//!
//! One 31-byte record holds everything the pointer needs across power
//! cycles: the zero-compensation switch, the zero offset vector and the
//! four screen-corner vectors. The record lives behind the write-back
//! store, so a freshly saved calibration is readable immediately even
//! while the physical bytes are still draining.

use crate::config::CALIBRATION_RECORD_ADDR;
use crate::sensor::XyzVector;
use crate::storage::{EepromDevice, SharedStore};

/// Serialized size: 1 flag byte + 3 zero axes + 4 corners of 3 axes,
/// i16 little-endian each.
pub const RECORD_LEN: usize = 31;

/// Calibration state of the magnetometer pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationData {
    /// Subtract [`Self::zero`] from every accepted sample.
    pub zero_compensation: bool,
    /// Sensor reading with no field applied (midpoint of a capture run).
    pub zero: XyzVector,
    /// Field directions at the four screen corners, in order top-left,
    /// top-right, bottom-left, bottom-right.
    pub corners: [XyzVector; 4],
}

impl Default for CalibrationData {
    fn default() -> Self {
        // Factory defaults measured on the reference unit; corners must
        // be recalibrated per installation before pointing works.
        Self {
            zero_compensation: true,
            zero: XyzVector { x: 21, y: -108, z: 138 },
            corners: [XyzVector::default(); 4],
        }
    }
}

impl CalibrationData {
    /// Serialize into `buf` (little-endian), returning the record length.
    pub fn serialize(&self, buf: &mut [u8; RECORD_LEN]) -> usize {
        buf[0] = self.zero_compensation as u8;
        let mut at = 1;
        for v in core::iter::once(&self.zero).chain(self.corners.iter()) {
            for axis in [v.x, v.y, v.z] {
                let le = axis.to_le_bytes();
                buf[at] = le[0];
                buf[at + 1] = le[1];
                at += 2;
            }
        }
        RECORD_LEN
    }

    /// Parse a record; `None` if the flag byte is not a valid boolean
    /// (e.g. erased EEPROM reading 0xFF).
    pub fn deserialize(buf: &[u8; RECORD_LEN]) -> Option<Self> {
        if buf[0] > 1 {
            return None;
        }
        let mut axes = [0i16; 15];
        for (i, axis) in axes.iter_mut().enumerate() {
            let at = 1 + i * 2;
            *axis = i16::from_le_bytes([buf[at], buf[at + 1]]);
        }
        let vec_at = |i: usize| XyzVector {
            x: axes[i * 3],
            y: axes[i * 3 + 1],
            z: axes[i * 3 + 2],
        };
        Some(Self {
            zero_compensation: buf[0] == 1,
            zero: vec_at(0),
            corners: [vec_at(1), vec_at(2), vec_at(3), vec_at(4)],
        })
    }

    /// Load the record from the store; falls back to [`Self::default`]
    /// when the stored record does not validate.
    pub fn load<D: EepromDevice, const N: usize>(store: &SharedStore<D, N>) -> Self {
        let mut buf = [0u8; RECORD_LEN];
        for (i, b) in buf.iter_mut().enumerate() {
            *b = store.read(CALIBRATION_RECORD_ADDR + i as u16);
        }
        Self::deserialize(&buf).unwrap_or_default()
    }

    /// Persist the whole record through the write-back store.
    pub fn store<D: EepromDevice, const N: usize>(&self, store: &SharedStore<D, N>) {
        let mut buf = [0u8; RECORD_LEN];
        self.serialize(&mut buf);
        store.write_record(CALIBRATION_RECORD_ADDR, &buf);
    }

    /// Persist only the zero-compensation flag byte.
    pub fn store_compensation_flag<D: EepromDevice, const N: usize>(
        &self,
        store: &SharedStore<D, N>,
    ) {
        store.write(CALIBRATION_RECORD_ADDR, self.zero_compensation as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SharedStore;

    struct RamEeprom {
        cells: [u8; 64],
    }

    impl EepromDevice for RamEeprom {
        fn read_byte(&mut self, address: u16) -> u8 {
            self.cells[address as usize]
        }
        fn begin_write(&mut self, address: u16, value: u8) {
            self.cells[address as usize] = value;
        }
        fn arm_ready_signal(&mut self) {}
        fn disarm_ready_signal(&mut self) {}
    }

    fn store() -> SharedStore<RamEeprom, 64> {
        // 64 slots so a whole record fits without needing a drain.
        SharedStore::new(RamEeprom { cells: [0xFF; 64] })
    }

    #[test]
    fn roundtrip_through_store() {
        let s = store();
        let cal = CalibrationData {
            zero_compensation: false,
            zero: XyzVector { x: -1, y: 2, z: -3 },
            corners: [
                XyzVector { x: 100, y: 200, z: 300 },
                XyzVector { x: -100, y: -200, z: -300 },
                XyzVector { x: 0, y: 32767, z: -32768 },
                XyzVector { x: 7, y: 8, z: 9 },
            ],
        };
        cal.store(&s);
        assert_eq!(CalibrationData::load(&s), cal);
    }

    #[test]
    fn erased_eeprom_yields_defaults() {
        // All cells read 0xFF; the flag byte fails validation.
        let s = store();
        assert_eq!(CalibrationData::load(&s), CalibrationData::default());
    }

    #[test]
    fn flag_byte_writes_alone() {
        let s = store();
        let mut cal = CalibrationData::default();
        cal.store(&s);
        cal.zero_compensation = false;
        cal.store_compensation_flag(&s);
        assert!(!CalibrationData::load(&s).zero_compensation);
    }
}
