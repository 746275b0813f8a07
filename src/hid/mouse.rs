//! USB HID absolute pointer report.
//!
//! Layout (6 bytes):
//! ```text
//! Byte 0:   Report ID (always 2)
//! Byte 1-2: X position (unsigned little-endian, 0..32767)
//! Byte 3-4: Y position (unsigned little-endian, 0..32767)
//! Byte 5:   Button bitfield (bit 0 = left, 1 = right, 2 = middle)
//! ```
//!
//! Absolute coordinates, not deltas: the pointer jumps to wherever the
//! sensor says the device is aimed.

use crate::config::{MOUSE_REPORT_ID, MOUSE_REPORT_SIZE};
use crate::mapping::map_to_screen;
use crate::sensor::{CalibrationData, XyzVector};

/// Absolute-position USB HID pointer report.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MouseReport {
    /// X position, 0..=32767 left to right.
    pub x: i16,
    /// Y position, 0..=32767 top to bottom.
    pub y: i16,
    /// Button bitfield (bit 0 = left, bit 1 = right, bit 2 = middle).
    pub buttons: u8,
}

impl MouseReport {
    /// Build a report from a sensor sample, or `None` when the sample
    /// cannot be placed on screen (degenerate corner calibration).
    pub fn from_sample(
        sample: &XyzVector,
        cal: &CalibrationData,
        buttons: u8,
    ) -> Option<Self> {
        let (x, y) = map_to_screen(sample, &cal.corners)?;
        Some(Self { x, y, buttons })
    }

    /// Serialise into a byte slice for USB HID transmission.
    /// Returns the number of bytes written (always 6).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < MOUSE_REPORT_SIZE {
            return 0;
        }
        buf[0] = MOUSE_REPORT_ID;
        buf[1..3].copy_from_slice(&self.x.to_le_bytes());
        buf[3..5].copy_from_slice(&self.y.to_le_bytes());
        buf[5] = self.buttons;
        MOUSE_REPORT_SIZE
    }
}

/// USB HID Report Descriptor for the absolute pointer interface.
pub const MOUSE_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x02, // Usage (Mouse)
    0xA1, 0x01, // Collection (Application)
    0x09, 0x01, //   Usage (Pointer)
    0xA1, 0x00, //   Collection (Physical)
    0x85, 0x02, //     Report ID (2)
    //
    //   - X, Y absolute position -
    0x05, 0x01, //     Usage Page (Generic Desktop)
    0x09, 0x30, //     Usage (X)
    0x09, 0x31, //     Usage (Y)
    0x15, 0x00, //     Logical Minimum (0)
    0x26, 0xFF, 0x7F, // Logical Maximum (32767)
    0x75, 0x10, //     Report Size (16)
    0x95, 0x02, //     Report Count (2)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    //
    //   - Buttons (3 bits + 5 padding) -
    0x05, 0x09, //     Usage Page (Buttons)
    0x19, 0x01, //     Usage Minimum (Button 1)
    0x29, 0x03, //     Usage Maximum (Button 3)
    0x15, 0x00, //     Logical Minimum (0)
    0x25, 0x01, //     Logical Maximum (1)
    0x95, 0x03, //     Report Count (3)
    0x75, 0x01, //     Report Size (1)
    0x81, 0x02, //     Input (Data, Variable, Absolute)
    0x95, 0x01, //     Report Count (1)
    0x75, 0x05, //     Report Size (5)
    0x81, 0x01, //     Input (Constant) - padding
    //
    0xC0, //   End Collection (Physical)
    0xC0, // End Collection (Application)
];
