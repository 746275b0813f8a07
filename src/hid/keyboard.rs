//! USB HID keyboard reports for typing menu text.
//!
//! Layout (2 bytes):
//! ```text
//! Byte 0: Modifier keys (bitfield, bit 1 = Left Shift)
//! Byte 1: Single key code (USB HID usage code, 0 = no key)
//! ```
//!
//! One key at a time is all the menus need, so the report skips the
//! boot-protocol reserved byte and 6-slot key array.

use crate::config::KEYBOARD_REPORT_SIZE;
use crate::output::OutputSink;

// Modifier bits (USB HID usage tables, chapter 10).
pub const MOD_CONTROL_LEFT: u8 = 1 << 0;
pub const MOD_SHIFT_LEFT: u8 = 1 << 1;
pub const MOD_ALT_LEFT: u8 = 1 << 2;
pub const MOD_GUI_LEFT: u8 = 1 << 3;

// Key codes used by the character map.
pub const KEY_A: u8 = 4;
pub const KEY_1: u8 = 30;
pub const KEY_0: u8 = 39;
pub const KEY_ENTER: u8 = 40;
pub const KEY_TAB: u8 = 43;
pub const KEY_SPACE: u8 = 44;
pub const KEY_MINUS: u8 = 45;
pub const KEY_EQUAL: u8 = 46;
pub const KEY_SEMICOLON: u8 = 51;
pub const KEY_COMMA: u8 = 54;
pub const KEY_PERIOD: u8 = 55;

/// Single-key USB HID keyboard report.
#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct KeyboardReport {
    /// Modifier key bitfield.
    pub modifier: u8,
    /// The one pressed key code, or 0 for "no key".
    pub keycode: u8,
}

impl KeyboardReport {
    /// Create an empty (all-keys-released) report.
    pub const fn empty() -> Self {
        Self {
            modifier: 0,
            keycode: 0,
        }
    }

    /// Serialise into a byte slice for USB HID transmission.
    /// Returns the number of bytes written (always 2).
    pub fn serialize(&self, buf: &mut [u8]) -> usize {
        if buf.len() < KEYBOARD_REPORT_SIZE {
            return 0;
        }
        buf[0] = self.modifier;
        buf[1] = self.keycode;
        KEYBOARD_REPORT_SIZE
    }

    /// Returns `true` if no key is pressed (release event).
    pub fn is_empty(&self) -> bool {
        self.modifier == 0 && self.keycode == 0
    }
}

/// Key and modifier for one ASCII character, US layout.
///
/// Unmapped characters produce an empty report, which the host ignores.
pub fn report_for_char(c: u8) -> KeyboardReport {
    let (modifier, keycode) = match c {
        b'a'..=b'z' => (0, KEY_A + c - b'a'),
        b'A'..=b'Z' => (MOD_SHIFT_LEFT, KEY_A + c - b'A'),
        b'1'..=b'9' => (0, KEY_1 + c - b'1'),
        b'0' => (0, KEY_0),
        b'\n' => (0, KEY_ENTER),
        b'\t' => (0, KEY_TAB),
        b' ' => (0, KEY_SPACE),
        b'!' => (MOD_SHIFT_LEFT, KEY_1),
        b'#' => (MOD_SHIFT_LEFT, KEY_1 + 2),
        b'$' => (MOD_SHIFT_LEFT, KEY_1 + 3),
        b'%' => (MOD_SHIFT_LEFT, KEY_1 + 4),
        b'&' => (MOD_SHIFT_LEFT, KEY_1 + 6),
        b'(' => (MOD_SHIFT_LEFT, KEY_1 + 8),
        b')' => (MOD_SHIFT_LEFT, KEY_0),
        b'*' => (MOD_SHIFT_LEFT, KEY_1 + 7),
        b'@' => (MOD_SHIFT_LEFT, KEY_1 + 1),
        b'-' => (0, KEY_MINUS),
        b'_' => (MOD_SHIFT_LEFT, KEY_MINUS),
        b'=' => (0, KEY_EQUAL),
        b'+' => (MOD_SHIFT_LEFT, KEY_EQUAL),
        b';' => (0, KEY_SEMICOLON),
        b':' => (MOD_SHIFT_LEFT, KEY_SEMICOLON),
        b',' => (0, KEY_COMMA),
        b'<' => (MOD_SHIFT_LEFT, KEY_COMMA),
        b'.' => (0, KEY_PERIOD),
        b'>' => (MOD_SHIFT_LEFT, KEY_PERIOD),
        _ => (0, 0),
    };
    KeyboardReport { modifier, keycode }
}

/// Turns the output sink's byte stream into a keyboard report stream.
///
/// Repeated identical key codes are separated by an all-released report,
/// otherwise the host would merge "ll" into a single long press. A final
/// release report is emitted after the last character.
#[derive(Default)]
pub struct TextTyper {
    last_keycode: u8,
}

impl TextTyper {
    pub const fn new() -> Self {
        Self { last_keycode: 0 }
    }

    /// Next report to send, or `None` when there is nothing to type and
    /// the final release has already gone out.
    pub fn next_report(&mut self, sink: &mut OutputSink) -> Option<KeyboardReport> {
        match sink.peek() {
            Some(c) => {
                let report = report_for_char(c);
                if report.keycode != 0 && report.keycode == self.last_keycode {
                    // Break between repeated characters; do not consume
                    // the byte, it is typed on the next pass.
                    self.last_keycode = 0;
                    Some(KeyboardReport::empty())
                } else {
                    self.last_keycode = report.keycode;
                    sink.advance();
                    Some(report)
                }
            }
            None => {
                if self.last_keycode != 0 {
                    self.last_keycode = 0;
                    Some(KeyboardReport::empty())
                } else {
                    None
                }
            }
        }
    }
}

/// USB HID Report Descriptor for the one-key keyboard interface.
pub const KEYBOARD_REPORT_DESCRIPTOR: &[u8] = &[
    0x05, 0x01, // Usage Page (Generic Desktop)
    0x09, 0x06, // Usage (Keyboard)
    0xA1, 0x01, // Collection (Application)
    //
    //   - Modifier keys (8 bits) -
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0xE0, //   Usage Minimum (Left Control)
    0x29, 0xE7, //   Usage Maximum (Right GUI)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x01, //   Logical Maximum (1)
    0x75, 0x01, //   Report Size (1)
    0x95, 0x08, //   Report Count (8)
    0x81, 0x02, //   Input (Data, Variable, Absolute)
    //
    //   - Single key code -
    0x05, 0x07, //   Usage Page (Keyboard/Keypad)
    0x19, 0x00, //   Usage Minimum (0)
    0x29, 0x65, //   Usage Maximum (101)
    0x15, 0x00, //   Logical Minimum (0)
    0x25, 0x65, //   Logical Maximum (101)
    0x75, 0x08, //   Report Size (8)
    0x95, 0x01, //   Report Count (1)
    0x81, 0x00, //   Input (Data, Array)
    //
    0xC0, // End Collection
];
