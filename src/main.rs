//! Host-side simulator for the mag2usb firmware core.
//!
//! Runs the full application loop against in-memory devices: a RAM
//! EEPROM drained by a background thread (standing in for the store
//! ready interrupt), a register-level magnetometer model and a HID
//! transport that decodes reports back to text. A scripted button
//! sequence walks the menu, reads the sensor and finally flips into
//! pointer mode.
//!
//! Build with `--features simulator`.

use std::io::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use mag2usb::app::App;
use mag2usb::bus::BusDriver;
use mag2usb::config::{
    KEYBOARD_REPORT_SIZE, MOUSE_REPORT_ID, MOUSE_REPORT_SIZE, SENSOR_I2C_WRITE_ADDRESS,
    WRITE_BUFFER_SLOTS,
};
use mag2usb::hid::keyboard::{report_for_char, KeyboardReport};
use mag2usb::hid::HidTransport;
use mag2usb::sensor::{CalibrationData, XyzVector};
use mag2usb::storage::{EepromDevice, SharedStore};
use mag2usb::ui::buttons::{BUTTON_CONFIRM, BUTTON_MODE_SWITCH, BUTTON_NEXT};

/// RAM-backed EEPROM, 512 cells like the target part.
struct SimEeprom {
    cells: [u8; 512],
}

impl EepromDevice for SimEeprom {
    fn read_byte(&mut self, address: u16) -> u8 {
        self.cells[address as usize]
    }

    fn begin_write(&mut self, address: u16, value: u8) {
        self.cells[address as usize] = value;
    }

    fn arm_ready_signal(&mut self) {}

    fn disarm_ready_signal(&mut self) {}
}

/// Register-pointer model of the magnetometer. The field vector is
/// fixed; the interesting traffic is the configuration and data reads.
struct SimBus {
    regs: [u8; 13],
    pointer: usize,
    reply: Vec<u8>,
}

impl SimBus {
    fn new(field: XyzVector) -> Self {
        let mut regs = [0u8; 13];
        regs[3..5].copy_from_slice(&field.x.to_be_bytes());
        regs[5..7].copy_from_slice(&field.z.to_be_bytes());
        regs[7..9].copy_from_slice(&field.y.to_be_bytes());
        regs[10..13].copy_from_slice(b"H43");
        Self {
            regs,
            pointer: 0,
            reply: Vec::new(),
        }
    }
}

impl BusDriver for SimBus {
    fn is_busy(&self) -> bool {
        false
    }

    fn start_transfer(&mut self, msg: &[u8]) {
        if msg[0] == SENSOR_I2C_WRITE_ADDRESS {
            self.pointer = msg[1] as usize;
            if msg.len() == 3 {
                self.regs[self.pointer] = msg[2];
            }
        } else {
            let n = msg.len() - 1;
            self.reply = self.regs[self.pointer..self.pointer + n].to_vec();
        }
    }

    fn fetch_result(&mut self, buf: &mut [u8]) -> bool {
        buf[1..1 + self.reply.len()].copy_from_slice(&self.reply);
        true
    }
}

/// Decodes submitted reports back to human-readable output.
struct SimHid {
    last_pointer: Option<(i16, i16)>,
}

impl SimHid {
    fn decode_key(report: &[u8]) -> Option<char> {
        // Invert the character map by probing it.
        (b' '..=b'~')
            .chain([b'\n', b'\t'])
            .find(|&c| {
                let r = report_for_char(c);
                !r.is_empty() && r.modifier == report[0] && r.keycode == report[1]
            })
            .map(|c| c as char)
    }
}

impl HidTransport for SimHid {
    fn interrupt_ready(&mut self) -> bool {
        true
    }

    fn submit(&mut self, report: &[u8]) {
        match report.len() {
            KEYBOARD_REPORT_SIZE => {
                let released = KeyboardReport {
                    modifier: report[0],
                    keycode: report[1],
                }
                .is_empty();
                if !released {
                    if let Some(c) = Self::decode_key(report) {
                        print!("{c}");
                        let _ = std::io::stdout().flush();
                    }
                }
            }
            MOUSE_REPORT_SIZE if report[0] == MOUSE_REPORT_ID => {
                let x = i16::from_le_bytes([report[1], report[2]]);
                let y = i16::from_le_bytes([report[3], report[4]]);
                // Only log pointer movement, not every identical report.
                if self.last_pointer != Some((x, y)) {
                    self.last_pointer = Some((x, y));
                    println!("[pointer] x={x} y={y} buttons={:03b}", report[5]);
                }
            }
            _ => {}
        }
    }
}

/// Hold each button mask for enough ticks to pass debouncing, with a
/// release gap in between.
fn script() -> Vec<(u8, u32)> {
    const PRESS: u32 = 12;
    const GAP: u32 = 12;
    let mut steps = vec![(0, 30)];
    let press = |steps: &mut Vec<(u8, u32)>, mask: u8| {
        steps.push((mask, PRESS));
        steps.push((0, GAP));
    };

    // Root -> main menu -> "3. Sensor data" -> sensor menu.
    press(&mut steps, BUTTON_CONFIRM);
    press(&mut steps, BUTTON_NEXT);
    press(&mut steps, BUTTON_NEXT);
    press(&mut steps, BUTTON_CONFIRM);
    // "3.1. Print sensor identification string"
    press(&mut steps, BUTTON_CONFIRM);
    // "3.2. Print X,Y,Z once"
    press(&mut steps, BUTTON_NEXT);
    press(&mut steps, BUTTON_CONFIRM);
    steps.push((0, 60));
    // Flip the mode switch and let pointer reports flow.
    steps.push((BUTTON_MODE_SWITCH, 200));
    steps
}

fn main() {
    let store: SharedStore<SimEeprom, WRITE_BUFFER_SLOTS> =
        SharedStore::new(SimEeprom { cells: [0xFF; 512] });

    let stop = AtomicBool::new(false);

    thread::scope(|scope| {
        // Stand-in for the EEPROM ready interrupt: drain one pending
        // byte at a time while the signal is armed.
        scope.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                if store.is_armed() {
                    store.on_ready();
                }
                thread::sleep(Duration::from_micros(200));
            }
        });

        // Seed a usable calibration so pointer mode has real corners.
        // The record is wider than the write buffer; the drain thread
        // keeps the blocking writes moving.
        let cal = CalibrationData {
            zero_compensation: false,
            zero: XyzVector::default(),
            corners: [
                XyzVector { x: 0, y: 0, z: 1000 },
                XyzVector { x: 1000, y: 0, z: 1000 },
                XyzVector { x: 0, y: 1000, z: 1000 },
                XyzVector { x: 1000, y: 1000, z: 1000 },
            ],
        };
        cal.store(&store);

        let bus = SimBus::new(XyzVector { x: 500, y: 250, z: 1000 });
        let mut app = App::new(bus, &store, SimHid { last_pointer: None });

        for (mask, polls) in script() {
            for _ in 0..polls {
                app.poll(mask, true);
                thread::sleep(Duration::from_micros(500));
            }
        }

        println!();
        println!(
            "[simulator] done; pointer mode = {}, pending eeprom writes = {}",
            app.is_pointer_mode(),
            store.pending()
        );

        stop.store(true, Ordering::Relaxed);
    });
}
