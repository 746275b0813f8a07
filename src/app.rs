//! Top-level firmware logic: one `poll` per main-loop iteration.
//!
//! The device has two modes, selected by the mode-switch input:
//!
//! - menu mode: the widget UI runs and its text is typed to the host
//!   through the keyboard interface;
//! - pointer mode: continuous sensor samples are mapped through the
//!   corner calibration and sent as absolute mouse reports.
//!
//! Nothing in here blocks. Bus traffic, EEPROM writes and HID output
//! all advance one step per poll at most.

use crate::bus::{BusDriver, Step};
use crate::config::{KEYBOARD_REPORT_SIZE, MOUSE_REPORT_SIZE};
use crate::hid::{HidTransport, MouseReport, TextTyper};
use crate::output::OutputSink;
use crate::sensor::SensorSession;
use crate::storage::{EepromDevice, SharedStore};
use crate::ui::buttons::BUTTON_MODE_SWITCH;
use crate::ui::{ButtonState, Ui};

pub struct App<'a, B, D, H, const N: usize>
where
    B: BusDriver,
    D: EepromDevice,
    H: HidTransport,
{
    buttons: ButtonState,
    ui: Ui,
    sensor: SensorSession<B>,
    store: &'a SharedStore<D, N>,
    sink: OutputSink,
    typer: TextTyper,
    hid: H,
    configured: bool,
    pointer_mode: bool,
    pending_mouse: Option<MouseReport>,
}

impl<'a, B, D, H, const N: usize> App<'a, B, D, H, N>
where
    B: BusDriver,
    D: EepromDevice,
    H: HidTransport,
{
    /// Build the application; restores the persisted calibration.
    pub fn new(bus: B, store: &'a SharedStore<D, N>, hid: H) -> Self {
        let mut sensor = SensorSession::new(bus);
        sensor.load_calibration(store);
        Self {
            buttons: ButtonState::new(),
            ui: Ui::new(),
            sensor,
            store,
            sink: OutputSink::new(),
            typer: TextTyper::new(),
            hid,
            configured: false,
            pointer_mode: false,
            pending_mouse: None,
        }
    }

    /// One main-loop iteration. `raw_buttons` is the sampled input
    /// bitmask; `timer_tick` is true when the periodic timer overflowed
    /// since the last poll.
    pub fn poll(&mut self, raw_buttons: u8, timer_tick: bool) {
        self.buttons.update(raw_buttons, timer_tick);

        // Push the sensor configuration before anything else talks to it.
        if !self.configured {
            match self.sensor.poll_configure() {
                Step::Busy => return,
                Step::Done(()) | Step::Failed(_) => self.configured = true,
            }
        }

        let pointer = self.buttons.is_down(BUTTON_MODE_SWITCH);
        if pointer != self.pointer_mode {
            self.pointer_mode = pointer;
            if pointer {
                self.sensor.start_continuous();
            } else {
                self.sensor.stop_continuous();
                self.pending_mouse = None;
            }
        }

        if timer_tick {
            self.sensor.tick();
        }

        if self.pointer_mode {
            self.poll_pointer();
        } else {
            self.ui
                .poll(&self.buttons, &mut self.sensor, self.store, &mut self.sink);
            self.poll_keyboard();
        }
    }

    fn poll_pointer(&mut self) {
        if let Some(sample) = self.sensor.take_new_data() {
            if !self.sensor.overflowed() {
                // An unmappable sample keeps the previous report.
                if let Some(report) = MouseReport::from_sample(
                    &sample,
                    self.sensor.calibration(),
                    self.buttons.state() & 0x07,
                ) {
                    self.pending_mouse = Some(report);
                }
            }
        }

        if let Some(report) = self.pending_mouse {
            if self.hid.interrupt_ready() {
                let mut buf = [0u8; MOUSE_REPORT_SIZE];
                report.serialize(&mut buf);
                self.hid.submit(&buf);
                self.pending_mouse = None;
            }
        }
    }

    fn poll_keyboard(&mut self) {
        if self.hid.interrupt_ready() {
            if let Some(report) = self.typer.next_report(&mut self.sink) {
                let mut buf = [0u8; KEYBOARD_REPORT_SIZE];
                report.serialize(&mut buf);
                self.hid.submit(&buf);
            }
        }
    }

    pub fn is_pointer_mode(&self) -> bool {
        self.pointer_mode
    }

    pub fn sensor_mut(&mut self) -> &mut SensorSession<B> {
        &mut self.sensor
    }

    pub fn hid(&self) -> &H {
        &self.hid
    }

    pub fn hid_mut(&mut self) -> &mut H {
        &mut self.hid
    }
}
