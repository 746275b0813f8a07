//! Hierarchical menu and modal widget state machine.
//!
//! The UI is a stack of frames, each recording a widget and a cursor.
//! Menu widgets use the cursor as the highlighted item index; modal
//! widgets reuse it as a private sub-state counter (which capture step,
//! which corner printed so far). Entering a widget pushes the current
//! frame, exiting pops it; popping an empty stack lands on the root
//! frame, so the UI can never escape the widget set.
//!
//! All text goes through the [`OutputSink`] and only when it is idle.
//! In-flight output is never interrupted; anything that wants to print
//! while the sink is busy simply tries again next pass.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::bus::Step;
use crate::config::UI_STACK_DEPTH;
use crate::output::OutputSink;
use crate::sensor::{SensorSession, XyzVector};
use crate::storage::{EepromDevice, SharedStore};
use crate::ui::buttons::{ButtonState, BUTTON_CONFIRM, BUTTON_NEXT, BUTTON_PREV};
use crate::bus::BusDriver;

/// Every widget the UI can display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WidgetId {
    /// Empty placeholder; confirming enters the main menu.
    RootMenu,
    MainMenu,
    ZeroMenu,
    CornersMenu,
    SensorMenu,
    /// Print the sensor identification registers once.
    SensorId,
    /// Print one X,Y,Z sample.
    ReadOnce,
    /// Print X,Y,Z samples until confirm or error.
    ReadContinuous,
    /// Capture a new zero offset from min/max extremes.
    RecalibrateZero,
    /// Capture the four screen corners, one confirm each.
    RecalibrateCorners,
    PrintZero,
    PrintCorners,
    ToggleZeroCompensation,
}

impl WidgetId {
    fn is_menu(self) -> bool {
        matches!(
            self,
            WidgetId::RootMenu
                | WidgetId::MainMenu
                | WidgetId::ZeroMenu
                | WidgetId::CornersMenu
                | WidgetId::SensorMenu
        )
    }
}

/// One menu line: its label and the widget it activates. `None` exits
/// to the parent widget.
pub struct MenuItem {
    pub label: &'static str,
    pub action: Option<WidgetId>,
}

static ROOT_MENU_ITEMS: &[MenuItem] = &[MenuItem {
    label: "",
    action: Some(WidgetId::MainMenu),
}];

static MAIN_MENU_ITEMS: &[MenuItem] = &[
    MenuItem { label: "1. Calibrate zero\n", action: Some(WidgetId::ZeroMenu) },
    MenuItem { label: "2. Calibrate corners\n", action: Some(WidgetId::CornersMenu) },
    MenuItem { label: "3. Sensor data\n", action: Some(WidgetId::SensorMenu) },
    MenuItem { label: "4. << quit menu\n", action: None },
];

static ZERO_MENU_ITEMS: &[MenuItem] = &[
    MenuItem { label: "1.1. Print calibrated zero\n", action: Some(WidgetId::PrintZero) },
    MenuItem { label: "1.2. Recalibrate zero\n", action: Some(WidgetId::RecalibrateZero) },
    MenuItem {
        label: "1.3. Toggle zero compensation\n",
        action: Some(WidgetId::ToggleZeroCompensation),
    },
    MenuItem { label: "1.4. << main menu\n", action: None },
];

static CORNERS_MENU_ITEMS: &[MenuItem] = &[
    MenuItem {
        label: "2.1. Print calibrated corners\n",
        action: Some(WidgetId::PrintCorners),
    },
    MenuItem {
        label: "2.2. Recalibrate corners\n",
        action: Some(WidgetId::RecalibrateCorners),
    },
    MenuItem { label: "2.3. << main menu\n", action: None },
];

static SENSOR_MENU_ITEMS: &[MenuItem] = &[
    MenuItem {
        label: "3.1. Print sensor identification string\n",
        action: Some(WidgetId::SensorId),
    },
    MenuItem { label: "3.2. Print X,Y,Z once\n", action: Some(WidgetId::ReadOnce) },
    MenuItem {
        label: "3.3. Print X,Y,Z continually\n",
        action: Some(WidgetId::ReadContinuous),
    },
    MenuItem { label: "3.4. << main menu\n", action: None },
];

fn items_for(widget: WidgetId) -> &'static [MenuItem] {
    match widget {
        WidgetId::RootMenu => ROOT_MENU_ITEMS,
        WidgetId::MainMenu => MAIN_MENU_ITEMS,
        WidgetId::ZeroMenu => ZERO_MENU_ITEMS,
        WidgetId::CornersMenu => CORNERS_MENU_ITEMS,
        WidgetId::SensorMenu => SENSOR_MENU_ITEMS,
        // Modal widgets have no items; exit() never indexes this.
        _ => ROOT_MENU_ITEMS,
    }
}

static SENSOR_ERROR_TEXT: &str = "Error while reading the sensor!\n";

static CORNER_PROMPTS: [&str; 4] = [
    "Point to the top-left corner, then confirm\n",
    "Point to the top-right corner, then confirm\n",
    "Point to the bottom-left corner, then confirm\n",
    "Point to the bottom-right corner, then confirm\n",
];

/// One level of the navigation stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UiFrame {
    pub widget: WidgetId,
    pub cursor: u8,
}

/// The menu/widget state machine.
pub struct Ui {
    frame: UiFrame,
    stack: Vec<UiFrame, UI_STACK_DEPTH>,
    should_print: bool,
}

impl Ui {
    pub fn new() -> Self {
        Self {
            frame: UiFrame { widget: WidgetId::RootMenu, cursor: 0 },
            stack: Vec::new(),
            should_print: true,
        }
    }

    pub fn active_widget(&self) -> WidgetId {
        self.frame.widget
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Push the current frame and activate `widget`.
    ///
    /// On a full stack the oldest ancestor is evicted; exiting from deep
    /// nesting then lands on the root a little early instead of losing
    /// the current frame.
    pub fn enter(&mut self, widget: WidgetId) {
        if self.stack.is_full() {
            self.stack.remove(0);
        }
        let _ = self.stack.push(self.frame);
        self.frame = UiFrame { widget, cursor: 0 };
        if widget.is_menu() {
            self.should_print = true;
        }
    }

    /// Return to the parent frame, or to the root when there is none.
    pub fn exit(&mut self) {
        self.frame = self
            .stack
            .pop()
            .unwrap_or(UiFrame { widget: WidgetId::RootMenu, cursor: 0 });
        if self.frame.widget.is_menu() {
            self.should_print = true;
        }
    }

    fn prev_item(&mut self) {
        let count = items_for(self.frame.widget).len() as u8;
        self.frame.cursor = if self.frame.cursor == 0 {
            count - 1
        } else {
            self.frame.cursor - 1
        };
        self.should_print = true;
    }

    fn next_item(&mut self) {
        let count = items_for(self.frame.widget).len() as u8;
        self.frame.cursor = (self.frame.cursor + 1) % count;
        self.should_print = true;
    }

    /// Advance the UI one pass. Call once per main-loop iteration while
    /// in menu mode; the sensor session itself is ticked by the caller.
    pub fn poll<B, D, const N: usize>(
        &mut self,
        buttons: &ButtonState,
        sensor: &mut SensorSession<B>,
        store: &SharedStore<D, N>,
        sink: &mut OutputSink,
    ) where
        B: BusDriver,
        D: EepromDevice,
    {
        if self.frame.widget.is_menu() {
            self.poll_menu(buttons, sink);
        } else {
            self.poll_modal(buttons, sensor, store, sink);
        }
    }

    fn poll_menu(&mut self, buttons: &ButtonState, sink: &mut OutputSink) {
        let items = items_for(self.frame.widget);

        if self.should_print && sink.is_idle() {
            sink.begin(items[self.frame.cursor as usize].label);
            self.should_print = false;
        }

        if buttons.pressed(BUTTON_PREV) {
            self.prev_item();
        } else if buttons.pressed(BUTTON_NEXT) {
            self.next_item();
        } else if buttons.pressed(BUTTON_CONFIRM) {
            match items[self.frame.cursor as usize].action {
                Some(widget) => self.enter(widget),
                None => self.exit(),
            }
        }
    }

    fn poll_modal<B, D, const N: usize>(
        &mut self,
        buttons: &ButtonState,
        sensor: &mut SensorSession<B>,
        store: &SharedStore<D, N>,
        sink: &mut OutputSink,
    ) where
        B: BusDriver,
        D: EepromDevice,
    {
        match self.frame.widget {
            WidgetId::SensorId => {
                if !sink.is_idle() {
                    return;
                }
                if self.frame.cursor == 0 {
                    sensor.reset_op();
                    self.frame.cursor = 1;
                }
                match sensor.poll_read_identification() {
                    Step::Busy => {}
                    Step::Done(id) => {
                        let mut line: String<8> = String::new();
                        for b in id {
                            let _ = line.push(b as char);
                        }
                        let _ = line.push('\n');
                        sink.begin(&line);
                        self.exit();
                    }
                    Step::Failed(_) => {
                        sink.begin(SENSOR_ERROR_TEXT);
                        self.exit();
                    }
                }
            }

            WidgetId::ReadOnce => {
                if self.frame.cursor == 0 {
                    if !sink.is_idle() {
                        return;
                    }
                    sensor.start_continuous();
                    self.frame.cursor = 1;
                } else if sink.is_idle() {
                    if let Some(sample) = sensor.take_new_data() {
                        sensor.stop_continuous();
                        print_vector(sink, &sample);
                        self.exit();
                    } else if sensor.had_error() {
                        sensor.stop_continuous();
                        sink.begin(SENSOR_ERROR_TEXT);
                        self.exit();
                    }
                }
            }

            WidgetId::ReadContinuous => {
                if self.frame.cursor == 0 {
                    if !sink.is_idle() {
                        return;
                    }
                    sensor.start_continuous();
                    self.frame.cursor = 1;
                    return;
                }
                if sink.is_idle() {
                    if let Some(sample) = sensor.take_new_data() {
                        print_vector(sink, &sample);
                    } else if sensor.had_error() {
                        sensor.stop_continuous();
                        sink.begin(SENSOR_ERROR_TEXT);
                        self.exit();
                        return;
                    }
                }
                if buttons.pressed(BUTTON_CONFIRM) {
                    sensor.stop_continuous();
                    self.exit();
                }
            }

            WidgetId::RecalibrateZero => match self.frame.cursor {
                0 => {
                    if !sink.is_idle() {
                        return;
                    }
                    sink.begin("Keep the sensor still, then confirm\n");
                    sensor.begin_zero_capture();
                    sensor.start_continuous();
                    self.frame.cursor = 1;
                }
                1 => {
                    if sensor.had_error() {
                        sensor.stop_continuous();
                        if sink.is_idle() {
                            sink.begin(SENSOR_ERROR_TEXT);
                            self.exit();
                        }
                        return;
                    }
                    if buttons.pressed(BUTTON_CONFIRM) {
                        sensor.stop_continuous();
                        sensor.finish_zero_capture();
                        sensor.calibration().store(store);
                        self.frame.cursor = 2;
                    }
                }
                _ => {
                    if sink.is_idle() {
                        let zero = sensor.calibration().zero;
                        print_vector(sink, &zero);
                        self.exit();
                    }
                }
            },

            WidgetId::RecalibrateCorners => {
                if self.frame.cursor == 0 {
                    if !sink.is_idle() {
                        return;
                    }
                    sensor.start_continuous();
                    self.frame.cursor = 1;
                    self.should_print = true;
                }

                if sensor.had_error() {
                    sensor.stop_continuous();
                    if sink.is_idle() {
                        sink.begin(SENSOR_ERROR_TEXT);
                        self.exit();
                    }
                    return;
                }

                let corner = (self.frame.cursor - 1) as usize;
                if self.should_print && sink.is_idle() {
                    sink.begin(CORNER_PROMPTS[corner]);
                    self.should_print = false;
                }

                if buttons.pressed(BUTTON_CONFIRM) {
                    sensor.capture_corner(corner);
                    if corner == 3 {
                        sensor.stop_continuous();
                        sensor.calibration().store(store);
                        self.exit();
                    } else {
                        self.frame.cursor += 1;
                        self.should_print = true;
                    }
                }
            }

            WidgetId::PrintZero => {
                if sink.is_idle() {
                    let zero = sensor.calibration().zero;
                    print_vector(sink, &zero);
                    self.exit();
                }
            }

            WidgetId::PrintCorners => {
                // One corner per pass, each waiting its turn at the sink.
                if sink.is_idle() {
                    let corner = self.frame.cursor as usize;
                    let v = sensor.calibration().corners[corner];
                    print_vector(sink, &v);
                    if corner == 3 {
                        self.exit();
                    } else {
                        self.frame.cursor += 1;
                    }
                }
            }

            WidgetId::ToggleZeroCompensation => {
                if sink.is_idle() {
                    let cal = sensor.calibration_mut();
                    cal.zero_compensation = !cal.zero_compensation;
                    let enabled = cal.zero_compensation;
                    sensor.calibration().store_compensation_flag(store);
                    sink.begin(if enabled {
                        "Zero compensation is on\n"
                    } else {
                        "Zero compensation is off\n"
                    });
                    self.exit();
                }
            }

            // Menu widgets are handled in poll_menu.
            _ => self.exit(),
        }
    }
}

impl Default for Ui {
    fn default() -> Self {
        Self::new()
    }
}

/// Queue "x<TAB>y<TAB>z\n" on the sink.
fn print_vector(sink: &mut OutputSink, v: &XyzVector) -> bool {
    let mut line: String<32> = String::new();
    let _ = write!(line, "{}\t{}\t{}\n", v.x, v.y, v.z);
    sink.begin(&line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::buttons::BUTTON_CONFIRM;

    struct InstantBus {
        regs: [u8; 13],
        pointer: usize,
        reply: std::vec::Vec<u8>,
        fail_reads: bool,
    }

    impl InstantBus {
        fn new() -> Self {
            let mut regs = [0u8; 13];
            regs[10..13].copy_from_slice(b"H43");
            Self {
                regs,
                pointer: 0,
                reply: std::vec::Vec::new(),
                fail_reads: false,
            }
        }
    }

    impl BusDriver for InstantBus {
        fn is_busy(&self) -> bool {
            false
        }
        fn start_transfer(&mut self, msg: &[u8]) {
            if msg[0] == crate::config::SENSOR_I2C_WRITE_ADDRESS {
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
            if self.fail_reads {
                return false;
            }
            buf[1..1 + self.reply.len()].copy_from_slice(&self.reply);
            true
        }
    }

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

    struct Fixture {
        ui: Ui,
        buttons: ButtonState,
        sensor: SensorSession<InstantBus>,
        store: SharedStore<RamEeprom, 64>,
        sink: OutputSink,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                ui: Ui::new(),
                buttons: ButtonState::new(),
                sensor: SensorSession::new(InstantBus::new()),
                store: SharedStore::new(RamEeprom { cells: [0xFF; 64] }),
                sink: OutputSink::new(),
            }
        }

        fn poll(&mut self) {
            self.ui
                .poll(&self.buttons, &mut self.sensor, &self.store, &mut self.sink);
        }

        fn press_confirm(&mut self) {
            // 8 stable ticks to register, one more pass for the edge.
            for _ in 0..7 {
                self.buttons.update(BUTTON_CONFIRM, true);
            }
            self.buttons.update(BUTTON_CONFIRM, true);
            assert!(self.buttons.pressed(BUTTON_CONFIRM));
            self.poll();
            for _ in 0..8 {
                self.buttons.update(0, true);
            }
        }

        fn drain_sink(&mut self) -> std::string::String {
            let mut out = std::string::String::new();
            while let Some(b) = self.sink.peek() {
                out.push(b as char);
                self.sink.advance();
            }
            out
        }
    }

    #[test]
    fn enter_then_exit_restores_the_previous_frame() {
        let mut ui = Ui::new();
        ui.enter(WidgetId::MainMenu);
        let before = ui.active_widget();
        let depth = ui.depth();
        ui.enter(WidgetId::SensorMenu);
        ui.exit();
        assert_eq!(ui.active_widget(), before);
        assert_eq!(ui.depth(), depth);
    }

    #[test]
    fn exit_on_empty_stack_resets_to_root() {
        let mut ui = Ui::new();
        ui.exit();
        assert_eq!(ui.active_widget(), WidgetId::RootMenu);
    }

    #[test]
    fn overfull_stack_evicts_the_oldest_frame() {
        let mut ui = Ui::new();
        for _ in 0..UI_STACK_DEPTH + 2 {
            ui.enter(WidgetId::MainMenu);
        }
        assert_eq!(ui.depth(), UI_STACK_DEPTH);
    }

    #[test]
    fn menu_cursor_wraps_both_directions() {
        let mut f = Fixture::new();
        f.ui.enter(WidgetId::MainMenu);
        let count = MAIN_MENU_ITEMS.len() as u8;
        f.ui.prev_item();
        assert_eq!(f.ui.frame.cursor, count - 1);
        f.ui.next_item();
        assert_eq!(f.ui.frame.cursor, 0);
    }

    #[test]
    fn menu_prints_only_when_sink_is_idle() {
        let mut f = Fixture::new();
        f.ui.enter(WidgetId::MainMenu);
        assert!(f.sink.begin("busy"));
        f.poll();
        // Still leased by the previous output.
        assert_eq!(f.drain_sink(), "busy");
        f.poll();
        assert_eq!(f.drain_sink(), "1. Calibrate zero\n");
    }

    #[test]
    fn root_menu_confirm_enters_the_main_menu() {
        let mut f = Fixture::new();
        f.poll();
        f.drain_sink();
        f.press_confirm();
        assert_eq!(f.ui.active_widget(), WidgetId::MainMenu);
        f.poll();
        assert_eq!(f.drain_sink(), "1. Calibrate zero\n");
    }

    #[test]
    fn sensor_id_widget_prints_and_returns() {
        let mut f = Fixture::new();
        f.ui.enter(WidgetId::SensorMenu);
        f.ui.enter(WidgetId::SensorId);
        f.poll();
        assert_eq!(f.drain_sink(), "H43\n");
        assert_eq!(f.ui.active_widget(), WidgetId::SensorMenu);
    }

    #[test]
    fn sensor_id_error_prints_error_text() {
        let mut f = Fixture::new();
        f.sensor = SensorSession::new(InstantBus {
            fail_reads: true,
            ..InstantBus::new()
        });
        f.ui.enter(WidgetId::SensorMenu);
        f.ui.enter(WidgetId::SensorId);
        f.poll();
        assert_eq!(f.drain_sink(), SENSOR_ERROR_TEXT);
        assert_eq!(f.ui.active_widget(), WidgetId::SensorMenu);
    }

    #[test]
    fn read_once_prints_one_sample() {
        let mut f = Fixture::new();
        f.sensor.calibration_mut().zero_compensation = false;
        f.sensor.bus_mut().regs[3..9].copy_from_slice(&[0, 1, 0, 3, 0, 2]);
        f.ui.enter(WidgetId::SensorMenu);
        f.ui.enter(WidgetId::ReadOnce);
        f.poll(); // starts continuous reading
        f.sensor.tick();
        f.poll(); // consumes the sample and prints
        assert_eq!(f.drain_sink(), "1\t2\t3\n");
        assert!(!f.sensor.is_continuous());
        assert_eq!(f.ui.active_widget(), WidgetId::SensorMenu);
    }

    #[test]
    fn toggle_widget_flips_and_persists_the_flag() {
        let mut f = Fixture::new();
        f.sensor.calibration().store(&f.store);
        assert!(f.sensor.calibration().zero_compensation);
        f.ui.enter(WidgetId::ZeroMenu);
        f.ui.enter(WidgetId::ToggleZeroCompensation);
        f.poll();
        assert_eq!(f.drain_sink(), "Zero compensation is off\n");
        assert!(!f.sensor.calibration().zero_compensation);
        assert_eq!(f.store.read(crate::config::CALIBRATION_RECORD_ADDR), 0);
    }

    #[test]
    fn corner_recalibration_walks_all_four_prompts() {
        let mut f = Fixture::new();
        f.sensor.calibration_mut().zero_compensation = false;
        f.ui.enter(WidgetId::CornersMenu);
        f.ui.enter(WidgetId::RecalibrateCorners);

        for (i, prompt) in CORNER_PROMPTS.iter().enumerate() {
            f.poll();
            assert_eq!(f.drain_sink(), *prompt);
            let axis = (i as i16 + 1) * 100;
            f.sensor.bus_mut().regs[3..5].copy_from_slice(&axis.to_be_bytes());
            // Enough ticks to ride out the probe countdown.
            for _ in 0..8 {
                f.sensor.tick();
            }
            f.press_confirm();
        }

        assert_eq!(f.ui.active_widget(), WidgetId::CornersMenu);
        assert!(!f.sensor.is_continuous());
        let corners = f.sensor.calibration().corners;
        assert_eq!(corners[0].x, 100);
        assert_eq!(corners[3].x, 400);
        // Persisted through the store as well.
        let reloaded = crate::sensor::CalibrationData::load(&f.store);
        assert_eq!(reloaded.corners, corners);
    }
}
