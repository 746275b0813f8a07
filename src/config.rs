//! Application-wide constants and compile-time configuration.
//!
//! All timing parameters, buffer capacities, device addresses and
//! persistent-storage layout constants live here so they can be tuned
//! in one place.

// Timing

/// Main timer tick period (microseconds). The original hardware timer
/// overflows every 1.365 ms; debouncing and sensor pacing count these.
pub const TIMER_TICK_US: u32 = 1365;

/// Ticks between the start of two sensor data probes while continuous
/// reading is active. The sensor refreshes at 75 Hz; probing at roughly
/// twice that rate keeps latency low without oversampling the device.
pub const SENSOR_PROBE_INTERVAL_TICKS: u8 = 5;

// EEPROM write-back store

/// Number of pending byte writes the write-back cache can hold.
pub const WRITE_BUFFER_SLOTS: usize = 16;

/// First EEPROM address of the calibration record.
pub const CALIBRATION_RECORD_ADDR: u16 = 1;

// Sensor (HMC5883L 3-axis magnetometer)

/// I2C address byte for reads (device address + read bit).
pub const SENSOR_I2C_READ_ADDRESS: u8 = 0x3D;
/// I2C address byte for writes (device address + write bit).
pub const SENSOR_I2C_WRITE_ADDRESS: u8 = 0x3C;

// Register map (HMC5883L datasheet, page 11)
pub const SENSOR_REG_CONF_A: u8 = 0;
pub const SENSOR_REG_CONF_B: u8 = 1;
pub const SENSOR_REG_MODE: u8 = 2;
/// Data registers 3..=8 hold X, Z, Y as big-endian 16-bit pairs.
pub const SENSOR_REG_DATA_START: u8 = 3;
/// Identification registers 10..=12 read as ASCII "H43".
pub const SENSOR_REG_ID_A: u8 = 10;

/// Configuration register A: average 8 samples, 75 Hz output rate,
/// normal measurement bias.
pub const SENSOR_CONF_A_VALUE: u8 = 0x60 | 0x18;
/// Configuration register B: 1.3 Ga gain.
pub const SENSOR_CONF_B_VALUE: u8 = 0x20;
/// Mode register: continuous measurement.
pub const SENSOR_MODE_VALUE: u8 = 0x00;

/// Any axis reading equal to this sentinel means the sensor saturated
/// and the whole sample is invalid.
pub const SENSOR_DATA_OVERFLOW: i16 = -4096;

// UI

/// Maximum depth of the widget navigation stack. Arbitrary; the deepest
/// real path is root -> main menu -> submenu -> modal widget.
pub const UI_STACK_DEPTH: usize = 5;

/// Capacity of the shared text output buffer (bytes).
pub const OUTPUT_BUFFER_LEN: usize = 80;

// USB HID

/// Keyboard report: {modifier, keycode}.
pub const KEYBOARD_REPORT_SIZE: usize = 2;

/// Mouse report: {report id, x lo, x hi, y lo, y hi, buttons}.
pub const MOUSE_REPORT_SIZE: usize = 6;

/// Report ID of the absolute-pointer report.
pub const MOUSE_REPORT_ID: u8 = 2;
