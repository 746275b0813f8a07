//! HMC5883L magnetometer session.
//!
//! All device traffic goes through resumable step machines built on
//! [`crate::bus::BusDriver`]: every `poll_*` function is safe to call
//! each tick, returns [`Step::Busy`] without side effects while the bus
//! is working, and walks its phases with fallthrough so a poll on an
//! idle bus completes as many steps as the hardware allows.
//!
//! A session only ever runs one operation at a time. The current
//! operation is tagged in `active_op`; starting a different operation
//! resets the phase first, so a half-finished read can never leak its
//! resume point into a configure (and vice versa).

pub mod calibration;

pub use calibration::CalibrationData;

use crate::bus::{BusDriver, Phase, Step};
use crate::config::{
    SENSOR_CONF_A_VALUE, SENSOR_CONF_B_VALUE, SENSOR_DATA_OVERFLOW, SENSOR_I2C_READ_ADDRESS,
    SENSOR_I2C_WRITE_ADDRESS, SENSOR_MODE_VALUE, SENSOR_PROBE_INTERVAL_TICKS,
    SENSOR_REG_CONF_A, SENSOR_REG_CONF_B, SENSOR_REG_DATA_START, SENSOR_REG_ID_A,
    SENSOR_REG_MODE,
};
use crate::error::Error;
use crate::storage::{EepromDevice, SharedStore};

/// One three-axis sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct XyzVector {
    pub x: i16,
    pub y: i16,
    pub z: i16,
}

/// Which step machine currently owns the phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Configure,
    ReadData,
    ReadId,
}

/// Driver session for one magnetometer on the bus.
pub struct SensorSession<B: BusDriver> {
    bus: B,
    phase: Phase,
    active_op: Option<Operation>,

    data: XyzVector,
    overflow: bool,
    new_data_available: bool,
    error_while_reading: bool,

    continuous: bool,
    probe_countdown: u8,

    cal: CalibrationData,
    // Zero capture runs with compensation bypassed and tracks the raw
    // extremes seen so far; the midpoint becomes the new zero.
    raw_capture: bool,
    capture_min: XyzVector,
    capture_max: XyzVector,
}

impl<B: BusDriver> SensorSession<B> {
    pub fn new(bus: B) -> Self {
        Self {
            bus,
            phase: Phase::SetPointer,
            active_op: None,
            data: XyzVector::default(),
            overflow: false,
            new_data_available: false,
            error_while_reading: false,
            continuous: false,
            probe_countdown: 0,
            cal: CalibrationData::default(),
            raw_capture: false,
            capture_min: XyzVector::default(),
            capture_max: XyzVector::default(),
        }
    }

    /// Claim the phase for `op`, resetting it if another operation (or
    /// none) held it before.
    fn begin_op(&mut self, op: Operation) {
        if self.active_op != Some(op) {
            self.phase = Phase::SetPointer;
            self.active_op = Some(op);
        }
    }

    fn finish_op(&mut self) {
        self.phase = Phase::SetPointer;
        self.active_op = None;
    }

    /// Abandon any in-flight operation; the next poll starts fresh.
    pub fn reset_op(&mut self) {
        self.finish_op();
    }

    /// Write the device's internal register pointer.
    fn set_address_pointer(&mut self, reg: u8) {
        self.bus.start_transfer(&[SENSOR_I2C_WRITE_ADDRESS, reg]);
    }

    /// Write one configuration register.
    fn set_register_value(&mut self, reg: u8, value: u8) {
        self.bus.start_transfer(&[SENSOR_I2C_WRITE_ADDRESS, reg, value]);
    }

    /// Push the fixed configuration (8-sample averaging, 75 Hz,
    /// 1.3 Ga gain, continuous measurement), one register per step.
    pub fn poll_configure(&mut self) -> Step<()> {
        self.begin_op(Operation::Configure);

        if self.phase == Phase::SetPointer {
            if self.bus.is_busy() {
                return Step::Busy;
            }
            self.set_register_value(SENSOR_REG_CONF_A, SENSOR_CONF_A_VALUE);
            self.phase = Phase::StartTransfer;
        }
        if self.phase == Phase::StartTransfer {
            if self.bus.is_busy() {
                return Step::Busy;
            }
            self.set_register_value(SENSOR_REG_CONF_B, SENSOR_CONF_B_VALUE);
            self.phase = Phase::FetchResult;
        }
        if self.bus.is_busy() {
            return Step::Busy;
        }
        self.set_register_value(SENSOR_REG_MODE, SENSOR_MODE_VALUE);
        self.finish_op();
        Step::Done(())
    }

    /// Read the X, Y, Z data registers.
    ///
    /// On success the sample (zero-compensated unless disabled, raw
    /// during zero capture) is latched as the session's newest data and
    /// also returned. On a failed transfer the previous sample is kept
    /// and the sticky error flag is set.
    pub fn poll_read_data(&mut self) -> Step<XyzVector> {
        self.begin_op(Operation::ReadData);

        if self.phase == Phase::SetPointer {
            if self.bus.is_busy() {
                return Step::Busy;
            }
            self.set_address_pointer(SENSOR_REG_DATA_START);
            self.phase = Phase::StartTransfer;
        }
        if self.phase == Phase::StartTransfer {
            if self.bus.is_busy() {
                return Step::Busy;
            }
            // Address byte + 6 data bytes.
            self.bus.start_transfer(&[SENSOR_I2C_READ_ADDRESS, 0, 0, 0, 0, 0, 0]);
            self.phase = Phase::FetchResult;
        }
        if self.bus.is_busy() {
            return Step::Busy;
        }

        let mut msg = [0u8; 7];
        let ok = self.bus.fetch_result(&mut msg);
        self.finish_op();
        if !ok {
            self.error_while_reading = true;
            return Step::Failed(Error::Bus);
        }
        self.error_while_reading = false;

        // Register order on the wire is X, Z, Y, big-endian each.
        let x = i16::from_be_bytes([msg[1], msg[2]]);
        let z = i16::from_be_bytes([msg[3], msg[4]]);
        let y = i16::from_be_bytes([msg[5], msg[6]]);

        self.overflow = x == SENSOR_DATA_OVERFLOW
            || y == SENSOR_DATA_OVERFLOW
            || z == SENSOR_DATA_OVERFLOW;

        let mut sample = XyzVector { x, y, z };
        if self.overflow {
            self.data = sample;
            self.new_data_available = true;
            return Step::Done(sample);
        }

        if self.raw_capture {
            self.capture_min.x = self.capture_min.x.min(sample.x);
            self.capture_min.y = self.capture_min.y.min(sample.y);
            self.capture_min.z = self.capture_min.z.min(sample.z);
            self.capture_max.x = self.capture_max.x.max(sample.x);
            self.capture_max.y = self.capture_max.y.max(sample.y);
            self.capture_max.z = self.capture_max.z.max(sample.z);
        } else if self.cal.zero_compensation {
            sample.x = sample.x.wrapping_sub(self.cal.zero.x);
            sample.y = sample.y.wrapping_sub(self.cal.zero.y);
            sample.z = sample.z.wrapping_sub(self.cal.zero.z);
        }

        self.data = sample;
        self.new_data_available = true;
        Step::Done(sample)
    }

    /// Read the three identification registers (ASCII `H43` on a
    /// healthy device).
    pub fn poll_read_identification(&mut self) -> Step<[u8; 3]> {
        self.begin_op(Operation::ReadId);

        if self.phase == Phase::SetPointer {
            if self.bus.is_busy() {
                return Step::Busy;
            }
            self.set_address_pointer(SENSOR_REG_ID_A);
            self.phase = Phase::StartTransfer;
        }
        if self.phase == Phase::StartTransfer {
            if self.bus.is_busy() {
                return Step::Busy;
            }
            self.bus.start_transfer(&[SENSOR_I2C_READ_ADDRESS, 0, 0, 0]);
            self.phase = Phase::FetchResult;
        }
        if self.bus.is_busy() {
            return Step::Busy;
        }

        let mut msg = [0u8; 4];
        let ok = self.bus.fetch_result(&mut msg);
        self.finish_op();
        if !ok {
            self.error_while_reading = true;
            return Step::Failed(Error::Bus);
        }
        self.error_while_reading = false;
        Step::Done([msg[1], msg[2], msg[3]])
    }

    /// Start periodic data reads. Clears stale data and errors.
    pub fn start_continuous(&mut self) {
        self.reset_op();
        self.continuous = true;
        self.probe_countdown = 0;
        self.new_data_available = false;
        self.error_while_reading = false;
    }

    /// Stop periodic reads. Latched data and error flags survive so the
    /// caller can still inspect the last outcome.
    pub fn stop_continuous(&mut self) {
        self.reset_op();
        self.continuous = false;
    }

    pub fn is_continuous(&self) -> bool {
        self.continuous
    }

    /// Timer tick while continuous reading is active: finish an
    /// in-flight read first, otherwise count down to the next probe.
    pub fn tick(&mut self) {
        if !self.continuous {
            return;
        }
        if self.active_op == Some(Operation::ReadData) {
            let _ = self.poll_read_data();
            return;
        }
        if self.probe_countdown > 0 {
            self.probe_countdown -= 1;
            return;
        }
        self.probe_countdown = SENSOR_PROBE_INTERVAL_TICKS;
        let _ = self.poll_read_data();
    }

    /// Take the newest sample, if one arrived since the last take.
    pub fn take_new_data(&mut self) -> Option<XyzVector> {
        if self.new_data_available {
            self.new_data_available = false;
            Some(self.data)
        } else {
            None
        }
    }

    /// Last accepted sample, whether or not it has been taken.
    pub fn last_data(&self) -> XyzVector {
        self.data
    }

    /// Whether the last sample hit the device's overflow sentinel.
    pub fn overflowed(&self) -> bool {
        self.overflow
    }

    /// Sticky transfer-error flag.
    pub fn had_error(&self) -> bool {
        self.error_while_reading
    }

    pub fn clear_error(&mut self) {
        self.error_while_reading = false;
    }

    /// Begin collecting raw samples for a new zero offset.
    pub fn begin_zero_capture(&mut self) {
        self.raw_capture = true;
        self.capture_min = XyzVector { x: i16::MAX, y: i16::MAX, z: i16::MAX };
        self.capture_max = XyzVector { x: i16::MIN, y: i16::MIN, z: i16::MIN };
    }

    /// Finish zero capture: the new zero is the midpoint of the observed
    /// extremes. Returns the captured zero.
    pub fn finish_zero_capture(&mut self) -> XyzVector {
        self.raw_capture = false;
        let mid = |lo: i16, hi: i16| ((lo as i32 + hi as i32) / 2) as i16;
        self.cal.zero = XyzVector {
            x: mid(self.capture_min.x, self.capture_max.x),
            y: mid(self.capture_min.y, self.capture_max.y),
            z: mid(self.capture_min.z, self.capture_max.z),
        };
        self.cal.zero
    }

    /// Record the last sample as corner `index` (top-left, top-right,
    /// bottom-left, bottom-right).
    pub fn capture_corner(&mut self, index: usize) {
        self.cal.corners[index] = self.data;
    }

    /// Direct access to the underlying bus driver.
    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn calibration(&self) -> &CalibrationData {
        &self.cal
    }

    pub fn calibration_mut(&mut self) -> &mut CalibrationData {
        &mut self.cal
    }

    /// Replace the in-memory calibration with the persisted record.
    pub fn load_calibration<D: EepromDevice, const N: usize>(
        &mut self,
        store: &SharedStore<D, N>,
    ) {
        self.cal = CalibrationData::load(store);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::cell::Cell;

    /// Register-pointer model of the device. Each transfer keeps the bus
    /// busy for `busy_per_transfer` polls of `is_busy`.
    struct FakeBus {
        regs: [u8; 13],
        pointer: usize,
        reply: std::vec::Vec<u8>,
        busy_per_transfer: u8,
        busy: Cell<u8>,
        fail_reads: bool,
        transfers: usize,
    }

    impl FakeBus {
        fn new() -> Self {
            let mut regs = [0u8; 13];
            regs[10..13].copy_from_slice(b"H43");
            Self {
                regs,
                pointer: 0,
                reply: std::vec::Vec::new(),
                busy_per_transfer: 0,
                busy: Cell::new(0),
                fail_reads: false,
                transfers: 0,
            }
        }

        fn set_axes(&mut self, x: i16, y: i16, z: i16) {
            self.regs[3..5].copy_from_slice(&x.to_be_bytes());
            self.regs[5..7].copy_from_slice(&z.to_be_bytes());
            self.regs[7..9].copy_from_slice(&y.to_be_bytes());
        }
    }

    impl BusDriver for FakeBus {
        fn is_busy(&self) -> bool {
            let n = self.busy.get();
            if n > 0 {
                self.busy.set(n - 1);
                true
            } else {
                false
            }
        }

        fn start_transfer(&mut self, msg: &[u8]) {
            self.transfers += 1;
            self.busy.set(self.busy_per_transfer);
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
            if self.fail_reads {
                return false;
            }
            buf[1..1 + self.reply.len()].copy_from_slice(&self.reply);
            true
        }
    }

    fn session(bus: FakeBus) -> SensorSession<FakeBus> {
        let mut s = SensorSession::new(bus);
        s.calibration_mut().zero_compensation = false;
        s
    }

    #[test]
    fn data_read_completes_in_one_poll_on_idle_bus() {
        let mut bus = FakeBus::new();
        bus.set_axes(1, 2, 3);
        let mut s = session(bus);
        assert_eq!(s.poll_read_data(), Step::Done(XyzVector { x: 1, y: 2, z: 3 }));
        assert!(!s.overflowed());
        assert_eq!(s.take_new_data(), Some(XyzVector { x: 1, y: 2, z: 3 }));
        assert_eq!(s.take_new_data(), None);
    }

    #[test]
    fn busy_polls_are_side_effect_free() {
        let mut bus = FakeBus::new();
        bus.set_axes(10, 20, 30);
        bus.busy_per_transfer = 2;
        let mut s = session(bus);

        let mut polls = 0;
        let sample = loop {
            polls += 1;
            match s.poll_read_data() {
                Step::Busy => continue,
                Step::Done(v) => break v,
                Step::Failed(e) => panic!("unexpected failure: {e:?}"),
            }
        };
        assert_eq!(sample, XyzVector { x: 10, y: 20, z: 30 });
        // Pointer write + data read, regardless of how often we polled.
        assert_eq!(s.bus.transfers, 2);
        assert!(polls > 2);
    }

    #[test]
    fn failed_transfer_latches_sticky_error() {
        let mut bus = FakeBus::new();
        bus.fail_reads = true;
        let mut s = session(bus);
        assert_eq!(s.poll_read_data(), Step::Failed(Error::Bus));
        assert!(s.had_error());
        // Data untouched by the failed read.
        assert_eq!(s.last_data(), XyzVector::default());
    }

    #[test]
    fn overflow_sentinel_flags_sample() {
        let mut bus = FakeBus::new();
        bus.set_axes(5, SENSOR_DATA_OVERFLOW, 5);
        let mut s = SensorSession::new(bus);
        let Step::Done(sample) = s.poll_read_data() else {
            panic!("expected completion")
        };
        assert!(s.overflowed());
        // Overflowed samples bypass zero compensation.
        assert_eq!(sample.y, SENSOR_DATA_OVERFLOW);
    }

    #[test]
    fn zero_compensation_subtracts_offset() {
        let mut bus = FakeBus::new();
        bus.set_axes(100, 100, 100);
        let mut s = SensorSession::new(bus);
        s.calibration_mut().zero_compensation = true;
        s.calibration_mut().zero = XyzVector { x: 10, y: -10, z: 0 };
        assert_eq!(
            s.poll_read_data(),
            Step::Done(XyzVector { x: 90, y: 110, z: 100 })
        );
    }

    #[test]
    fn switching_operations_restarts_the_phase() {
        let mut bus = FakeBus::new();
        bus.busy_per_transfer = 10;
        let mut s = session(bus);

        // Get a data read past its first phase.
        assert!(s.poll_read_data().is_busy());
        s.bus.busy.set(0);

        // A different operation must not resume at the stale phase:
        // its first transfer is the CONF_A register write.
        s.reset_op();
        let _ = s.poll_configure();
        let conf_a_written = s.bus.regs[SENSOR_REG_CONF_A as usize];
        assert_eq!(conf_a_written, SENSOR_CONF_A_VALUE);
    }

    #[test]
    fn configure_writes_all_three_registers() {
        let mut s = session(FakeBus::new());
        assert_eq!(s.poll_configure(), Step::Done(()));
        assert_eq!(s.bus.regs[SENSOR_REG_CONF_A as usize], SENSOR_CONF_A_VALUE);
        assert_eq!(s.bus.regs[SENSOR_REG_CONF_B as usize], SENSOR_CONF_B_VALUE);
        assert_eq!(s.bus.regs[SENSOR_REG_MODE as usize], SENSOR_MODE_VALUE);
    }

    #[test]
    fn identification_reads_ascii_h43() {
        let mut s = session(FakeBus::new());
        assert_eq!(s.poll_read_identification(), Step::Done(*b"H43"));
    }

    #[test]
    fn continuous_ticks_pace_the_probes() {
        let mut bus = FakeBus::new();
        bus.set_axes(1, 1, 1);
        let mut s = session(bus);
        s.start_continuous();

        // First tick probes immediately; the next probe waits out the
        // countdown.
        s.tick();
        assert!(s.take_new_data().is_some());
        let after_first = s.bus.transfers;
        for _ in 0..SENSOR_PROBE_INTERVAL_TICKS {
            s.tick();
        }
        assert_eq!(s.bus.transfers, after_first);
        s.tick();
        assert!(s.bus.transfers > after_first);
        assert!(s.take_new_data().is_some());
    }

    #[test]
    fn zero_capture_takes_midpoint_of_extremes() {
        let mut bus = FakeBus::new();
        bus.set_axes(0, 0, 0);
        let mut s = SensorSession::new(bus);
        s.calibration_mut().zero_compensation = true;
        s.begin_zero_capture();

        for (x, y, z) in [(10, -20, 30), (-30, 40, 10), (20, 0, -10)] {
            s.bus.set_axes(x, y, z);
            let Step::Done(raw) = s.poll_read_data() else {
                panic!("expected completion")
            };
            // Capture samples stay uncompensated.
            assert_eq!(raw, XyzVector { x, y, z });
        }

        let zero = s.finish_zero_capture();
        assert_eq!(zero, XyzVector { x: -5, y: 10, z: 10 });
        assert_eq!(s.calibration().zero, zero);
    }
}
