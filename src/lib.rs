//! Core logic of a magnetometer-driven USB HID pointer/keyboard device.
//!
//! Everything hardware-specific sits behind three small traits
//! ([`storage::EepromDevice`], [`bus::BusDriver`], [`hid::HidTransport`]),
//! so the whole application is host-testable; the embedded target and
//! the simulator only provide trait implementations and the main loop.
//!
//! Module map:
//! - [`storage`]: write-back cache over a slow persistent byte store
//! - [`bus`]: non-blocking bus contract and the step-machine vocabulary
//! - [`sensor`]: HMC5883L session (configure, read, calibrate)
//! - [`mapping`]: corner calibration to screen coordinates
//! - [`hid`]: keyboard/mouse report construction
//! - [`output`]: single in-flight text sink
//! - [`ui`]: button debouncing and the menu/widget stack
//! - [`app`]: ties it all together, one `poll` per loop iteration

#![cfg_attr(not(test), no_std)]

pub mod app;
pub mod bus;
pub mod config;
pub mod error;
pub mod hid;
pub mod mapping;
pub mod output;
pub mod sensor;
pub mod storage;
pub mod ui;

pub use error::Error;
