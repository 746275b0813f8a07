//! USB HID report construction.
//!
//! Two interfaces are exposed to the host: a minimal one-key keyboard
//! used to type menu text, and an absolute pointer whose coordinates
//! come from the calibrated sensor mapping. Report layouts match the
//! descriptors below byte for byte; transports only shuttle the
//! serialized bytes.

pub mod keyboard;
pub mod mouse;

pub use keyboard::{KeyboardReport, TextTyper};
pub use mouse::MouseReport;

/// Contract of the USB interrupt-in endpoint.
///
/// `interrupt_ready` gates report submission: a new report may only be
/// handed over once the previous one has left the endpoint buffer.
pub trait HidTransport {
    /// Whether the endpoint can accept a report right now.
    fn interrupt_ready(&mut self) -> bool;

    /// Queue `report` bytes on the interrupt endpoint. Must only be
    /// called after `interrupt_ready` returned `true`.
    fn submit(&mut self, report: &[u8]);
}
