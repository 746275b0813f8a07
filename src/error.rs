//! Unified error type for mag2usb.
//!
//! We avoid `alloc` - all variants carry only fixed-size data.
//! Derives `defmt::Format` for efficient on-target logging when the
//! `defmt` feature is enabled.

/// Top-level error type used across the firmware core.
///
/// Nothing here is fatal: bus errors degrade to an error message on the
/// next tick, and a full write buffer only ever blocks the caller of the
/// busy-waiting write path until the drain frees a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A bus transfer did not complete successfully. The sensor session
    /// additionally latches this in its sticky `error_while_reading` flag.
    Bus,

    /// The write-back buffer has no free slot. Internal to the blocking
    /// write path; callers of `try_write` may see it and retry.
    StoreFull,
}
