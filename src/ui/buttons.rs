//! Push-button debouncing and edge detection.
//!
//! The raw input lines are sampled once per timer tick into per-button
//! shift registers. A button changes state only after 8 consecutive
//! identical samples (8 ticks of 1.365 ms, roughly 11 ms), which rides
//! out contact bounce. Intermediate register values leave the state
//! untouched.

/// Previous menu item.
pub const BUTTON_PREV: u8 = 1 << 0;
/// Next menu item.
pub const BUTTON_NEXT: u8 = 1 << 1;
/// Confirm / enter.
pub const BUTTON_CONFIRM: u8 = 1 << 2;
/// Switch between menu mode and pointer mode.
pub const BUTTON_MODE_SWITCH: u8 = 1 << 3;

const BUTTON_COUNT: usize = 4;

/// Debounced state of the four input buttons.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ButtonState {
    /// Debounced level bitmask, 1 = pressed.
    state: u8,
    /// Bits that flipped on the last update.
    changed: u8,
    debouncing: [u8; BUTTON_COUNT],
}

impl ButtonState {
    pub const fn new() -> Self {
        Self {
            state: 0,
            changed: 0,
            debouncing: [0; BUTTON_COUNT],
        }
    }

    /// Feed one raw sample (1 = pressed). The shift registers only move
    /// on a timer tick; off-tick calls just refresh the edge mask.
    pub fn update(&mut self, raw_state: u8, timer_tick: bool) {
        let mut filtered = self.state;

        if timer_tick {
            for i in 0..BUTTON_COUNT {
                self.debouncing[i] =
                    (self.debouncing[i] << 1) | ((raw_state >> i) & 1);

                if self.debouncing[i] == 0x00 {
                    filtered &= !(1 << i);
                } else if self.debouncing[i] == 0xFF {
                    filtered |= 1 << i;
                }
            }
        }

        self.changed = self.state ^ filtered;
        self.state = filtered;
    }

    /// Any of `mask` went down on the last update.
    pub fn pressed(&self, mask: u8) -> bool {
        self.changed & self.state & mask != 0
    }

    /// Any of `mask` went up on the last update.
    pub fn released(&self, mask: u8) -> bool {
        self.changed & !self.state & mask != 0
    }

    /// Any of `mask` is currently held.
    pub fn is_down(&self, mask: u8) -> bool {
        self.state & mask != 0
    }

    /// Raw debounced level bitmask.
    pub fn state(&self) -> u8 {
        self.state
    }
}
