//! Button input and the menu/widget user interface.

pub mod buttons;
pub mod menu;

pub use buttons::ButtonState;
pub use menu::{Ui, WidgetId};
