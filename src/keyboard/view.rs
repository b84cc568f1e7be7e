// src/keyboard/view.rs

//! Presentation capabilities the keyboard core drives.
//!
//! The state machine and the geometry engine never touch a toolkit directly;
//! they call these operations on whatever presentation layer hosts the
//! buttons. The X11 backend implements them with one child window per key.

use super::model::{KeyFace, KeyId};

/// Horizontal sizing of one button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonWidth {
    /// Fixed width in pixels.
    Fixed(u32),
    /// Expand to take whatever space the row has left.
    Fill,
}

/// Padding plus border around a button's content, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Insets {
    pub left: u32,
    pub right: u32,
    pub top: u32,
    pub bottom: u32,
}

impl Insets {
    pub fn uniform(px: u32) -> Self {
        Self {
            left: px,
            right: px,
            top: px,
            bottom: px,
        }
    }

    pub fn horizontal(&self) -> u32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> u32 {
        self.top + self.bottom
    }
}

/// Operations on the on-screen buttons.
pub trait KeyboardView {
    /// Shows a label or an image on the button, replacing the previous face.
    fn set_face(&mut self, key: KeyId, face: &KeyFace);

    /// Draws the button pressed (toggled) or released.
    fn set_active(&mut self, key: KeyId, active: bool);

    fn set_visible(&mut self, key: KeyId, visible: bool);

    fn set_width(&mut self, key: KeyId, width: ButtonWidth);

    /// Size of the whole keyboard area.
    fn set_keyboard_size(&mut self, width: u32, height: u32);

    /// Padding and border the current visual style puts around button content.
    fn button_insets(&self) -> Insets;
}

/// Measures the natural rendered size of button text.
pub trait GlyphMetrics {
    /// Returns `(width, height)` in pixels.
    fn text_size(&self, text: &str) -> (u32, u32);
}
