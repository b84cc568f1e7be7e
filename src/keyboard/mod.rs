// src/keyboard/mod.rs

//! On-screen keyboard core.
//!
//! A layout file is parsed into a `Keyboard`, sized against the screen, and
//! then driven by touch presses and releases. Everything here talks to the
//! outside world through the `KeyboardView`, `GlyphMetrics`, `InputSystem`
//! and `TerminalSink` traits, so the core runs without any toolkit.

pub mod geometry;
pub mod inject;
pub mod model;
pub mod parser;
pub mod release;
pub mod state;
pub mod symbols;
pub mod view;

#[cfg(test)]
pub mod mock;

pub use geometry::{Geometry, ScreenMetrics, SizingRules};
pub use inject::{
    DeviceId, EventKind, HardwareKey, InputSystem, KeyEvent, SurfaceId, TerminalSink,
};
pub use model::{Key, KeyFace, KeyId, Keyboard, LayoutVariant};
pub use parser::{LayoutError, LayoutParser, StructureError};
pub use release::ReleaseQueue;
pub use state::{KeyContext, PressOutcome, ReleaseOutcome};
pub use view::{ButtonWidth, GlyphMetrics, Insets, KeyboardView};

#[cfg(test)]
mod tests;
