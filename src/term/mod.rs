// src/term/mod.rs

//! The terminal side of kterm: the host console the child's output goes to,
//! and the bytes a key event becomes on the child's PTY.

pub mod console;
pub mod key_translator;
pub mod modes;

pub use console::HostConsole;
pub use key_translator::translate_key_input;
pub use modes::{CursorModes, ModeTracker};
