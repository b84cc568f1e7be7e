// src/keyboard/inject.rs

//! Synthetic key event construction and dispatch.
//!
//! A resolved keysym is mapped to a hardware key code by the input system and
//! delivered as a press or release event, as if it came from a physical
//! keyboard. Keysyms the live keyboard mapping cannot express fall back to
//! writing their character straight to the terminal.

use crate::keys::{Keysym, Modifiers};
use log::{debug, warn};
use std::io;

/// Timestamp value meaning "whenever the event is processed".
pub const CURRENT_TIME: u64 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Press,
    Release,
}

/// Input device a synthetic event claims to originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId(pub u64);

/// Window or surface that receives a synthetic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurfaceId(pub u64);

/// Hardware encoding of a keysym on the current keyboard mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareKey {
    pub keycode: u32,
    /// Shift level the keysym sits at: 0 plain, 1 shifted, 2 level three, ...
    pub level: u8,
}

/// A synthesized low-level key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub surface: SurfaceId,
    pub kind: EventKind,
    pub keycode: u32,
    pub keysym: Keysym,
    /// Basic modifier bits (shift, control, alt) held on the keyboard.
    pub modifiers: Modifiers,
    /// Shift level implied by the hardware mapping; the backend folds it into
    /// the event state together with `modifiers`.
    pub level: u8,
    pub device: Option<DeviceId>,
    pub time: u64,
}

/// The windowing system's input facilities.
pub trait InputSystem {
    /// Current keyboard input device, if the platform exposes one.
    fn active_keyboard_device(&self) -> Option<DeviceId>;

    /// Hardware encoding for `keysym`, or `None` if the current keyboard
    /// mapping has no key producing it.
    fn map_keysym(&self, keysym: Keysym) -> Option<HardwareKey>;

    /// Surface synthetic events are delivered to.
    fn target_surface(&self) -> SurfaceId;

    /// Feeds `event` into the application's normal input path.
    fn dispatch(&mut self, event: KeyEvent);
}

/// The terminal's raw input channel.
pub trait TerminalSink {
    /// Writes bytes to the child as if typed.
    fn feed_raw_bytes(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Builds and dispatches a key event for `keysym` with the basic part of
/// `mask`. Returns `None` without dispatching when the keysym is unmapped.
pub fn inject_key(
    input: &mut dyn InputSystem,
    kind: EventKind,
    keysym: Keysym,
    mask: Modifiers,
) -> Option<KeyEvent> {
    let Some(hardware) = input.map_keysym(keysym) else {
        debug!("Keysym {:#x} not in keymap", keysym.raw());
        return None;
    };
    let event = KeyEvent {
        surface: input.target_surface(),
        kind,
        keycode: hardware.keycode,
        keysym,
        modifiers: mask.basic(),
        level: hardware.level,
        device: input.active_keyboard_device(),
        time: CURRENT_TIME,
    };
    debug!(
        "{:?} keycode {} keysym {:#x} state {:?} level {}",
        kind,
        event.keycode,
        keysym.raw(),
        event.modifiers,
        event.level
    );
    input.dispatch(event);
    Some(event)
}

/// Writes the UTF-8 encoding of `keysym`'s character to the terminal.
/// Returns false when the keysym has no character or the write fails.
pub fn feed_character(terminal: &mut dyn TerminalSink, keysym: Keysym) -> bool {
    let Some(c) = keysym.to_char() else {
        debug!("Keysym {:#x} has no character; dropped", keysym.raw());
        return false;
    };
    let mut utf8 = [0u8; 4];
    let bytes = c.encode_utf8(&mut utf8).as_bytes();
    debug!("feed child: {} bytes", bytes.len());
    match terminal.feed_raw_bytes(bytes) {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to feed character to terminal: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyboard::mock::{MockInput, RecordingTerminal};

    #[test_log::test]
    fn mapped_keysym_is_dispatched_with_basic_modifiers() {
        let mut input = MockInput::new().with_mapping(Keysym::from_char('A'), 38, 1);
        let mask = Modifiers::SHIFT | Modifiers::CAPS_LOCK | Modifiers::MOD1;

        let event = inject_key(&mut input, EventKind::Press, Keysym::from_char('A'), mask)
            .expect("mapped");

        assert_eq!(event.keycode, 38);
        assert_eq!(event.level, 1);
        assert_eq!(event.modifiers, Modifiers::SHIFT);
        assert_eq!(event.device, input.active_keyboard_device());
        assert_eq!(event.surface, input.target_surface());
        assert_eq!(event.time, CURRENT_TIME);
        assert_eq!(input.dispatched(), &[event]);
    }

    #[test_log::test]
    fn unmapped_keysym_is_not_dispatched() {
        let mut input = MockInput::new();
        assert!(inject_key(
            &mut input,
            EventKind::Release,
            Keysym::from_char('ł'),
            Modifiers::empty()
        )
        .is_none());
        assert!(input.dispatched().is_empty());
    }

    #[test_log::test]
    fn fallback_writes_utf8() {
        let mut terminal = RecordingTerminal::new();
        assert!(feed_character(&mut terminal, Keysym::from_char('ł')));
        assert!(feed_character(&mut terminal, Keysym(x11::keysym::XK_Return)));
        assert_eq!(terminal.received(), "ł\r".as_bytes());
    }

    #[test_log::test]
    fn fallback_drops_keysyms_without_character() {
        let mut terminal = RecordingTerminal::new();
        assert!(!feed_character(&mut terminal, Keysym(x11::keysym::XK_F1)));
        assert!(terminal.received().is_empty());
    }

    #[test_log::test]
    fn fallback_reports_write_failure() {
        let mut terminal = RecordingTerminal::failing();
        assert!(!feed_character(&mut terminal, Keysym::from_char('x')));
    }
}
