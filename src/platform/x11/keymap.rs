// src/platform/x11/keymap.rs
#![allow(non_snake_case)] // Allow non-snake case for X11 types

//! `InputSystem` over the core X keyboard mapping.
//!
//! Synthetic events are put back on the application's own event queue, so
//! they reach the same KeyPress handling as the physical keyboard.

use super::connection::Connection;
use crate::keyboard::{DeviceId, EventKind, HardwareKey, InputSystem, KeyEvent, SurfaceId};
use crate::keys::{Keysym, Modifiers};

use log::{debug, trace};
use std::mem;
use std::rc::Rc;

use libc::{c_int, c_uint};
use x11::xlib;

/// XInput2 id of the virtual core keyboard.
const VIRTUAL_CORE_KEYBOARD: u64 = 3;

pub struct X11Input {
    connection: Rc<Connection>,
    target: xlib::Window,
}

impl X11Input {
    pub fn new(connection: Rc<Connection>, target: xlib::Window) -> Self {
        Self {
            connection,
            target,
        }
    }

    /// Grabs the physical keyboard so its keystrokes reach kterm.
    pub fn grab_keyboard(&self) -> bool {
        let status = unsafe {
            xlib::XGrabKeyboard(
                self.connection.display(),
                self.connection.root(),
                xlib::False,
                xlib::GrabModeAsync,
                xlib::GrabModeAsync,
                xlib::CurrentTime,
            )
        };
        debug!("XGrabKeyboard status {}", status);
        status == xlib::GrabSuccess
    }

    pub fn ungrab_keyboard(&self) {
        unsafe { xlib::XUngrabKeyboard(self.connection.display(), xlib::CurrentTime) };
        self.connection.flush();
        debug!("Keyboard ungrabbed");
    }
}

impl InputSystem for X11Input {
    fn active_keyboard_device(&self) -> Option<DeviceId> {
        Some(DeviceId(VIRTUAL_CORE_KEYBOARD))
    }

    fn map_keysym(&self, keysym: Keysym) -> Option<HardwareKey> {
        if keysym.is_none() {
            return None;
        }
        let display = self.connection.display();
        let sym = xlib::KeySym::from(keysym.raw());
        let keycode = unsafe { xlib::XKeysymToKeycode(display, sym) };
        if keycode == 0 {
            return None;
        }

        let mut per_keycode: c_int = 0;
        let syms = unsafe { xlib::XGetKeyboardMapping(display, keycode, 1, &mut per_keycode) };
        let column = if syms.is_null() {
            None
        } else {
            // SAFETY: XGetKeyboardMapping returned `per_keycode` keysyms for one keycode.
            let column = unsafe {
                std::slice::from_raw_parts(syms, per_keycode.max(0) as usize)
                    .iter()
                    .position(|&s| s == sym)
            };
            unsafe { xlib::XFree(syms as *mut _) };
            column
        };
        let level = column.map_or(0, level_for_column);
        trace!(
            "keysym {:#x} -> keycode {} column {:?} level {}",
            keysym.raw(),
            keycode,
            column,
            level
        );
        Some(HardwareKey {
            keycode: u32::from(keycode),
            level,
        })
    }

    fn target_surface(&self) -> SurfaceId {
        SurfaceId(self.target as u64)
    }

    fn dispatch(&mut self, event: KeyEvent) {
        let display = self.connection.display();
        let mut xkey: xlib::XKeyEvent = unsafe { mem::zeroed() };
        xkey.type_ = match event.kind {
            EventKind::Press => xlib::KeyPress,
            EventKind::Release => xlib::KeyRelease,
        };
        xkey.send_event = xlib::True;
        xkey.display = display;
        xkey.window = event.surface.0 as xlib::Window;
        xkey.root = self.connection.root();
        xkey.time = event.time as xlib::Time;
        xkey.keycode = event.keycode as c_uint;
        xkey.state = event_state(event.modifiers, event.level);
        xkey.same_screen = xlib::True;

        let state = xkey.state;
        let mut xevent: xlib::XEvent = unsafe { mem::zeroed() };
        xevent.key = xkey;
        unsafe { xlib::XPutBackEvent(display, &mut xevent) };
        trace!("Put back {:?} keycode {} state {:#x}", event.kind, event.keycode, state);
    }
}

/// Shift level of a keysym found in `column` of the core keyboard mapping:
/// group 1 and group 2 columns come in unshifted/shifted pairs, then the
/// level three pair.
pub fn level_for_column(column: usize) -> u8 {
    match column {
        0 | 2 => 0,
        1 | 3 => 1,
        4 => 2,
        5 => 3,
        _ => 0,
    }
}

/// Core event state for basic modifiers plus a shift level.
pub fn event_state(modifiers: Modifiers, level: u8) -> c_uint {
    let mut state: c_uint = 0;
    if modifiers.contains(Modifiers::SHIFT) || level % 2 == 1 {
        state |= xlib::ShiftMask;
    }
    if modifiers.contains(Modifiers::CONTROL) {
        state |= xlib::ControlMask;
    }
    if modifiers.contains(Modifiers::ALT) {
        state |= xlib::Mod1Mask;
    }
    if level >= 2 {
        state |= xlib::Mod5Mask;
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_map_to_levels() {
        assert_eq!(level_for_column(0), 0);
        assert_eq!(level_for_column(1), 1);
        assert_eq!(level_for_column(2), 0);
        assert_eq!(level_for_column(3), 1);
        assert_eq!(level_for_column(4), 2);
        assert_eq!(level_for_column(5), 3);
        assert_eq!(level_for_column(9), 0);
    }

    #[test]
    fn state_combines_modifiers_and_level() {
        assert_eq!(event_state(Modifiers::empty(), 0), 0);
        assert_eq!(event_state(Modifiers::empty(), 1), xlib::ShiftMask);
        assert_eq!(
            event_state(Modifiers::CONTROL | Modifiers::ALT, 0),
            xlib::ControlMask | xlib::Mod1Mask
        );
        assert_eq!(event_state(Modifiers::empty(), 2), xlib::Mod5Mask);
        assert_eq!(event_state(Modifiers::SHIFT, 3), xlib::ShiftMask | xlib::Mod5Mask);
    }

    #[test]
    fn caps_and_mod_bits_are_not_forwarded() {
        assert_eq!(event_state(Modifiers::CAPS_LOCK | Modifiers::MOD1, 0), 0);
    }
}
