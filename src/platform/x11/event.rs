// src/platform/x11/event.rs
#![allow(non_snake_case)] // Allow non-snake case for X11 types

use super::connection::Connection;
use super::window::KeyboardWindow;
use crate::keyboard::KeyId;
use crate::keys::{KeySymbol, Keysym, Modifiers};

use log::{debug, trace};
use std::mem;
use std::ptr;

use libc::{c_char, c_int, c_uint};
use x11::{keysym, xlib};

/// Buffer size for text obtained from `XLookupString`.
const KEY_TEXT_BUFFER_SIZE: usize = 32;

/// What the event loop needs to know about X events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    /// A finger went down on a key button.
    ButtonPressed(KeyId),
    /// The finger lifted off a key button.
    ButtonReleased(KeyId),
    /// A key press, physical or synthesized by the on-screen keyboard.
    Key {
        symbol: KeySymbol,
        modifiers: Modifiers,
        text: String,
    },
    /// The physical toggle key was pressed.
    ToggleKeyboard,
    /// The root window changed size (rotation or mode switch).
    ScreenResized { width: u32, height: u32 },
}

/// Drains the X event queue, including events put back by synthetic
/// dispatch, handling exposes in place.
pub fn process_pending_events(
    connection: &Connection,
    window: &mut KeyboardWindow,
) -> Vec<PlatformEvent> {
    let mut events = Vec::new();
    let display = connection.display();
    let root = connection.root();

    while connection.pending() {
        let mut xevent: xlib::XEvent = unsafe { mem::zeroed() };
        unsafe { xlib::XNextEvent(display, &mut xevent) };
        let event_type = unsafe { xevent.type_ };

        match event_type {
            xlib::Expose => {
                let expose_event = unsafe { xevent.expose };
                if expose_event.count == 0 {
                    if let Some(id) = window.key_for_window(expose_event.window) {
                        window.redraw(id);
                    }
                }
            }
            xlib::ButtonPress | xlib::ButtonRelease => {
                let button_event = unsafe { xevent.button };
                let Some(id) = window.key_for_window(button_event.window) else {
                    trace!("XEvent: button event on unknown window {}", button_event.window);
                    continue;
                };
                if event_type == xlib::ButtonPress {
                    events.push(PlatformEvent::ButtonPressed(id));
                } else {
                    events.push(PlatformEvent::ButtonReleased(id));
                }
            }
            xlib::KeyPress => {
                let key_event = unsafe { &mut xevent.key };
                let (sym, text) = lookup_key(key_event);
                let modifiers = modifiers_from_state(key_event.state);
                let synthetic = key_event.send_event != 0;

                if !synthetic && sym == keysym::XK_F12 as xlib::KeySym {
                    debug!("XEvent: keyboard toggle");
                    events.push(PlatformEvent::ToggleKeyboard);
                    continue;
                }

                let symbol = KeySymbol::from_keysym(Keysym(sym as u32), &text);
                debug!(
                    "XEvent: KeyPress (symbol: {:?}, keysym: {:X}, modifiers: {:?}, text: {:?}, synthetic: {})",
                    symbol, sym, modifiers, text, synthetic
                );
                events.push(PlatformEvent::Key {
                    symbol,
                    modifiers,
                    text,
                });
            }
            xlib::KeyRelease => {
                trace!("XEvent: KeyRelease ignored");
            }
            xlib::ConfigureNotify => {
                let configure_event = unsafe { xevent.configure };
                if configure_event.window == root {
                    debug!(
                        "XEvent: root ConfigureNotify {}x{}",
                        configure_event.width, configure_event.height
                    );
                    events.push(PlatformEvent::ScreenResized {
                        width: configure_event.width.max(0) as u32,
                        height: configure_event.height.max(0) as u32,
                    });
                }
            }
            xlib::MappingNotify => {
                let mut mapping_event = unsafe { xevent.mapping };
                unsafe { xlib::XRefreshKeyboardMapping(&mut mapping_event) };
                debug!("XEvent: keyboard mapping refreshed");
            }
            _ => {
                trace!("XEvent: Ignored (type: {})", event_type);
            }
        }
    }
    events
}

/// Keysym and text of a key event through the current keyboard mapping.
fn lookup_key(key_event: &mut xlib::XKeyEvent) -> (xlib::KeySym, String) {
    let mut x_keysym: xlib::KeySym = 0;
    let mut key_text_buffer = [0u8; KEY_TEXT_BUFFER_SIZE];
    let count = unsafe {
        xlib::XLookupString(
            key_event,
            key_text_buffer.as_mut_ptr() as *mut c_char,
            key_text_buffer.len() as c_int,
            &mut x_keysym,
            ptr::null_mut(),
        )
    };
    let text = if count > 0 {
        // XLookupString produces Latin-1.
        key_text_buffer[..count as usize]
            .iter()
            .map(|&b| char::from(b))
            .collect()
    } else {
        // Latin-1 lookup yields nothing for other scripts; the keysym still
        // encodes the character.
        Keysym(x_keysym as u32)
            .to_char()
            .filter(|c| !c.is_control())
            .map(String::from)
            .unwrap_or_default()
    };
    (x_keysym, text)
}

/// Modifiers reported in a core event's state field.
pub fn modifiers_from_state(state: c_uint) -> Modifiers {
    let mut modifiers = Modifiers::empty();
    if state & xlib::ShiftMask != 0 {
        modifiers.insert(Modifiers::SHIFT);
    }
    if state & xlib::ControlMask != 0 {
        modifiers.insert(Modifiers::CONTROL);
    }
    if state & xlib::Mod1Mask != 0 {
        modifiers.insert(Modifiers::ALT);
    }
    modifiers
}
