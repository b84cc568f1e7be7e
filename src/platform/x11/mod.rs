// src/platform/x11/mod.rs

//! X11 backend for the on-screen keyboard.
//!
//! - `connection`: the display and default screen resources.
//! - `font`: the Xft label font, also used to measure labels while parsing.
//! - `window`: the keyboard window, one child window per key (`KeyboardView`).
//! - `keymap`: keysym to keycode mapping and synthetic dispatch (`InputSystem`).
//! - `event`: X events translated into [`PlatformEvent`]s.

pub mod connection;
pub mod event;
pub mod font;
pub mod keymap;
pub mod window;

pub use connection::Connection;
pub use event::PlatformEvent;
pub use font::LabelFont;
pub use keymap::X11Input;
pub use window::KeyboardWindow;

use crate::config::ColorScheme;
use crate::keyboard::{KeyContext, Keyboard, ScreenMetrics, TerminalSink};

use anyhow::{Context, Result};
use log::{info, warn};
use std::os::unix::io::RawFd;
use std::rc::Rc;
use x11::xlib;

/// Everything the event loop drives on the X side.
pub struct X11Keyboard {
    connection: Rc<Connection>,
    window: KeyboardWindow,
    input: X11Input,
    grabbed: bool,
}

impl X11Keyboard {
    /// Creates the keyboard window for `keyboard`, watches the root window for
    /// screen changes and grabs the physical keyboard.
    pub fn new(
        connection: Rc<Connection>,
        font: Rc<LabelFont>,
        keyboard: &Keyboard,
        scheme: ColorScheme,
    ) -> Result<Self> {
        let window = KeyboardWindow::new(Rc::clone(&connection), font, keyboard, scheme)
            .context("Failed to create the keyboard window")?;
        let input = X11Input::new(Rc::clone(&connection), window.id());

        unsafe {
            xlib::XSelectInput(
                connection.display(),
                connection.root(),
                xlib::StructureNotifyMask,
            );
        }
        let grabbed = input.grab_keyboard();
        if !grabbed {
            warn!("Could not grab the physical keyboard; its keys go to the focused window.");
        }
        connection.flush();
        info!("X11 keyboard backend ready.");

        Ok(X11Keyboard {
            connection,
            window,
            input,
            grabbed,
        })
    }

    pub fn event_fd(&self) -> Option<RawFd> {
        self.connection.event_fd()
    }

    pub fn screen_metrics(&self) -> ScreenMetrics {
        self.connection.screen_metrics()
    }

    pub fn process_events(&mut self) -> Vec<PlatformEvent> {
        event::process_pending_events(&self.connection, &mut self.window)
    }

    pub fn window(&mut self) -> &mut KeyboardWindow {
        &mut self.window
    }

    /// Collaborators for a keyboard press or release.
    pub fn context<'a>(&'a mut self, terminal: &'a mut dyn TerminalSink) -> KeyContext<'a> {
        KeyContext {
            view: &mut self.window,
            input: &mut self.input,
            terminal,
        }
    }

    pub fn is_shown(&self) -> bool {
        self.window.is_mapped()
    }

    pub fn show(&mut self) {
        self.window.show();
    }

    pub fn hide(&mut self) {
        self.window.hide();
    }

    pub fn flush(&mut self) {
        self.window.flush();
    }

    /// Releases the keyboard grab and destroys the window.
    pub fn shutdown(&mut self) {
        if self.grabbed {
            self.input.ungrab_keyboard();
            self.grabbed = false;
        }
        self.window.cleanup();
    }
}

impl Drop for X11Keyboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}
