// src/platform/x11/connection.rs
#![allow(non_snake_case)] // Allow non-snake case for X11 types

use anyhow::{anyhow, Result};
use log::{debug, info, warn};
use std::os::unix::io::RawFd;
use std::ptr;

use libc::c_int;
use x11::xlib;

use crate::keyboard::ScreenMetrics;

/// Millimetres per inch, for the DPI estimate.
const MM_PER_INCH: f64 = 25.4;

/// Owns an Xlib `Display` and closes it on drop.
#[derive(Debug)]
struct ManagedDisplay {
    ptr: *mut xlib::Display,
}

impl ManagedDisplay {
    /// Opens the display named by `DISPLAY`.
    fn new() -> Result<Self> {
        let display_ptr = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display_ptr.is_null() {
            Err(anyhow!(
                "Failed to open X display. Check DISPLAY environment variable or X server status."
            ))
        } else {
            debug!("X display opened: {:p}", display_ptr);
            Ok(Self { ptr: display_ptr })
        }
    }

    #[inline]
    fn raw(&self) -> *mut xlib::Display {
        self.ptr
    }
}

impl Drop for ManagedDisplay {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            info!("Closing X11 display connection: {:p}", self.ptr);
            unsafe {
                let status = xlib::XCloseDisplay(self.ptr);
                if status != 0 {
                    warn!("XCloseDisplay returned non-zero status: {}", status);
                }
            }
        }
    }
}

/// The connection to the X server plus the default screen resources every
/// other part of the backend draws with.
///
/// Shared by reference counting between the keyboard window, the label font
/// and the input system; the display closes when the last holder drops.
#[derive(Debug)]
pub struct Connection {
    managed_display: ManagedDisplay,
    screen: c_int,
    colormap: xlib::Colormap,
    visual: *mut xlib::Visual,
    depth: c_int,
}

impl Connection {
    pub fn new() -> Result<Self> {
        info!("Establishing X11 server connection.");
        let managed_display = ManagedDisplay::new()?;
        let display = managed_display.raw();

        let screen = unsafe { xlib::XDefaultScreen(display) };
        let colormap = unsafe { xlib::XDefaultColormap(display, screen) };
        let visual = unsafe { xlib::XDefaultVisual(display, screen) };
        if visual.is_null() {
            return Err(anyhow!(
                "Failed to get default visual for screen {}.",
                screen
            ));
        }
        let depth = unsafe { xlib::XDefaultDepth(display, screen) };
        debug!(
            "Default screen {}, colormap {}, visual {:p}, depth {}",
            screen, colormap, visual, depth
        );

        Ok(Connection {
            managed_display,
            screen,
            colormap,
            visual,
            depth,
        })
    }

    #[inline]
    pub fn display(&self) -> *mut xlib::Display {
        self.managed_display.raw()
    }

    #[inline]
    pub fn screen(&self) -> c_int {
        self.screen
    }

    #[inline]
    pub fn colormap(&self) -> xlib::Colormap {
        self.colormap
    }

    #[inline]
    pub fn visual(&self) -> *mut xlib::Visual {
        self.visual
    }

    #[inline]
    pub fn depth(&self) -> c_int {
        self.depth
    }

    pub fn root(&self) -> xlib::Window {
        unsafe { xlib::XRootWindow(self.display(), self.screen) }
    }

    /// Screen size in pixels and the DPI implied by its physical width.
    pub fn screen_metrics(&self) -> ScreenMetrics {
        let display = self.display();
        let (width, height, width_mm) = unsafe {
            (
                xlib::XDisplayWidth(display, self.screen),
                xlib::XDisplayHeight(display, self.screen),
                xlib::XDisplayWidthMM(display, self.screen),
            )
        };
        ScreenMetrics {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
            dpi: dpi_from_size(width, width_mm),
        }
    }

    /// Descriptor to poll for incoming X events, if the display is open.
    pub fn event_fd(&self) -> Option<RawFd> {
        if self.managed_display.ptr.is_null() {
            warn!("event_fd called on a closed X display.");
            None
        } else {
            Some(unsafe { xlib::XConnectionNumber(self.display()) })
        }
    }

    /// Events already read from the socket or put back on the queue.
    pub fn pending(&self) -> bool {
        !self.managed_display.ptr.is_null() && unsafe { xlib::XPending(self.display()) } > 0
    }

    pub fn flush(&self) {
        if !self.managed_display.ptr.is_null() {
            unsafe { xlib::XFlush(self.display()) };
        }
    }
}

/// `None` when the server reports no physical size.
fn dpi_from_size(width_px: c_int, width_mm: c_int) -> Option<f64> {
    if width_px <= 0 || width_mm <= 0 {
        return None;
    }
    Some(width_px as f64 * MM_PER_INCH / width_mm as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_connection() -> Connection {
        Connection {
            managed_display: ManagedDisplay {
                ptr: ptr::null_mut(),
            },
            screen: 0,
            colormap: 0,
            visual: ptr::null_mut(),
            depth: 24,
        }
    }

    #[test]
    fn test_event_fd_on_closed_display() {
        let conn = closed_connection();
        assert!(conn.event_fd().is_none());
        assert!(!conn.pending());
    }

    #[test]
    fn test_dpi_from_physical_width() {
        assert_eq!(dpi_from_size(1072, 0), None);
        assert_eq!(dpi_from_size(0, 90), None);
        let dpi = dpi_from_size(1000, 254).expect("dpi");
        assert!((dpi - 100.0).abs() < 1e-9);
    }
}
