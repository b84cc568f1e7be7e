// src/platform/x11/font.rs

//! The Xft font button labels are drawn and measured with.

use super::connection::Connection;
use crate::keyboard::GlyphMetrics;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, trace};
use std::ffi::CString;
use std::mem;
use std::rc::Rc;

use libc::c_int;
use x11::xft;
use x11::xrender::XGlyphInfo;

/// An open `XftFont`, closed on drop.
#[derive(Debug)]
pub struct LabelFont {
    connection: Rc<Connection>,
    ptr: *mut xft::XftFont,
    ascent: u32,
    height: u32,
}

impl LabelFont {
    /// Opens a fontconfig pattern such as `monospace:size=8`.
    pub fn open(connection: Rc<Connection>, pattern: &str) -> Result<Self> {
        let pattern_cstr =
            CString::new(pattern).context("Font pattern contains a NUL byte")?;
        let ptr = unsafe {
            xft::XftFontOpenName(
                connection.display(),
                connection.screen(),
                pattern_cstr.as_ptr(),
            )
        };
        if ptr.is_null() {
            return Err(anyhow!(
                "XftFontOpenName failed for font: '{}'. Ensure font is installed and accessible.",
                pattern
            ));
        }
        // SAFETY: ptr was just returned non-null by Xft.
        let (ascent, descent) = unsafe { ((*ptr).ascent, (*ptr).descent) };
        let ascent = ascent.max(0) as u32;
        let height = ascent + descent.max(0) as u32;
        info!("Label font '{}' loaded: ascent {}, height {}", pattern, ascent, height);
        Ok(LabelFont {
            connection,
            ptr,
            ascent,
            height,
        })
    }

    #[inline]
    pub fn raw(&self) -> *mut xft::XftFont {
        self.ptr
    }

    pub fn ascent(&self) -> u32 {
        self.ascent
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Advance width of `text` in pixels.
    pub fn text_width(&self, text: &str) -> u32 {
        if text.is_empty() {
            return 0;
        }
        let mut extents: XGlyphInfo = unsafe { mem::zeroed() };
        unsafe {
            xft::XftTextExtentsUtf8(
                self.connection.display(),
                self.ptr,
                text.as_ptr(),
                text.len() as c_int,
                &mut extents,
            );
        }
        trace!("Extents of {:?}: xOff {} width {}", text, extents.xOff, extents.width);
        (extents.xOff.max(0) as u32).max(extents.width as u32)
    }
}

impl GlyphMetrics for LabelFont {
    fn text_size(&self, text: &str) -> (u32, u32) {
        (self.text_width(text), self.height)
    }
}

impl Drop for LabelFont {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            debug!("Closing label font {:p}", self.ptr);
            unsafe { xft::XftFontClose(self.connection.display(), self.ptr) };
        }
    }
}
