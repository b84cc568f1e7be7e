// src/platform/x11/window.rs
#![allow(non_snake_case)] // Allow non-snake case for X11 types

use super::connection::Connection;
use super::font::LabelFont;
use crate::config::ColorScheme;
use crate::keyboard::model::Bitmap;
use crate::keyboard::{ButtonWidth, Insets, KeyFace, KeyId, Keyboard, KeyboardView};

use anyhow::{anyhow, Result};
use log::{debug, error, info, trace, warn};
use std::collections::HashMap;
use std::mem;
use std::ptr;
use std::rc::Rc;

use libc::{c_char, c_int, c_uint, c_ulong};
use x11::xrender::XRenderColor;
use x11::{xft, xlib};

/// Padding inside the one-pixel border, per side.
const BUTTON_PADDING: u32 = 2;
const BUTTON_BORDER: u32 = 1;

/// RGB triples of a color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemeColors {
    pub background: (u8, u8, u8),
    pub button: (u8, u8, u8),
    pub button_active: (u8, u8, u8),
    pub border: (u8, u8, u8),
    pub text: (u8, u8, u8),
}

impl SchemeColors {
    pub fn for_scheme(scheme: ColorScheme) -> Self {
        match scheme {
            ColorScheme::Light => SchemeColors {
                background: (0xd0, 0xd0, 0xd0),
                button: (0xf8, 0xf8, 0xf8),
                button_active: (0x90, 0x90, 0x90),
                border: (0x60, 0x60, 0x60),
                text: (0x00, 0x00, 0x00),
            },
            ColorScheme::Dark => SchemeColors {
                background: (0x18, 0x18, 0x18),
                button: (0x30, 0x30, 0x30),
                button_active: (0x70, 0x70, 0x70),
                border: (0x08, 0x08, 0x08),
                text: (0xf0, 0xf0, 0xf0),
            },
        }
    }
}

/// Allocated Xft colors for one scheme, freed on drop.
struct Palette {
    connection: Rc<Connection>,
    background: xft::XftColor,
    button: xft::XftColor,
    button_active: xft::XftColor,
    border: xft::XftColor,
    text: xft::XftColor,
    button_rgb: (u8, u8, u8),
    button_active_rgb: (u8, u8, u8),
}

impl Palette {
    fn allocate(connection: Rc<Connection>, colors: SchemeColors) -> Result<Self> {
        let alloc = |rgb: (u8, u8, u8)| -> Result<xft::XftColor> {
            let (r, g, b) = rgb;
            let render_color = XRenderColor {
                red: u16::from(r) << 8 | u16::from(r),
                green: u16::from(g) << 8 | u16::from(g),
                blue: u16::from(b) << 8 | u16::from(b),
                alpha: 0xffff,
            };
            let mut color: xft::XftColor = unsafe { mem::zeroed() };
            let ok = unsafe {
                xft::XftColorAllocValue(
                    connection.display(),
                    connection.visual(),
                    connection.colormap(),
                    &render_color,
                    &mut color,
                )
            } != 0;
            if ok {
                Ok(color)
            } else {
                Err(anyhow!("XftColorAllocValue failed for {:?}", rgb))
            }
        };
        Ok(Palette {
            background: alloc(colors.background)?,
            button: alloc(colors.button)?,
            button_active: alloc(colors.button_active)?,
            border: alloc(colors.border)?,
            text: alloc(colors.text)?,
            button_rgb: colors.button,
            button_active_rgb: colors.button_active,
            connection,
        })
    }
}

impl Drop for Palette {
    fn drop(&mut self) {
        let display = self.connection.display();
        let visual = self.connection.visual();
        let colormap = self.connection.colormap();
        for color in [
            &mut self.background,
            &mut self.button,
            &mut self.button_active,
            &mut self.border,
            &mut self.text,
        ] {
            unsafe { xft::XftColorFree(display, visual, colormap, color) };
        }
    }
}

#[derive(Debug)]
struct Button {
    key: KeyId,
    window: xlib::Window,
    row: usize,
    filler: bool,
    face: Option<KeyFace>,
    active: bool,
    visible: bool,
    width: ButtonWidth,
    /// Size after the last layout pass.
    size: (u32, u32),
}

/// The on-screen keyboard: an override-redirect strip along the bottom of
/// the screen with one child window per key.
pub struct KeyboardWindow {
    connection: Rc<Connection>,
    font: Rc<LabelFont>,
    palette: Palette,
    id: xlib::Window,
    buttons: Vec<Button>,
    by_window: HashMap<xlib::Window, KeyId>,
    row_count: usize,
    size: (u32, u32),
    insets: Insets,
    draw: *mut xft::XftDraw,
    gc: xlib::GC,
    mapped: bool,
    layout_dirty: bool,
}

impl KeyboardWindow {
    /// Creates the keyboard window and one button window per key of
    /// `keyboard`. Nothing is mapped until [`KeyboardWindow::show`].
    pub fn new(
        connection: Rc<Connection>,
        font: Rc<LabelFont>,
        keyboard: &Keyboard,
        scheme: ColorScheme,
    ) -> Result<Self> {
        let palette = Palette::allocate(Rc::clone(&connection), SchemeColors::for_scheme(scheme))?;
        let display = connection.display();
        let screen_metrics = connection.screen_metrics();

        let id = unsafe {
            let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
            attributes.colormap = connection.colormap();
            attributes.background_pixel = palette.background.pixel;
            attributes.border_pixel = palette.background.pixel;
            attributes.override_redirect = xlib::True;
            attributes.event_mask = xlib::StructureNotifyMask;
            xlib::XCreateWindow(
                display,
                connection.root(),
                0,
                0,
                screen_metrics.width.max(1),
                1,
                0,
                connection.depth(),
                xlib::InputOutput as c_uint,
                connection.visual(),
                xlib::CWColormap
                    | xlib::CWBackPixel
                    | xlib::CWBorderPixel
                    | xlib::CWOverrideRedirect
                    | xlib::CWEventMask,
                &mut attributes,
            )
        };
        if id == 0 {
            return Err(anyhow!("XCreateWindow failed for the keyboard window"));
        }
        unsafe {
            xlib::XStoreName(display, id, b"kterm keyboard\0".as_ptr() as *mut c_char);
        }

        let mut buttons = Vec::with_capacity(keyboard.key_count());
        let mut by_window = HashMap::with_capacity(keyboard.key_count());
        for key in keyboard.keys() {
            let window = unsafe {
                let mut attributes: xlib::XSetWindowAttributes = mem::zeroed();
                attributes.background_pixel = if key.is_filler() {
                    palette.background.pixel
                } else {
                    palette.button.pixel
                };
                attributes.event_mask = if key.is_filler() {
                    0
                } else {
                    xlib::ExposureMask | xlib::ButtonPressMask | xlib::ButtonReleaseMask
                };
                xlib::XCreateWindow(
                    display,
                    id,
                    0,
                    0,
                    1,
                    1,
                    0,
                    connection.depth(),
                    xlib::InputOutput as c_uint,
                    connection.visual(),
                    xlib::CWBackPixel | xlib::CWEventMask,
                    &mut attributes,
                )
            };
            if window == 0 {
                return Err(anyhow!("XCreateWindow failed for key {}", key.id().index()));
            }
            by_window.insert(window, key.id());
            buttons.push(Button {
                key: key.id(),
                window,
                row: key.row(),
                filler: key.is_filler(),
                face: None,
                active: false,
                visible: true,
                width: ButtonWidth::Fixed(1),
                size: (1, 1),
            });
        }

        let draw = unsafe {
            xft::XftDrawCreate(display, id, connection.visual(), connection.colormap())
        };
        if draw.is_null() {
            return Err(anyhow!("XftDrawCreate failed for the keyboard window"));
        }
        let gc = unsafe { xlib::XCreateGC(display, id, 0, ptr::null_mut()) };
        if gc.is_null() {
            unsafe { xft::XftDrawDestroy(draw) };
            return Err(anyhow!("XCreateGC failed for the keyboard window"));
        }

        info!(
            "Keyboard window {} created with {} buttons in {} rows",
            id,
            buttons.len(),
            keyboard.row_count()
        );
        Ok(KeyboardWindow {
            connection,
            font,
            palette,
            id,
            buttons,
            by_window,
            row_count: keyboard.row_count(),
            size: (screen_metrics.width, 0),
            insets: Insets::uniform(BUTTON_PADDING + BUTTON_BORDER),
            draw,
            gc,
            mapped: false,
            layout_dirty: true,
        })
    }

    #[inline]
    pub fn id(&self) -> xlib::Window {
        self.id
    }

    /// Key whose button window is `window`.
    pub fn key_for_window(&self, window: xlib::Window) -> Option<KeyId> {
        self.by_window.get(&window).copied()
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn show(&mut self) {
        if self.mapped {
            return;
        }
        self.relayout();
        unsafe {
            xlib::XMapSubwindows(self.connection.display(), self.id);
            for button in self.buttons.iter().filter(|b| !b.visible) {
                xlib::XUnmapWindow(self.connection.display(), button.window);
            }
            xlib::XMapRaised(self.connection.display(), self.id);
        }
        self.mapped = true;
        self.connection.flush();
        debug!("Keyboard window shown");
    }

    pub fn hide(&mut self) {
        if !self.mapped {
            return;
        }
        unsafe { xlib::XUnmapWindow(self.connection.display(), self.id) };
        self.mapped = false;
        self.connection.flush();
        debug!("Keyboard window hidden");
    }

    /// Applies pending size changes and sends queued requests.
    pub fn flush(&mut self) {
        if self.layout_dirty {
            self.relayout();
        }
        self.connection.flush();
    }

    /// Places the window at the bottom of the screen and every visible
    /// button in its row.
    fn relayout(&mut self) {
        self.layout_dirty = false;
        let (width, height) = self.size;
        if width == 0 || height == 0 || self.row_count == 0 {
            return;
        }
        let display = self.connection.display();
        let screen = self.connection.screen_metrics();
        let y = screen.height.saturating_sub(height) as c_int;
        unsafe { xlib::XMoveResizeWindow(display, self.id, 0, y, width, height) };

        let row_height = height / self.row_count as u32;
        for row in 0..self.row_count {
            let members: Vec<usize> = self
                .buttons
                .iter()
                .enumerate()
                .filter(|(_, b)| b.row == row && b.visible)
                .map(|(i, _)| i)
                .collect();
            let widths: Vec<ButtonWidth> = members.iter().map(|&i| self.buttons[i].width).collect();
            let placements = layout_row(&widths, width);
            let top = (row as u32 * row_height) as c_int;
            for (&index, (x, w)) in members.iter().zip(placements) {
                let button = &mut self.buttons[index];
                let w = w.max(1);
                button.size = (w, row_height.max(1));
                unsafe {
                    xlib::XMoveResizeWindow(
                        display,
                        button.window,
                        x as c_int,
                        top,
                        w,
                        row_height.max(1),
                    )
                };
            }
        }
        trace!("Keyboard laid out at {}x{}", width, height);
    }

    /// Draws the button of `id`. Called on expose and on state changes.
    pub fn redraw(&self, id: KeyId) {
        let Some(button) = self.buttons.get(id.index()) else {
            return;
        };
        if button.filler || !self.mapped || !button.visible {
            return;
        }
        let (w, h) = button.size;
        let fill = if button.active {
            &self.palette.button_active
        } else {
            &self.palette.button
        };
        unsafe {
            xft::XftDrawChange(self.draw, button.window);
            xft::XftDrawRect(self.draw, &self.palette.border, 0, 0, w, h);
            let inner = BUTTON_BORDER as c_int;
            xft::XftDrawRect(
                self.draw,
                fill,
                inner,
                inner,
                w.saturating_sub(2 * BUTTON_BORDER),
                h.saturating_sub(2 * BUTTON_BORDER),
            );
        }

        match &button.face {
            Some(KeyFace::Label(text)) if !text.is_empty() => {
                let text_w = self.font.text_width(text);
                let x = (w.saturating_sub(text_w) / 2) as c_int;
                let y = (h.saturating_sub(self.font.height()) / 2 + self.font.ascent()) as c_int;
                unsafe {
                    xft::XftDrawStringUtf8(
                        self.draw,
                        &self.palette.text,
                        self.font.raw(),
                        x,
                        y,
                        text.as_ptr(),
                        text.len() as c_int,
                    );
                }
            }
            Some(KeyFace::Image(bitmap)) => {
                let background = if button.active {
                    self.palette.button_active_rgb
                } else {
                    self.palette.button_rgb
                };
                let x = w.saturating_sub(bitmap.width) / 2;
                let y = h.saturating_sub(bitmap.height) / 2;
                if let Err(e) = self.put_bitmap(button.window, bitmap, background, x, y) {
                    warn!("Failed to draw image on key {}: {}", id.index(), e);
                }
            }
            _ => {}
        }
    }

    fn redraw_all(&self) {
        for button in &self.buttons {
            self.redraw(button.key);
        }
    }

    /// Blends `bitmap` over `background` and puts it on `window` at `(x, y)`.
    fn put_bitmap(
        &self,
        window: xlib::Window,
        bitmap: &Bitmap,
        background: (u8, u8, u8),
        x: u32,
        y: u32,
    ) -> Result<()> {
        let visual = self.connection.visual();
        // SAFETY: the default visual lives as long as the display.
        let masks = unsafe { ((*visual).red_mask, (*visual).green_mask, (*visual).blue_mask) };
        let mut data = blend_to_pixels(bitmap, background, masks);
        if data.is_empty() {
            return Ok(());
        }
        let display = self.connection.display();
        let image = unsafe {
            xlib::XCreateImage(
                display,
                visual,
                self.connection.depth() as c_uint,
                xlib::ZPixmap,
                0,
                data.as_mut_ptr() as *mut c_char,
                bitmap.width,
                bitmap.height,
                32,
                0,
            )
        };
        if image.is_null() {
            return Err(anyhow!("XCreateImage failed"));
        }
        unsafe {
            xlib::XPutImage(
                display,
                window,
                self.gc,
                image,
                0,
                0,
                x as c_int,
                y as c_int,
                bitmap.width,
                bitmap.height,
            );
            // The pixel buffer belongs to `data`.
            (*image).data = ptr::null_mut();
            if let Some(destroy) = (*image).funcs.destroy_image {
                destroy(image);
            }
        }
        Ok(())
    }

    /// Destroys the window and its buttons.
    pub fn cleanup(&mut self) {
        if self.id == 0 {
            return;
        }
        info!("Destroying keyboard window (ID: {}).", self.id);
        let display = self.connection.display();
        unsafe {
            xft::XftDrawDestroy(self.draw);
            xlib::XFreeGC(display, self.gc);
            xlib::XDestroyWindow(display, self.id);
        }
        self.draw = ptr::null_mut();
        self.gc = ptr::null_mut();
        self.id = 0;
        self.buttons.clear();
        self.by_window.clear();
        self.connection.flush();
    }
}

impl KeyboardView for KeyboardWindow {
    fn set_face(&mut self, key: KeyId, face: &KeyFace) {
        if let Some(button) = self.buttons.get_mut(key.index()) {
            button.face = Some(face.clone());
            self.redraw(key);
        }
    }

    fn set_active(&mut self, key: KeyId, active: bool) {
        if let Some(button) = self.buttons.get_mut(key.index()) {
            if button.active != active {
                button.active = active;
                self.redraw(key);
            }
        }
    }

    fn set_visible(&mut self, key: KeyId, visible: bool) {
        let display = self.connection.display();
        if let Some(button) = self.buttons.get_mut(key.index()) {
            if button.visible == visible {
                return;
            }
            button.visible = visible;
            if self.mapped {
                unsafe {
                    if visible {
                        xlib::XMapWindow(display, button.window);
                    } else {
                        xlib::XUnmapWindow(display, button.window);
                    }
                }
            }
            self.layout_dirty = true;
        }
    }

    fn set_width(&mut self, key: KeyId, width: ButtonWidth) {
        if let Some(button) = self.buttons.get_mut(key.index()) {
            if button.width != width {
                button.width = width;
                self.layout_dirty = true;
            }
        }
    }

    fn set_keyboard_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
        self.relayout();
        if self.mapped {
            self.redraw_all();
        }
    }

    fn button_insets(&self) -> Insets {
        self.insets
    }
}

impl Drop for KeyboardWindow {
    fn drop(&mut self) {
        if self.id != 0 {
            error!(
                "Keyboard window (ID: {}) dropped without explicit cleanup.",
                self.id
            );
            self.cleanup();
        }
    }
}

/// `(x, width)` of each button in a row of `total` pixels.
///
/// Fixed buttons keep their width; fill buttons split what is left. A row
/// without fill buttons is centered.
pub fn layout_row(widths: &[ButtonWidth], total: u32) -> Vec<(u32, u32)> {
    let fixed: u32 = widths
        .iter()
        .map(|w| match w {
            ButtonWidth::Fixed(px) => *px,
            ButtonWidth::Fill => 0,
        })
        .sum();
    let fills = widths.iter().filter(|w| **w == ButtonWidth::Fill).count() as u32;
    let spare = total.saturating_sub(fixed);
    let (share, mut remainder) = match fills {
        0 => (0, 0),
        n => (spare / n, spare % n),
    };

    let mut x = if fills == 0 { spare / 2 } else { 0 };
    widths
        .iter()
        .map(|w| {
            let width = match w {
                ButtonWidth::Fixed(px) => *px,
                ButtonWidth::Fill => {
                    let extra = u32::from(remainder > 0);
                    remainder = remainder.saturating_sub(1);
                    share + extra
                }
            };
            let placed = (x, width);
            x += width;
            placed
        })
        .collect()
}

/// Converts RGBA pixels to 32-bit server pixels for a TrueColor visual,
/// compositing alpha over `background`.
pub fn blend_to_pixels(
    bitmap: &Bitmap,
    background: (u8, u8, u8),
    (red_mask, green_mask, blue_mask): (c_ulong, c_ulong, c_ulong),
) -> Vec<u32> {
    let pack = |value: u8, mask: c_ulong| -> u32 {
        let mask = mask as u32;
        if mask == 0 {
            return 0;
        }
        let shift = mask.trailing_zeros();
        let bits = (mask >> shift).count_ones();
        let scaled = if bits >= 8 {
            u32::from(value) << (bits - 8)
        } else {
            u32::from(value) >> (8 - bits)
        };
        (scaled << shift) & mask
    };
    let blend = |fg: u8, bg: u8, alpha: u8| -> u8 {
        let a = u32::from(alpha);
        ((u32::from(fg) * a + u32::from(bg) * (255 - a) + 127) / 255) as u8
    };
    bitmap
        .pixels
        .chunks_exact(4)
        .map(|px| {
            let r = blend(px[0], background.0, px[3]);
            let g = blend(px[1], background.1, px[3]);
            let b = blend(px[2], background.2, px[3]);
            pack(r, red_mask) | pack(g, green_mask) | pack(b, blue_mask)
        })
        .collect()
}
