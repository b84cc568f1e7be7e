// src/keyboard/mock.rs

//! Recording stand-ins for the keyboard's collaborators.

use super::inject::{DeviceId, HardwareKey, InputSystem, KeyEvent, SurfaceId, TerminalSink};
use super::model::{KeyFace, KeyId};
use super::view::{ButtonWidth, GlyphMetrics, Insets, KeyboardView};
use crate::keys::Keysym;
use std::collections::HashMap;
use std::io;

/// Every glyph measures the same.
#[derive(Debug, Clone, Copy)]
pub struct FixedGlyphMetrics {
    width: u32,
    height: u32,
}

impl FixedGlyphMetrics {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl GlyphMetrics for FixedGlyphMetrics {
    fn text_size(&self, text: &str) -> (u32, u32) {
        (self.width * text.chars().count() as u32, self.height)
    }
}

pub struct RecordingView {
    faces: HashMap<KeyId, KeyFace>,
    active: HashMap<KeyId, bool>,
    hidden: HashMap<KeyId, bool>,
    widths: HashMap<KeyId, ButtonWidth>,
    keyboard_size: Option<(u32, u32)>,
    insets: Insets,
    face_updates: usize,
}

impl RecordingView {
    pub fn new() -> Self {
        Self {
            faces: HashMap::new(),
            active: HashMap::new(),
            hidden: HashMap::new(),
            widths: HashMap::new(),
            keyboard_size: None,
            insets: Insets::default(),
            face_updates: 0,
        }
    }

    pub fn with_insets(mut self, insets: Insets) -> Self {
        self.insets = insets;
        self
    }

    pub fn face(&self, id: KeyId) -> Option<&KeyFace> {
        self.faces.get(&id)
    }

    pub fn label(&self, id: KeyId) -> Option<&str> {
        self.face(id).and_then(KeyFace::label)
    }

    pub fn is_active(&self, id: KeyId) -> bool {
        self.active.get(&id).copied().unwrap_or(false)
    }

    pub fn is_visible(&self, id: KeyId) -> bool {
        !self.hidden.get(&id).copied().unwrap_or(false)
    }

    pub fn width_of(&self, id: KeyId) -> Option<ButtonWidth> {
        self.widths.get(&id).copied()
    }

    pub fn keyboard_size(&self) -> Option<(u32, u32)> {
        self.keyboard_size
    }

    /// Number of `set_face` calls so far.
    pub fn face_updates(&self) -> usize {
        self.face_updates
    }
}

impl KeyboardView for RecordingView {
    fn set_face(&mut self, key: KeyId, face: &KeyFace) {
        self.face_updates += 1;
        self.faces.insert(key, face.clone());
    }

    fn set_active(&mut self, key: KeyId, active: bool) {
        self.active.insert(key, active);
    }

    fn set_visible(&mut self, key: KeyId, visible: bool) {
        self.hidden.insert(key, !visible);
    }

    fn set_width(&mut self, key: KeyId, width: ButtonWidth) {
        self.widths.insert(key, width);
    }

    fn set_keyboard_size(&mut self, width: u32, height: u32) {
        self.keyboard_size = Some((width, height));
    }

    fn button_insets(&self) -> Insets {
        self.insets
    }
}

/// Input system with an explicit keysym table.
pub struct MockInput {
    mapping: HashMap<Keysym, HardwareKey>,
    dispatched: Vec<KeyEvent>,
}

impl MockInput {
    pub fn new() -> Self {
        Self {
            mapping: HashMap::new(),
            dispatched: Vec::new(),
        }
    }

    pub fn with_mapping(mut self, keysym: Keysym, keycode: u32, level: u8) -> Self {
        self.mapping.insert(keysym, HardwareKey { keycode, level });
        self
    }

    pub fn dispatched(&self) -> &[KeyEvent] {
        &self.dispatched
    }
}

impl InputSystem for MockInput {
    fn active_keyboard_device(&self) -> Option<DeviceId> {
        Some(DeviceId(3))
    }

    fn map_keysym(&self, keysym: Keysym) -> Option<HardwareKey> {
        self.mapping.get(&keysym).copied()
    }

    fn target_surface(&self) -> SurfaceId {
        SurfaceId(0x40_0001)
    }

    fn dispatch(&mut self, event: KeyEvent) {
        self.dispatched.push(event);
    }
}

/// Collects bytes fed to the terminal.
pub struct RecordingTerminal {
    received: Vec<u8>,
    fail: bool,
}

impl RecordingTerminal {
    pub fn new() -> Self {
        Self {
            received: Vec::new(),
            fail: false,
        }
    }

    /// A terminal whose child has gone away.
    pub fn failing() -> Self {
        Self {
            received: Vec::new(),
            fail: true,
        }
    }

    pub fn received(&self) -> &[u8] {
        &self.received
    }
}

impl TerminalSink for RecordingTerminal {
    fn feed_raw_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.fail {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        self.received.extend_from_slice(bytes);
        Ok(())
    }
}
