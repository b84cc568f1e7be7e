// src/keyboard/model.rs

//! In-memory keyboard model.
//!
//! The `Keyboard` owns every `Key` in one contiguous arena, in reading order.
//! Keys never point back at their keyboard; callers address them through
//! `KeyId`, an index into that arena.

use crate::keys::{Keysym, Modifiers};
use std::fmt;
use std::rc::Rc;

/// Upper bound on keys in a layout; a layout must stay strictly below it.
pub const KEYS_MAX: usize = 500;
/// Maximum number of rows in a layout.
pub const ROWS_MAX: usize = 10;
/// Width of one standard key in layout width units.
pub const KEY_UNIT: u32 = 1000;

/// Stable handle of a key inside its keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(usize);

impl KeyId {
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// One of the five alternate outputs a key can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayoutVariant {
    #[default]
    Default,
    Shifted,
    Mod1,
    Mod2,
    Mod3,
}

impl LayoutVariant {
    pub const COUNT: usize = 5;
    pub const ALL: [LayoutVariant; LayoutVariant::COUNT] = [
        LayoutVariant::Default,
        LayoutVariant::Shifted,
        LayoutVariant::Mod1,
        LayoutVariant::Mod2,
        LayoutVariant::Mod3,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// Element name of this variant in a layout file.
    pub fn from_element(name: &[u8]) -> Option<LayoutVariant> {
        match name {
            b"default" | b"normal" => Some(LayoutVariant::Default),
            b"shifted" => Some(LayoutVariant::Shifted),
            b"mod1" => Some(LayoutVariant::Mod1),
            b"mod2" => Some(LayoutVariant::Mod2),
            b"mod3" => Some(LayoutVariant::Mod3),
            _ => None,
        }
    }
}

/// Decoded RGBA bitmap used as a key face.
#[derive(Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA8 pixels.
    pub pixels: Vec<u8>,
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// What a key shows for one variant: a text label or an image, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFace {
    Label(String),
    Image(Rc<Bitmap>),
}

impl KeyFace {
    pub fn label(&self) -> Option<&str> {
        match self {
            KeyFace::Label(text) => Some(text),
            KeyFace::Image(_) => None,
        }
    }
}

/// Face and output of a key under one layout variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySlot {
    pub face: Option<KeyFace>,
    pub keysym: Keysym,
}

/// Interactive button or inert filler produced by `<space>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyKind {
    Button,
    Filler,
}

/// Screen orientation derived from the current screen size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    Portrait,
    #[default]
    Landscape,
}

impl Orientation {
    pub fn from_size(width: u32, height: u32) -> Orientation {
        if width < height {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }
}

/// One on-screen button.
#[derive(Debug, Clone)]
pub struct Key {
    id: KeyId,
    row: usize,
    kind: KeyKind,
    pub(crate) slots: [KeySlot; LayoutVariant::COUNT],
    /// Modifier bit toggled by this key; empty for ordinary keys.
    pub modifier: Modifiers,
    /// Forced width in layout units, zero for automatic.
    pub width: u32,
    pub obey_caps: bool,
    pub fill: bool,
    pub extended: bool,
    // Presentation state mirrored from the view.
    pub(crate) shown: Option<LayoutVariant>,
    pub(crate) active: bool,
    pub(crate) visible: bool,
}

impl Key {
    pub(crate) fn new(kind: KeyKind) -> Self {
        Self {
            id: KeyId(0),
            row: 0,
            kind,
            slots: Default::default(),
            modifier: Modifiers::empty(),
            width: 0,
            obey_caps: false,
            fill: false,
            extended: false,
            shown: None,
            active: false,
            visible: true,
        }
    }

    #[inline]
    pub fn id(&self) -> KeyId {
        self.id
    }

    /// Zero-based row this key sits in.
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }

    #[inline]
    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    #[inline]
    pub fn is_filler(&self) -> bool {
        self.kind == KeyKind::Filler
    }

    #[inline]
    pub fn is_modifier(&self) -> bool {
        !self.modifier.is_empty()
    }

    pub fn slot(&self, variant: LayoutVariant) -> &KeySlot {
        &self.slots[variant.index()]
    }

    pub(crate) fn slot_mut(&mut self, variant: LayoutVariant) -> &mut KeySlot {
        &mut self.slots[variant.index()]
    }

    pub fn keysym(&self, variant: LayoutVariant) -> Keysym {
        self.slot(variant).keysym
    }

    pub fn face(&self, variant: LayoutVariant) -> Option<&KeyFace> {
        self.slot(variant).face.as_ref()
    }

    /// Width contribution in layout units.
    pub fn width_units(&self) -> u32 {
        if self.width != 0 {
            self.width
        } else {
            KEY_UNIT
        }
    }

    /// Variant whose face is currently on screen, if any was set.
    pub fn shown_variant(&self) -> Option<LayoutVariant> {
        self.shown
    }

    /// Whether the button is drawn pressed/toggled.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

/// The keyboard aggregate: keys, row structure, held modifiers and sizing.
#[derive(Debug, Clone, Default)]
pub struct Keyboard {
    keys: Vec<Key>,
    row_count: usize,
    key_per_row: [usize; ROWS_MAX],
    pub(crate) modifier_mask: Modifiers,
    min_button_width: u32,
    min_button_height: u32,
    pub(crate) orientation: Orientation,
    pub(crate) row_width: u32,
    pub(crate) unit_width: u32,
    pub(crate) unit_height: u32,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn key(&self, id: KeyId) -> Option<&Key> {
        self.keys.get(id.0)
    }

    pub(crate) fn key_mut(&mut self, id: KeyId) -> Option<&mut Key> {
        self.keys.get_mut(id.0)
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Number of keys in each row, in row order.
    pub fn key_per_row(&self) -> &[usize] {
        &self.key_per_row[..self.row_count]
    }

    /// Keys grouped by row, in reading order.
    pub fn rows(&self) -> impl Iterator<Item = &[Key]> + '_ {
        let mut start = 0;
        self.key_per_row().iter().map(move |&count| {
            let row = &self.keys[start..start + count];
            start += count;
            row
        })
    }

    /// Modifiers currently held.
    pub fn modifier_mask(&self) -> Modifiers {
        self.modifier_mask
    }

    /// Largest natural glyph or image width seen while parsing.
    pub fn min_button_width(&self) -> u32 {
        self.min_button_width
    }

    /// Largest natural glyph or image height seen while parsing.
    pub fn min_button_height(&self) -> u32 {
        self.min_button_height
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn is_portrait(&self) -> bool {
        self.orientation == Orientation::Portrait
    }

    /// Total row width in pixels from the last geometry pass.
    pub fn row_width(&self) -> u32 {
        self.row_width
    }

    /// Width of one standard key from the last geometry pass.
    pub fn unit_width(&self) -> u32 {
        self.unit_width
    }

    /// Button height from the last geometry pass.
    pub fn unit_height(&self) -> u32 {
        self.unit_height
    }

    pub(crate) fn push_row(&mut self) {
        debug_assert!(self.row_count < ROWS_MAX);
        self.row_count += 1;
    }

    /// Appends a key to the last opened row.
    pub(crate) fn push_key(&mut self, mut key: Key) -> KeyId {
        debug_assert!(self.row_count > 0);
        let row = self.row_count - 1;
        let id = KeyId(self.keys.len());
        key.id = id;
        key.row = row;
        self.keys.push(key);
        self.key_per_row[row] += 1;
        id
    }

    /// Raises the minimum button size to fit a glyph or image.
    pub(crate) fn note_natural_size(&mut self, width: u32, height: u32) {
        self.min_button_width = self.min_button_width.max(width);
        self.min_button_height = self.min_button_height.max(height);
    }

    /// Releases spare arena capacity once parsing is done.
    pub(crate) fn compact(&mut self) {
        self.keys.shrink_to_fit();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyboard_with_rows(rows: &[usize]) -> Keyboard {
        let mut keyboard = Keyboard::new();
        for &count in rows {
            keyboard.push_row();
            for _ in 0..count {
                keyboard.push_key(Key::new(KeyKind::Button));
            }
        }
        keyboard
    }

    #[test]
    fn keys_are_assigned_sequential_ids_and_rows() {
        let keyboard = keyboard_with_rows(&[2, 3]);
        let rows: Vec<Vec<(usize, usize)>> = keyboard
            .rows()
            .map(|row| row.iter().map(|k| (k.id().index(), k.row())).collect())
            .collect();
        assert_eq!(
            rows,
            vec![vec![(0, 0), (1, 0)], vec![(2, 1), (3, 1), (4, 1)]]
        );
        assert_eq!(keyboard.key_per_row(), &[2, 3]);
        assert_eq!(
            keyboard.key_per_row().iter().sum::<usize>(),
            keyboard.key_count()
        );
    }

    #[test]
    fn natural_size_only_grows() {
        let mut keyboard = Keyboard::new();
        keyboard.note_natural_size(12, 20);
        keyboard.note_natural_size(8, 30);
        assert_eq!(keyboard.min_button_width(), 12);
        assert_eq!(keyboard.min_button_height(), 30);
    }

    #[test]
    fn empty_rows_are_reported() {
        let keyboard = keyboard_with_rows(&[0, 1]);
        assert_eq!(keyboard.row_count(), 2);
        assert_eq!(keyboard.rows().map(<[Key]>::len).collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn unknown_key_id_is_none() {
        let keyboard = keyboard_with_rows(&[1]);
        assert!(keyboard.key(KeyId(1)).is_none());
    }

    #[test]
    fn default_width_is_one_unit() {
        let mut key = Key::new(KeyKind::Button);
        assert_eq!(key.width_units(), KEY_UNIT);
        key.width = 1500;
        assert_eq!(key.width_units(), 1500);
    }

    #[test]
    fn orientation_follows_aspect() {
        assert_eq!(Orientation::from_size(600, 800), Orientation::Portrait);
        assert_eq!(Orientation::from_size(800, 600), Orientation::Landscape);
        assert_eq!(Orientation::from_size(600, 600), Orientation::Landscape);
    }
}
