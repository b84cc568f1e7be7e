// src/keyboard/parser.rs

//! Streaming keyboard layout parser.
//!
//! A layout file is an XML-like document of `row` elements holding `key` and
//! `space` elements; every `key` carries up to five variant elements
//! (`default`/`normal`, `shifted`, `mod1`, `mod2`, `mod3`) with optional
//! `display` and `action` attributes:
//!
//! ```xml
//! <row>
//!   <key obey-caps="true"><default display="a"/><shifted display="A"/></key>
//!   <key width="1500"><default display="Shift" action="modifier:shift"/></key>
//!   <space width="500"/>
//! </row>
//! ```
//!
//! The document is tokenized incrementally; a small state machine tracked
//! across start/end element events builds the `Keyboard`. Any structural
//! violation abandons the whole layout.

use super::model::{Bitmap, Key, KeyFace, KeyKind, Keyboard, LayoutVariant, KEYS_MAX, ROWS_MAX};
use super::symbols::{keysym_by_name, modifier_by_name};
use super::view::GlyphMetrics;
use crate::keys::Keysym;

use log::{debug, trace, warn};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;

const IMAGE_PREFIX: &str = "image:";
const MODIFIER_PREFIX: &str = "modifier:";

/// Ways a layout can be structurally invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructureError {
    #[error("row opened while another row is open")]
    NestedRow,
    #[error("key opened while another key is open")]
    NestedKey,
    #[error("key variant outside of a key")]
    VariantOutsideKey,
    #[error("key outside of a row")]
    KeyOutsideRow,
    #[error("space inside a key")]
    SpaceInsideKey,
    #[error("row closed while none is open")]
    UnexpectedRowEnd,
    #[error("key closed while none is open")]
    UnexpectedKeyEnd,
    #[error("too many rows (max {max})", max = ROWS_MAX)]
    TooManyRows,
    #[error("too many keys (max {max})", max = KEYS_MAX - 1)]
    TooManyKeys,
}

/// Failure to load a keyboard layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("cannot read keyboard layout {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("keyboard layout parser error at byte {position}")]
    Markup {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("not a valid kterm keyboard layout (byte {position}): {kind}")]
    Structure {
        position: usize,
        kind: StructureError,
    },
}

impl LayoutError {
    /// The structural violation, if this is one.
    pub fn structure(&self) -> Option<StructureError> {
        match self {
            LayoutError::Structure { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Builds a `Keyboard` from a layout document.
pub struct LayoutParser<'m> {
    metrics: &'m dyn GlyphMetrics,
    base_dir: Option<PathBuf>,
}

impl<'m> LayoutParser<'m> {
    /// `metrics` measures single-glyph labels; relative image paths resolve
    /// against `base_dir`.
    pub fn new(metrics: &'m dyn GlyphMetrics, base_dir: Option<PathBuf>) -> Self {
        Self { metrics, base_dir }
    }

    /// Parses the layout file at `path`; images resolve relative to its directory.
    pub fn parse_file(metrics: &'m dyn GlyphMetrics, path: &Path) -> Result<Keyboard, LayoutError> {
        let file = File::open(path).map_err(|source| LayoutError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let base_dir = path.parent().map(Path::to_path_buf);
        LayoutParser::new(metrics, base_dir).parse(BufReader::new(file))
    }

    /// Parses a layout document streamed from `input`.
    pub fn parse<R: BufRead>(&self, input: R) -> Result<Keyboard, LayoutError> {
        let mut reader = Reader::from_reader(input);
        // Row and key nesting is checked by `ParserState`.
        reader.trim_text(true).check_end_names(false);

        let mut state = ParserState::new(self);
        let mut buf = Vec::new();

        loop {
            let event = reader
                .read_event_into(&mut buf)
                .map_err(|source| LayoutError::Markup {
                    position: reader.buffer_position(),
                    source,
                })?;
            let result = match event {
                Event::Start(ref element) => state.start_element(element),
                Event::Empty(ref element) => state
                    .start_element(element)
                    .and_then(|()| state.end_element(element.name().as_ref())),
                Event::End(ref element) => state.end_element(element.name().as_ref()),
                Event::Eof => break,
                _ => Ok(()),
            };
            result.map_err(|kind| LayoutError::Structure {
                position: reader.buffer_position(),
                kind,
            })?;
            buf.clear();
        }

        let keyboard = state.finish();
        debug!(
            "Parsed {} keys in {} rows",
            keyboard.key_count(),
            keyboard.row_count()
        );
        Ok(keyboard)
    }

    fn resolve_image_path(&self, spec: &str) -> PathBuf {
        let path = Path::new(spec);
        match &self.base_dir {
            Some(dir) if !spec.starts_with('/') => dir.join(path),
            _ => path.to_path_buf(),
        }
    }
}

/// Parser state carried across element callbacks.
struct ParserState<'p, 'm> {
    parser: &'p LayoutParser<'m>,
    keyboard: Keyboard,
    row_open: bool,
    current_key: Option<Key>,
    images: HashMap<PathBuf, Option<Rc<Bitmap>>>,
}

impl<'p, 'm> ParserState<'p, 'm> {
    fn new(parser: &'p LayoutParser<'m>) -> Self {
        Self {
            parser,
            keyboard: Keyboard::new(),
            row_open: false,
            current_key: None,
            images: HashMap::new(),
        }
    }

    fn start_element(&mut self, element: &BytesStart) -> Result<(), StructureError> {
        let name = element.name();
        let attributes = read_attributes(element);
        for (attr, value) in &attributes {
            trace!("attribute {} = \"{}\"", attr, value);
        }

        match name.as_ref() {
            b"row" => self.row_start(),
            b"key" => self.key_start(&attributes),
            b"space" => self.space(&attributes),
            other => match LayoutVariant::from_element(other) {
                Some(variant) => self.key_contents(&attributes, variant),
                None => {
                    trace!(
                        "Ignoring element <{}>",
                        String::from_utf8_lossy(other)
                    );
                    Ok(())
                }
            },
        }
    }

    fn end_element(&mut self, name: &[u8]) -> Result<(), StructureError> {
        trace!("end element: {}", String::from_utf8_lossy(name));
        match name {
            b"row" => self.row_end(),
            b"key" => {
                let key = self
                    .current_key
                    .take()
                    .ok_or(StructureError::UnexpectedKeyEnd)?;
                self.commit_key(key)
            }
            _ => Ok(()),
        }
    }

    fn row_start(&mut self) -> Result<(), StructureError> {
        if self.keyboard.row_count() >= ROWS_MAX {
            return Err(StructureError::TooManyRows);
        }
        if self.row_open {
            return Err(StructureError::NestedRow);
        }
        self.keyboard.push_row();
        self.row_open = true;
        Ok(())
    }

    fn row_end(&mut self) -> Result<(), StructureError> {
        if !self.row_open || self.current_key.is_some() {
            return Err(StructureError::UnexpectedRowEnd);
        }
        self.row_open = false;
        Ok(())
    }

    fn key_start(&mut self, attributes: &[(String, String)]) -> Result<(), StructureError> {
        if self.current_key.is_some() {
            return Err(StructureError::NestedKey);
        }
        if !self.row_open {
            return Err(StructureError::KeyOutsideRow);
        }
        let mut key = Key::new(KeyKind::Button);
        apply_key_attributes(&mut key, attributes, true);
        self.current_key = Some(key);
        Ok(())
    }

    /// `<space>` is an inert filler key committed immediately.
    fn space(&mut self, attributes: &[(String, String)]) -> Result<(), StructureError> {
        if self.current_key.is_some() {
            return Err(StructureError::SpaceInsideKey);
        }
        if !self.row_open {
            return Err(StructureError::KeyOutsideRow);
        }
        let mut key = Key::new(KeyKind::Filler);
        apply_key_attributes(&mut key, attributes, false);
        self.commit_key(key)
    }

    fn commit_key(&mut self, key: Key) -> Result<(), StructureError> {
        if self.keyboard.key_count() + 1 >= KEYS_MAX {
            return Err(StructureError::TooManyKeys);
        }
        self.keyboard.push_key(key);
        Ok(())
    }

    fn key_contents(
        &mut self,
        attributes: &[(String, String)],
        variant: LayoutVariant,
    ) -> Result<(), StructureError> {
        let mut key = self
            .current_key
            .take()
            .ok_or(StructureError::VariantOutsideKey)?;

        let mut action = None;
        for (name, value) in attributes {
            if name.eq_ignore_ascii_case("display") {
                let (width, height) = self.key_display(&mut key, value, variant);
                debug!("key width: {}", width);
                self.keyboard.note_natural_size(width, height);
            } else if name.eq_ignore_ascii_case("action") {
                action = Some(value.as_str());
            }
        }

        // Without an explicit action the label doubles as the action.
        let label = key.face(variant).and_then(KeyFace::label).map(str::to_owned);
        if let Some(action) = action.or(label.as_deref()) {
            key_action(&mut key, action, variant);
        }

        self.current_key = Some(key);
        Ok(())
    }

    /// Sets the face of `variant`; returns the natural size to account for,
    /// or zero when the key has a forced width or nothing measurable.
    fn key_display(&mut self, key: &mut Key, value: &str, variant: LayoutVariant) -> (u32, u32) {
        if let Some(spec) = value.strip_prefix(IMAGE_PREFIX) {
            let path = self.parser.resolve_image_path(spec);
            let bitmap = self.load_image(path);
            let size = match &bitmap {
                Some(b) if key.width == 0 => (b.width, b.height),
                _ => (0, 0),
            };
            key.slot_mut(variant).face = bitmap.map(KeyFace::Image);
            return size;
        }

        key.slot_mut(variant).face = Some(KeyFace::Label(value.to_owned()));
        if key.width == 0 && value.chars().count() == 1 {
            self.parser.metrics.text_size(value)
        } else {
            (0, 0)
        }
    }

    fn load_image(&mut self, path: PathBuf) -> Option<Rc<Bitmap>> {
        if let Some(cached) = self.images.get(&path) {
            return cached.clone();
        }
        let bitmap = match image::open(&path) {
            Ok(decoded) => {
                let rgba = decoded.to_rgba8();
                Some(Rc::new(Bitmap {
                    width: rgba.width(),
                    height: rgba.height(),
                    pixels: rgba.into_raw(),
                }))
            }
            Err(e) => {
                warn!("Failed to load key image {}: {}", path.display(), e);
                None
            }
        };
        self.images.insert(path, bitmap.clone());
        bitmap
    }

    fn finish(mut self) -> Keyboard {
        if self.current_key.is_some() {
            warn!("Layout ended inside a key; discarding it");
        }
        if self.row_open {
            warn!("Layout ended inside a row");
        }
        self.keyboard.compact();
        self.keyboard
    }
}

/// Resolves an `action` value for one variant.
fn key_action(key: &mut Key, value: &str, variant: LayoutVariant) {
    if let Some(name) = value.strip_prefix(MODIFIER_PREFIX) {
        key.slot_mut(variant).keysym = Keysym::NONE;
        key.modifier = modifier_by_name(name);
        if key.modifier.is_empty() {
            warn!("Unknown modifier '{}'", name);
        }
        return;
    }

    let mut chars = value.chars();
    let keysym = match (chars.next(), chars.next()) {
        (Some(c), None) => Keysym::from_char(c),
        _ => keysym_by_name(value),
    };
    if keysym.is_none() && !value.is_empty() {
        debug!("No keysym for action '{}'", value);
    }
    key.slot_mut(variant).keysym = keysym;
}

/// `obey-caps` only applies to real keys; `space` accepts the sizing flags.
fn apply_key_attributes(key: &mut Key, attributes: &[(String, String)], allow_caps: bool) {
    for (name, value) in attributes {
        let enabled = value.eq_ignore_ascii_case("true");
        if allow_caps && name.eq_ignore_ascii_case("obey-caps") {
            key.obey_caps = enabled;
        } else if name.eq_ignore_ascii_case("fill") {
            key.fill = enabled;
        } else if name.eq_ignore_ascii_case("extended") {
            key.extended = enabled;
        } else if name.eq_ignore_ascii_case("width") {
            key.width = value.trim().parse().unwrap_or(0);
        }
    }
}

/// Collects attributes as owned strings. Malformed attributes are skipped and
/// values that fail to unescape are read as empty.
fn read_attributes(element: &BytesStart) -> Vec<(String, String)> {
    let mut attributes = Vec::new();
    for attr in element.attributes() {
        let attr = match attr {
            Ok(attr) => attr,
            Err(e) => {
                warn!("Skipping malformed attribute: {}", e);
                continue;
            }
        };
        let name = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.unescape_value() {
            Ok(value) => value.into_owned(),
            Err(e) => {
                warn!("Unreadable value for attribute '{}': {}", name, e);
                String::new()
            }
        };
        attributes.push((name, value));
    }
    attributes
}

#[cfg(test)]
mod tests;
