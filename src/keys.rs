// src/keys.rs

use bitflags::bitflags;
use x11::keysym;

mod unicode;

bitflags! {
    /// Modifier state held by the on-screen keyboard and carried by key events.
    ///
    /// `CAPS_LOCK` is the only locking modifier; every other bit is one-shot
    /// and is cleared after the next non-modifier key is released.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const SHIFT = 1 << 0;
        const CAPS_LOCK = 1 << 1;
        const CONTROL = 1 << 2;
        const ALT = 1 << 3;
        const MOD1 = 1 << 4;
        const MOD2 = 1 << 5;
        const MOD3 = 1 << 6;
    }
}

impl Modifiers {
    /// Bits delivered downstream with a synthesized key event.
    pub const BASIC: Modifiers = Modifiers::SHIFT
        .union(Modifiers::CONTROL)
        .union(Modifiers::ALT);

    /// Bits that auto-release after the next non-modifier key.
    pub const ONE_SHOT: Modifiers = Modifiers::all().difference(Modifiers::CAPS_LOCK);

    /// The part of this mask that is forwarded with injected events.
    pub fn basic(self) -> Modifiers {
        self.intersection(Modifiers::BASIC)
    }

    /// The one-shot part of this mask.
    pub fn one_shot(self) -> Modifiers {
        self.intersection(Modifiers::ONE_SHOT)
    }
}

/// A platform key symbol (X11 keysym space).
///
/// Zero is the "no symbol" sentinel; a key variant carrying it has no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Keysym(pub u32);

/// Keysyms at or above this value encode a Unicode code point directly.
const UNICODE_KEYSYM_BASE: u32 = 0x0100_0000;

impl Keysym {
    pub const NONE: Keysym = Keysym(0);

    #[inline]
    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }

    /// Keysym for a Unicode character.
    ///
    /// Latin-1 printable characters map to themselves and characters with a
    /// legacy keysym (Latin-2 to Latin-9, Cyrillic, Greek, symbols, ...) to
    /// that keysym. Everything else uses the `0x01000000 + code point` range.
    pub fn from_char(c: char) -> Keysym {
        let cp = c as u32;
        match cp {
            0x20..=0x7e | 0xa0..=0xff => Keysym(cp),
            0x08 => Keysym(keysym::XK_BackSpace),
            0x09 => Keysym(keysym::XK_Tab),
            0x0a => Keysym(keysym::XK_Linefeed),
            0x0d => Keysym(keysym::XK_Return),
            0x1b => Keysym(keysym::XK_Escape),
            0x7f => Keysym(keysym::XK_Delete),
            _ => Keysym(unicode::legacy_keysym(cp).unwrap_or(UNICODE_KEYSYM_BASE | cp)),
        }
    }

    /// The Unicode character this keysym produces, if any.
    pub fn to_char(self) -> Option<char> {
        let raw = self.0;
        match raw {
            0x20..=0x7e | 0xa0..=0xff => char::from_u32(raw),
            keysym::XK_BackSpace => Some('\u{8}'),
            keysym::XK_Tab => Some('\t'),
            keysym::XK_Linefeed => Some('\n'),
            keysym::XK_Return => Some('\r'),
            keysym::XK_Escape => Some('\u{1b}'),
            keysym::XK_Delete => Some('\u{7f}'),
            r if (UNICODE_KEYSYM_BASE + 0x100..=UNICODE_KEYSYM_BASE + 0x10_ffff).contains(&r) => {
                char::from_u32(r - UNICODE_KEYSYM_BASE)
            }
            r => unicode::legacy_code_point(r).and_then(char::from_u32),
        }
    }
}

/// Represents a key symbol.
///
/// This is the abstract key a dispatched key event resolves to before it is
/// translated into bytes for the child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeySymbol {
    // Printable characters
    Char(char),

    // Function keys
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,

    // Modifier keys
    Shift,
    Control,
    Alt,
    CapsLock,

    // Navigation keys
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Begin,
    Insert,
    Delete,

    // Other common keys
    Enter,
    Backspace,
    Tab,
    Escape,
    Pause,
    ScrollLock,
    SysReq,
    Clear,

    #[default]
    Unknown,
}

impl KeySymbol {
    /// Returns true if the key symbol represents a modifier key.
    pub fn is_modifier(&self) -> bool {
        matches!(
            self,
            KeySymbol::Shift | KeySymbol::Control | KeySymbol::Alt | KeySymbol::CapsLock
        )
    }

    /// Maps a keysym to the abstract key, preferring a single printable
    /// character from `text` when the platform produced one.
    pub fn from_keysym(sym: Keysym, text: &str) -> KeySymbol {
        let mut chars = text.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if !c.is_control() && c != '\u{FFFD}' {
                return KeySymbol::Char(c);
            }
        }

        match sym.raw() {
            keysym::XK_Shift_L | keysym::XK_Shift_R => KeySymbol::Shift,
            keysym::XK_Control_L | keysym::XK_Control_R => KeySymbol::Control,
            keysym::XK_Alt_L | keysym::XK_Alt_R | keysym::XK_Meta_L | keysym::XK_Meta_R => {
                KeySymbol::Alt
            }
            keysym::XK_Caps_Lock => KeySymbol::CapsLock,

            keysym::XK_Return | keysym::XK_KP_Enter => KeySymbol::Enter,
            keysym::XK_Linefeed => KeySymbol::Char('\n'),
            keysym::XK_BackSpace => KeySymbol::Backspace,
            keysym::XK_Tab | keysym::XK_ISO_Left_Tab => KeySymbol::Tab,
            keysym::XK_Escape => KeySymbol::Escape,
            keysym::XK_Pause => KeySymbol::Pause,
            keysym::XK_Scroll_Lock => KeySymbol::ScrollLock,
            keysym::XK_Sys_Req => KeySymbol::SysReq,
            keysym::XK_Clear => KeySymbol::Clear,

            keysym::XK_Home => KeySymbol::Home,
            keysym::XK_Left => KeySymbol::Left,
            keysym::XK_Up => KeySymbol::Up,
            keysym::XK_Right => KeySymbol::Right,
            keysym::XK_Down => KeySymbol::Down,
            keysym::XK_Page_Up => KeySymbol::PageUp,
            keysym::XK_Page_Down => KeySymbol::PageDown,
            keysym::XK_End => KeySymbol::End,
            keysym::XK_Begin => KeySymbol::Begin,
            keysym::XK_Insert => KeySymbol::Insert,
            keysym::XK_Delete => KeySymbol::Delete,

            keysym::XK_F1 => KeySymbol::F1,
            keysym::XK_F2 => KeySymbol::F2,
            keysym::XK_F3 => KeySymbol::F3,
            keysym::XK_F4 => KeySymbol::F4,
            keysym::XK_F5 => KeySymbol::F5,
            keysym::XK_F6 => KeySymbol::F6,
            keysym::XK_F7 => KeySymbol::F7,
            keysym::XK_F8 => KeySymbol::F8,
            keysym::XK_F9 => KeySymbol::F9,
            keysym::XK_F10 => KeySymbol::F10,
            keysym::XK_F11 => KeySymbol::F11,
            keysym::XK_F12 => KeySymbol::F12,

            _ => match sym.to_char() {
                Some(c) if !c.is_control() => KeySymbol::Char(c),
                _ => KeySymbol::Unknown,
            },
        }
    }
}
