// src/keyboard/symbols.rs

//! Name lookups used by the layout parser: symbolic key names to keysyms and
//! modifier names to modifier bits. Both match case-insensitively.

use crate::keys::{Keysym, Modifiers};
use x11::keysym;

/// Symbolic `action` names understood in layout files.
static KEYSYM_NAMES: &[(&str, u32)] = &[
    ("backspace", keysym::XK_BackSpace),
    ("tab", keysym::XK_Tab),
    ("linefeed", keysym::XK_Linefeed),
    ("clear", keysym::XK_Clear),
    ("return", keysym::XK_Return),
    ("pause", keysym::XK_Pause),
    ("scrolllock", keysym::XK_Scroll_Lock),
    ("sysreq", keysym::XK_Sys_Req),
    ("escape", keysym::XK_Escape),
    ("delete", keysym::XK_Delete),
    ("home", keysym::XK_Home),
    ("left", keysym::XK_Left),
    ("up", keysym::XK_Up),
    ("right", keysym::XK_Right),
    ("down", keysym::XK_Down),
    ("prior", keysym::XK_Prior),
    ("pageup", keysym::XK_Page_Up),
    ("next", keysym::XK_Next),
    ("pagedown", keysym::XK_Page_Down),
    ("end", keysym::XK_End),
    ("begin", keysym::XK_Begin),
    ("space", keysym::XK_space),
    ("f1", keysym::XK_F1),
    ("f2", keysym::XK_F2),
    ("f3", keysym::XK_F3),
    ("f4", keysym::XK_F4),
    ("f5", keysym::XK_F5),
    ("f6", keysym::XK_F6),
    ("f7", keysym::XK_F7),
    ("f8", keysym::XK_F8),
    ("f9", keysym::XK_F9),
    ("f10", keysym::XK_F10),
    ("f11", keysym::XK_F11),
    ("f12", keysym::XK_F12),
];

/// Names accepted after the `modifier:` action prefix.
static MODIFIER_NAMES: &[(&str, Modifiers)] = &[
    ("shift", Modifiers::SHIFT),
    ("caps", Modifiers::CAPS_LOCK),
    ("ctrl", Modifiers::CONTROL),
    ("alt", Modifiers::ALT),
    ("mod1", Modifiers::MOD1),
    ("mod2", Modifiers::MOD2),
    ("mod3", Modifiers::MOD3),
];

/// Looks up a symbolic key name. Unknown names yield `Keysym::NONE`.
pub fn keysym_by_name(name: &str) -> Keysym {
    KEYSYM_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, sym)| Keysym(sym))
        .unwrap_or(Keysym::NONE)
}

/// Looks up a modifier name. Unknown names yield an empty mask.
pub fn modifier_by_name(name: &str) -> Modifiers {
    MODIFIER_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, m)| m)
        .unwrap_or_else(Modifiers::empty)
}
