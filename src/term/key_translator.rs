// src/term/key_translator.rs

//! Bytes sent to the child for a dispatched key event.

use crate::keys::{KeySymbol, Modifiers};
use crate::term::modes::CursorModes;

#[rustfmt::skip]
pub fn translate_key_input(
    symbol: KeySymbol,
    modifiers: Modifiers,
    text: &str,
    modes: &CursorModes,
) -> Vec<u8> {
    let mut bytes_to_send: Vec<u8> = Vec::new();

    // Alt is sent as an ESC prefix
    if modifiers.contains(Modifiers::ALT) {
        bytes_to_send.push(0x1B);
    }

    if modifiers.contains(Modifiers::CONTROL) {
        if let KeySymbol::Char(c) = symbol {
            if let Some(control) = control_code(c) {
                bytes_to_send.push(control);
                return bytes_to_send;
            }
        }
    }

    match symbol {
        KeySymbol::Char(c) => {
            if text.is_empty() {
                let mut buf = [0; 4];
                bytes_to_send.extend(c.encode_utf8(&mut buf).as_bytes());
            } else {
                bytes_to_send.extend(text.as_bytes());
            }
        }
        KeySymbol::Enter => bytes_to_send.push(b'\r'),
        KeySymbol::Backspace => bytes_to_send.push(0x7f),
        KeySymbol::Tab => {
            if modifiers.contains(Modifiers::SHIFT) {
                bytes_to_send.extend_from_slice(b"\x1b[Z");
            } else {
                bytes_to_send.push(b'\t');
            }
        }
        KeySymbol::Escape => bytes_to_send.push(0x1B),

        KeySymbol::Up => bytes_to_send.extend_from_slice(
            if modes.cursor_keys_app_mode { b"\x1bOA" } else { b"\x1b[A" }
        ),
        KeySymbol::Down => bytes_to_send.extend_from_slice(
            if modes.cursor_keys_app_mode { b"\x1bOB" } else { b"\x1b[B" }
        ),
        KeySymbol::Right => bytes_to_send.extend_from_slice(
            if modes.cursor_keys_app_mode { b"\x1bOC" } else { b"\x1b[C" }
        ),
        KeySymbol::Left => bytes_to_send.extend_from_slice(
            if modes.cursor_keys_app_mode { b"\x1bOD" } else { b"\x1b[D" }
        ),

        KeySymbol::Home => bytes_to_send.extend_from_slice(b"\x1b[1~"),
        KeySymbol::End => bytes_to_send.extend_from_slice(b"\x1b[4~"),
        KeySymbol::PageUp => bytes_to_send.extend_from_slice(b"\x1b[5~"),
        KeySymbol::PageDown => bytes_to_send.extend_from_slice(b"\x1b[6~"),
        KeySymbol::Insert => bytes_to_send.extend_from_slice(b"\x1b[2~"),
        KeySymbol::Delete => bytes_to_send.extend_from_slice(b"\x1b[3~"),
        KeySymbol::Begin => bytes_to_send.extend_from_slice(b"\x1b[E"),

        KeySymbol::F1 => bytes_to_send.extend_from_slice(b"\x1bOP"),
        KeySymbol::F2 => bytes_to_send.extend_from_slice(b"\x1bOQ"),
        KeySymbol::F3 => bytes_to_send.extend_from_slice(b"\x1bOR"),
        KeySymbol::F4 => bytes_to_send.extend_from_slice(b"\x1bOS"),
        KeySymbol::F5 => bytes_to_send.extend_from_slice(b"\x1b[15~"),
        KeySymbol::F6 => bytes_to_send.extend_from_slice(b"\x1b[17~"),
        KeySymbol::F7 => bytes_to_send.extend_from_slice(b"\x1b[18~"),
        KeySymbol::F8 => bytes_to_send.extend_from_slice(b"\x1b[19~"),
        KeySymbol::F9 => bytes_to_send.extend_from_slice(b"\x1b[20~"),
        KeySymbol::F10 => bytes_to_send.extend_from_slice(b"\x1b[21~"),
        KeySymbol::F11 => bytes_to_send.extend_from_slice(b"\x1b[23~"),
        KeySymbol::F12 => bytes_to_send.extend_from_slice(b"\x1b[24~"),

        // Whatever the keymap produced for keys without a named sequence
        _ if !text.is_empty() && !symbol.is_modifier() => {
            bytes_to_send.extend(text.as_bytes());
        }
        _ => {
            log::trace!(
                "Unhandled KeySymbol (with no text): {:?}, Modifiers: {:?}",
                symbol,
                modifiers
            );
            // Nothing to send; drop a lone Alt prefix.
            bytes_to_send.clear();
        }
    }

    bytes_to_send
}

/// C0 control code for Ctrl+`c`.
fn control_code(c: char) -> Option<u8> {
    match c {
        c if c.is_ascii_alphabetic() => Some((c.to_ascii_lowercase() as u8) - b'a' + 1),
        '[' => Some(0x1b),
        '\\' => Some(0x1c),
        ']' => Some(0x1d),
        '^' => Some(0x1e),
        '_' => Some(0x1f),
        ' ' | '@' | '2' => Some(0x00),
        '?' => Some(0x7f),
        _ => None,
    }
}
