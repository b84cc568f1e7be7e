// src/term/modes.rs

//! Tracks the DEC private modes that change what the keyboard sends.
//!
//! The child's output is relayed to the host console untouched; this module
//! only watches it for `CSI ? Pm h` / `CSI ? Pm l` so cursor keys can follow
//! application cursor mode (DECCKM).

use log::debug;

/// DECCKM mode number.
const CURSOR_KEYS: u16 = 1;

/// Longest private mode sequence we buffer across reads before giving up.
const MAX_PENDING: usize = 32;

/// Modes consulted by the key translator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorModes {
    /// Cursor keys send `ESC O x` instead of `ESC [ x`.
    pub cursor_keys_app_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Ground,
    Escape,
    Csi,
    Private,
}

/// Incremental scanner for private mode set/reset sequences.
///
/// Sequences may be split across reads; the scanner keeps the partial
/// parameter bytes between calls to [`ModeTracker::observe`].
#[derive(Debug)]
pub struct ModeTracker {
    modes: CursorModes,
    state: ScanState,
    params: Vec<u8>,
}

impl Default for ModeTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ModeTracker {
    pub fn new() -> Self {
        Self {
            modes: CursorModes::default(),
            state: ScanState::Ground,
            params: Vec::new(),
        }
    }

    pub fn modes(&self) -> &CursorModes {
        &self.modes
    }

    /// Feeds a chunk of child output through the scanner.
    pub fn observe(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.state = match (self.state, byte) {
                (_, 0x1b) => ScanState::Escape,
                (ScanState::Ground, _) => ScanState::Ground,
                (ScanState::Escape, b'[') => ScanState::Csi,
                (ScanState::Escape, _) => ScanState::Ground,
                (ScanState::Csi, b'?') => {
                    self.params.clear();
                    ScanState::Private
                }
                (ScanState::Csi, _) => ScanState::Ground,
                (ScanState::Private, b'0'..=b'9' | b';') if self.params.len() < MAX_PENDING => {
                    self.params.push(byte);
                    ScanState::Private
                }
                (ScanState::Private, b'h') => {
                    self.apply(true);
                    ScanState::Ground
                }
                (ScanState::Private, b'l') => {
                    self.apply(false);
                    ScanState::Ground
                }
                (ScanState::Private, _) => ScanState::Ground,
            };
        }
    }

    fn apply(&mut self, enable: bool) {
        let params = std::mem::take(&mut self.params);
        for mode in params
            .split(|&b| b == b';')
            .filter_map(|p| std::str::from_utf8(p).ok()?.parse::<u16>().ok())
        {
            if mode == CURSOR_KEYS && self.modes.cursor_keys_app_mode != enable {
                debug!("Application cursor keys {}", if enable { "on" } else { "off" });
                self.modes.cursor_keys_app_mode = enable;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_and_reset_cursor_keys() {
        let mut tracker = ModeTracker::new();
        tracker.observe(b"hello\x1b[?1h");
        assert!(tracker.modes().cursor_keys_app_mode);
        tracker.observe(b"\x1b[?1l world");
        assert!(!tracker.modes().cursor_keys_app_mode);
    }

    #[test]
    fn sequence_split_across_reads() {
        let mut tracker = ModeTracker::new();
        tracker.observe(b"\x1b");
        tracker.observe(b"[?");
        tracker.observe(b"1");
        assert!(!tracker.modes().cursor_keys_app_mode);
        tracker.observe(b"h");
        assert!(tracker.modes().cursor_keys_app_mode);
    }

    #[test]
    fn mode_in_parameter_list() {
        let mut tracker = ModeTracker::new();
        tracker.observe(b"\x1b[?1049;1h");
        assert!(tracker.modes().cursor_keys_app_mode);
    }

    #[test]
    fn other_sequences_are_ignored() {
        let mut tracker = ModeTracker::new();
        tracker.observe(b"\x1b[1h\x1b[?10h\x1b[?25l\x1b[31m");
        assert!(!tracker.modes().cursor_keys_app_mode);
    }
}
