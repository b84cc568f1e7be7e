// src/keyboard/state.rs

//! Modifier and layout variant state machine.
//!
//! The keyboard's modifier mask selects which of the five variants each key
//! shows and produces. Modifier keys toggle their bit on press; any other key
//! produces a synthetic event on press and again on (deferred) release, after
//! which the one-shot modifiers are cleared. Caps lock persists.

use super::inject::{feed_character, inject_key, EventKind, InputSystem, KeyEvent, TerminalSink};
use super::model::{Key, KeyFace, KeyId, Keyboard, LayoutVariant};
use super::view::KeyboardView;
use crate::keys::{Keysym, Modifiers};
use log::{debug, trace};

/// Variant selected by a modifier mask.
///
/// Shift or caps lock win over mod1, which wins over mod2, then mod3.
pub fn resolve_variant(mask: Modifiers) -> LayoutVariant {
    if mask.intersects(Modifiers::SHIFT | Modifiers::CAPS_LOCK) {
        LayoutVariant::Shifted
    } else if mask.contains(Modifiers::MOD1) {
        LayoutVariant::Mod1
    } else if mask.contains(Modifiers::MOD2) {
        LayoutVariant::Mod2
    } else if mask.contains(Modifiers::MOD3) {
        LayoutVariant::Mod3
    } else {
        LayoutVariant::Default
    }
}

/// Caps lock held without shift.
#[inline]
fn caps_only(mask: Modifiers) -> bool {
    mask.contains(Modifiers::CAPS_LOCK) && !mask.contains(Modifiers::SHIFT)
}

/// Variant `key` shows and acts on under `mask`. With caps lock alone, only
/// keys that obey caps are shifted.
pub fn variant_for_key(key: &Key, mask: Modifiers) -> LayoutVariant {
    if caps_only(mask) && !key.obey_caps {
        LayoutVariant::Default
    } else {
        resolve_variant(mask)
    }
}

/// Keysym `key` produces under `mask`, falling back to the default variant.
pub fn resolve_keysym(key: &Key, mask: Modifiers) -> Option<Keysym> {
    let variant = variant_for_key(key, mask);
    let keysym = key.keysym(variant);
    let keysym = if keysym.is_none() && variant != LayoutVariant::Default {
        key.keysym(LayoutVariant::Default)
    } else {
        keysym
    };
    (!keysym.is_none()).then_some(keysym)
}

/// What a press did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PressOutcome {
    /// Unknown key or a filler.
    Ignored,
    /// A modifier bit was toggled; carries the resulting mask.
    ModifierToggled(Modifiers),
    /// The key has no action under the current modifiers.
    NoAction,
    Injected(KeyEvent),
    /// Unmapped keysym written to the terminal as a character.
    FedToTerminal(Keysym),
    /// Unmapped keysym without a character.
    Dropped(Keysym),
}

/// What a deferred release did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// Unknown key, a filler or a modifier key.
    Ignored,
    NoAction,
    Injected(KeyEvent),
    Unmapped(Keysym),
}

/// Collaborators a key press or release talks to.
pub struct KeyContext<'a> {
    pub view: &'a mut dyn KeyboardView,
    pub input: &'a mut dyn InputSystem,
    pub terminal: &'a mut dyn TerminalSink,
}

impl Keyboard {
    /// Whether pressing `id` should be followed by a deferred release.
    pub fn wants_release(&self, id: KeyId) -> bool {
        self.key(id)
            .is_some_and(|key| !key.is_filler() && !key.is_modifier())
    }

    /// Shows every key's face for the current modifier mask. Keys already
    /// showing the right variant are left alone.
    pub fn refresh_faces(&mut self, view: &mut dyn KeyboardView) {
        let mask = self.modifier_mask;
        trace!("setting layout {:?}, caps only: {}", resolve_variant(mask), caps_only(mask));
        for index in 0..self.key_count() {
            let Some(key) = self.keys().get(index) else {
                break;
            };
            let Some((variant, face)) = displayed_face(key, mask) else {
                continue;
            };
            if key.shown == Some(variant) {
                continue;
            }
            let id = key.id();
            view.set_face(id, face);
            if let Some(key) = self.key_mut(id) {
                key.shown = Some(variant);
            }
        }
    }

    /// Clears the one-shot modifiers and releases their buttons. Caps lock
    /// keeps both its bit and its button state.
    pub fn reset_modifiers(&mut self, view: &mut dyn KeyboardView) {
        debug!("resetting modifier_mask");
        let ids: Vec<KeyId> = self
            .keys()
            .iter()
            .filter(|key| key.is_modifier() && key.modifier != Modifiers::CAPS_LOCK)
            .map(Key::id)
            .collect();
        for id in ids {
            self.set_active(view, id, false);
        }
        self.modifier_mask &= Modifiers::CAPS_LOCK;
    }

    /// Handles a touch press on `id`.
    pub fn press(&mut self, id: KeyId, ctx: &mut KeyContext<'_>) -> PressOutcome {
        let Some(key) = self.key(id) else {
            return PressOutcome::Ignored;
        };
        if key.is_filler() {
            return PressOutcome::Ignored;
        }
        let modifier = key.modifier;
        let mask = self.modifier_mask;
        let keysym = resolve_keysym(key, mask);
        let active = if modifier.is_empty() { true } else { !key.active };
        debug!(
            "press: key {} keysym {:?} modifier {:?} mask {:?}",
            id.index(),
            keysym,
            modifier,
            mask
        );
        self.set_active(ctx.view, id, active);

        if !modifier.is_empty() {
            self.modifier_mask ^= modifier;
            if resolve_variant(modifier) != LayoutVariant::Default {
                self.refresh_faces(ctx.view);
            }
            return PressOutcome::ModifierToggled(self.modifier_mask);
        }

        let Some(keysym) = keysym else {
            debug!("Empty action");
            return PressOutcome::NoAction;
        };
        match inject_key(ctx.input, EventKind::Press, keysym, mask) {
            Some(event) => PressOutcome::Injected(event),
            None if feed_character(ctx.terminal, keysym) => PressOutcome::FedToTerminal(keysym),
            None => PressOutcome::Dropped(keysym),
        }
    }

    /// Handles the deferred release of `id`.
    ///
    /// The released keysym is resolved with the modifiers the press saw; the
    /// event carries the modifiers left after the one-shot clear.
    pub fn release(&mut self, id: KeyId, ctx: &mut KeyContext<'_>) -> ReleaseOutcome {
        let Some(key) = self.key(id) else {
            return ReleaseOutcome::Ignored;
        };
        if key.is_filler() || key.is_modifier() {
            return ReleaseOutcome::Ignored;
        }
        let keysym = resolve_keysym(key, self.modifier_mask);
        debug!("release: key {} keysym {:?}", id.index(), keysym);
        self.set_active(ctx.view, id, false);

        if !self.modifier_mask.one_shot().is_empty() {
            self.reset_modifiers(ctx.view);
            self.refresh_faces(ctx.view);
        }

        let Some(keysym) = keysym else {
            debug!("Empty action");
            return ReleaseOutcome::NoAction;
        };
        match inject_key(ctx.input, EventKind::Release, keysym, self.modifier_mask) {
            Some(event) => ReleaseOutcome::Injected(event),
            None => ReleaseOutcome::Unmapped(keysym),
        }
    }

    pub(crate) fn set_active(&mut self, view: &mut dyn KeyboardView, id: KeyId, active: bool) {
        if let Some(key) = self.key_mut(id) {
            key.active = active;
            view.set_active(id, active);
        }
    }
}

/// Face to show for `key`; a variant without a face shows the default one.
fn displayed_face(key: &Key, mask: Modifiers) -> Option<(LayoutVariant, &KeyFace)> {
    let variant = variant_for_key(key, mask);
    match key.face(variant) {
        Some(face) => Some((variant, face)),
        None => key
            .face(LayoutVariant::Default)
            .map(|face| (LayoutVariant::Default, face)),
    }
}
