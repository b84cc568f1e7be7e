// src/keyboard/tests.rs

//! End-to-end keyboard behaviour: parse a layout, render it, then drive it
//! with presses and debounced releases.

#[cfg(test)]
mod keyboard_tests {
    use crate::keyboard::mock::{FixedGlyphMetrics, MockInput, RecordingTerminal, RecordingView};
    use crate::keyboard::state::resolve_variant;
    use crate::keyboard::{
        EventKind, KeyContext, KeyId, Keyboard, LayoutParser, LayoutVariant, PressOutcome,
        ReleaseOutcome, ReleaseQueue,
    };
    use crate::keys::{Keysym, Modifiers};
    use std::time::{Duration, Instant};

    const GLYPH: FixedGlyphMetrics = FixedGlyphMetrics::new(10, 16);
    const RELEASE_DELAY: Duration = Duration::from_millis(100);

    const LAYOUT: &str = r#"
        <keyboard>
          <row>
            <key><default display="Shift" action="modifier:shift"/></key>
            <key obey-caps="true"><default display="a"/><shifted display="A"/></key>
            <key><default display="1"/><shifted display="!"/></key>
            <key><default display="Caps" action="modifier:caps"/></key>
          </row>
          <row>
            <key><default display="Ctrl" action="modifier:ctrl"/></key>
            <key><default display="AltGr" action="modifier:mod1"/></key>
            <key><default display="e"/><mod1 display="ę"/></key>
            <key><default display="Tab" action="tab"/><shifted display="BTab"/></key>
            <space width="500"/>
          </row>
        </keyboard>"#;

    const SHIFT: usize = 0;
    const LETTER: usize = 1;
    const DIGIT: usize = 2;
    const CAPS: usize = 3;
    const CTRL: usize = 4;
    const ALTGR: usize = 5;
    const E: usize = 6;
    const TAB: usize = 7;
    const FILLER: usize = 8;

    /// Keyboard plus recording collaborators and a release timer queue.
    struct Harness {
        keyboard: Keyboard,
        view: RecordingView,
        input: MockInput,
        terminal: RecordingTerminal,
        timers: ReleaseQueue,
        now: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let mut keyboard = LayoutParser::new(&GLYPH, None)
                .parse(LAYOUT.as_bytes())
                .expect("layout parses");
            let mut view = RecordingView::new();
            keyboard.refresh_faces(&mut view);
            let input = MockInput::new()
                .with_mapping(Keysym::from_char('a'), 38, 0)
                .with_mapping(Keysym::from_char('A'), 38, 1)
                .with_mapping(Keysym::from_char('1'), 10, 0)
                .with_mapping(Keysym::from_char('!'), 10, 1)
                .with_mapping(Keysym::from_char('e'), 26, 0)
                .with_mapping(Keysym(x11::keysym::XK_Tab), 23, 0);
            Self {
                keyboard,
                view,
                input,
                terminal: RecordingTerminal::new(),
                timers: ReleaseQueue::new(),
                now: Instant::now(),
            }
        }

        fn id(&self, index: usize) -> KeyId {
            self.keyboard.keys()[index].id()
        }

        /// Presses a key; a release still pending for it runs first.
        fn press(&mut self, index: usize) -> PressOutcome {
            let id = self.id(index);
            if self.timers.take(id) {
                self.release(id);
            }
            let mut ctx = KeyContext {
                view: &mut self.view,
                input: &mut self.input,
                terminal: &mut self.terminal,
            };
            self.keyboard.press(id, &mut ctx)
        }

        /// Lifts the finger; non-modifier keys schedule their release.
        fn lift(&mut self, index: usize) {
            let id = self.id(index);
            if self.keyboard.wants_release(id) {
                self.timers.schedule(self.now, RELEASE_DELAY, id);
            }
        }

        /// Advances the clock and runs expired releases.
        fn advance(&mut self, by: Duration) -> Vec<ReleaseOutcome> {
            self.now += by;
            let mut outcomes = Vec::new();
            for id in self.timers.pop_expired(self.now) {
                outcomes.push(self.release(id));
            }
            outcomes
        }

        fn release(&mut self, id: KeyId) -> ReleaseOutcome {
            let mut ctx = KeyContext {
                view: &mut self.view,
                input: &mut self.input,
                terminal: &mut self.terminal,
            };
            self.keyboard.release(id, &mut ctx)
        }

        /// Press, lift, and wait out the debounce.
        fn tap(&mut self, index: usize) -> PressOutcome {
            let outcome = self.press(index);
            self.lift(index);
            self.advance(RELEASE_DELAY);
            outcome
        }

        fn label(&self, index: usize) -> Option<&str> {
            self.view.label(self.id(index))
        }

        fn mask(&self) -> Modifiers {
            self.keyboard.modifier_mask()
        }
    }

    fn injected(outcome: PressOutcome) -> crate::keyboard::KeyEvent {
        match outcome {
            PressOutcome::Injected(event) => event,
            other => panic!("expected an injected event, got {:?}", other),
        }
    }

    #[test_log::test]
    fn test_initial_faces_show_default_variant() {
        let h = Harness::new();
        assert_eq!(h.label(LETTER), Some("a"));
        assert_eq!(h.label(SHIFT), Some("Shift"));
        assert_eq!(h.label(FILLER), None);
        assert_eq!(
            h.keyboard.keys()[LETTER].shown_variant(),
            Some(LayoutVariant::Default)
        );
    }

    #[test_log::test]
    fn test_shift_then_letter_scenario() {
        let mut h = Harness::new();

        assert_eq!(
            h.press(SHIFT),
            PressOutcome::ModifierToggled(Modifiers::SHIFT)
        );
        h.lift(SHIFT);
        assert!(h.timers.is_empty(), "modifier keys have no deferred release");
        assert!(h.view.is_active(h.id(SHIFT)));
        assert_eq!(h.label(LETTER), Some("A"));
        assert_eq!(h.label(DIGIT), Some("!"));

        let press = injected(h.press(LETTER));
        assert_eq!(press.kind, EventKind::Press);
        assert_eq!(press.keysym, Keysym::from_char('A'));
        assert_eq!(press.keycode, 38);
        assert_eq!(press.modifiers, Modifiers::SHIFT);
        assert_eq!(press.level, 1);
        assert!(h.view.is_active(h.id(LETTER)));

        h.lift(LETTER);
        assert!(h.advance(Duration::from_millis(99)).is_empty());
        assert_eq!(h.label(LETTER), Some("A"), "debounce keeps the shifted face");

        let released = h.advance(Duration::from_millis(1));
        let release = match released.as_slice() {
            [ReleaseOutcome::Injected(event)] => *event,
            other => panic!("expected one release, got {:?}", other),
        };
        assert_eq!(release.kind, EventKind::Release);
        assert_eq!(release.keysym, Keysym::from_char('A'));
        assert_eq!(release.modifiers, Modifiers::empty());

        assert_eq!(h.mask(), Modifiers::empty());
        assert_eq!(h.label(LETTER), Some("a"));
        assert!(!h.view.is_active(h.id(LETTER)));
        assert!(!h.view.is_active(h.id(SHIFT)));
        assert_eq!(h.input.dispatched(), &[press, release]);
    }

    #[test_log::test]
    fn test_caps_only_shifts_obeying_keys() {
        let mut h = Harness::new();
        h.tap(CAPS);
        assert_eq!(h.mask(), Modifiers::CAPS_LOCK);
        assert_eq!(h.label(LETTER), Some("A"));
        assert_eq!(h.label(DIGIT), Some("1"));

        let letter = injected(h.tap(LETTER));
        assert_eq!(letter.keysym, Keysym::from_char('A'));
        // Caps lock is not a basic modifier.
        assert_eq!(letter.modifiers, Modifiers::empty());

        let digit = injected(h.tap(DIGIT));
        assert_eq!(digit.keysym, Keysym::from_char('1'));
    }

    #[test_log::test]
    fn test_caps_persists_and_shift_does_not() {
        let mut h = Harness::new();
        h.tap(CAPS);
        h.tap(E);
        assert_eq!(h.mask(), Modifiers::CAPS_LOCK);
        assert!(h.view.is_active(h.id(CAPS)));

        h.tap(SHIFT);
        assert_eq!(h.mask(), Modifiers::CAPS_LOCK | Modifiers::SHIFT);
        h.tap(E);
        assert_eq!(h.mask(), Modifiers::CAPS_LOCK);
        assert!(!h.view.is_active(h.id(SHIFT)));
        assert!(h.view.is_active(h.id(CAPS)));

        h.tap(CAPS);
        assert_eq!(h.mask(), Modifiers::empty());
        assert!(!h.view.is_active(h.id(CAPS)));
        assert_eq!(h.label(LETTER), Some("a"));
    }

    #[test_log::test]
    fn test_modifier_toggle_is_self_inverse() {
        let mut h = Harness::new();
        for index in [SHIFT, CTRL, ALTGR, CAPS] {
            let before = h.mask();
            let updates = h.view.face_updates();
            h.tap(index);
            h.tap(index);
            assert_eq!(h.mask(), before, "key {} twice", index);
            assert!(!h.view.is_active(h.id(index)));
            assert!(h.view.face_updates() >= updates);
        }
        assert_eq!(h.label(LETTER), Some("a"));
    }

    #[test_log::test]
    fn test_control_does_not_rerender() {
        let mut h = Harness::new();
        let updates = h.view.face_updates();
        h.tap(CTRL);
        assert_eq!(h.mask(), Modifiers::CONTROL);
        assert_eq!(h.view.face_updates(), updates);

        let event = injected(h.tap(E));
        assert_eq!(event.modifiers, Modifiers::CONTROL);
        assert_eq!(h.mask(), Modifiers::empty());
    }

    #[test_log::test]
    fn test_unmapped_character_is_fed_to_terminal() {
        let mut h = Harness::new();
        h.tap(ALTGR);
        assert_eq!(h.label(E), Some("ę"));
        // Keys without a mod1 face keep showing their default face.
        assert_eq!(h.label(LETTER), Some("a"));

        assert_eq!(h.press(E), PressOutcome::FedToTerminal(Keysym::from_char('ę')));
        assert_eq!(h.terminal.received(), "ę".as_bytes());
        h.lift(E);
        let released = h.advance(RELEASE_DELAY);
        assert_eq!(
            released,
            vec![ReleaseOutcome::Unmapped(Keysym::from_char('ę'))]
        );
        assert_eq!(h.mask(), Modifiers::empty());
        assert!(h.input.dispatched().is_empty());
    }

    #[test_log::test]
    fn test_legacy_keysym_matches_national_keymap() {
        let mut h = Harness::new();
        // A Polish mapping binds `eogonek` at level three of the `e` key.
        h.input = MockInput::new().with_mapping(Keysym(x11::keysym::XK_eogonek), 26, 2);
        h.tap(ALTGR);

        let event = injected(h.tap(E));
        assert_eq!(event.keysym, Keysym(0x01ea));
        assert_eq!(event.keycode, 26);
        assert_eq!(event.level, 2);
        assert!(h.terminal.received().is_empty());
    }

    #[test_log::test]
    fn test_repress_runs_pending_release_first() {
        let mut h = Harness::new();
        h.press(LETTER);
        h.lift(LETTER);
        h.press(LETTER);
        h.lift(LETTER);
        assert_eq!(h.advance(RELEASE_DELAY).len(), 1);

        let kinds: Vec<EventKind> = h.input.dispatched().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Press,
                EventKind::Release,
                EventKind::Press,
                EventKind::Release
            ]
        );
        assert!(h.timers.is_empty());
    }

    #[test_log::test]
    fn test_missing_variant_action_falls_back_to_default() {
        let mut h = Harness::new();
        h.tap(ALTGR);
        // No mod1 variant on the letter: it types the default.
        let event = injected(h.tap(LETTER));
        assert_eq!(event.keysym, Keysym::from_char('a'));
    }

    #[test_log::test]
    fn test_unresolvable_shifted_action_uses_default() {
        let mut h = Harness::new();
        h.tap(SHIFT);
        assert_eq!(h.label(TAB), Some("BTab"));
        // "BTab" names no keysym, so the default Tab is sent.
        let event = injected(h.tap(TAB));
        assert_eq!(event.keysym, Keysym(x11::keysym::XK_Tab));
        assert_eq!(event.modifiers, Modifiers::SHIFT);
    }

    #[test_log::test]
    fn test_filler_ignores_touch() {
        let mut h = Harness::new();
        assert_eq!(h.press(FILLER), PressOutcome::Ignored);
        assert!(!h.keyboard.wants_release(h.id(FILLER)));
        assert!(!h.view.is_active(h.id(FILLER)));
    }

    #[test_log::test]
    fn test_cancelled_release_never_fires() {
        let mut h = Harness::new();
        h.tap(SHIFT);
        h.press(LETTER);
        h.lift(LETTER);
        assert_eq!(h.timers.cancel_all(), 1);
        assert!(h.advance(RELEASE_DELAY).is_empty());
        assert_eq!(h.mask(), Modifiers::SHIFT);
    }

    #[test_log::test]
    fn test_stale_key_release_is_ignored() {
        let mut h = Harness::new();
        let mut ctx = KeyContext {
            view: &mut h.view,
            input: &mut h.input,
            terminal: &mut h.terminal,
        };
        let stale = {
            let other = LayoutParser::new(&GLYPH, None)
                .parse(format!("<row>{}</row>", "<space/>".repeat(20)).as_bytes())
                .expect("layout");
            other.keys()[19].id()
        };
        assert_eq!(h.keyboard.release(stale, &mut ctx), ReleaseOutcome::Ignored);
        assert_eq!(h.keyboard.press(stale, &mut ctx), PressOutcome::Ignored);
    }

    #[test_log::test]
    fn test_faces_follow_resolve_variant() {
        let mut h = Harness::new();
        h.tap(SHIFT);
        h.tap(ALTGR);
        let mask = h.mask();
        assert_eq!(resolve_variant(mask), LayoutVariant::Shifted);
        assert_eq!(
            h.keyboard.keys()[E].shown_variant(),
            Some(LayoutVariant::Default)
        );
        assert_eq!(
            h.keyboard.keys()[LETTER].shown_variant(),
            Some(LayoutVariant::Shifted)
        );
    }
}
