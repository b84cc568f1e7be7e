// src/keyboard/parser/tests.rs

//! Tests for the layout parser: structure validation, attribute handling and
//! per-variant face/action resolution.

#[cfg(test)]
mod parser_tests {
    use crate::keyboard::mock::FixedGlyphMetrics;
    use crate::keyboard::model::{KeyFace, KeyKind, Keyboard, LayoutVariant, KEYS_MAX};
    use crate::keyboard::parser::{LayoutError, LayoutParser, StructureError};
    use crate::keys::{Keysym, Modifiers};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;
    use x11::keysym;

    // --- Test Helpers ---

    const GLYPH: FixedGlyphMetrics = FixedGlyphMetrics::new(10, 16);

    fn parse_str(layout: &str) -> Result<Keyboard, LayoutError> {
        LayoutParser::new(&GLYPH, None).parse(layout.as_bytes())
    }

    fn parse_ok(layout: &str) -> Keyboard {
        match parse_str(layout) {
            Ok(keyboard) => keyboard,
            Err(e) => panic!("layout should parse: {}", e),
        }
    }

    fn structure_error(layout: &str) -> StructureError {
        match parse_str(layout) {
            Ok(_) => panic!("layout should be rejected"),
            Err(e) => e
                .structure()
                .unwrap_or_else(|| panic!("expected a structure error, got {}", e)),
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        image::RgbaImage::new(width, height)
            .save(path)
            .expect("write png fixture");
    }

    fn assert_counts_consistent(keyboard: &Keyboard) {
        assert_eq!(
            keyboard.key_per_row().iter().sum::<usize>(),
            keyboard.key_count(),
            "key_per_row must add up to key_count"
        );
        assert!(keyboard.row_count() <= 10);
        assert!(keyboard.key_count() < KEYS_MAX);
    }

    // --- Structure ---

    #[test_log::test]
    fn test_simple_layout() {
        let keyboard = parse_ok(
            r#"<keyboard>
                 <row>
                   <key><default display="q"/><shifted display="Q"/></key>
                   <key><default display="w"/></key>
                 </row>
                 <row>
                   <space width="500"/>
                   <key fill="true"><default display=" " action="space"/></key>
                 </row>
               </keyboard>"#,
        );
        assert_eq!(keyboard.row_count(), 2);
        assert_eq!(keyboard.key_count(), 4);
        assert_eq!(keyboard.key_per_row(), &[2, 2]);
        assert_counts_consistent(&keyboard);

        let q = &keyboard.keys()[0];
        assert_eq!(q.keysym(LayoutVariant::Default), Keysym::from_char('q'));
        assert_eq!(q.keysym(LayoutVariant::Shifted), Keysym::from_char('Q'));
        assert_eq!(q.keysym(LayoutVariant::Mod1), Keysym::NONE);

        let filler = &keyboard.keys()[2];
        assert_eq!(filler.kind(), KeyKind::Filler);
        assert_eq!(filler.width, 500);
        assert_eq!(filler.row(), 1);

        let space = &keyboard.keys()[3];
        assert!(space.fill);
        assert_eq!(space.keysym(LayoutVariant::Default), Keysym(keysym::XK_space));
    }

    #[test_log::test]
    fn test_empty_document() {
        let keyboard = parse_ok("");
        assert_eq!(keyboard.row_count(), 0);
        assert_eq!(keyboard.key_count(), 0);
    }

    #[test_log::test]
    fn test_nested_row_rejected() {
        assert_eq!(structure_error("<row><row></row></row>"), StructureError::NestedRow);
    }

    #[test_log::test]
    fn test_nested_key_rejected() {
        assert_eq!(
            structure_error("<row><key><key></key></key></row>"),
            StructureError::NestedKey
        );
    }

    #[test_log::test]
    fn test_variant_outside_key_rejected() {
        assert_eq!(
            structure_error(r#"<row><default display="a"/></row>"#),
            StructureError::VariantOutsideKey
        );
    }

    #[test_log::test]
    fn test_key_outside_row_rejected() {
        assert_eq!(
            structure_error(r#"<key><default display="a"/></key>"#),
            StructureError::KeyOutsideRow
        );
        assert_eq!(structure_error("<space/>"), StructureError::KeyOutsideRow);
    }

    #[test_log::test]
    fn test_space_inside_key_rejected() {
        assert_eq!(
            structure_error("<row><key><space/></key></row>"),
            StructureError::SpaceInsideKey
        );
    }

    #[test_log::test]
    fn test_too_many_rows_rejected() {
        let ten = "<row></row>".repeat(10);
        assert_eq!(parse_ok(&ten).row_count(), 10);

        let eleven = "<row></row>".repeat(11);
        assert_eq!(structure_error(&eleven), StructureError::TooManyRows);
    }

    #[test_log::test]
    fn test_too_many_keys_rejected() {
        // 499 keys is the largest layout accepted.
        let fits = format!("<row>{}</row>", "<space/>".repeat(KEYS_MAX - 1));
        let keyboard = parse_ok(&fits);
        assert_eq!(keyboard.key_count(), KEYS_MAX - 1);
        assert_counts_consistent(&keyboard);

        let keys = r#"<key><default display="x"/></key>"#.repeat(251);
        let layout = format!("<row>{keys}</row><row>{keys}</row>");
        let err = parse_str(&layout).err().expect("502 keys must fail");
        assert!(matches!(
            err,
            LayoutError::Structure {
                kind: StructureError::TooManyKeys,
                ..
            }
        ));
    }

    #[test_log::test]
    fn test_unknown_elements_ignored() {
        let keyboard = parse_ok(
            r#"<layout><meta name="x"/><row><key><default display="a"/><label/></key></row></layout>"#,
        );
        assert_eq!(keyboard.key_count(), 1);
    }

    #[test_log::test]
    fn test_malformed_markup_is_an_error() {
        let err = parse_str("<row><key").err().expect("truncated tag");
        assert!(matches!(err, LayoutError::Markup { .. }), "got {:?}", err);
    }

    #[test_log::test]
    fn test_unexpected_row_end_rejected() {
        assert_eq!(
            structure_error("<row></row></row>"),
            StructureError::UnexpectedRowEnd
        );
        assert_eq!(structure_error("</row>"), StructureError::UnexpectedRowEnd);
        assert_eq!(
            structure_error("<row><key></row>"),
            StructureError::UnexpectedRowEnd
        );
    }

    #[test_log::test]
    fn test_unexpected_key_end_rejected() {
        assert_eq!(
            structure_error(r#"<row><key><default display="a"/></key></key></row>"#),
            StructureError::UnexpectedKeyEnd
        );
        assert_eq!(structure_error("<row></key></row>"), StructureError::UnexpectedKeyEnd);
    }

    // --- Attributes and variants ---

    #[test_log::test]
    fn test_key_attributes() {
        let keyboard = parse_ok(
            r#"<row><key OBEY-CAPS="True" extended="TRUE" fill="yes" width="1500">
                 <normal display="a"/>
               </key></row>"#,
        );
        let key = &keyboard.keys()[0];
        assert!(key.obey_caps);
        assert!(key.extended);
        assert!(!key.fill, "only 'true' enables a flag");
        assert_eq!(key.width, 1500);
        assert_eq!(key.width_units(), 1500);
    }

    #[test_log::test]
    fn test_unparseable_width_is_automatic() {
        let keyboard = parse_ok(r#"<row><key width="wide"><default display="a"/></key></row>"#);
        assert_eq!(keyboard.keys()[0].width, 0);
    }

    #[test_log::test]
    fn test_missing_action_defaults_to_display() {
        let keyboard = parse_ok(
            r#"<row>
                 <key><default display="z"/></key>
                 <key><default display="z" action="z"/></key>
                 <key><default display="Tab"/></key>
               </row>"#,
        );
        let keys = keyboard.keys();
        assert_eq!(
            keys[0].keysym(LayoutVariant::Default),
            keys[1].keysym(LayoutVariant::Default)
        );
        assert_eq!(keys[2].keysym(LayoutVariant::Default), Keysym(keysym::XK_Tab));
    }

    #[test_log::test]
    fn test_action_resolution() {
        let keyboard = parse_ok(
            r#"<row><key>
                 <default display="Esc" action="escape"/>
                 <shifted display="ł"/>
                 <mod1 display="?" action="nosuchkey"/>
                 <mod2 display="F5" action="F5"/>
               </key></row>"#,
        );
        let key = &keyboard.keys()[0];
        assert_eq!(key.keysym(LayoutVariant::Default), Keysym(keysym::XK_Escape));
        assert_eq!(key.keysym(LayoutVariant::Shifted), Keysym(0x01b3));
        assert_eq!(key.keysym(LayoutVariant::Mod1), Keysym::NONE);
        assert_eq!(key.keysym(LayoutVariant::Mod2), Keysym(keysym::XK_F5));
        assert_eq!(
            key.face(LayoutVariant::Default),
            Some(&KeyFace::Label("Esc".to_owned()))
        );
    }

    #[test_log::test]
    fn test_modifier_action() {
        let keyboard = parse_ok(
            r#"<row><key><default display="Shift" action="modifier:shift"/></key>
                    <key><default display="Caps" action="MODIFIER:caps"/></key></row>"#,
        );
        let shift = &keyboard.keys()[0];
        assert_eq!(shift.modifier, Modifiers::SHIFT);
        assert!(shift.is_modifier());
        assert_eq!(shift.keysym(LayoutVariant::Default), Keysym::NONE);
        // The prefix is matched exactly; anything else is a keysym name.
        assert!(!keyboard.keys()[1].is_modifier());
    }

    // --- Natural size tracking ---

    #[test_log::test]
    fn test_single_glyph_labels_set_minimum_size() {
        let keyboard = parse_ok(
            r#"<row>
                 <key><default display="a"/></key>
                 <key><default display="Enter"/></key>
                 <key width="2000"><default display="b"/></key>
               </row>"#,
        );
        assert_eq!(keyboard.min_button_width(), 10);
        assert_eq!(keyboard.min_button_height(), 16);
    }

    #[test_log::test]
    fn test_image_face_sets_minimum_width() {
        let dir = TempDir::new().expect("tempdir");
        write_png(&dir.path().join("icon.png"), 42, 12);
        let layout = dir.path().join("keyboard.xml");
        fs::write(
            &layout,
            r#"<row><key><default display="a"/></key>
                    <key><default display="image:icon.png" action="Return"/></key></row>"#,
        )
        .expect("write layout");

        let keyboard = LayoutParser::parse_file(&GLYPH, &layout).expect("parse");
        assert_eq!(keyboard.min_button_width(), 42);
        assert_eq!(keyboard.min_button_height(), 16);

        let key = &keyboard.keys()[1];
        match key.face(LayoutVariant::Default) {
            Some(KeyFace::Image(bitmap)) => {
                assert_eq!((bitmap.width, bitmap.height), (42, 12));
                assert_eq!(bitmap.pixels.len(), 42 * 12 * 4);
            }
            other => panic!("expected image face, got {:?}", other),
        }
        assert_eq!(key.keysym(LayoutVariant::Default), Keysym(keysym::XK_Return));
    }

    #[test_log::test]
    fn test_image_is_shared_between_variants() {
        let dir = TempDir::new().expect("tempdir");
        let icon = dir.path().join("icon.png");
        write_png(&icon, 8, 8);
        let layout = format!(
            r#"<row><key width="1000"><default display="image:{0}"/><shifted display="image:{0}"/></key></row>"#,
            icon.display()
        );
        let keyboard = parse_ok(&layout);
        let key = &keyboard.keys()[0];
        match (key.face(LayoutVariant::Default), key.face(LayoutVariant::Shifted)) {
            (Some(KeyFace::Image(a)), Some(KeyFace::Image(b))) => {
                assert!(std::rc::Rc::ptr_eq(a, b))
            }
            other => panic!("expected two image faces, got {:?}", other),
        }
        // Explicit width: the image does not raise the minimum.
        assert_eq!(keyboard.min_button_width(), 0);
    }

    #[test_log::test]
    fn test_missing_image_leaves_face_empty() {
        let keyboard =
            parse_ok(r#"<row><key><default display="image:/nonexistent/x.png" action="a"/></key></row>"#);
        let key = &keyboard.keys()[0];
        assert!(key.face(LayoutVariant::Default).is_none());
        assert_eq!(key.keysym(LayoutVariant::Default), Keysym::from_char('a'));
        assert_eq!(keyboard.min_button_width(), 0);
    }

    #[test_log::test]
    fn test_unreadable_layout_file() {
        let dir = TempDir::new().expect("tempdir");
        let missing = dir.path().join("none.xml");
        match LayoutParser::parse_file(&GLYPH, &missing) {
            Err(LayoutError::Io { path, .. }) => assert_eq!(path, missing),
            other => panic!("expected Io error, got {:?}", other.map(|k| k.key_count())),
        }
    }
}
