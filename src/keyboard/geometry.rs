// src/keyboard/geometry.rs

//! Button sizing against the current screen.
//!
//! Buttons prefer to share the screen width evenly by width units but never
//! shrink below the largest natural label or image size. Button height aims
//! for a fixed physical size, bounded by the content below and a share of the
//! screen height above.

use super::model::{Keyboard, Orientation, KEY_UNIT};
use super::view::{ButtonWidth, KeyboardView};
use log::debug;

/// Resolution assumed when the screen does not report one.
pub const DEFAULT_DPI: f64 = 96.0;

/// Screen state the layout is computed against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMetrics {
    pub width: u32,
    pub height: u32,
    /// Dots per inch, if known.
    pub dpi: Option<f64>,
}

impl ScreenMetrics {
    pub fn effective_dpi(&self) -> f64 {
        match self.dpi {
            Some(dpi) if dpi > 0.0 => dpi,
            _ => DEFAULT_DPI,
        }
    }
}

/// Tunable sizing constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SizingRules {
    /// Preferred button height in inches.
    pub preferred_height_in: f64,
    /// The keyboard takes at most `1 / max_height_divisor` of the screen height.
    pub max_height_divisor: u32,
    /// Floor for the button width on top of the natural content size.
    pub min_button_width: u32,
}

impl Default for SizingRules {
    fn default() -> Self {
        Self {
            preferred_height_in: 0.3,
            max_height_divisor: 3,
            min_button_width: 0,
        }
    }
}

/// Result of one geometry pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub orientation: Orientation,
    /// Widest row, in whole key units.
    pub max_row_units: u32,
    pub unit_width: u32,
    pub unit_height: u32,
    pub keyboard_width: u32,
    pub keyboard_height: u32,
}

/// Sum of width units per row, each rounded up to whole keys. Extended keys
/// do not count in portrait.
pub fn row_units(keyboard: &Keyboard, orientation: Orientation) -> Vec<u32> {
    keyboard
        .rows()
        .map(|row| {
            let units: u32 = row
                .iter()
                .filter(|key| !(key.extended && orientation == Orientation::Portrait))
                .map(|key| key.width_units())
                .sum();
            units.div_ceil(KEY_UNIT)
        })
        .collect()
}

/// Picks the button height from its bounds: the ceiling wins if either the
/// content or the preferred height would exceed it, then the preferred height
/// if the content fits in it, else the content height.
pub fn choose_unit_height(min: u32, preferred: u32, max: u32) -> u32 {
    if min > max || preferred > max {
        max
    } else if preferred >= min {
        preferred
    } else {
        min
    }
}

impl Keyboard {
    /// Recomputes sizes for `screen` and pushes them to `view`.
    pub fn apply_geometry(
        &mut self,
        screen: ScreenMetrics,
        rules: &SizingRules,
        view: &mut dyn KeyboardView,
    ) -> Geometry {
        let orientation = Orientation::from_size(screen.width, screen.height);
        let portrait = orientation == Orientation::Portrait;
        let insets = view.button_insets();

        let max_row_units = row_units(self, orientation).into_iter().max().unwrap_or(0);
        let unit_wmax = screen.width.checked_div(max_row_units).unwrap_or(0);
        let unit_wmin = self.min_button_width().max(rules.min_button_width) + insets.horizontal();
        let unit_width = unit_wmax.max(unit_wmin);

        for index in 0..self.key_count() {
            let Some(key) = self.keys().get(index) else {
                break;
            };
            let id = key.id();
            let (extended, fill, declared) = (key.extended, key.fill, key.width);
            let visible = key.visible;

            if extended {
                let show = !portrait;
                if show != visible {
                    view.set_visible(id, show);
                    if let Some(key) = self.key_mut(id) {
                        key.visible = show;
                    }
                }
                if !show {
                    continue;
                }
            }

            let width = if fill {
                ButtonWidth::Fill
            } else if declared != 0 {
                ButtonWidth::Fixed(scale_width(unit_width, declared))
            } else {
                ButtonWidth::Fixed(unit_width)
            };
            view.set_width(id, width);
        }

        let rows = self.row_count() as u32;
        let unit_hmin = self.min_button_height() + insets.vertical();
        let unit_hpref = (rules.preferred_height_in * screen.effective_dpi()) as u32;
        let unit_hmax = match rows {
            0 => 0,
            rows => screen.height / rules.max_height_divisor.max(1) / rows,
        };
        let unit_height = choose_unit_height(unit_hmin, unit_hpref, unit_hmax);

        let geometry = Geometry {
            orientation,
            max_row_units,
            unit_width,
            unit_height,
            keyboard_width: screen.width,
            keyboard_height: unit_height * rows,
        };
        debug!(
            "screen size: {}x{} ({} dpi), {:?}",
            screen.width,
            screen.height,
            screen.effective_dpi() as u32,
            orientation
        );
        debug!(
            "wmin: {}, wmax: {} => {}; hmin: {}, hmax: {}, pref: {} => {}",
            unit_wmin, unit_wmax, unit_width, unit_hmin, unit_hmax, unit_hpref, unit_height
        );
        debug!(
            "keyboard size: {}x{}",
            geometry.keyboard_width, geometry.keyboard_height
        );

        self.orientation = orientation;
        self.unit_width = unit_width;
        self.unit_height = unit_height;
        self.row_width = unit_width.saturating_mul(max_row_units);
        view.set_keyboard_size(geometry.keyboard_width, geometry.keyboard_height);
        geometry
    }
}

/// Pixel width of a key declaring `units` width units.
fn scale_width(unit_width: u32, units: u32) -> u32 {
    let scaled = u64::from(unit_width) * u64::from(units) / u64::from(KEY_UNIT);
    u32::try_from(scaled).unwrap_or(u32::MAX)
}
