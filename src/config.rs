// src/config.rs

//! Runtime configuration.
//!
//! A `Config` starts from built-in defaults, is updated from the `key = value`
//! config file, then from command-line flags. It is built once in `main` and
//! passed down by reference.

use std::env;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};

use crate::cli::Cli;
use crate::keyboard::SizingRules;

/// System-wide config file, preferred when readable.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/kterm/kterm.conf";
/// Config file looked up next to the executable otherwise.
pub const CONFIG_FILE_NAME: &str = "kterm.conf";
/// Layout looked up relative to the executable by default.
pub const DEFAULT_LAYOUT: &str = "layouts/keyboard.xml";
/// Environment variable naming a layout file; wins over every other source.
pub const LAYOUT_ENV_VAR: &str = "MB_KBD_CONFIG";

/// The complete configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Show the on-screen keyboard.
    pub keyboard_enabled: bool,
    pub color_scheme: ColorScheme,
    pub font: FontConfig,
    /// Keyboard layout file.
    pub layout_path: PathBuf,
    /// Character encoding of the terminal; only UTF-8 is supported.
    pub encoding: String,
    /// Forced screen orientation, if any.
    pub orientation: Option<ScreenOrientation>,
    pub cursor_shape: CursorShape,
    pub shell: ShellConfig,
    pub keyboard: KeyboardConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            keyboard_enabled: true,
            color_scheme: ColorScheme::Light,
            font: FontConfig::default(),
            layout_path: exe_dir().join(DEFAULT_LAYOUT),
            encoding: "UTF-8".to_string(),
            orientation: None,
            cursor_shape: CursorShape::Block,
            shell: ShellConfig::default(),
            keyboard: KeyboardConfig::default(),
        }
    }
}

/// Button colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorScheme {
    #[default]
    Light,
    Dark,
}

impl ColorScheme {
    pub fn from_index(index: u32) -> Option<ColorScheme> {
        match index {
            0 => Some(ColorScheme::Light),
            1 => Some(ColorScheme::Dark),
            _ => None,
        }
    }
}

/// Label font, as an Xft family and point size.
#[derive(Debug, Clone, PartialEq)]
pub struct FontConfig {
    pub family: String,
    pub size: u32,
}

impl Default for FontConfig {
    fn default() -> Self {
        FontConfig {
            family: "monospace".to_string(),
            size: 8,
        }
    }
}

impl FontConfig {
    /// Fontconfig pattern for this font, e.g. `monospace:size=8`.
    pub fn pattern(&self) -> String {
        format!("{}:size={}", self.family, self.size)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenOrientation {
    Upright,
    Right,
    Left,
}

impl ScreenOrientation {
    pub fn from_char(c: char) -> Option<ScreenOrientation> {
        match c.to_ascii_uppercase() {
            'U' => Some(ScreenOrientation::Upright),
            'R' => Some(ScreenOrientation::Right),
            'L' => Some(ScreenOrientation::Left),
            _ => None,
        }
    }

    pub fn is_landscape(self) -> bool {
        self != ScreenOrientation::Upright
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorShape {
    #[default]
    Block,
    IBeam,
    Underline,
}

impl CursorShape {
    pub fn from_char(c: char) -> Option<CursorShape> {
        match c.to_ascii_uppercase() {
            'B' => Some(CursorShape::Block),
            'I' => Some(CursorShape::IBeam),
            'U' => Some(CursorShape::Underline),
            _ => None,
        }
    }

    /// DECSCUSR parameter for a steady cursor of this shape.
    pub fn decscusr(self) -> u8 {
        match self {
            CursorShape::Block => 2,
            CursorShape::Underline => 4,
            CursorShape::IBeam => 6,
        }
    }
}

/// Child process settings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShellConfig {
    /// Program and arguments; `None` runs the user's shell.
    pub command: Option<Vec<String>>,
    /// Extra environment for the child.
    pub env: Vec<(String, String)>,
}

impl ShellConfig {
    /// Program and arguments to spawn.
    pub fn argv(&self) -> Vec<String> {
        match &self.command {
            Some(argv) if !argv.is_empty() => argv.clone(),
            _ => vec![env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())],
        }
    }
}

/// On-screen keyboard tuning.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardConfig {
    /// Delay between lifting a finger and releasing the key.
    pub release_delay_ms: u64,
    /// Preferred button height in inches.
    pub preferred_key_height_in: f64,
    /// The keyboard takes at most this fraction (1/n) of the screen height.
    pub max_height_divisor: u32,
    /// Minimum button width in pixels, on top of the natural label size.
    pub min_button_width: u32,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        KeyboardConfig {
            release_delay_ms: 100,
            preferred_key_height_in: 0.3,
            max_height_divisor: 3,
            min_button_width: 0,
        }
    }
}

impl KeyboardConfig {
    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn sizing(&self) -> SizingRules {
        SizingRules {
            preferred_height_in: self.preferred_key_height_in,
            max_height_divisor: self.max_height_divisor,
            min_button_width: self.min_button_width,
        }
    }
}

impl Config {
    /// Defaults updated from the first readable config file.
    pub fn load() -> Config {
        let mut config = Config::default();
        let path = config_file_path();
        debug!("config: {}", path.display());
        match fs::read_to_string(&path) {
            Ok(contents) => config.apply_file(&contents),
            Err(e) => debug!("No config file {}: {}", path.display(), e),
        }
        config
    }

    /// Applies `key = value` lines. Unknown keys and bad values are skipped.
    pub fn apply_file(&mut self, contents: &str) {
        for (number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                warn!("config line {}: expected key = value", number + 1);
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            if !self.apply_setting(key, value) {
                warn!(
                    "config line {}: ignoring {} = {}",
                    number + 1,
                    key,
                    value
                );
            } else {
                debug!("{} = {}", key, value);
            }
        }
    }

    fn apply_setting(&mut self, key: &str, value: &str) -> bool {
        match key {
            "keyboard" => match value.parse::<u32>() {
                Ok(v @ (0 | 1)) => self.keyboard_enabled = v == 1,
                _ => return false,
            },
            "color_scheme" => {
                match value.parse().ok().and_then(ColorScheme::from_index) {
                    Some(scheme) => self.color_scheme = scheme,
                    None => return false,
                }
            }
            "font_family" => match quoted(value) {
                Some(family) if !family.is_empty() => self.font.family = family.to_string(),
                _ => return false,
            },
            "font_size" => match value.parse::<u32>() {
                Ok(size) if size > 0 => self.font.size = size,
                _ => return false,
            },
            "kb_conf_path" => match quoted(value) {
                Some(path) if !path.is_empty() => self.layout_path = PathBuf::from(path),
                _ => return false,
            },
            "encoding" => match quoted(value) {
                Some(encoding) if !encoding.is_empty() => self.encoding = encoding.to_string(),
                _ => return false,
            },
            "orientation" => match single_char(value).and_then(ScreenOrientation::from_char) {
                Some(orientation) => self.orientation = Some(orientation),
                None => return false,
            },
            "cursor_shape" => match single_char(value).and_then(CursorShape::from_char) {
                Some(shape) => self.cursor_shape = shape,
                None => return false,
            },
            _ => return false,
        }
        true
    }

    /// Command-line flags override file settings.
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(index) = cli.color_scheme {
            match ColorScheme::from_index(index) {
                Some(scheme) => self.color_scheme = scheme,
                None => warn!("Ignoring color scheme {}", index),
            }
        }
        if let Some(on) = cli.keyboard {
            match on {
                0 | 1 => self.keyboard_enabled = on == 1,
                _ => warn!("Ignoring keyboard setting {}", on),
            }
        }
        if let Some(family) = cli.font_family.as_deref().filter(|f| !f.is_empty()) {
            self.font.family = family.to_string();
        }
        if let Some(size) = cli.font_size {
            if size > 0 {
                self.font.size = size;
            } else {
                warn!("Ignoring font size {}", size);
            }
        }
        if let Some(path) = &cli.layout {
            self.layout_path = path.clone();
        }
        if let Some(c) = cli.orientation {
            match ScreenOrientation::from_char(c) {
                Some(orientation) => self.orientation = Some(orientation),
                None => warn!("Ignoring orientation '{}'", c),
            }
        }
        if let Some(argv) = cli.exec_argv() {
            self.shell.command = Some(argv);
        }
        self.shell.env.extend(cli.env_pairs());
    }

    /// Picks the layout file: `MB_KBD_CONFIG` if it names a readable file,
    /// else the configured path if readable.
    pub fn resolve_layout_path(&self, env_value: Option<&OsStr>) -> Option<PathBuf> {
        if let Some(path) = env_value.map(PathBuf::from) {
            if is_readable(&path) {
                debug!("Layout path from {}: {}", LAYOUT_ENV_VAR, path.display());
                return Some(path);
            }
        }
        if is_readable(&self.layout_path) {
            debug!("Layout path from config: {}", self.layout_path.display());
            return Some(self.layout_path.clone());
        }
        info!("No layout config");
        None
    }
}

/// `/etc/kterm/kterm.conf` if readable, else `kterm.conf` next to the binary.
pub fn config_file_path() -> PathBuf {
    let system = PathBuf::from(SYSTEM_CONFIG_PATH);
    if is_readable(&system) {
        system
    } else {
        exe_dir().join(CONFIG_FILE_NAME)
    }
}

/// Directory holding the running executable.
pub fn exe_dir() -> PathBuf {
    env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn is_readable(path: &Path) -> bool {
    File::open(path).is_ok_and(|f| f.metadata().is_ok_and(|m| m.is_file()))
}

/// Contents of a double-quoted value.
fn quoted(value: &str) -> Option<&str> {
    value.strip_prefix('"')?.strip_suffix('"')
}

fn single_char(value: &str) -> Option<char> {
    let value = quoted(value).unwrap_or(value);
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}
