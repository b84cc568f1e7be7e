// src/cli.rs

//! Command-line flags.

use clap::{ArgAction, Parser};
use std::path::PathBuf;

/// Terminal with an on-screen keyboard for touch devices.
#[derive(Debug, Clone, Default, Parser)]
#[command(name = "kterm", version, disable_version_flag = true)]
pub struct Cli {
    /// Color scheme (0 light, 1 dark)
    #[arg(short = 'c', value_name = "0|1")]
    pub color_scheme: Option<u32>,

    /// Debug logging
    #[arg(short = 'd')]
    pub debug: bool,

    /// Command to run instead of the login shell
    #[arg(short = 'e', value_name = "COMMAND")]
    pub exec: Option<String>,

    /// Extra environment variable for the command (repeatable)
    #[arg(short = 'E', value_name = "VAR=VALUE")]
    pub env: Vec<String>,

    /// Font family
    #[arg(short = 'f', value_name = "FAMILY")]
    pub font_family: Option<String>,

    /// On-screen keyboard (0 off, 1 on)
    #[arg(short = 'k', value_name = "0|1")]
    pub keyboard: Option<u32>,

    /// Keyboard layout file
    #[arg(short = 'l', value_name = "PATH")]
    pub layout: Option<PathBuf>,

    /// Screen orientation (U upright, R right, L left)
    #[arg(short = 'o', value_name = "U|R|L")]
    pub orientation: Option<char>,

    /// Font size
    #[arg(short = 's', value_name = "SIZE")]
    pub font_size: Option<u32>,

    /// Print version
    #[arg(short = 'v', action = ArgAction::Version)]
    pub version: Option<bool>,
}

impl Cli {
    /// The `-e` command split into program and arguments.
    pub fn exec_argv(&self) -> Option<Vec<String>> {
        let argv: Vec<String> = self
            .exec
            .as_deref()?
            .split_whitespace()
            .map(str::to_owned)
            .collect();
        (!argv.is_empty()).then_some(argv)
    }

    /// `-E` entries as name/value pairs; entries without `=` are skipped.
    pub fn env_pairs(&self) -> Vec<(String, String)> {
        self.env
            .iter()
            .filter_map(|entry| {
                let (name, value) = entry.split_once('=')?;
                (!name.is_empty()).then(|| (name.to_owned(), value.to_owned()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_short_flags() {
        let cli = Cli::try_parse_from([
            "kterm", "-d", "-c", "1", "-k", "0", "-l", "/tmp/kb.xml", "-o", "R", "-s", "12",
            "-f", "DejaVu Sans Mono", "-e", "top -d 5", "-E", "A=1", "-E", "B=x=y",
        ])
        .expect("valid flags");

        assert!(cli.debug);
        assert_eq!(cli.color_scheme, Some(1));
        assert_eq!(cli.keyboard, Some(0));
        assert_eq!(cli.layout, Some(PathBuf::from("/tmp/kb.xml")));
        assert_eq!(cli.orientation, Some('R'));
        assert_eq!(cli.font_size, Some(12));
        assert_eq!(cli.font_family.as_deref(), Some("DejaVu Sans Mono"));
        assert_eq!(
            cli.exec_argv(),
            Some(vec!["top".to_owned(), "-d".to_owned(), "5".to_owned()])
        );
        assert_eq!(
            cli.env_pairs(),
            vec![
                ("A".to_owned(), "1".to_owned()),
                ("B".to_owned(), "x=y".to_owned())
            ]
        );
    }

    #[test]
    fn version_flag_is_lowercase_v() {
        let err = Cli::try_parse_from(["kterm", "-v"]).expect_err("prints version");
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }

    #[test]
    fn blank_exec_is_ignored() {
        let cli = Cli::try_parse_from(["kterm", "-e", "  "]).expect("valid flags");
        assert_eq!(cli.exec_argv(), None);
        let cli = Cli::try_parse_from(["kterm", "-E", "novalue"]).expect("valid flags");
        assert!(cli.env_pairs().is_empty());
    }
}
