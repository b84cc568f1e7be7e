// src/main.rs

// Declare modules
pub mod app;
pub mod cli;
pub mod config;
pub mod keyboard;
pub mod keys;
pub mod os;
pub mod platform;
pub mod term;
pub mod timer;

use crate::{
    app::{App, OnScreenKeyboard},
    cli::Cli,
    config::Config,
};

use clap::Parser;
use log::{info, warn};

/// Main entry point for `kterm`.
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp_micros()
        .init();

    info!("Starting kterm {}...", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load();
    config.apply_cli(&cli);
    info!("Configuration loaded.");

    let keyboard = match OnScreenKeyboard::open(&config) {
        Ok(keyboard) => keyboard,
        Err(e) => {
            warn!("On-screen keyboard unavailable: {:#}", e);
            None
        }
    };

    let mut app = App::new(&config, keyboard)?;
    info!("Starting main event loop...");
    app.run()?;
    info!("kterm exited successfully.");
    Ok(())
}
