// src/app.rs

//! The event loop.
//!
//! One thread waits on the child's PTY, the host console, the X connection
//! and a signalfd. Child output goes to the host console; key presses from
//! the on-screen keyboard and the physical keyboard go to the child. Deferred
//! key releases run from a timer queue whose next deadline bounds the wait.

use anyhow::{Context, Result};
use log::{debug, error, info, trace, warn};
use nix::sys::signal::{SigSet, Signal};
use nix::sys::signalfd::{SfdFlags, SignalFd};
use std::env;
use std::io::{ErrorKind, Read};
use std::os::unix::io::{AsFd, AsRawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::config::{Config, ScreenOrientation, LAYOUT_ENV_VAR};
use crate::keyboard::{
    KeyId, Keyboard, LayoutParser, PressOutcome, ReleaseOutcome, ReleaseQueue, ScreenMetrics,
    SizingRules, TerminalSink,
};
use crate::os::epoll::{EpollFlags, EventMonitor};
use crate::os::pty::{NixPty, PtyConfig};
use crate::platform::x11::{Connection, LabelFont, PlatformEvent, X11Keyboard};
use crate::term::{translate_key_input, HostConsole, ModeTracker};

const TOKEN_PTY: u64 = 0;
const TOKEN_CONSOLE: u64 = 1;
const TOKEN_X11: u64 = 2;
const TOKEN_SIGNAL: u64 = 3;

const READ_BUFFER_SIZE: usize = 4096;

/// The on-screen keyboard and what drives it.
pub struct OnScreenKeyboard {
    keyboard: Keyboard,
    x11: X11Keyboard,
    releases: ReleaseQueue,
    release_delay: Duration,
    sizing: SizingRules,
    orientation: Option<ScreenOrientation>,
}

impl OnScreenKeyboard {
    /// Loads the layout and creates the keyboard window. Returns `Ok(None)`
    /// when there is no usable layout; the terminal then runs without one.
    pub fn open(config: &Config) -> Result<Option<Self>> {
        let Some(path) = config.resolve_layout_path(env::var_os(LAYOUT_ENV_VAR).as_deref())
        else {
            info!("No readable keyboard layout; running without the on-screen keyboard.");
            return Ok(None);
        };

        let connection = Rc::new(Connection::new()?);
        let font = Rc::new(LabelFont::open(Rc::clone(&connection), &config.font.pattern())?);
        let mut keyboard = match LayoutParser::parse_file(font.as_ref(), &path) {
            Ok(keyboard) => keyboard,
            Err(e) => {
                error!("Keyboard layout {}: {}", path.display(), e);
                return Ok(None);
            }
        };
        let mut x11 = X11Keyboard::new(connection, font, &keyboard, config.color_scheme)?;
        keyboard.refresh_faces(x11.window());

        let mut osk = OnScreenKeyboard {
            keyboard,
            x11,
            releases: ReleaseQueue::new(),
            release_delay: config.keyboard.release_delay(),
            sizing: config.keyboard.sizing(),
            orientation: config.orientation,
        };
        osk.update_geometry(osk.x11.screen_metrics());
        if config.keyboard_enabled {
            osk.x11.show();
        }
        osk.x11.flush();
        Ok(Some(osk))
    }

    fn update_geometry(&mut self, screen: ScreenMetrics) {
        let screen = oriented_screen(screen, self.orientation);
        let geometry = self
            .keyboard
            .apply_geometry(screen, &self.sizing, self.x11.window());
        debug!("Keyboard geometry {:?}", geometry);
    }

    fn toggle(&mut self) {
        if self.x11.is_shown() {
            self.x11.hide();
        } else {
            self.update_geometry(self.x11.screen_metrics());
            self.x11.show();
        }
    }

    /// A key pressed again before its debounced release gets that release
    /// first.
    fn press(&mut self, id: KeyId, terminal: &mut dyn TerminalSink) {
        if self.releases.take(id) {
            self.release(id, terminal);
        }
        let outcome = self.keyboard.press(id, &mut self.x11.context(terminal));
        match outcome {
            PressOutcome::Dropped(keysym) => debug!("Key {} dropped keysym {:?}", id.index(), keysym),
            outcome => trace!("Key {} press: {:?}", id.index(), outcome),
        }
    }

    fn lift(&mut self, id: KeyId, now: Instant) {
        if self.keyboard.wants_release(id) {
            self.releases.schedule(now, self.release_delay, id);
        }
    }

    fn fire_releases(&mut self, now: Instant, terminal: &mut dyn TerminalSink) {
        for id in self.releases.pop_expired(now) {
            self.release(id, terminal);
        }
    }

    fn release(&mut self, id: KeyId, terminal: &mut dyn TerminalSink) {
        let outcome = self.keyboard.release(id, &mut self.x11.context(terminal));
        if let ReleaseOutcome::Unmapped(keysym) = outcome {
            trace!("Release of {:?} had no keycode", keysym);
        }
    }

    /// Cancels pending releases, then releases the grab and the window.
    fn shutdown(&mut self) {
        let cancelled = self.releases.cancel_all();
        if cancelled > 0 {
            debug!("Cancelled {} pending key releases", cancelled);
        }
        self.x11.shutdown();
    }
}

/// Screen metrics as seen in the forced orientation, if any.
pub fn oriented_screen(screen: ScreenMetrics, orientation: Option<ScreenOrientation>) -> ScreenMetrics {
    match orientation {
        Some(forced) if forced.is_landscape() != (screen.width >= screen.height) => ScreenMetrics {
            width: screen.height,
            height: screen.width,
            dpi: screen.dpi,
        },
        _ => screen,
    }
}

pub struct App {
    monitor: EventMonitor,
    signals: SignalFd,
    pty: NixPty,
    console: HostConsole,
    modes: ModeTracker,
    keyboard: Option<OnScreenKeyboard>,
    console_open: bool,
    running: bool,
}

impl App {
    pub fn new(config: &Config, keyboard: Option<OnScreenKeyboard>) -> Result<Self> {
        if !config.encoding.eq_ignore_ascii_case("UTF-8") {
            warn!("Encoding {} is not supported; using UTF-8.", config.encoding);
        }

        let mut console = HostConsole::new()?;
        if let Err(e) = console.set_cursor_shape(config.cursor_shape) {
            warn!("Failed to set cursor shape: {}", e);
        }
        let (cols, rows) = console.size();

        // Spawned before signals are blocked; the child inherits the mask.
        let argv = config.shell.argv();
        info!("Starting {:?}", argv);
        let pty = NixPty::spawn_with_config(&PtyConfig {
            argv: &argv,
            env: &config.shell.env,
            initial_cols: cols,
            initial_rows: rows,
        })
        .context("Failed to start the child process")?;

        let mut mask = SigSet::empty();
        mask.add(Signal::SIGINT);
        mask.add(Signal::SIGTERM);
        mask.add(Signal::SIGWINCH);
        mask.thread_block().context("Failed to block signals")?;
        let signals = SignalFd::with_flags(&mask, SfdFlags::SFD_NONBLOCK | SfdFlags::SFD_CLOEXEC)
            .context("Failed to create signalfd")?;

        let monitor = EventMonitor::new()?;
        monitor.add(pty.as_raw_fd(), TOKEN_PTY, EpollFlags::EPOLLIN)?;
        monitor.add(console.input_fd(), TOKEN_CONSOLE, EpollFlags::EPOLLIN)?;
        monitor.add(signals.as_fd().as_raw_fd(), TOKEN_SIGNAL, EpollFlags::EPOLLIN)?;
        if let Some(fd) = keyboard.as_ref().and_then(|k| k.x11.event_fd()) {
            monitor.add(fd, TOKEN_X11, EpollFlags::EPOLLIN)?;
        }

        Ok(App {
            monitor,
            signals,
            pty,
            console,
            modes: ModeTracker::new(),
            keyboard,
            console_open: true,
            running: true,
        })
    }

    /// Runs until the child exits or a termination signal arrives.
    pub fn run(&mut self) -> Result<()> {
        while self.running {
            let now = Instant::now();
            let timeout = self
                .keyboard
                .as_ref()
                .and_then(|k| k.releases.next_timeout(now));
            let ready = self.monitor.wait(timeout)?;

            for readiness in ready {
                match readiness.token {
                    TOKEN_PTY => self.relay_child_output(),
                    TOKEN_CONSOLE => self.forward_console_input(readiness.is_hangup()),
                    TOKEN_SIGNAL => self.handle_signals(),
                    TOKEN_X11 => {}
                    token => warn!("Readiness for unknown token {}", token),
                }
            }
            self.service_keyboard();
        }
        self.shutdown();
        Ok(())
    }

    fn relay_child_output(&mut self) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        loop {
            match self.pty.read(&mut buf) {
                Ok(0) => {
                    info!("Child process exited.");
                    self.running = false;
                    return;
                }
                Ok(n) => {
                    self.modes.observe(&buf[..n]);
                    if let Err(e) = self.console.write_output(&buf[..n]) {
                        warn!("Failed to write to host console: {}", e);
                    }
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("Reading from the child failed: {}", e);
                    self.running = false;
                    return;
                }
            }
        }
    }

    fn forward_console_input(&mut self, hangup: bool) {
        let mut buf = [0u8; READ_BUFFER_SIZE];
        match self.console.read_input(&mut buf) {
            Ok(0) if hangup => self.close_console_input(),
            Ok(0) => {}
            Ok(n) => {
                if let Err(e) = self.pty.feed_raw_bytes(&buf[..n]) {
                    warn!("Failed to forward console input: {}", e);
                }
            }
            Err(e) => {
                warn!("Reading the host console failed: {}", e);
                self.close_console_input();
            }
        }
    }

    fn close_console_input(&mut self) {
        if self.console_open {
            debug!("Host console input closed.");
            if let Err(e) = self.monitor.delete(self.console.input_fd()) {
                warn!("{:#}", e);
            }
            self.console_open = false;
        }
    }

    fn handle_signals(&mut self) {
        loop {
            match self.signals.read_signal() {
                Ok(Some(info)) => match Signal::try_from(info.ssi_signo as i32) {
                    Ok(Signal::SIGWINCH) => {
                        if let Some((cols, rows)) = self.console.poll_resize() {
                            if let Err(e) = self.pty.resize(cols, rows) {
                                warn!("{:#}", e);
                            }
                        }
                    }
                    Ok(signal) => {
                        info!("Received {}; exiting.", signal);
                        self.running = false;
                    }
                    Err(e) => warn!("Unknown signal {}: {}", info.ssi_signo, e),
                },
                Ok(None) => return,
                Err(e) => {
                    warn!("Reading signalfd failed: {}", e);
                    return;
                }
            }
        }
    }

    /// Runs due releases and drains X events until the queue stays empty;
    /// dispatch puts synthetic events back on it.
    fn service_keyboard(&mut self) {
        let Some(osk) = self.keyboard.as_mut() else {
            return;
        };
        osk.fire_releases(Instant::now(), &mut self.pty);
        loop {
            let events = osk.x11.process_events();
            if events.is_empty() {
                break;
            }
            for event in events {
                match event {
                    PlatformEvent::ButtonPressed(id) => osk.press(id, &mut self.pty),
                    PlatformEvent::ButtonReleased(id) => osk.lift(id, Instant::now()),
                    PlatformEvent::Key {
                        symbol,
                        modifiers,
                        text,
                    } => {
                        let bytes = translate_key_input(symbol, modifiers, &text, self.modes.modes());
                        if !bytes.is_empty() {
                            if let Err(e) = self.pty.feed_raw_bytes(&bytes) {
                                warn!("Failed to write key to the child: {}", e);
                            }
                        }
                    }
                    PlatformEvent::ToggleKeyboard => osk.toggle(),
                    PlatformEvent::ScreenResized { width, height } => {
                        let mut screen = osk.x11.screen_metrics();
                        screen.width = width;
                        screen.height = height;
                        osk.update_geometry(screen);
                    }
                }
            }
        }
        osk.x11.flush();
    }

    fn shutdown(&mut self) {
        if let Some(osk) = self.keyboard.as_mut() {
            osk.shutdown();
        }
        if let Err(e) = self.console.restore() {
            warn!("{:#}", e);
        }
    }
}
