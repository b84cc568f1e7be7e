// src/term/console.rs

//! The host console kterm runs in.
//!
//! The child's output is relayed here verbatim and keystrokes typed on the
//! host are forwarded to the child, so the console is switched to raw mode
//! for the lifetime of a [`HostConsole`].

use anyhow::{Context, Result};
use libc::{winsize, STDIN_FILENO, STDOUT_FILENO, TIOCGWINSZ};
use log::{debug, info, warn};
use std::io::{self, stdout, Write};
use std::mem;
use std::os::unix::io::RawFd;
use termios::{tcsetattr, Termios, ECHO, ICANON, ISIG, TCSANOW, VMIN, VTIME};

use crate::config::CursorShape;

/// Size used when the console does not report one.
pub const FALLBACK_SIZE: (u16, u16) = (80, 24);

pub struct HostConsole {
    original_termios: Option<Termios>,
    last_known_size: (u16, u16),
}

impl HostConsole {
    /// Puts stdin into raw mode. A console that is not a terminal is used
    /// as-is with a warning.
    pub fn new() -> Result<Self> {
        let original_termios = match Termios::from_fd(STDIN_FILENO) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!("Host console has no termios ({}); not entering raw mode.", e);
                None
            }
        };

        if let Some(ref ots) = original_termios {
            let mut raw_termios = *ots;
            raw_termios.c_lflag &= !(ECHO | ICANON | ISIG | libc::IEXTEN);
            raw_termios.c_iflag &=
                !(libc::IXON | libc::IXOFF | libc::ICRNL | libc::INLCR | libc::IGNCR);
            raw_termios.c_oflag &= !libc::OPOST;
            raw_termios.c_cc[VMIN] = 0;
            raw_termios.c_cc[VTIME] = 0;
            tcsetattr(STDIN_FILENO, TCSANOW, &raw_termios)
                .context("Failed to put host console into raw mode")?;
            debug!("Host console in raw mode.");
        }

        let last_known_size = terminal_size_cells(STDOUT_FILENO).unwrap_or_else(|e| {
            debug!("Host console size unavailable ({}); using {:?}", e, FALLBACK_SIZE);
            FALLBACK_SIZE
        });
        info!(
            "Host console size: {}x{} cells.",
            last_known_size.0, last_known_size.1
        );

        Ok(HostConsole {
            original_termios,
            last_known_size,
        })
    }

    /// Descriptor to poll for host keystrokes.
    pub fn input_fd(&self) -> RawFd {
        STDIN_FILENO
    }

    pub fn size(&self) -> (u16, u16) {
        self.last_known_size
    }

    /// Re-reads the console size; returns it if it changed.
    pub fn poll_resize(&mut self) -> Option<(u16, u16)> {
        match terminal_size_cells(STDOUT_FILENO) {
            Ok(size) if size != self.last_known_size => {
                info!(
                    "Host console resized from {}x{} to {}x{} cells.",
                    self.last_known_size.0, self.last_known_size.1, size.0, size.1
                );
                self.last_known_size = size;
                Some(size)
            }
            Ok(_) => None,
            Err(e) => {
                warn!("Failed to get host console size: {}", e);
                None
            }
        }
    }

    /// Writes child output to the console.
    pub fn write_output(&mut self, bytes: &[u8]) -> io::Result<()> {
        let mut out = stdout().lock();
        out.write_all(bytes)?;
        out.flush()
    }

    /// Reads whatever the host keyboard typed. `Ok(0)` means no input or EOF.
    pub fn read_input(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match nix::unistd::read(io::stdin(), buf) {
            Ok(n) => Ok(n),
            Err(nix::Error::EAGAIN) | Err(nix::Error::EINTR) => Ok(0),
            Err(e) => Err(io::Error::other(e)),
        }
    }

    pub fn set_cursor_shape(&mut self, shape: CursorShape) -> io::Result<()> {
        self.write_output(cursor_shape_sequence(shape).as_bytes())
    }

    /// Restores the console attributes saved on creation.
    pub fn restore(&mut self) -> Result<()> {
        // Back to the console's default cursor.
        let _ = self.write_output(b"\x1b[0 q");
        if let Some(original) = self.original_termios.take() {
            tcsetattr(STDIN_FILENO, TCSANOW, &original)
                .context("Failed to restore host console attributes")?;
            debug!("Host console attributes restored.");
        }
        Ok(())
    }
}

impl Drop for HostConsole {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            warn!("{:#}", e);
        }
    }
}

/// DECSCUSR sequence selecting `shape`.
pub fn cursor_shape_sequence(shape: CursorShape) -> String {
    format!("\x1b[{} q", shape.decscusr())
}

fn terminal_size_cells(fd: RawFd) -> io::Result<(u16, u16)> {
    // SAFETY: winsize is plain data and TIOCGWINSZ fills it in.
    let mut ws: winsize = unsafe { mem::zeroed() };
    if unsafe { libc::ioctl(fd, TIOCGWINSZ, &mut ws) } == -1 {
        return Err(io::Error::last_os_error());
    }
    if ws.ws_col == 0 || ws.ws_row == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "zero console size"));
    }
    Ok((ws.ws_col, ws.ws_row))
}
