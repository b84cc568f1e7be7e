// src/os/pty.rs

use anyhow::{Context, Result};
use std::ffi::CString;
use std::io::{Error as IoError, ErrorKind as IoErrorKind, Read, Result as IoResult, Write};
use std::os::unix::io::{AsFd, AsRawFd, OwnedFd, RawFd};

use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::{openpty, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::termios;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, fork, setsid, ForkResult, Pid};

use crate::keyboard::TerminalSink;

/// Configuration for spawning the child on a PTY.
#[derive(Debug, Clone)]
pub struct PtyConfig<'a> {
    /// Program followed by its arguments. The program is looked up in `PATH`.
    pub argv: &'a [String],
    /// Extra environment for the child.
    pub env: &'a [(String, String)],
    pub initial_cols: u16,
    pub initial_rows: u16,
}

/// Child process attached to the master side of a pseudo-terminal.
#[derive(Debug)]
pub struct NixPty {
    master_fd: OwnedFd,
    child_pid: Pid,
}

impl NixPty {
    fn set_pty_size_internal<Fd: AsFd>(fd: Fd, cols: u16, rows: u16) -> Result<()> {
        let raw_fd = fd.as_fd().as_raw_fd();
        nix::ioctl_write_ptr_bad!(tcsetwinsize, nix::libc::TIOCSWINSZ, Winsize);
        let winsize = Winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        unsafe { tcsetwinsize(raw_fd, &winsize) }
            .map_err(|e| anyhow::anyhow!("ioctl TIOCSWINSZ failed for fd {}: {}", raw_fd, e))?;
        log::trace!("NixPty: Set PTY fd {} size to {}x{}", raw_fd, cols, rows);
        Ok(())
    }

    /// Forks and runs `config.argv` on a new PTY as session leader.
    pub fn spawn_with_config(config: &PtyConfig) -> Result<Self> {
        let program = config
            .argv
            .first()
            .context("Empty command line for PTY child")?;
        // Built before forking; the child only execs.
        let program_cst = CString::new(program.as_str())
            .with_context(|| format!("Invalid command: {}", program))?;
        let args_cst = config
            .argv
            .iter()
            .map(|arg| CString::new(arg.as_str()))
            .collect::<Result<Vec<_>, _>>()
            .context("Invalid command argument")?;

        let pty_results = openpty(None, None).context("Failed to open PTY")?;
        let master_fd = pty_results.master;
        let slave_fd = pty_results.slave;

        match unsafe { fork() }.context("Failed to fork process")? {
            ForkResult::Parent { child } => {
                drop(slave_fd);
                log::debug!(
                    "Forked child with PID {}, PTY master FD {}",
                    child,
                    master_fd.as_raw_fd()
                );
                Self::set_pty_size_internal(&master_fd, config.initial_cols, config.initial_rows)
                    .context("Failed to set initial PTY size")?;
                Self::set_fd_nonblocking(&master_fd)
                    .context("Failed to set master PTY to non-blocking")?;
                Ok(NixPty {
                    master_fd,
                    child_pid: child,
                })
            }
            ForkResult::Child => {
                drop(master_fd);
                if let Err(e) = Self::child_setup(slave_fd, config.env) {
                    eprintln!("kterm: child setup failed: {:#}", e);
                    std::process::exit(1);
                }
                let exec_err = match execvp(&program_cst, &args_cst) {
                    Err(e) => e,
                    Ok(never) => match never {},
                };
                eprintln!("kterm: failed to execute {:?}: {}", program_cst, exec_err);
                std::process::exit(127);
            }
        }
    }

    /// New session, controlling terminal and standard streams on the slave.
    fn child_setup(slave_fd: OwnedFd, env: &[(String, String)]) -> Result<()> {
        setsid().context("Failed to create new session")?;

        let slave_raw_fd = slave_fd.as_raw_fd();
        if unsafe { libc::ioctl(slave_raw_fd, libc::TIOCSCTTY as _, 0) } == -1 {
            return Err(anyhow::Error::from(nix::Error::last())
                .context("Failed to set PTY slave as controlling terminal"));
        }

        let mut attrs = termios::tcgetattr(&slave_fd).context("Failed to get terminal attributes")?;
        attrs.input_flags |= termios::InputFlags::ICRNL;
        attrs.local_flags |= termios::LocalFlags::ISIG;
        termios::tcsetattr(&slave_fd, termios::SetArg::TCSANOW, &attrs)
            .context("Failed to set terminal attributes")?;

        for target in [libc::STDIN_FILENO, libc::STDOUT_FILENO, libc::STDERR_FILENO] {
            if unsafe { libc::dup2(slave_raw_fd, target) } == -1 {
                return Err(anyhow::Error::from(nix::Error::last())
                    .context("Failed to dup PTY slave onto standard streams"));
            }
        }
        drop(slave_fd);

        for (name, value) in env {
            std::env::set_var(name, value);
        }
        Ok(())
    }

    fn set_fd_nonblocking<Fd: AsFd>(fd: Fd) -> Result<()> {
        let raw_fd = fd.as_fd().as_raw_fd();
        let flags = fcntl(fd.as_fd(), FcntlArg::F_GETFL)
            .with_context(|| format!("Failed to get FD flags for fd {}", raw_fd))?;
        let mut non_blocking_flags = OFlag::from_bits_truncate(flags);
        non_blocking_flags.insert(OFlag::O_NONBLOCK);
        fcntl(fd.as_fd(), FcntlArg::F_SETFL(non_blocking_flags))
            .with_context(|| format!("Failed to set FD {} to non-blocking", raw_fd))?;
        log::trace!("NixPty: Set FD {} to non-blocking", raw_fd);
        Ok(())
    }

    /// Resizes the PTY window and tells the child.
    pub fn resize(&self, cols: u16, rows: u16) -> Result<()> {
        Self::set_pty_size_internal(&self.master_fd, cols, rows)?;
        kill(self.child_pid, Some(Signal::SIGWINCH))
            .with_context(|| format!("Failed to send SIGWINCH to child {}", self.child_pid))?;
        log::debug!("Resized PTY to {}x{}", cols, rows);
        Ok(())
    }

    pub fn child_pid(&self) -> Pid {
        self.child_pid
    }

    /// Reaps the child if it has exited; returns its status.
    pub fn try_wait(&self) -> Option<WaitStatus> {
        match waitpid(self.child_pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => None,
            Ok(status) => Some(status),
            Err(e) => {
                log::debug!("waitpid({}) failed: {}", self.child_pid, e);
                None
            }
        }
    }
}

impl Drop for NixPty {
    fn drop(&mut self) {
        let pid = self.child_pid;
        match waitpid(pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => {
                log::debug!("Child process {} is still alive. Sending SIGHUP.", pid);
                if let Err(e) = kill(pid, Some(Signal::SIGHUP)) {
                    log::warn!("Failed to send SIGHUP to child process {}: {}", pid, e);
                }
            }
            Ok(status) => log::debug!("Child process {} exited: {:?}", pid, status),
            Err(nix::Error::ECHILD) | Err(nix::Error::ESRCH) => {
                log::debug!("Child process {} already reaped", pid)
            }
            Err(e) => log::warn!("Error checking child process {}: {}", pid, e),
        }
    }
}

impl Read for NixPty {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match nix::unistd::read(&self.master_fd, buf) {
            Ok(bytes_read) => {
                log::trace!("NixPty::read {} bytes", bytes_read);
                Ok(bytes_read)
            }
            // The slave side is gone once the child exits.
            Err(nix::Error::EIO) => Ok(0),
            Err(nix::Error::EAGAIN) => Err(IoError::from(IoErrorKind::WouldBlock)),
            Err(nix::Error::EINTR) => Err(IoError::from(IoErrorKind::Interrupted)),
            Err(e) => Err(IoError::other(e)),
        }
    }
}

impl Write for NixPty {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match nix::unistd::write(&self.master_fd, buf) {
            Ok(bytes_written) => {
                log::trace!("NixPty::write {} bytes", bytes_written);
                Ok(bytes_written)
            }
            Err(nix::Error::EAGAIN) => Err(IoError::from(IoErrorKind::WouldBlock)),
            Err(nix::Error::EINTR) => Err(IoError::from(IoErrorKind::Interrupted)),
            Err(e) => Err(IoError::other(e)),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        Ok(())
    }
}

impl AsRawFd for NixPty {
    fn as_raw_fd(&self) -> RawFd {
        self.master_fd.as_raw_fd()
    }
}

impl TerminalSink for NixPty {
    fn feed_raw_bytes(&mut self, bytes: &[u8]) -> IoResult<()> {
        write_fully(self, bytes)
    }
}

/// `write_all` over a non-blocking descriptor: retries short writes and
/// `WouldBlock` by waiting for the PTY to drain.
pub fn write_fully<W: Write + AsRawFd>(writer: &mut W, mut bytes: &[u8]) -> IoResult<()> {
    while !bytes.is_empty() {
        match writer.write(bytes) {
            Ok(0) => return Err(IoError::from(IoErrorKind::WriteZero)),
            Ok(n) => bytes = &bytes[n..],
            Err(e) if e.kind() == IoErrorKind::Interrupted => {}
            Err(e) if e.kind() == IoErrorKind::WouldBlock => {
                let mut pollfd = libc::pollfd {
                    fd: writer.as_raw_fd(),
                    events: libc::POLLOUT,
                    revents: 0,
                };
                if unsafe { libc::poll(&mut pollfd, 1, 100) } == -1 {
                    let err = IoError::last_os_error();
                    if err.kind() != IoErrorKind::Interrupted {
                        return Err(err);
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
    Ok(())
}
