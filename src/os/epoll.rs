// src/os/epoll.rs

//! Wrapper around `epoll` through raw `libc` calls, used by the event loop to
//! wait on the X connection, the PTY and the host console at once.

use anyhow::{Context, Result};
use bitflags::bitflags;
use log::{debug, trace, warn};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

const EPOLL_CREATE_CLOEXEC: libc::c_int = libc::O_CLOEXEC;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EpollFlags: u32 {
        const EPOLLIN = libc::EPOLLIN as u32;
        const EPOLLOUT = libc::EPOLLOUT as u32;
        const EPOLLERR = libc::EPOLLERR as u32;
        const EPOLLHUP = libc::EPOLLHUP as u32;
        const EPOLLRDHUP = libc::EPOLLRDHUP as u32;
    }
}

/// One ready descriptor, identified by the token it was registered with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Readiness {
    pub token: u64,
    pub flags: EpollFlags,
}

impl Readiness {
    pub fn is_readable(&self) -> bool {
        self.flags.contains(EpollFlags::EPOLLIN)
    }

    /// Peer closed or the descriptor errored.
    pub fn is_hangup(&self) -> bool {
        self.flags
            .intersects(EpollFlags::EPOLLHUP | EpollFlags::EPOLLERR | EpollFlags::EPOLLRDHUP)
    }
}

const MAX_EVENTS_BUFFER_SIZE: usize = 16;

#[derive(Debug)]
pub struct EventMonitor {
    epoll_fd: RawFd,
    event_buffer: [libc::epoll_event; MAX_EVENTS_BUFFER_SIZE],
}

impl EventMonitor {
    pub fn new() -> Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(EPOLL_CREATE_CLOEXEC) };
        if epoll_fd == -1 {
            return Err(io::Error::last_os_error())
                .context("Failed to create epoll instance (epoll_create1)");
        }
        debug!("EventMonitor created with epoll_fd: {}", epoll_fd);
        Ok(Self {
            epoll_fd,
            event_buffer: [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS_BUFFER_SIZE],
        })
    }

    pub fn add(&self, fd: RawFd, token: u64, flags: EpollFlags) -> Result<()> {
        let mut event = libc::epoll_event {
            events: flags.bits(),
            u64: token,
        };
        if unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_ADD, fd, &mut event) } == -1 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to add fd {} to epoll (token: {})", fd, token));
        }
        trace!(
            "Added fd {} to epoll_fd {} with token {} and flags {:?}",
            fd,
            self.epoll_fd,
            token,
            flags
        );
        Ok(())
    }

    pub fn delete(&self, fd: RawFd) -> Result<()> {
        let mut event = libc::epoll_event { events: 0, u64: 0 };
        if unsafe { libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, &mut event) } == -1 {
            return Err(io::Error::last_os_error())
                .with_context(|| format!("Failed to delete fd {} from epoll", fd));
        }
        trace!("Deleted fd {} from epoll_fd {}", fd, self.epoll_fd);
        Ok(())
    }

    /// Waits for readiness. `None` blocks indefinitely. An interrupted wait
    /// returns no events.
    pub fn wait(&mut self, timeout: Option<Duration>) -> Result<Vec<Readiness>> {
        let timeout_ms = timeout_to_ms(timeout);
        trace!(
            "EventMonitor: polling with timeout {}ms on epoll_fd {}",
            timeout_ms,
            self.epoll_fd
        );

        let num_events = unsafe {
            libc::epoll_wait(
                self.epoll_fd,
                self.event_buffer.as_mut_ptr(),
                MAX_EVENTS_BUFFER_SIZE as libc::c_int,
                timeout_ms,
            )
        };

        if num_events == -1 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                trace!("EventMonitor: epoll_wait interrupted (EINTR)");
                return Ok(Vec::new());
            }
            return Err(err).context("epoll_wait failed in EventMonitor");
        }

        Ok(self.event_buffer[..num_events as usize]
            .iter()
            .map(|event| Readiness {
                token: event.u64,
                flags: EpollFlags::from_bits_truncate(event.events),
            })
            .collect())
    }
}

/// Milliseconds for `epoll_wait`, rounding up so a pending deadline is never
/// polled early.
fn timeout_to_ms(timeout: Option<Duration>) -> libc::c_int {
    match timeout {
        None => -1,
        Some(t) => {
            let ms = t.as_micros().div_ceil(1000);
            libc::c_int::try_from(ms).unwrap_or(libc::c_int::MAX)
        }
    }
}

impl Drop for EventMonitor {
    fn drop(&mut self) {
        if unsafe { libc::close(self.epoll_fd) } == -1 {
            warn!(
                "Failed to close epoll_fd {} in EventMonitor::drop: {}",
                self.epoll_fd,
                io::Error::last_os_error()
            );
        } else {
            debug!("Closed epoll_fd {} in EventMonitor::drop", self.epoll_fd);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::{pipe, write};
    use std::os::unix::io::AsRawFd;

    #[test]
    fn timeout_conversion() {
        assert_eq!(timeout_to_ms(None), -1);
        assert_eq!(timeout_to_ms(Some(Duration::ZERO)), 0);
        assert_eq!(timeout_to_ms(Some(Duration::from_micros(1500))), 2);
        assert_eq!(timeout_to_ms(Some(Duration::from_millis(100))), 100);
    }

    #[test_log::test]
    fn reports_readable_pipe() {
        let (read_end, write_end) = pipe().expect("pipe");
        let mut monitor = EventMonitor::new().expect("epoll");
        monitor
            .add(read_end.as_raw_fd(), 7, EpollFlags::EPOLLIN)
            .expect("add");

        assert!(monitor
            .wait(Some(Duration::from_millis(10)))
            .expect("wait")
            .is_empty());

        write(&write_end, b"x").expect("write");
        let ready = monitor.wait(Some(Duration::from_secs(1))).expect("wait");
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].token, 7);
        assert!(ready[0].is_readable());

        monitor.delete(read_end.as_raw_fd()).expect("delete");
        assert!(monitor.wait(Some(Duration::ZERO)).expect("wait").is_empty());
    }
}
