// src/os/mod.rs

//! Linux plumbing: readiness polling and the child's pseudo-terminal.

pub mod epoll;
pub mod pty;
