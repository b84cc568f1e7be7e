// src/platform/mod.rs

//! Windowing system backends hosting the on-screen keyboard.

pub mod x11;
