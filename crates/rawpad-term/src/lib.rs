// SPDX-License-Identifier: MIT
//
// rawpad-term: Terminal core for rawpad.
//
// Four pieces, composed as a pipeline over one shared device:
//
//   terminal  → RawModeSession: raw termios in, original termios back out
//               on every exit path (drop, panic, process exit)
//   geometry  → GeometryProbe: window size via ioctl, falling back to a
//               cursor-position-report exchange over the input stream
//   input     → KeyDecoder: bytes to key events, resolving the lone-ESC
//               ambiguity with a bounded wait
//   output    → FrameCompositor: one full frame, one write()
//
// The device sits behind the `Tty` / `ByteSource` traits in `tty`, so the
// whole pipeline runs against a scripted fake in tests.
//
// This crate intentionally avoids TUI frameworks in favor of direct
// terminal control via ANSI escape sequences and raw termios. The design
// assumes a VT100-compatible terminal.

#[cfg(not(unix))]
compile_error!("rawpad-term drives the terminal through termios and only supports unix targets");

pub mod ansi;
pub mod config;
pub mod error;
pub mod geometry;
pub mod input;
pub mod output;
pub mod resize;
pub mod terminal;
pub mod tty;

#[cfg(test)]
mod script;
