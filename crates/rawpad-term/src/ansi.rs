// SPDX-License-Identifier: MIT
//
// ANSI escape sequence generation.
//
// Byte encodings for the handful of VT100 commands rawpad sends: cursor
// moves, cursor visibility, the position request, and the two erases.
// Each function appends to an `impl Write`; when to send them is decided
// by the compositor, the probe, and the session.
//
// Rows and columns are 0-based here and 1-based on the wire.
//
// Errors come only from the writer. Frames and probe requests are built
// in memory, so in practice nothing fails.
use std::io::{self, Write};

/// Escape byte that opens every sequence.
pub const ESC: u8 = 0x1B;

// ─── Cursor ──────────────────────────────────────────────────────────────────

/// Move the cursor to `(row, col)` using the CUP (Cursor Position) sequence.
///
/// Our coordinates are 0-indexed; ANSI CUP is 1-indexed.
#[inline]
pub fn cursor_to(w: &mut impl Write, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", u32::from(row) + 1, u32::from(col) + 1)
}

/// Move the cursor to the top-left cell (CUP with no parameters).
#[inline]
pub fn cursor_home(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[H")
}

/// Hide the cursor (DECTCEM reset).
#[inline]
pub fn cursor_hide(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25l")
}

/// Show the cursor (DECTCEM set).
#[inline]
pub fn cursor_show(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[?25h")
}

/// Push the cursor `n` cells right then `n` cells down (CUF + CUD).
///
/// Both movements clamp at the screen edge, so a large `n` parks the
/// cursor in the bottom-right cell regardless of terminal size. CUP is
/// not used here because its behavior past the edge is unspecified.
#[inline]
pub fn cursor_far_bottom_right(w: &mut impl Write, n: u16) -> io::Result<()> {
    write!(w, "\x1b[{n}C\x1b[{n}B")
}

/// Ask the terminal to report the cursor position (DSR 6).
///
/// The reply arrives on the input stream as `ESC [ <row> ; <col> R`.
#[inline]
pub fn request_cursor_position(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[6n")
}

// ─── Screen ──────────────────────────────────────────────────────────────────

/// Clear the entire screen (ED 2).
#[inline]
pub fn clear_screen(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Erase from the cursor to the end of the current line (EL 0).
#[inline]
pub fn erase_line_right(w: &mut impl Write) -> io::Result<()> {
    w.write_all(b"\x1b[K")
}

// ─── Tests ───────────────────────────────────────────────────────────────────
