// SPDX-License-Identifier: MIT
//
// Output buffering and full-frame composition.
//
// Two components work together to keep redraws flicker-free:
//
//   OutputBuffer : accumulates all ANSI bytes for one frame in memory so
//   the entire frame reaches the terminal in a single write() syscall.
//   Lives for exactly one render call.
//
//   FrameCompositor : lays a frame out into an OutputBuffer: hide cursor,
//   home, every row (content or `~` filler) followed by erase-to-EOL,
//   CRLF between rows but not after the last, then park and show the
//   cursor. Erasing per row instead of clearing the screen means the old
//   frame is never blanked before the new one is drawn.
//
// A partial write is fatal. Half an escape sequence leaves the terminal
// in a state we can't reason about.

use std::io::{self, Write};

use crate::ansi;
use crate::error::DeviceError;
use crate::geometry::ScreenGeometry;

// ─── Single Write ────────────────────────────────────────────────────────────

/// Deliver `bytes` with exactly one `write` call, then flush.
///
/// # Errors
///
/// The write failed, or accepted fewer bytes than offered.
pub fn write_once<W: Write + ?Sized>(w: &mut W, bytes: &[u8]) -> Result<(), DeviceError> {
    if bytes.is_empty() {
        return Ok(());
    }
    let n = w.write(bytes).map_err(DeviceError::at("write"))?;
    if n != bytes.len() {
        return Err(DeviceError::short_write(n, bytes.len()));
    }
    w.flush().map_err(DeviceError::at("flush"))
}

// ─── OutputBuffer ────────────────────────────────────────────────────────────

/// One frame's worth of bytes, handed to the device in a single write.
///
/// Backed by a `Vec`, so growth past the initial capacity is geometric.
#[derive(Debug, Default)]
pub struct OutputBuffer {
    buf: Vec<u8>,
}

impl OutputBuffer {
    /// Create an empty buffer with room for `capacity` bytes.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes accumulated.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether the buffer is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// The accumulated bytes.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Append raw bytes.
    #[inline]
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write the whole buffer with one `write` call and discard it.
    ///
    /// # Errors
    ///
    /// See [`write_once`].
    pub fn write_to<W: Write + ?Sized>(self, w: &mut W) -> Result<(), DeviceError> {
        write_once(w, &self.buf)
    }
}

impl Write for OutputBuffer {
    #[inline]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        // Intentionally a no-op. Real delivery happens in write_to().
        Ok(())
    }
}

// ─── CursorPosition ──────────────────────────────────────────────────────────

/// Cursor location, 0-indexed. Rendered 1-indexed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorPosition {
    pub row: u16,
    pub col: u16,
}

impl CursorPosition {
    #[must_use]
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// Clamp into the visible area of `geometry`.
    #[must_use]
    pub fn clamp_to(self, geometry: ScreenGeometry) -> Self {
        Self {
            row: self.row.min(geometry.rows.saturating_sub(1)),
            col: self.col.min(geometry.cols.saturating_sub(1)),
        }
    }
}

// ─── FrameCompositor ─────────────────────────────────────────────────────────

/// Marker drawn on rows past the end of the content.
pub const FILLER: &[u8] = b"~";

/// Control-sequence bytes per frame outside the rows: hide, home, CUP
/// with two five-digit coordinates, show.
const FRAME_OVERHEAD: usize = 6 + 3 + 14 + 6;

/// Bytes per row beyond its text: erase-to-EOL plus CRLF.
const ROW_OVERHEAD: usize = 3 + 2;

/// Composes full-screen frames and delivers each with one write.
#[derive(Debug, Clone, Copy)]
pub struct FrameCompositor {
    geometry: ScreenGeometry,
}

impl FrameCompositor {
    /// A compositor for a screen of the given size.
    #[must_use]
    pub const fn new(geometry: ScreenGeometry) -> Self {
        Self { geometry }
    }

    /// The geometry frames are laid out for.
    #[inline]
    #[must_use]
    pub const fn geometry(&self) -> ScreenGeometry {
        self.geometry
    }

    /// Lay out subsequent frames for a new geometry.
    pub const fn resize(&mut self, geometry: ScreenGeometry) {
        self.geometry = geometry;
    }

    /// Build one frame.
    ///
    /// Row `i` shows `content[i]` truncated to the column count, or the
    /// `~` filler once content runs out. The cursor is clamped into the
    /// screen.
    #[must_use]
    pub fn compose<S: AsRef<str>>(&self, cursor: CursorPosition, content: &[S]) -> OutputBuffer {
        let rows = usize::from(self.geometry.rows);
        let cols = usize::from(self.geometry.cols);
        let mut out = OutputBuffer::with_capacity(FRAME_OVERHEAD + rows * (cols + ROW_OVERHEAD));

        // Writes into a Vec-backed buffer cannot fail.
        let _ = ansi::cursor_hide(&mut out);
        let _ = ansi::cursor_home(&mut out);

        for y in 0..rows {
            match content.get(y) {
                Some(line) => out.push_bytes(truncate(line.as_ref(), cols).as_bytes()),
                None => out.push_bytes(FILLER),
            }
            let _ = ansi::erase_line_right(&mut out);
            if y + 1 < rows {
                out.push_bytes(b"\r\n");
            }
        }

        let cursor = cursor.clamp_to(self.geometry);
        let _ = ansi::cursor_to(&mut out, cursor.row, cursor.col);
        let _ = ansi::cursor_show(&mut out);
        out
    }

    /// Compose a frame and write it to `w` in a single call.
    ///
    /// # Errors
    ///
    /// The write failed or was short.
    pub fn render<W, S>(&self, w: &mut W, cursor: CursorPosition, content: &[S]) -> Result<(), DeviceError>
    where
        W: Write + ?Sized,
        S: AsRef<str>,
    {
        self.compose(cursor, content).write_to(w)
    }
}

/// The longest prefix of `line` holding at most `cols` characters.
fn truncate(line: &str, cols: usize) -> &str {
    line.char_indices().nth(cols).map_or(line, |(end, _)| &line[..end])
}

// ─── Tests ───────────────────────────────────────────────────────────────────
