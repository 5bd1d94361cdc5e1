// SPDX-License-Identifier: MIT
//
// Screen geometry discovery.
//
// The direct path is one ioctl. Some terminals (serial consoles, a few
// emulators over odd transports) answer it with zero columns or not at
// all, so there is a fallback that asks the terminal itself:
//
//   1. Park the cursor in the bottom-right cell: `ESC [ 999 C ESC [ 999 B`.
//      Both moves clamp at the edge, so the final position is the size.
//   2. Request a cursor position report: `ESC [ 6 n`.
//   3. Read the reply `ESC [ <rows> ; <cols> R` back out of the input
//      stream, one byte at a time, within a byte budget and the idle
//      timeout.
//
// The reply shares the stream with keystrokes. The probe must run to
// completion before the key decoder reads anything, and it reads byte by
// byte so it never swallows keys typed after the `R`.

use std::io;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ansi;
use crate::error::{DeviceError, Error, ProtocolError};
use crate::output::write_once;
use crate::tty::{ByteSource, Tty};

// ─── ScreenGeometry ─────────────────────────────────────────────────────────

/// Visible screen size in character cells.
///
/// Both values are non-zero once a probe has succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenGeometry {
    /// Number of rows (height in character cells).
    pub rows: u16,
    /// Number of columns (width in character cells).
    pub cols: u16,
}

impl ScreenGeometry {
    /// Total number of cells (`rows × cols`).
    #[inline]
    #[must_use]
    pub const fn area(self) -> u32 {
        self.rows as u32 * self.cols as u32
    }

    /// Whether either dimension is zero.
    #[inline]
    #[must_use]
    pub const fn is_degenerate(self) -> bool {
        self.rows == 0 || self.cols == 0
    }
}

// ─── GeometryProbe ──────────────────────────────────────────────────────────

/// Default far-move distance for the fallback path.
pub const DEFAULT_FAR_MOVE: u16 = 999;

/// Default byte budget for the position report reply.
pub const DEFAULT_REPORT_BUDGET: usize = 32;

/// Discovers the screen geometry, falling back to the position-report
/// protocol when the OS can't say.
#[derive(Debug, Clone, Copy)]
pub struct GeometryProbe {
    far_move: u16,
    budget: usize,
    timeout: Duration,
}

impl GeometryProbe {
    /// A probe that waits at most `timeout` for each reply byte.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self {
            far_move: DEFAULT_FAR_MOVE,
            budget: DEFAULT_REPORT_BUDGET,
            timeout,
        }
    }

    /// Override the far-move distance.
    #[must_use]
    pub const fn far_move(mut self, cells: u16) -> Self {
        self.far_move = cells;
        self
    }

    /// Override the reply byte budget.
    #[must_use]
    pub const fn budget(mut self, bytes: usize) -> Self {
        self.budget = bytes;
        self
    }

    /// Determine the screen geometry.
    ///
    /// Tries the OS query first; on failure or a degenerate answer, runs
    /// the position-report protocol. No retries.
    ///
    /// # Errors
    ///
    /// [`Error::Device`] if writing the request or reading the reply
    /// fails; [`Error::Protocol`] if the reply is malformed or incomplete.
    pub fn probe<T: Tty>(&self, tty: &mut T) -> Result<ScreenGeometry, Error> {
        if let Some(geometry) = query_os(tty) {
            debug!(rows = geometry.rows, cols = geometry.cols, "geometry from window size query");
            return Ok(geometry);
        }

        let geometry = self.probe_position_report(tty)?;
        debug!(rows = geometry.rows, cols = geometry.cols, "geometry from cursor position report");
        Ok(geometry)
    }

    /// Run only the fallback protocol: park the cursor, request a report,
    /// read and parse the reply.
    ///
    /// # Errors
    ///
    /// See [`probe`](Self::probe).
    pub fn probe_position_report<T: Tty>(&self, tty: &mut T) -> Result<ScreenGeometry, Error> {
        let mut request = Vec::with_capacity(24);
        ansi::cursor_far_bottom_right(&mut request, self.far_move)
            .and_then(|()| ansi::request_cursor_position(&mut request))
            .map_err(DeviceError::at("write"))?;
        write_once(tty, &request)?;

        let reply = self.read_position_report(tty)?;
        Ok(parse_position_report(&reply)?)
    }

    /// Collect reply bytes up to and including the `R` terminator.
    ///
    /// Stops early when the budget is spent or a read times out; the
    /// caller's parse then reports what was wrong with the partial reply.
    ///
    /// # Errors
    ///
    /// Any read failure other than a timeout. Interrupted reads are retried.
    pub fn read_position_report<S: ByteSource>(&self, src: &mut S) -> Result<Vec<u8>, DeviceError> {
        let mut reply = Vec::with_capacity(self.budget);
        let mut byte = [0u8; 1];

        while reply.len() < self.budget {
            let n = match src.read_timeout(&mut byte, self.timeout) {
                Ok(n) => n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(DeviceError::new("read", err)),
            };
            if n == 0 {
                break;
            }
            reply.push(byte[0]);
            if byte[0] == b'R' {
                break;
            }
        }

        Ok(reply)
    }
}

/// Ask the OS for the window size, discarding failures and degenerate
/// answers.
///
/// This is the only query that is safe once key decoding has started
/// (e.g. after a resize); the fallback protocol is not.
#[must_use]
pub fn query_os<T: Tty>(tty: &T) -> Option<ScreenGeometry> {
    match tty.window_size() {
        Ok(geometry) if !geometry.is_degenerate() => Some(geometry),
        Ok(geometry) => {
            debug!(rows = geometry.rows, cols = geometry.cols, "window size query is degenerate");
            None
        }
        Err(err) => {
            debug!(error = %err, "window size query failed");
            None
        }
    }
}

/// Parse a cursor position report: `ESC [ <rows> ; <cols> R`.
///
/// # Errors
///
/// The [`ProtocolError`] variant naming the first structural problem found.
pub fn parse_position_report(reply: &[u8]) -> Result<ScreenGeometry, ProtocolError> {
    if reply.len() < 2 {
        return Err(ProtocolError::Incomplete);
    }
    if reply[0] != ansi::ESC || reply[1] != b'[' {
        return Err(ProtocolError::BadPrefix);
    }

    let Some((&b'R', payload)) = reply[2..].split_last() else {
        return Err(ProtocolError::BadTerminator);
    };

    let mut fields = payload.splitn(2, |&b| b == b';');
    let rows = fields.next().and_then(parse_u16).ok_or(ProtocolError::BadPayload)?;
    let cols = fields.next().and_then(parse_u16).ok_or(ProtocolError::BadPayload)?;

    let geometry = ScreenGeometry { rows, cols };
    if geometry.is_degenerate() {
        return Err(ProtocolError::Degenerate { rows, cols });
    }
    Ok(geometry)
}

/// Parse a non-empty run of ASCII digits. Rejects signs, spaces, overflow.
fn parse_u16(digits: &[u8]) -> Option<u16> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    digits.iter().try_fold(0u16, |acc, &d| {
        acc.checked_mul(10)?.checked_add(u16::from(d - b'0'))
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
