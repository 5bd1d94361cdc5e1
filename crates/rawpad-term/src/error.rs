// SPDX-License-Identifier: MIT
//
// Error taxonomy for the terminal core.
//
// Two kinds of failure exist and they never mix:
//
//   DeviceError   : the OS refused a terminal operation (tcgetattr,
//                   tcsetattr, read, write, ioctl). Always fatal. The
//                   caller unwinds, the session guard restores the
//                   terminal, and the diagnostic names the operation.
//
//   ProtocolError : the cursor position report came back malformed.
//                   Local to the geometry probe; the caller decides
//                   between a default geometry and aborting startup.
//
// A timeout is not an error. Bounded reads that see no bytes return
// zero and the caller re-polls.

use std::io;

use thiserror::Error;

/// An OS-level terminal I/O failure.
///
/// Displays as `"<op>: <os error>"` so the operator sees both which call
/// failed and why.
#[derive(Debug, Error)]
#[error("{op}: {source}")]
pub struct DeviceError {
    /// Name of the failing operation (`tcsetattr`, `read`, ...).
    pub op: &'static str,
    /// The underlying OS error.
    #[source]
    pub source: io::Error,
}

impl DeviceError {
    /// Wrap an I/O error with the name of the operation that produced it.
    #[must_use]
    pub const fn new(op: &'static str, source: io::Error) -> Self {
        Self { op, source }
    }

    /// Adapter for `map_err`: `.map_err(DeviceError::at("read"))`.
    pub fn at(op: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::new(op, source)
    }

    /// A write that accepted fewer bytes than requested.
    ///
    /// Partial escape sequences corrupt terminal state, so this is fatal
    /// like any other device failure.
    #[must_use]
    pub fn short_write(written: usize, expected: usize) -> Self {
        Self::new(
            "write",
            io::Error::new(
                io::ErrorKind::WriteZero,
                format!("short write: {written} of {expected} bytes"),
            ),
        )
    }
}

/// A malformed or incomplete cursor position report.
///
/// The expected reply is `ESC [ <rows> ; <cols> R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The byte budget or the idle timeout ran out before `R` arrived.
    #[error("cursor position report incomplete")]
    Incomplete,
    /// The reply did not start with `ESC [`.
    #[error("cursor position report has a bad prefix")]
    BadPrefix,
    /// The reply did not end with `R`.
    #[error("cursor position report has a bad terminator")]
    BadTerminator,
    /// The payload was not `<digits> ; <digits>`.
    #[error("cursor position report has a malformed payload")]
    BadPayload,
    /// The terminal reported zero rows or zero columns.
    #[error("cursor position report is degenerate ({rows}x{cols})")]
    Degenerate { rows: u16, cols: u16 },
}

/// Any failure the terminal core can report.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Result alias for operations that can fail with either kind of error.
pub type Result<T, E = Error> = std::result::Result<T, E>;
