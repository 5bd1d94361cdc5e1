// SPDX-License-Identifier: MIT
//
// The terminal device: line discipline, size query, and byte I/O.
//
// Safety: termios calls, the TIOCGWINSZ ioctl, isatty, poll and the raw
// read/write on fds 0 and 1 are FFI. Each unsafe block wraps exactly one
// call and checks its return value.
#![allow(unsafe_code)]
//
// Everything above this module talks to the terminal through two small
// capability traits:
//
//   ByteSource : "give me up to N bytes, waiting at most T". The key
//                decoder and the geometry probe only need this.
//
//   Tty        : ByteSource + Write + line discipline + size query. The
//                raw-mode session and the probe's request side need it.
//
// `StdTty` is the real thing (stdin for input and termios, stdout for
// output and TIOCGWINSZ). Tests substitute a scripted fake so the whole
// core runs without a terminal.
//
// Output deliberately bypasses `io::stdout()`. Rust's stdout is a
// LineWriter: a frame containing "\r\n" would be split into several
// write() syscalls at the newlines, which is exactly the partial redraw
// the compositor exists to prevent. One `Write::write` here is one
// `write(2)`.

use std::io::{self, Write};
use std::os::unix::io::RawFd;
use std::time::Duration;

use crate::geometry::ScreenGeometry;

// ─── TerminalState ───────────────────────────────────────────────────────────

/// Opaque snapshot of the terminal's line-discipline configuration.
///
/// Holds the complete `termios` structure (flags, control characters,
/// speeds), so restoring a snapshot is byte-for-byte exact.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct TerminalState {
    termios: libc::termios,
}

impl TerminalState {
    /// Wrap a raw `termios` value.
    #[must_use]
    pub const fn from_termios(termios: libc::termios) -> Self {
        Self { termios }
    }

    /// The wrapped `termios` value.
    #[must_use]
    pub const fn as_termios(&self) -> &libc::termios {
        &self.termios
    }

    pub(crate) const fn termios_mut(&mut self) -> &mut libc::termios {
        &mut self.termios
    }

    /// Whether typed bytes are echoed back by the terminal.
    #[must_use]
    pub const fn echo(&self) -> bool {
        self.termios.c_lflag & libc::ECHO != 0
    }

    /// Whether input is line-buffered (canonical mode).
    #[must_use]
    pub const fn canonical(&self) -> bool {
        self.termios.c_lflag & libc::ICANON != 0
    }

    /// Whether Ctrl-C / Ctrl-Z / Ctrl-\ generate signals.
    #[must_use]
    pub const fn signals(&self) -> bool {
        self.termios.c_lflag & libc::ISIG != 0
    }

    /// Whether Ctrl-S / Ctrl-Q are swallowed as flow control.
    #[must_use]
    pub const fn flow_control(&self) -> bool {
        self.termios.c_iflag & libc::IXON != 0
    }

    /// Whether output `\n` is translated to `\r\n`.
    #[must_use]
    pub const fn output_processing(&self) -> bool {
        self.termios.c_oflag & libc::OPOST != 0
    }

    /// VMIN: minimum bytes per read.
    #[must_use]
    pub const fn min_bytes(&self) -> u8 {
        self.termios.c_cc[libc::VMIN]
    }

    /// VTIME: inter-byte timeout in deciseconds.
    #[must_use]
    pub const fn timeout_deciseconds(&self) -> u8 {
        self.termios.c_cc[libc::VTIME]
    }
}

impl Default for TerminalState {
    /// An all-zero configuration: every flag off, VMIN = VTIME = 0.
    fn default() -> Self {
        // termios is a plain C struct of integers and arrays; all-zero is
        // a valid bit pattern.
        Self {
            termios: unsafe { std::mem::zeroed() },
        }
    }
}

impl std::fmt::Debug for TerminalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalState")
            .field("echo", &self.echo())
            .field("canonical", &self.canonical())
            .field("signals", &self.signals())
            .field("flow_control", &self.flow_control())
            .field("output_processing", &self.output_processing())
            .field("vmin", &self.min_bytes())
            .field("vtime", &self.timeout_deciseconds())
            .finish_non_exhaustive()
    }
}

/// Derive the raw-mode configuration from a captured one.
///
/// cfmakeraw equivalent with a bounded read policy instead of a blocking
/// one: echo, canonical input, signal generation, extended input
/// processing, input translation, flow control, and output post-processing
/// are all disabled; the character size is forced to 8 bits; reads return
/// as soon as any byte is available or after `idle_timeout` (VMIN = 0,
/// VTIME = timeout in deciseconds, clamped to 1..=255).
#[must_use]
pub fn make_raw(original: &TerminalState, idle_timeout: Duration) -> TerminalState {
    let mut raw = *original;
    let t = raw.termios_mut();

    t.c_iflag &= !(libc::IGNBRK
        | libc::BRKINT
        | libc::PARMRK
        | libc::INPCK
        | libc::ISTRIP
        | libc::INLCR
        | libc::IGNCR
        | libc::ICRNL
        | libc::IXON);
    t.c_oflag &= !libc::OPOST;
    t.c_lflag &= !(libc::ECHO | libc::ECHONL | libc::ICANON | libc::ISIG | libc::IEXTEN);
    t.c_cflag &= !(libc::CSIZE | libc::PARENB);
    t.c_cflag |= libc::CS8;

    t.c_cc[libc::VMIN] = 0;
    t.c_cc[libc::VTIME] = deciseconds(idle_timeout);

    raw
}

/// Convert a timeout to VTIME deciseconds, clamped to `1..=255`.
#[allow(clippy::cast_possible_truncation)] // Clamped to u8 range first.
fn deciseconds(timeout: Duration) -> u8 {
    (timeout.as_millis() / 100).clamp(1, 255) as u8
}

// ─── Capability Traits ──────────────────────────────────────────────────────

/// A stream of input bytes with bounded waits.
pub trait ByteSource {
    /// Read up to `buf.len()` bytes, waiting at most `timeout` for the
    /// first one.
    ///
    /// Returns `Ok(0)` when the timeout elapses with nothing to read.
    ///
    /// # Errors
    ///
    /// Any OS read failure. A hung-up stream reports
    /// [`io::ErrorKind::UnexpectedEof`]; a signal that cut the wait short
    /// reports [`io::ErrorKind::Interrupted`], and the caller decides
    /// whether to retry.
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;
}

/// A terminal device: byte I/O plus line-discipline and size control.
///
/// `Write::write` must map to a single device write; the compositor
/// relies on that to deliver a frame atomically.
pub trait Tty: ByteSource + Write {
    /// Capture the current line-discipline configuration.
    ///
    /// # Errors
    ///
    /// The OS rejected the query (e.g. not a terminal).
    fn get_attrs(&self) -> io::Result<TerminalState>;

    /// Apply a line-discipline configuration, discarding pending input.
    ///
    /// # Errors
    ///
    /// The OS rejected the change.
    fn set_attrs(&mut self, state: &TerminalState) -> io::Result<()>;

    /// Ask the OS for the window size in character cells.
    ///
    /// May report zero columns on terminals that don't know their size.
    ///
    /// # Errors
    ///
    /// The OS does not support the query for this device.
    fn window_size(&self) -> io::Result<ScreenGeometry>;

    /// Arrange for `state` to be restored if the process exits or panics
    /// without going through the session guard.
    fn arm_restore(&self, _state: &TerminalState) {}

    /// Cancel a previous [`arm_restore`](Self::arm_restore).
    fn disarm_restore(&self) {}
}

impl<T: ByteSource + ?Sized> ByteSource for &mut T {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        (**self).read_timeout(buf, timeout)
    }
}

// ─── StdTty ─────────────────────────────────────────────────────────────────

/// The process's controlling terminal: stdin for input and termios,
/// stdout for output and window size.
#[derive(Debug, Clone, Copy)]
pub struct StdTty {
    input: RawFd,
    output: RawFd,
}

impl StdTty {
    /// Handle over `STDIN_FILENO` / `STDOUT_FILENO`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            input: libc::STDIN_FILENO,
            output: libc::STDOUT_FILENO,
        }
    }

    /// Whether stdin is connected to a terminal.
    #[must_use]
    pub fn is_tty(&self) -> bool {
        unsafe { libc::isatty(self.input) != 0 }
    }
}

impl Default for StdTty {
    fn default() -> Self {
        Self::new()
    }
}

impl ByteSource for StdTty {
    fn read_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let mut pfd = libc::pollfd {
            fd: self.input,
            events: libc::POLLIN,
            revents: 0,
        };

        let ready = unsafe { libc::poll(&raw mut pfd, 1, timeout_ms) };
        if ready < 0 {
            // EINTR (SIGWINCH) surfaces as `Interrupted` for the caller.
            return Err(io::Error::last_os_error());
        }
        if ready == 0 {
            return Ok(0);
        }

        let n = unsafe { libc::read(self.input, buf.as_mut_ptr().cast(), buf.len()) };
        if n < 0 {
            let err = io::Error::last_os_error();
            return match err.kind() {
                io::ErrorKind::WouldBlock => Ok(0),
                _ => Err(err),
            };
        }
        if n == 0 {
            // poll said readable but read found nothing: the other end hung up.
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof));
        }

        #[allow(clippy::cast_sign_loss)] // n > 0 guaranteed above.
        Ok(n as usize)
    }
}

impl Write for StdTty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            let n = unsafe { libc::write(self.output, buf.as_ptr().cast(), buf.len()) };
            if n >= 0 {
                #[allow(clippy::cast_sign_loss)] // n >= 0 guaranteed above.
                return Ok(n as usize);
            }
            let err = io::Error::last_os_error();
            if err.kind() != io::ErrorKind::Interrupted {
                return Err(err);
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        // Unbuffered: every write already reached the device.
        Ok(())
    }
}

impl Tty for StdTty {
    fn get_attrs(&self) -> io::Result<TerminalState> {
        let mut state = TerminalState::default();
        if unsafe { libc::tcgetattr(self.input, &raw mut state.termios) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(state)
    }

    fn set_attrs(&mut self, state: &TerminalState) -> io::Result<()> {
        if unsafe { libc::tcsetattr(self.input, libc::TCSAFLUSH, &raw const state.termios) } != 0
        {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn window_size(&self) -> io::Result<ScreenGeometry> {
        let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
        if unsafe { libc::ioctl(self.output, libc::TIOCGWINSZ, &raw mut ws) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(ScreenGeometry {
            rows: ws.ws_row,
            cols: ws.ws_col,
        })
    }

    fn arm_restore(&self, state: &TerminalState) {
        crate::terminal::arm_process_restore(self.input, state);
    }

    fn disarm_restore(&self) {
        crate::terminal::disarm_process_restore();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
