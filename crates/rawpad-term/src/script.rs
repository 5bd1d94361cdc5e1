// SPDX-License-Identifier: MIT
//
// Scripted terminal for tests.
//
// Plays back a fixed script of input chunks and timeouts, records every
// write, and keeps the line-discipline configuration in a plain field so
// tests can assert on exactly what the session applied and restored.

use std::cell::Cell;
use std::collections::VecDeque;
use std::io::{self, Write};
use std::time::Duration;

use crate::geometry::ScreenGeometry;
use crate::tty::{ByteSource, TerminalState, Tty};

/// One step of scripted input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Bytes available to the next read(s).
    Bytes(Vec<u8>),
    /// The next read times out with zero bytes.
    Timeout,
    /// The next read fails as if the terminal hung up.
    Eof,
    /// The next read fails with an OS error.
    Fail,
    /// The next read is cut short by a signal.
    Interrupt,
}

/// A configuration resembling a freshly opened shell terminal.
pub fn cooked_state() -> TerminalState {
    let mut state = TerminalState::default();
    let t = state.termios_mut();
    t.c_iflag = libc::ICRNL | libc::IXON | libc::BRKINT;
    t.c_oflag = libc::OPOST;
    t.c_cflag = libc::CS7 | libc::PARENB;
    t.c_lflag = libc::ECHO | libc::ICANON | libc::ISIG | libc::IEXTEN;
    t.c_cc[libc::VMIN] = 1;
    t.c_cc[libc::VTIME] = 0;
    state
}

/// A fake terminal driven by a script.
#[derive(Debug)]
pub struct ScriptedTty {
    script: VecDeque<Step>,
    /// Current line-discipline configuration.
    pub attrs: TerminalState,
    /// Every configuration passed to `set_attrs`, in order.
    pub applied: Vec<TerminalState>,
    /// What `window_size` reports; `None` means the query is unsupported.
    pub size: Option<ScreenGeometry>,
    /// Everything written, concatenated.
    pub output: Vec<u8>,
    /// Number of `write` calls.
    pub writes: usize,
    /// Total input bytes handed out.
    pub consumed: usize,
    /// Make `get_attrs` fail.
    pub fail_get: bool,
    /// Make `set_attrs` fail.
    pub fail_set: bool,
    /// Accept at most this many bytes per write.
    pub write_limit: Option<usize>,
    /// State armed for process-exit restoration, if any.
    pub armed: Cell<Option<TerminalState>>,
}

impl ScriptedTty {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            script: steps.into_iter().collect(),
            attrs: cooked_state(),
            applied: Vec::new(),
            size: Some(ScreenGeometry { rows: 24, cols: 80 }),
            output: Vec::new(),
            writes: 0,
            consumed: 0,
            fail_get: false,
            fail_set: false,
            write_limit: None,
            armed: Cell::new(None),
        }
    }

    /// Script with no input: every read times out.
    pub fn idle() -> Self {
        Self::new(Vec::<Step>::new())
    }

    /// Script containing the given bytes as one chunk.
    pub fn with_input(bytes: &[u8]) -> Self {
        Self::new([Step::Bytes(bytes.to_vec())])
    }

    /// Bytes still waiting to be read.
    pub fn remaining(&self) -> usize {
        self.script
            .iter()
            .map(|s| match s {
                Step::Bytes(b) => b.len(),
                _ => 0,
            })
            .sum()
    }

    pub fn output_str(&self) -> String {
        String::from_utf8_lossy(&self.output).into_owned()
    }
}

impl ByteSource for ScriptedTty {
    fn read_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> io::Result<usize> {
        match self.script.pop_front() {
            None | Some(Step::Timeout) => Ok(0),
            Some(Step::Eof) => Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
            Some(Step::Fail) => Err(io::Error::other("scripted read failure")),
            Some(Step::Interrupt) => Err(io::Error::from(io::ErrorKind::Interrupted)),
            Some(Step::Bytes(mut bytes)) => {
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                if n < bytes.len() {
                    self.script.push_front(Step::Bytes(bytes.split_off(n)));
                }
                self.consumed += n;
                Ok(n)
            }
        }
    }
}

impl Write for ScriptedTty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes += 1;
        let n = self.write_limit.map_or(buf.len(), |limit| buf.len().min(limit));
        self.output.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Tty for ScriptedTty {
    fn get_attrs(&self) -> io::Result<TerminalState> {
        if self.fail_get {
            return Err(io::Error::from_raw_os_error(libc::ENOTTY));
        }
        Ok(self.attrs)
    }

    fn set_attrs(&mut self, state: &TerminalState) -> io::Result<()> {
        if self.fail_set {
            return Err(io::Error::from_raw_os_error(libc::EIO));
        }
        self.attrs = *state;
        self.applied.push(*state);
        Ok(())
    }

    fn window_size(&self) -> io::Result<ScreenGeometry> {
        self.size
            .ok_or_else(|| io::Error::from_raw_os_error(libc::ENOTTY))
    }

    fn arm_restore(&self, state: &TerminalState) {
        self.armed.set(Some(*state));
    }

    fn disarm_restore(&self) {
        self.armed.set(None);
    }
}
