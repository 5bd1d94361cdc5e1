// SPDX-License-Identifier: MIT
//
// Key decoding.
//
// Turns the raw byte stream into semantic key events, one event per call.
// The only ambiguity is the escape byte: it is both the Escape key and the
// first byte of every cursor-movement sequence. We resolve it by waiting:
//
//   ESC                      → wait one idle timeout for a follow-up byte
//   ESC x                    → wait one idle timeout for the final byte
//   ESC [ A / B / C / D      → Arrow(Up / Down / Right / Left)
//   anything else, or silence → bare Escape
//
// Both follow-up bytes are consumed once they arrive, so an unrecognized
// three-byte sequence such as `ESC O A` yields one Escape and leaves no
// stray printable behind.
//
// So every real Escape keypress costs one idle timeout of latency. That
// is the price of single-byte lookahead without a terminal that promises
// to deliver sequences atomically.
//
// # Design
//
// The decision is an explicit state machine (`DecodeState`) fed one
// `Option<u8>` at a time, where `None` means "the read timed out". The
// pure `step` function carries all of the decoding rules; `KeyDecoder`
// only shuttles bytes from a `ByteSource` into it. Reads are always one
// byte long, so the decoder never consumes past the end of the event it
// returns.
//
// A signal (SIGWINCH) that interrupts the first read ends the call with
// `WouldBlock` so the loop can react to it. Inside an escape sequence the
// read is retried instead, since giving up there would split the
// sequence into an Escape and stray bytes.

use std::io;
use std::time::Duration;

use tracing::trace;

use crate::ansi::ESC;
use crate::error::DeviceError;
use crate::tty::ByteSource;

// ─── Event Types ────────────────────────────────────────────────────────────

/// Cursor key direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// A decoded key event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    /// A byte outside the control range (includes bytes `>= 0x80`).
    Printable(u8),
    /// A byte in `0x00..=0x1F` or `0x7F`; Ctrl-<letter> arrives here.
    Control(u8),
    /// A decoded cursor key.
    Arrow(Direction),
    /// An escape byte not followed by a recognized sequence.
    Escape,
    /// The idle timeout elapsed with no input; poll again.
    WouldBlock,
    /// The input stream hung up.
    Eof,
}

impl KeyEvent {
    /// Classify a single non-escape byte.
    #[must_use]
    pub const fn classify(byte: u8) -> Self {
        if byte < 0x20 || byte == 0x7F {
            Self::Control(byte)
        } else {
            Self::Printable(byte)
        }
    }

    /// Whether this is Ctrl + `key` (`key` given as its letter, any case).
    #[must_use]
    pub const fn is_ctrl(self, key: u8) -> bool {
        matches!(self, Self::Control(b) if b == ctrl(key))
    }
}

/// The control byte produced by Ctrl + `key`: `'q' & 0x1f == 0x11`.
#[inline]
#[must_use]
pub const fn ctrl(key: u8) -> u8 {
    key & 0x1F
}

// ─── State Machine ──────────────────────────────────────────────────────────

/// Where the decoder is within one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    /// Nothing read yet.
    Idle,
    /// Read `ESC`.
    SawEscape,
    /// Read `ESC [`.
    SawEscapeBracket,
    /// Read `ESC` and one byte other than `[`.
    SawEscapeOther,
    /// The event is decided.
    Done(KeyEvent),
}

impl DecodeState {
    /// Advance by one read outcome: `Some(byte)` or `None` for a timeout.
    #[must_use]
    pub const fn step(self, input: Option<u8>) -> Self {
        match (self, input) {
            (Self::Idle, None) => Self::Done(KeyEvent::WouldBlock),
            (Self::Idle, Some(ESC)) => Self::SawEscape,
            (Self::Idle, Some(b)) => Self::Done(KeyEvent::classify(b)),

            (Self::SawEscape, Some(b'[')) => Self::SawEscapeBracket,
            (Self::SawEscape, Some(_)) => Self::SawEscapeOther,
            (Self::SawEscape, None) => Self::Done(KeyEvent::Escape),

            (Self::SawEscapeBracket, Some(b'A')) => Self::Done(KeyEvent::Arrow(Direction::Up)),
            (Self::SawEscapeBracket, Some(b'B')) => Self::Done(KeyEvent::Arrow(Direction::Down)),
            (Self::SawEscapeBracket, Some(b'C')) => Self::Done(KeyEvent::Arrow(Direction::Right)),
            (Self::SawEscapeBracket, Some(b'D')) => Self::Done(KeyEvent::Arrow(Direction::Left)),
            (Self::SawEscapeBracket | Self::SawEscapeOther, _) => Self::Done(KeyEvent::Escape),

            (Self::Done(event), _) => Self::Done(event),
        }
    }
}

// ─── KeyDecoder ─────────────────────────────────────────────────────────────

/// Reads one key event at a time from a [`ByteSource`].
#[derive(Debug, Clone, Copy)]
pub struct KeyDecoder {
    timeout: Duration,
}

impl KeyDecoder {
    /// A decoder that waits at most `timeout` per read, including the
    /// follow-up reads after an escape byte.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Decode the next event.
    ///
    /// Returns [`KeyEvent::WouldBlock`] if the first read times out, and
    /// [`KeyEvent::Eof`] if the stream hung up.
    ///
    /// # Errors
    ///
    /// Any read failure other than a timeout or hang-up.
    pub fn next_event<S: ByteSource>(&self, src: &mut S) -> Result<KeyEvent, DeviceError> {
        let mut state = DecodeState::Idle;
        let mut byte = [0u8; 1];

        loop {
            if let DecodeState::Done(event) = state {
                if event != KeyEvent::WouldBlock {
                    trace!(?event, "decoded key");
                }
                return Ok(event);
            }

            let input = match src.read_timeout(&mut byte, self.timeout) {
                Ok(0) => None,
                Ok(_) => Some(byte[0]),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    if state == DecodeState::Idle {
                        return Ok(KeyEvent::WouldBlock);
                    }
                    continue;
                }
                Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(KeyEvent::Eof);
                }
                Err(err) => return Err(DeviceError::new("read", err)),
            };
            state = state.step(input);
        }
    }

    /// Decode the next event, re-polling through timeouts.
    ///
    /// # Errors
    ///
    /// See [`next_event`](Self::next_event).
    pub fn wait_event<S: ByteSource>(&self, src: &mut S) -> Result<KeyEvent, DeviceError> {
        loop {
            match self.next_event(src)? {
                KeyEvent::WouldBlock => {}
                event => return Ok(event),
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::{ScriptedTty, Step};
    use pretty_assertions::assert_eq;

    fn decoder() -> KeyDecoder {
        KeyDecoder::new(Duration::from_millis(100))
    }

    /// Helper: decode one event from a script.
    fn decode(steps: impl IntoIterator<Item = Step>) -> (KeyEvent, ScriptedTty) {
        let mut tty = ScriptedTty::new(steps);
        let event = decoder().next_event(&mut tty).unwrap();
        (event, tty)
    }

    fn bytes(b: &[u8]) -> Step {
        Step::Bytes(b.to_vec())
    }

    // ── Single bytes ────────────────────────────────────────────────────

    #[test]
    fn printable_q() {
        let (event, tty) = decode([bytes(b"q")]);
        assert_eq!(event, KeyEvent::Printable(b'q'));
        assert_eq!(tty.consumed, 1);
    }

    #[test]
    fn ctrl_q_is_control() {
        assert_eq!(ctrl(b'q'), 0x11);
        let (event, _) = decode([bytes(&[0x11])]);
        assert_eq!(event, KeyEvent::Control(0x11));
        assert!(event.is_ctrl(b'q'));
        assert!(event.is_ctrl(b'Q'));
        assert!(!event.is_ctrl(b'w'));
    }

    #[test]
    fn control_range_boundaries() {
        assert_eq!(KeyEvent::classify(0x00), KeyEvent::Control(0x00));
        assert_eq!(KeyEvent::classify(0x1F), KeyEvent::Control(0x1F));
        assert_eq!(KeyEvent::classify(0x20), KeyEvent::Printable(b' '));
        assert_eq!(KeyEvent::classify(0x7E), KeyEvent::Printable(b'~'));
        assert_eq!(KeyEvent::classify(0x7F), KeyEvent::Control(0x7F));
        assert_eq!(KeyEvent::classify(0xC3), KeyEvent::Printable(0xC3));
    }

    #[test]
    fn enter_and_tab_are_control() {
        assert_eq!(decode([bytes(b"\r")]).0, KeyEvent::Control(b'\r'));
        assert_eq!(decode([bytes(b"\t")]).0, KeyEvent::Control(b'\t'));
    }

    #[test]
    fn one_event_per_call() {
        let mut tty = ScriptedTty::with_input(b"ab");
        assert_eq!(decoder().next_event(&mut tty).unwrap(), KeyEvent::Printable(b'a'));
        assert_eq!(tty.remaining(), 1);
        assert_eq!(decoder().next_event(&mut tty).unwrap(), KeyEvent::Printable(b'b'));
    }

    // ── Arrow keys ──────────────────────────────────────────────────────

    #[test]
    fn arrow_up_consumes_three_bytes() {
        let (event, tty) = decode([bytes(b"\x1b[A")]);
        assert_eq!(event, KeyEvent::Arrow(Direction::Up));
        assert_eq!(tty.consumed, 3);
        assert_eq!(tty.remaining(), 0);
    }

    #[test]
    fn all_arrows() {
        assert_eq!(decode([bytes(b"\x1b[B")]).0, KeyEvent::Arrow(Direction::Down));
        assert_eq!(decode([bytes(b"\x1b[C")]).0, KeyEvent::Arrow(Direction::Right));
        assert_eq!(decode([bytes(b"\x1b[D")]).0, KeyEvent::Arrow(Direction::Left));
    }

    #[test]
    fn arrow_split_across_reads() {
        let (event, _) = decode([bytes(b"\x1b"), bytes(b"["), bytes(b"A")]);
        assert_eq!(event, KeyEvent::Arrow(Direction::Up));
    }

    #[test]
    fn arrow_leaves_following_keys() {
        let mut tty = ScriptedTty::with_input(b"\x1b[Cx");
        assert_eq!(
            decoder().next_event(&mut tty).unwrap(),
            KeyEvent::Arrow(Direction::Right)
        );
        assert_eq!(decoder().next_event(&mut tty).unwrap(), KeyEvent::Printable(b'x'));
    }

    // ── Bare Escape ─────────────────────────────────────────────────────

    #[test]
    fn lone_escape_then_timeout() {
        let (event, tty) = decode([bytes(b"\x1b"), Step::Timeout]);
        assert_eq!(event, KeyEvent::Escape);
        assert_eq!(tty.consumed, 1);
    }

    #[test]
    fn escape_bracket_then_timeout() {
        let (event, tty) = decode([bytes(b"\x1b["), Step::Timeout]);
        assert_eq!(event, KeyEvent::Escape);
        assert_eq!(tty.consumed, 2);
    }

    #[test]
    fn unrecognized_final_byte_is_escape() {
        let (event, tty) = decode([bytes(b"\x1b[Z")]);
        assert_eq!(event, KeyEvent::Escape);
        assert_eq!(tty.consumed, 3);
    }

    #[test]
    fn escape_followed_by_non_bracket() {
        let mut tty = ScriptedTty::with_input(b"\x1bOA");
        assert_eq!(decoder().next_event(&mut tty).unwrap(), KeyEvent::Escape);
        assert_eq!(tty.consumed, 3);
        assert_eq!(decoder().next_event(&mut tty).unwrap(), KeyEvent::WouldBlock);
    }

    #[test]
    fn escape_non_bracket_then_timeout() {
        let (event, tty) = decode([bytes(b"\x1bx"), Step::Timeout, bytes(b"y")]);
        assert_eq!(event, KeyEvent::Escape);
        assert_eq!(tty.consumed, 2);
        assert_eq!(tty.remaining(), 1);
    }

    // ── Timeouts and failures ───────────────────────────────────────────

    #[test]
    fn timeout_is_would_block() {
        let (event, _) = decode([Step::Timeout]);
        assert_eq!(event, KeyEvent::WouldBlock);
    }

    #[test]
    fn hang_up_is_eof() {
        let (event, _) = decode([Step::Eof]);
        assert_eq!(event, KeyEvent::Eof);
    }

    #[test]
    fn read_failure_is_device_error() {
        let mut tty = ScriptedTty::new([Step::Fail]);
        let err = decoder().next_event(&mut tty).unwrap_err();
        assert_eq!(err.op, "read");
    }

    #[test]
    fn signal_before_input_is_would_block() {
        let (event, tty) = decode([Step::Interrupt, bytes(b"a")]);
        assert_eq!(event, KeyEvent::WouldBlock);
        assert_eq!(tty.remaining(), 1);
    }

    #[test]
    fn signal_inside_sequence_keeps_arrow_whole() {
        let mut tty = ScriptedTty::new([
            bytes(b"\x1b"),
            Step::Interrupt,
            bytes(b"["),
            Step::Interrupt,
            bytes(b"B"),
        ]);
        assert_eq!(
            decoder().next_event(&mut tty).unwrap(),
            KeyEvent::Arrow(Direction::Down)
        );
        assert_eq!(decoder().next_event(&mut tty).unwrap(), KeyEvent::WouldBlock);
    }

    #[test]
    fn wait_event_skips_timeouts() {
        let mut tty = ScriptedTty::new([Step::Timeout, Step::Timeout, bytes(b"z")]);
        assert_eq!(decoder().wait_event(&mut tty).unwrap(), KeyEvent::Printable(b'z'));
    }

    // ── State machine in isolation ──────────────────────────────────────

    #[test]
    fn step_transitions() {
        use DecodeState::{Done, Idle, SawEscape, SawEscapeBracket, SawEscapeOther};
        assert_eq!(Idle.step(Some(ESC)), SawEscape);
        assert_eq!(SawEscape.step(Some(b'[')), SawEscapeBracket);
        assert_eq!(SawEscape.step(Some(b'O')), SawEscapeOther);
        assert_eq!(SawEscape.step(None), Done(KeyEvent::Escape));
        assert_eq!(SawEscapeOther.step(Some(b'A')), Done(KeyEvent::Escape));
        assert_eq!(SawEscapeOther.step(None), Done(KeyEvent::Escape));
        assert_eq!(SawEscapeBracket.step(None), Done(KeyEvent::Escape));
        assert_eq!(
            SawEscapeBracket.step(Some(b'A')),
            Done(KeyEvent::Arrow(Direction::Up))
        );
    }

    #[test]
    fn done_is_absorbing() {
        let done = DecodeState::Done(KeyEvent::Printable(b'a'));
        assert_eq!(done.step(Some(b'b')), done);
        assert_eq!(done.step(None), done);
    }
}
