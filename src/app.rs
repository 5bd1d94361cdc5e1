// SPDX-License-Identifier: MIT
//
// Key viewer: the application state behind the main loop.
//
// Every decoded key is logged with its byte value (and character, if
// printable), newest at the bottom. Arrow keys move the on-screen cursor.
// Ctrl-Q quits. No I/O happens here: the loop in main.rs feeds events in
// and pulls rows and a cursor out for the compositor.

use std::collections::VecDeque;

use rawpad_term::geometry::ScreenGeometry;
use rawpad_term::input::{Direction, KeyEvent};
use rawpad_term::output::CursorPosition;

/// Maximum number of events kept in the scrolling log.
const MAX_LOG_ENTRIES: usize = 1000;

/// First row of every frame.
const HEADER: &str = "rawpad key viewer (Ctrl-Q to quit)";

/// What the loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Nothing changed.
    Idle,
    /// State changed; render a new frame.
    Redraw,
    /// Leave the loop.
    Quit,
}

/// The viewer state.
pub struct Viewer {
    geometry: ScreenGeometry,
    cursor: CursorPosition,
    log: VecDeque<String>,
}

impl Viewer {
    pub fn new(geometry: ScreenGeometry) -> Self {
        Self {
            geometry,
            cursor: CursorPosition::default(),
            log: VecDeque::with_capacity(64),
        }
    }

    /// Apply one key event.
    pub fn handle(&mut self, event: KeyEvent) -> Action {
        match event {
            KeyEvent::WouldBlock => return Action::Idle,
            KeyEvent::Eof => return Action::Quit,
            e if e.is_ctrl(b'q') => return Action::Quit,
            KeyEvent::Arrow(direction) => self.move_cursor(direction),
            _ => {}
        }
        self.push_log(describe(event));
        Action::Redraw
    }

    /// Adopt a new screen size, keeping the cursor on screen.
    pub fn resize(&mut self, geometry: ScreenGeometry) {
        self.geometry = geometry;
        self.cursor = self.cursor.clamp_to(geometry);
    }

    pub const fn cursor(&self) -> CursorPosition {
        self.cursor
    }

    /// Content rows for the next frame: the header, then as many of the
    /// newest log entries as fit.
    pub fn rows(&self) -> Vec<String> {
        let visible = usize::from(self.geometry.rows).saturating_sub(1);
        let skip = self.log.len().saturating_sub(visible);

        let mut rows = Vec::with_capacity(visible + 1);
        rows.push(HEADER.to_owned());
        rows.extend(self.log.iter().skip(skip).cloned());
        rows
    }

    fn move_cursor(&mut self, direction: Direction) {
        let c = &mut self.cursor;
        match direction {
            Direction::Up => c.row = c.row.saturating_sub(1),
            Direction::Down => c.row = c.row.saturating_add(1),
            Direction::Left => c.col = c.col.saturating_sub(1),
            Direction::Right => c.col = c.col.saturating_add(1),
        }
        self.cursor = self.cursor.clamp_to(self.geometry);
    }

    fn push_log(&mut self, entry: String) {
        if self.log.len() >= MAX_LOG_ENTRIES {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }
}

/// One log line per event: the byte value, plus the character for
/// printable bytes and the caret form for control bytes.
fn describe(event: KeyEvent) -> String {
    match event {
        KeyEvent::Printable(b) if b.is_ascii() => format!("{b} ('{}')", char::from(b)),
        KeyEvent::Printable(b) => format!("{b}"),
        KeyEvent::Control(b) => format!("{b} (^{})", char::from(b ^ 0x40)),
        KeyEvent::Arrow(direction) => format!("arrow {direction:?}"),
        KeyEvent::Escape => "escape".to_owned(),
        KeyEvent::WouldBlock => "idle".to_owned(),
        KeyEvent::Eof => "end of input".to_owned(),
    }
}

// ─── Tests ──────────────────────────────────────────────────────────────────
