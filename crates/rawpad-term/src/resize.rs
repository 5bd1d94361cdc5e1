// SPDX-License-Identifier: MIT
#![allow(unsafe_code)]
//
// Terminal resize notification.
//
// A SIGWINCH handler sets an `AtomicBool`; the application loop checks it
// between key events and re-derives the geometry with the OS query only.
// The position-report fallback is never used after startup because its
// reply would interleave with keystrokes the decoder is already reading.
//
// The handler is installed without SA_RESTART, so a resize interrupts a
// pending poll() and the loop sees the new size without waiting out the
// idle timeout.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::geometry::{ScreenGeometry, query_os};
use crate::tty::Tty;

/// Set by the SIGWINCH handler, cleared by [`take_resize`].
static RESIZED: AtomicBool = AtomicBool::new(false);

static HANDLER_INSTALLED: Once = Once::new();

/// Install the SIGWINCH handler (once per process).
pub fn install_resize_handler() {
    HANDLER_INSTALLED.call_once(|| unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = sigwinch_handler as *const () as usize;
        sa.sa_flags = 0;
        libc::sigemptyset(&raw mut sa.sa_mask);
        libc::sigaction(libc::SIGWINCH, &raw const sa, std::ptr::null_mut());
    });
}

extern "C" fn sigwinch_handler(_sig: libc::c_int) {
    RESIZED.store(true, Ordering::Relaxed);
}

/// Whether a resize happened since the last call. Clears the flag.
pub fn take_resize() -> bool {
    RESIZED.swap(false, Ordering::Relaxed)
}

/// If a resize is pending, re-query the size.
///
/// Returns the new geometry when it differs from `current`; a failed or
/// degenerate query keeps the old one.
pub fn poll_resize<T: Tty>(tty: &T, current: ScreenGeometry) -> Option<ScreenGeometry> {
    if !take_resize() {
        return None;
    }
    let geometry = query_os(tty).filter(|g| *g != current)?;
    debug!(rows = geometry.rows, cols = geometry.cols, "terminal resized");
    Some(geometry)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
