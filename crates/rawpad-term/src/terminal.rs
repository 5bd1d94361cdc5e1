// SPDX-License-Identifier: MIT
//
// Raw mode session: capture, apply, and guaranteed restore.
//
// Safety: The process-exit handler is registered with `atexit` and the
// backup is restored with `tcsetattr`; both are FFI calls with no safe
// alternative.
#![allow(unsafe_code)]
//
// The terminal's line discipline is the one piece of process-wide state
// this crate touches, so every way out of the process has to put it back:
//
//   Normal return, `?` propagation, unwinding panic
//       → `RawModeSession` is dropped, `Drop` restores and clears.
//
//   Panic with `panic = "abort"`, or a panic hook that never returns
//       → our panic hook writes the emergency sequence and restores the
//         global backup before delegating to the original hook.
//
//   `std::process::exit` anywhere (destructors don't run)
//       → the `atexit` handler restores the global backup.
//
// The backup is armed by the device (`Tty::arm_restore`), so only the real
// terminal registers process-wide hooks. Scripted test devices keep
// everything local, and any number of independent sessions can exist in
// tests.
//
// The emergency sequence goes out through a raw write(2) on fd 1, the same
// path frames take, so neither handler touches `io::stdout()`.

use std::os::unix::io::RawFd;
use std::sync::{Mutex, Once};
use std::time::Duration;

use tracing::{info, warn};

use crate::ansi;
use crate::error::DeviceError;
use crate::output::write_once;
use crate::tty::{TerminalState, Tty, make_raw};

// ─── Process-Wide Restore ───────────────────────────────────────────────────

/// Global backup of the original configuration for exit and panic paths.
///
/// The session owns its own copy, but neither the panic hook nor the
/// `atexit` handler can reach it. Behind a [`Mutex`], not `static mut`.
static STATE_BACKUP: Mutex<Option<(RawFd, libc::termios)>> = Mutex::new(None);

/// Ensures the hooks are installed at most once per process.
static HOOKS_INSTALLED: Once = Once::new();

/// Clear screen, home cursor, show cursor. Written on abnormal exits so
/// the shell prompt lands on a clean screen.
const EMERGENCY_RESTORE: &[u8] = b"\x1b[2J\x1b[H\x1b[?25h";

/// Store `state` for restoration on `fd` and install the exit hooks.
pub(crate) fn arm_process_restore(fd: RawFd, state: &TerminalState) {
    if let Ok(mut guard) = STATE_BACKUP.lock() {
        *guard = Some((fd, *state.as_termios()));
    }
    install_hooks();
}

/// Forget the backup; the hooks become no-ops.
pub(crate) fn disarm_process_restore() {
    if let Ok(mut guard) = STATE_BACKUP.lock() {
        *guard = None;
    }
}

/// Restore and forget the backup. Best-effort, ignores errors.
///
/// Returns whether a backup was armed.
fn restore_from_backup() -> bool {
    let Ok(mut guard) = STATE_BACKUP.lock() else {
        return false;
    };
    let Some((fd, original)) = guard.take() else {
        return false;
    };
    unsafe {
        let _ = libc::tcsetattr(fd, libc::TCSAFLUSH, &raw const original);
    }
    true
}

/// Write [`EMERGENCY_RESTORE`] straight to fd 1.
fn emergency_write() {
    unsafe {
        let _ = libc::write(
            libc::STDOUT_FILENO,
            EMERGENCY_RESTORE.as_ptr().cast::<libc::c_void>(),
            EMERGENCY_RESTORE.len(),
        );
    }
}

extern "C" fn restore_at_exit() {
    if restore_from_backup() {
        emergency_write();
    }
}

fn install_hooks() {
    HOOKS_INSTALLED.call_once(|| {
        let original = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            if restore_from_backup() {
                emergency_write();
            }
            original(info);
        }));

        if unsafe { libc::atexit(restore_at_exit) } != 0 {
            warn!("could not register atexit terminal restore");
        }
    });
}

// ─── RawModeSession ─────────────────────────────────────────────────────────

/// Exclusive raw-mode control of a terminal, restored on drop.
///
/// The session owns the device; the geometry probe, key decoder, and
/// compositor borrow it through [`tty_mut`](Self::tty_mut).
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use rawpad_term::terminal::RawModeSession;
/// use rawpad_term::tty::StdTty;
///
/// let mut session = RawModeSession::enter(StdTty::new(), Duration::from_millis(100))?;
/// // ... probe geometry, render frames, decode keys ...
/// session.finish()?;
/// # Ok::<(), rawpad_term::error::DeviceError>(())
/// ```
pub struct RawModeSession<T: Tty> {
    tty: T,
    /// Configuration captured before entering raw mode. `None` once restored.
    original: Option<TerminalState>,
}

impl<T: Tty> RawModeSession<T> {
    /// Capture the current configuration, arm process-exit restoration,
    /// and switch the terminal to raw mode with reads bounded by
    /// `idle_timeout`.
    ///
    /// # Errors
    ///
    /// Reading or applying the configuration failed. If applying failed,
    /// the captured configuration has already been re-applied (best-effort).
    pub fn enter(mut tty: T, idle_timeout: Duration) -> Result<Self, DeviceError> {
        let original = tty.get_attrs().map_err(DeviceError::at("tcgetattr"))?;
        tty.arm_restore(&original);

        let raw = make_raw(&original, idle_timeout);
        if let Err(err) = tty.set_attrs(&raw) {
            if tty.set_attrs(&original).is_ok() {
                tty.disarm_restore();
            }
            return Err(DeviceError::new("tcsetattr", err));
        }

        info!(
            vtime = raw.timeout_deciseconds(),
            "entered raw mode"
        );
        Ok(Self {
            tty,
            original: Some(original),
        })
    }

    /// Whether raw mode is still in effect.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.original.is_some()
    }

    /// The configuration that [`exit`](Self::exit) will restore.
    #[must_use]
    pub const fn original(&self) -> Option<&TerminalState> {
        self.original.as_ref()
    }

    /// The underlying device.
    #[must_use]
    pub const fn tty(&self) -> &T {
        &self.tty
    }

    /// The underlying device, for reads and writes.
    pub const fn tty_mut(&mut self) -> &mut T {
        &mut self.tty
    }

    /// Restore the captured configuration.
    ///
    /// Idempotent: once restored, further calls do nothing.
    ///
    /// # Errors
    ///
    /// The OS rejected the restore. The session stays active (and the
    /// process-exit hook stays armed) so a later attempt can retry.
    pub fn exit(&mut self) -> Result<(), DeviceError> {
        let Some(original) = self.original else {
            return Ok(());
        };
        self.tty
            .set_attrs(&original)
            .map_err(DeviceError::at("tcsetattr"))?;
        self.tty.disarm_restore();
        self.original = None;
        info!("restored terminal configuration");
        Ok(())
    }

    /// Restore the configuration, then clear the screen and home the
    /// cursor so the terminal is left clean.
    ///
    /// Both steps are attempted even if the first fails; the first error
    /// is reported.
    ///
    /// # Errors
    ///
    /// Restoring or writing failed.
    pub fn finish(&mut self) -> Result<(), DeviceError> {
        let restored = self.exit();
        let cleared = clear_and_home(&mut self.tty);
        restored.and(cleared)
    }
}

impl<T: Tty> Drop for RawModeSession<T> {
    fn drop(&mut self) {
        if self.is_active() {
            if let Err(err) = self.finish() {
                warn!(error = %err, "terminal restore on drop failed");
            }
        }
    }
}

/// Clear the whole screen and home the cursor in one write.
fn clear_and_home<T: Tty>(tty: &mut T) -> Result<(), DeviceError> {
    let mut seq = Vec::with_capacity(8);
    ansi::clear_screen(&mut seq)
        .and_then(|()| ansi::cursor_home(&mut seq))
        .map_err(DeviceError::at("write"))?;
    write_once(tty, &seq)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
