// SPDX-License-Identifier: MIT
//
// rawpad: a minimal full-screen terminal program.
//
// This is the application loop on top of rawpad-term:
//
//   enter raw mode → probe geometry (before any key is read, so the
//   position report can't be mistaken for keystrokes) → loop { render
//   one frame if dirty → decode one key → update viewer } → restore.
//
// Fatal errors unwind through `?`. The session guard is dropped on the
// way out (configuration restored, screen cleared, cursor homed) before
// main prints the diagnostic, so it lands on a usable terminal.

mod app;
mod settings;

use std::process;

use anyhow::{Context, bail};
use rawpad_term::config::TermConfig;
use rawpad_term::error::Error as TermError;
use rawpad_term::output::FrameCompositor;
use rawpad_term::resize::{install_resize_handler, poll_resize};
use rawpad_term::terminal::RawModeSession;
use rawpad_term::tty::StdTty;
use tracing::{error, info, warn};

use crate::app::{Action, Viewer};
use crate::settings::{Settings, init_logging};

fn main() {
    let settings = Settings::load().unwrap_or_else(|e| {
        eprintln!("rawpad: {e:#}");
        process::exit(1);
    });
    init_logging(&settings.log);
    info!("rawpad starting");

    if let Err(e) = run(&settings.terminal) {
        error!("fatal: {e:#}");
        eprintln!("rawpad: {e:#}");
        process::exit(1);
    }
    info!("rawpad exiting");
}

fn run(cfg: &TermConfig) -> anyhow::Result<()> {
    let tty = StdTty::new();
    if !tty.is_tty() {
        bail!("stdin is not a terminal");
    }

    let mut session =
        RawModeSession::enter(tty, cfg.idle_timeout()).context("entering raw mode")?;

    let geometry = match (cfg.probe().probe(session.tty_mut()), cfg.default_geometry) {
        (Ok(geometry), _) => geometry,
        (Err(TermError::Protocol(err)), Some(fallback)) => {
            warn!(error = %err, rows = fallback.rows, cols = fallback.cols, "using default geometry");
            fallback
        }
        (Err(err), _) => return Err(err).context("probing screen geometry"),
    };
    info!(rows = geometry.rows, cols = geometry.cols, "screen geometry");

    install_resize_handler();

    let decoder = cfg.decoder();
    let mut compositor = FrameCompositor::new(geometry);
    let mut viewer = Viewer::new(geometry);
    let mut dirty = true;

    loop {
        if let Some(resized) = poll_resize(session.tty(), compositor.geometry()) {
            compositor.resize(resized);
            viewer.resize(resized);
            dirty = true;
        }

        if dirty {
            let rows = viewer.rows();
            compositor
                .render(session.tty_mut(), viewer.cursor(), rows.as_slice())
                .context("rendering frame")?;
            dirty = false;
        }

        let event = decoder
            .next_event(session.tty_mut())
            .context("reading key")?;
        match viewer.handle(event) {
            Action::Idle => {}
            Action::Redraw => dirty = true,
            Action::Quit => break,
        }
    }

    session.finish().context("restoring terminal")?;
    Ok(())
}
