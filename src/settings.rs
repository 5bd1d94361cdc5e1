// SPDX-License-Identifier: MIT
//
// Settings file and log setup.
//
// The config lives at `$RAWPAD_CONFIG`, or `~/.rawpad/config.toml`. A
// missing file means defaults; a broken one is a startup error.
//
// Logs go to a file (`~/.rawpad/rawpad.log` unless configured). They can
// never go to stdout or stderr: those are the screen we are drawing on.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use rawpad_term::config::TermConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Env var naming an explicit config file.
const CONFIG_ENV: &str = "RAWPAD_CONFIG";

/// Env var with a tracing filter that overrides `log.level`.
const LOG_ENV: &str = "RAWPAD_LOG";

/// Whole-file configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub terminal: TermConfig,
    pub log: LogConfig,
}

/// `[log]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `"info"` or `"rawpad_term=trace"`.
    pub level: String,
    /// Log file path; defaults to `~/.rawpad/rawpad.log`.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

impl Settings {
    /// Load from the configured location.
    pub fn load() -> anyhow::Result<Self> {
        let path = env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .or_else(|| home_dir().map(|dir| dir.join("config.toml")));

        match path {
            Some(path) if path.exists() => Self::from_file(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

/// `~/.rawpad`, if `$HOME` is set.
fn home_dir() -> Option<PathBuf> {
    env::var_os("HOME").map(|home| PathBuf::from(home).join(".rawpad"))
}

/// Install a file-backed subscriber. Logging stays off if the file can't
/// be opened.
pub fn init_logging(cfg: &LogConfig) {
    let Some(path) = cfg.file.clone().or_else(|| home_dir().map(|dir| dir.join("rawpad.log")))
    else {
        return;
    };

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let Ok(file) = fs::OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_new(&cfg.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}
