// SPDX-License-Identifier: MIT
//
// Terminal tuning knobs, loadable from the `[terminal]` table of a TOML
// config file. Every field has a default, so an empty table is valid.

use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::geometry::{DEFAULT_FAR_MOVE, DEFAULT_REPORT_BUDGET, GeometryProbe, ScreenGeometry};
use crate::input::KeyDecoder;

/// Timing and protocol settings for the terminal core.
///
/// ```toml
/// [terminal]
/// idle_timeout_ms = 100
/// position_report_budget = 32
/// far_move_cells = 999
/// default_geometry = { rows = 24, cols = 80 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TermConfig {
    /// Upper bound on every read, and the Escape-key latency.
    pub idle_timeout_ms: u64,
    /// Maximum bytes read while waiting for a cursor position report.
    pub position_report_budget: usize,
    /// Cells to move right and down before requesting the report.
    pub far_move_cells: u16,
    /// Geometry to use when probing fails. Without it, a failed probe
    /// aborts startup. Both dimensions must be non-zero.
    #[serde(deserialize_with = "non_degenerate")]
    pub default_geometry: Option<ScreenGeometry>,
}

impl Default for TermConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 100,
            position_report_budget: DEFAULT_REPORT_BUDGET,
            far_move_cells: DEFAULT_FAR_MOVE,
            default_geometry: None,
        }
    }
}

fn non_degenerate<'de, D>(deserializer: D) -> Result<Option<ScreenGeometry>, D::Error>
where
    D: Deserializer<'de>,
{
    let geometry = ScreenGeometry::deserialize(deserializer)?;
    if geometry.is_degenerate() {
        return Err(de::Error::custom(format!(
            "default_geometry must be non-zero, got {}x{}",
            geometry.rows, geometry.cols
        )));
    }
    Ok(Some(geometry))
}

impl TermConfig {
    /// Parse a `TermConfig` from TOML text (the table's contents, not a
    /// whole file).
    ///
    /// # Errors
    ///
    /// The text is not valid TOML or a field has the wrong type.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// The idle timeout as a `Duration`.
    #[must_use]
    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// A geometry probe configured from these settings.
    #[must_use]
    pub const fn probe(&self) -> GeometryProbe {
        GeometryProbe::new(self.idle_timeout())
            .far_move(self.far_move_cells)
            .budget(self.position_report_budget)
    }

    /// A key decoder configured from these settings.
    #[must_use]
    pub const fn decoder(&self) -> KeyDecoder {
        KeyDecoder::new(self.idle_timeout())
    }
}
