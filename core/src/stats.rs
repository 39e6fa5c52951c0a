//! Human-readable statistic rows
//!
//! Subsystems turn their counters into [`DebugStat`] rows so that tools and
//! overlays can print them without knowing each stats struct.

use splatstorm_shared::MathStatsSnapshot;

/// A single named statistic.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugStat {
    /// Display name for the stat
    pub name: String,
    /// Current value as a formatted string
    pub value: String,
}

impl DebugStat {
    /// Create a new debug stat with a string value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Create a debug stat from a numeric value.
    pub fn number(name: impl Into<String>, value: impl std::fmt::Display) -> Self {
        Self {
            name: name.into(),
            value: value.to_string(),
        }
    }

    /// Milliseconds with two decimals
    pub fn millis(name: impl Into<String>, ms: f32) -> Self {
        Self {
            name: name.into(),
            value: format!("{ms:.2} ms"),
        }
    }

    /// Create a debug stat for a byte count, formatted as KB/MB.
    pub fn bytes(name: impl Into<String>, bytes: usize) -> Self {
        let value = if bytes >= 1024 * 1024 {
            format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
        } else if bytes >= 1024 {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        } else {
            format!("{} B", bytes)
        };
        Self {
            name: name.into(),
            value,
        }
    }
}

impl std::fmt::Display for DebugStat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:<24} {}", self.name, self.value)
    }
}

/// Rows for the fixed-point counters
pub fn math_debug_stats(stats: &MathStatsSnapshot) -> Vec<DebugStat> {
    vec![
        DebugStat::number("Math operations", stats.operations),
        DebugStat::number("Math overflows", stats.overflows),
        DebugStat::number("Math underflows", stats.underflows),
    ]
}
