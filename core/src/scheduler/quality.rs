//! Discrete quality levels and the adaptive level state machine

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

/// Samples kept in the rolling FPS window
pub const FPS_HISTORY_LEN: usize = 60;

/// Operating point bounding splat count and batch size.
///
/// Ordered from lowest to highest, so `Ultra > High > ... > Fallback`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum QualityLevel {
    Fallback,
    Low,
    Medium,
    #[default]
    High,
    Ultra,
}

impl QualityLevel {
    /// All levels, lowest first
    pub const ALL: [QualityLevel; 5] = [
        Self::Fallback,
        Self::Low,
        Self::Medium,
        Self::High,
        Self::Ultra,
    ];

    /// Most splats processed in one frame
    pub const fn max_splats(self) -> usize {
        match self {
            Self::Ultra => 16_000,
            Self::High => 12_000,
            Self::Medium => 8_000,
            Self::Low => 4_000,
            Self::Fallback => 1_000,
        }
    }

    /// Splats per transform/upload cycle
    pub const fn batch_size(self) -> usize {
        match self {
            Self::Ultra => 512,
            Self::High => 256,
            Self::Medium => 128,
            Self::Low => 64,
            Self::Fallback => 32,
        }
    }

    /// Next level up, `None` at the top
    pub fn up(self) -> Option<Self> {
        match self {
            Self::Fallback => Some(Self::Low),
            Self::Low => Some(Self::Medium),
            Self::Medium => Some(Self::High),
            Self::High => Some(Self::Ultra),
            Self::Ultra => None,
        }
    }

    /// Next level down, `None` at the bottom
    pub fn down(self) -> Option<Self> {
        match self {
            Self::Fallback => None,
            Self::Low => Some(Self::Fallback),
            Self::Medium => Some(Self::Low),
            Self::High => Some(Self::Medium),
            Self::Ultra => Some(Self::High),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Fallback => "fallback",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Ultra => "ultra",
        }
    }
}

impl fmt::Display for QualityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QualityLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown quality level '{s}'"))
    }
}

// ============================================================================
// FPS History
// ============================================================================

/// Fixed-length circular buffer of FPS samples. Zero entries are unfilled.
#[derive(Debug, Clone, PartialEq)]
pub struct FpsHistory {
    samples: [f32; FPS_HISTORY_LEN],
    next: usize,
}

impl Default for FpsHistory {
    fn default() -> Self {
        Self {
            samples: [0.0; FPS_HISTORY_LEN],
            next: 0,
        }
    }
}

impl FpsHistory {
    pub fn push(&mut self, fps: f32) {
        // Non-finite samples would poison the average forever
        let fps = if fps.is_finite() { fps.max(0.0) } else { 0.0 };
        self.samples[self.next] = fps;
        self.next = (self.next + 1) % FPS_HISTORY_LEN;
    }

    /// Mean of the non-zero samples, `None` if there are none
    pub fn average(&self) -> Option<f32> {
        let (sum, n) = self
            .samples
            .iter()
            .filter(|&&s| s > 0.0)
            .fold((0.0f32, 0u32), |(sum, n), &s| (sum + s, n + 1));
        (n > 0).then(|| sum / n as f32)
    }

    pub fn clear(&mut self) {
        self.samples = [0.0; FPS_HISTORY_LEN];
        self.next = 0;
    }
}

// ============================================================================
// Quality State
// ============================================================================

/// Outcome of a level evaluation or manual change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QualityChange {
    Held,
    Upgraded { from: QualityLevel, to: QualityLevel },
    Downgraded { from: QualityLevel, to: QualityLevel },
}

impl QualityChange {
    pub fn is_change(self) -> bool {
        self != Self::Held
    }
}

/// Thresholds on `avg_fps / target_fps`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityThresholds {
    /// Move up at or above this ratio
    pub upgrade: f32,
    /// Move down below this ratio
    pub downgrade: f32,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            upgrade: 1.1,
            downgrade: 0.9,
        }
    }
}

/// Current level plus everything needed to decide the next one.
#[derive(Debug, Clone)]
pub struct QualityState {
    level: QualityLevel,
    adaptive: bool,
    target_fps: f32,
    thresholds: QualityThresholds,
    history: FpsHistory,
    upgrades: u32,
    downgrades: u32,
}

impl QualityState {
    pub fn new(level: QualityLevel, target_fps: f32, adaptive: bool) -> Self {
        Self {
            level,
            adaptive,
            target_fps,
            thresholds: QualityThresholds::default(),
            history: FpsHistory::default(),
            upgrades: 0,
            downgrades: 0,
        }
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn level(&self) -> QualityLevel {
        self.level
    }

    pub fn target_fps(&self) -> f32 {
        self.target_fps
    }

    pub fn is_adaptive(&self) -> bool {
        self.adaptive
    }

    pub fn set_adaptive(&mut self, adaptive: bool) {
        self.adaptive = adaptive;
    }

    pub fn upgrades(&self) -> u32 {
        self.upgrades
    }

    pub fn downgrades(&self) -> u32 {
        self.downgrades
    }

    /// Total level changes in either direction
    pub fn adjustments(&self) -> u32 {
        self.upgrades + self.downgrades
    }

    pub fn history(&self) -> &FpsHistory {
        &self.history
    }

    pub fn record_fps(&mut self, fps: f32) {
        self.history.push(fps);
    }

    /// Jump straight to `level`, counting it like an adaptive change.
    pub fn set_level(&mut self, level: QualityLevel) -> QualityChange {
        let from = self.level;
        let change = match level.cmp(&from) {
            std::cmp::Ordering::Equal => return QualityChange::Held,
            std::cmp::Ordering::Greater => {
                self.upgrades += 1;
                QualityChange::Upgraded { from, to: level }
            }
            std::cmp::Ordering::Less => {
                self.downgrades += 1;
                QualityChange::Downgraded { from, to: level }
            }
        };
        self.level = level;
        info!(%from, to = %level, "Quality level changed");
        change
    }

    /// One adaptive step: at most one level per call.
    pub fn evaluate(&mut self) -> QualityChange {
        if !self.adaptive || self.target_fps <= 0.0 {
            return QualityChange::Held;
        }
        let Some(avg_fps) = self.history.average() else {
            return QualityChange::Held;
        };

        let ratio = avg_fps / self.target_fps;
        let next = if ratio >= self.thresholds.upgrade {
            self.level.up()
        } else if ratio < self.thresholds.downgrade {
            self.level.down()
        } else {
            None
        };

        match next {
            Some(level) => self.set_level(level),
            None => QualityChange::Held,
        }
    }
}
