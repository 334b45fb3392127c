use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::scoring::GuidanceCategory;

/// How per-axis deltas are measured against the target.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AngleWrap {
    /// Plain `|a - b|`; 179 vs -179 is 358 degrees apart.
    Linear,
    /// Shortest way around the circle; 179 vs -179 is 2 degrees apart.
    Shortest,
}

impl Default for AngleWrap {
    fn default() -> Self {
        AngleWrap::Linear
    }
}

/// Timing and tuning for the guidance loop.
#[derive(Debug, Clone)]
pub struct GuidanceConfig {
    /// Countdown length in ticks once the pose locks.
    pub countdown_ticks: u8,
    pub tick_interval: Duration,
    pub sample_interval: Duration,
    /// Minimum gap between "adjust" voice prompts while far off target.
    pub voice_throttle: Duration,

    /// Cue cadence per guidance category
    pub cue_locked: Duration,
    pub cue_almost: Duration,
    pub cue_adjust: Duration,
    pub cue_far: Duration,

    pub angle_wrap: AngleWrap,
    /// Log every sample at info level.
    pub debug_samples: bool,
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            countdown_ticks: 3,
            tick_interval: Duration::from_secs(1),
            sample_interval: Duration::from_millis(100),
            voice_throttle: Duration::from_secs(4),
            cue_locked: Duration::from_millis(600),
            cue_almost: Duration::from_millis(900),
            cue_adjust: Duration::from_millis(1400),
            cue_far: Duration::from_millis(2100),
            angle_wrap: AngleWrap::Linear,
            debug_samples: false,
        }
    }
}

impl GuidanceConfig {
    /// Defaults plus `CAPTURE_GUIDE_DEBUG` and `CAPTURE_GUIDE_SAMPLE_MS` overrides.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        config.debug_samples = std::env::var("CAPTURE_GUIDE_DEBUG")
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if let Some(ms) = std::env::var("CAPTURE_GUIDE_SAMPLE_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|ms| *ms > 0)
        {
            config.sample_interval = Duration::from_millis(ms);
        }

        config
    }

    pub fn cue_interval(&self, category: GuidanceCategory) -> Duration {
        match category {
            GuidanceCategory::Locked => self.cue_locked,
            GuidanceCategory::Almost => self.cue_almost,
            GuidanceCategory::Adjust => self.cue_adjust,
            GuidanceCategory::Far => self.cue_far,
        }
    }
}
