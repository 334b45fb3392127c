use serde::{Deserialize, Serialize};

use super::config::AngleWrap;
use super::orientation::Orientation;
use super::targets::AngleTarget;

/// Deviation at which an axis earns no alignment credit.
const SATURATION_DEG: f64 = 25.0;

const LOCKED_ABOVE: f64 = 0.90;
const ALMOST_ABOVE: f64 = 0.75;
const ADJUST_ABOVE: f64 = 0.50;

/// Discrete guidance tier, ordered from worst to best.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum GuidanceCategory {
    Far,
    Adjust,
    Almost,
    Locked,
}

impl GuidanceCategory {
    /// The single classifier for scores. Lower bounds are exclusive.
    pub fn from_score(score: f64) -> Self {
        if score > LOCKED_ABOVE {
            GuidanceCategory::Locked
        } else if score > ALMOST_ABOVE {
            GuidanceCategory::Almost
        } else if score > ADJUST_ABOVE {
            GuidanceCategory::Adjust
        } else {
            GuidanceCategory::Far
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GuidanceCategory::Locked => "locked",
            GuidanceCategory::Almost => "almost",
            GuidanceCategory::Adjust => "adjust",
            GuidanceCategory::Far => "far",
        }
    }
}

impl Default for GuidanceCategory {
    fn default() -> Self {
        GuidanceCategory::Far
    }
}

/// Score how closely `orientation` matches `target`, in `[0, 1]` to two decimals.
pub fn alignment_score(orientation: &Orientation, target: &AngleTarget, wrap: AngleWrap) -> f64 {
    let pitch = axis_credit(axis_delta(orientation.pitch, target.target_pitch, wrap));
    let roll = axis_credit(axis_delta(orientation.roll, target.target_roll, wrap));
    let yaw = axis_credit(axis_delta(orientation.yaw, target.target_yaw, wrap));

    round_two((pitch + roll + yaw) / 3.0)
}

/// Score as a whole percentage for display.
pub fn score_percent(score: f64) -> u8 {
    (score * 100.0).round().clamp(0.0, 100.0) as u8
}

fn axis_delta(actual: f64, target: f64, wrap: AngleWrap) -> f64 {
    let delta = (actual - target).abs();
    match wrap {
        AngleWrap::Linear => delta,
        AngleWrap::Shortest => {
            let reduced = delta % 360.0;
            reduced.min(360.0 - reduced)
        }
    }
}

fn axis_credit(delta: f64) -> f64 {
    1.0 - (delta / SATURATION_DEG).clamp(0.0, 1.0)
}

fn round_two(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
