use serde::{Deserialize, Serialize};

use crate::error::GuidanceError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AngleId {
    Front,
    Right45,
    Left45,
    Top,
    Donor,
}

impl AngleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AngleId::Front => "front",
            AngleId::Right45 => "right45",
            AngleId::Left45 => "left45",
            AngleId::Top => "top",
            AngleId::Donor => "donor",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        ANGLES
            .iter()
            .map(|target| target.id)
            .find(|id| id.as_str() == value)
    }

    pub fn target(&self) -> &'static AngleTarget {
        // ANGLES is indexed in capture order and covers every id.
        &ANGLES[self.index()]
    }

    pub fn index(&self) -> usize {
        match self {
            AngleId::Front => 0,
            AngleId::Right45 => 1,
            AngleId::Left45 => 2,
            AngleId::Top => 3,
            AngleId::Donor => 4,
        }
    }

    /// Next angle in the capture sequence, `None` after `donor`.
    pub fn next(&self) -> Option<AngleId> {
        ANGLES.get(self.index() + 1).map(|target| target.id)
    }

    pub fn is_last(&self) -> bool {
        self.next().is_none()
    }
}

impl Default for AngleId {
    fn default() -> Self {
        AngleId::Front
    }
}

impl std::fmt::Display for AngleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target pose for one capture angle, in degrees.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AngleTarget {
    pub id: AngleId,
    pub target_pitch: f64,
    pub target_roll: f64,
    pub target_yaw: f64,
    /// Top and donor shots get supplementary on-screen guidance.
    pub extra_assist: bool,
}

impl AngleTarget {
    /// Targets must be finite and within one turn on every axis.
    pub fn validate(&self) -> Result<(), GuidanceError> {
        let axes = [
            ("pitch", self.target_pitch),
            ("roll", self.target_roll),
            ("yaw", self.target_yaw),
        ];
        for (axis, value) in axes {
            if !value.is_finite() || value.abs() > 180.0 {
                return Err(GuidanceError::MalformedTarget {
                    id: self.id,
                    reason: format!("{axis} target {value} outside [-180, 180]"),
                });
            }
        }
        Ok(())
    }
}

pub const ANGLES: [AngleTarget; 5] = [
    AngleTarget {
        id: AngleId::Front,
        target_pitch: 0.0,
        target_roll: 0.0,
        target_yaw: 0.0,
        extra_assist: false,
    },
    AngleTarget {
        id: AngleId::Right45,
        target_pitch: 0.0,
        target_roll: 0.0,
        target_yaw: 45.0,
        extra_assist: false,
    },
    AngleTarget {
        id: AngleId::Left45,
        target_pitch: 0.0,
        target_roll: 0.0,
        target_yaw: -45.0,
        extra_assist: false,
    },
    AngleTarget {
        id: AngleId::Top,
        target_pitch: -90.0,
        target_roll: 0.0,
        target_yaw: 0.0,
        extra_assist: true,
    },
    AngleTarget {
        id: AngleId::Donor,
        target_pitch: 0.0,
        target_roll: 180.0,
        target_yaw: 0.0,
        extra_assist: true,
    },
];
