use std::time::Duration;

use serde::Serialize;

use super::orientation::Orientation;
use super::scoring::GuidanceCategory;
use super::state::CountdownState;
use super::targets::AngleId;

/// Spoken prompt keys. Wording and language belong to the speech layer.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum VoicePrompt {
    Ready,
    Adjust,
    Success,
}

/// Instructions from the state machine to whoever owns the timers and camera.
#[derive(Debug, Clone, PartialEq)]
pub enum GuidanceEffect {
    CategoryChanged {
        category: GuidanceCategory,
        cue_interval: Duration,
    },
    CountdownStarted {
        epoch: u64,
    },
    CountdownCancelled,
    CountdownTick {
        remaining: u8,
    },
    TriggerCapture {
        angle: AngleId,
        manual: bool,
    },
    Voice(VoicePrompt),
    PhotoRecorded {
        angle: AngleId,
    },
    CaptureFailed {
        angle: AngleId,
        message: String,
    },
    AngleChanged {
        angle: AngleId,
    },
    SequenceComplete,
}

/// Outward notifications for the UI, speech and audio layers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GuidanceEvent {
    Cue {
        category: GuidanceCategory,
    },
    Voice {
        prompt: VoicePrompt,
    },
    #[serde(rename_all = "camelCase")]
    CountdownTick {
        remaining: u8,
    },
    CaptureTriggered {
        angle: AngleId,
        manual: bool,
    },
    PhotoCaptured {
        angle: AngleId,
    },
    CaptureFailed {
        angle: AngleId,
        message: String,
    },
    AngleChanged {
        angle: AngleId,
    },
    #[serde(rename_all = "camelCase")]
    SessionComplete {
        session_id: Option<String>,
    },
    SensorUnavailable {
        reason: String,
    },
}

/// Everything the capture screen renders from.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuidanceSnapshot {
    pub angle: AngleId,
    pub extra_assist: bool,
    pub orientation: Orientation,
    pub score: f64,
    pub category: GuidanceCategory,
    pub countdown: CountdownState,
    pub sensor_available: bool,
    pub sequence_complete: bool,
    pub session_id: Option<String>,
}
