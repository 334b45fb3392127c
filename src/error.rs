use crate::guidance::AngleId;

/// Errors surfaced by the guidance core and its collaborators.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum GuidanceError {
    /// Permission denied or no motion hardware. Surfaced as a flag, never mid-stream.
    #[error("motion sensor unavailable: {0}")]
    SensorUnavailable(String),
    #[error("capture failed: {0}")]
    CaptureFailure(String),
    #[error("angle target {id:?} is malformed: {reason}")]
    MalformedTarget { id: AngleId, reason: String },
    #[error("no active capture session")]
    NoActiveSession,
    #[error("unknown capture session {0}")]
    UnknownSession(String),
}
