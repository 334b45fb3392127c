pub mod config;
pub mod controller;
pub mod events;
pub mod orientation;
pub mod scoring;
pub mod state;
pub mod targets;

pub use config::{AngleWrap, GuidanceConfig};
pub use controller::GuidanceController;
pub use events::{GuidanceEffect, GuidanceEvent, GuidanceSnapshot, VoicePrompt};
pub use orientation::{calculate_orientation, MotionSample, Orientation};
pub use scoring::{alignment_score, score_percent, GuidanceCategory};
pub use state::{CountdownState, GuidanceState};
pub use targets::{AngleId, AngleTarget, ANGLES};
