pub mod controller;
pub mod loop_worker;
pub mod source;

pub use controller::SensingController;
pub use source::{MotionSampleSource, ScriptedMotionSource};
