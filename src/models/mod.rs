pub mod session;

pub use session::{CaptureSession, CapturedPhoto, GraftEstimate};
