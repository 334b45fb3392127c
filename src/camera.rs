use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use log::info;

use crate::error::GuidanceError;
use crate::guidance::AngleId;

/// Encoded still handed back by the camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedImage {
    pub base64: String,
    pub uri: Option<String>,
}

/// The device camera. Errors surface as a capture failure for the active angle.
#[async_trait]
pub trait CaptureDevice: Send + Sync {
    async fn capture(&self, angle: AngleId) -> Result<CapturedImage, GuidanceError>;
}

/// Stand-in camera for replay runs: no pixels, just a numbered uri per shot.
#[derive(Default)]
pub struct PlaceholderCamera {
    shots: AtomicU32,
}

impl PlaceholderCamera {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shots(&self) -> u32 {
        self.shots.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CaptureDevice for PlaceholderCamera {
    async fn capture(&self, angle: AngleId) -> Result<CapturedImage, GuidanceError> {
        let shot = self.shots.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Placeholder capture #{shot} for {angle}");
        Ok(CapturedImage {
            base64: String::new(),
            uri: Some(format!("placeholder://{angle}/{shot}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn placeholder_numbers_each_shot() {
        let camera = PlaceholderCamera::new();
        let first = camera.capture(AngleId::Front).await.unwrap();
        let second = camera.capture(AngleId::Top).await.unwrap();

        assert_eq!(first.uri.as_deref(), Some("placeholder://front/1"));
        assert_eq!(second.uri.as_deref(), Some("placeholder://top/2"));
        assert_eq!(camera.shots(), 2);
    }
}
