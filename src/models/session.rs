use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::guidance::AngleId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CapturedPhoto {
    pub angle_id: AngleId,
    pub base64: String,
    pub captured_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// Graft count range and price band handed back by the estimator.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GraftEstimate {
    pub min: u32,
    pub max: u32,
    pub min_price: u64,
    pub max_price: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub locale: String,
    /// Capture order; at most one entry per angle.
    pub photos: Vec<CapturedPhoto>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graft_estimate: Option<GraftEstimate>,
}

impl CaptureSession {
    pub fn new(id: String, locale: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            created_at,
            locale: locale.into(),
            photos: Vec::new(),
            graft_estimate: None,
        }
    }

    /// Record a photo, dropping any earlier shot of the same angle.
    pub fn upsert_photo(&mut self, photo: CapturedPhoto) {
        self.photos.retain(|existing| existing.angle_id != photo.angle_id);
        self.photos.push(photo);
    }

    pub fn photo(&self, angle: AngleId) -> Option<&CapturedPhoto> {
        self.photos.iter().find(|photo| photo.angle_id == angle)
    }

    pub fn is_complete(&self) -> bool {
        crate::guidance::ANGLES
            .iter()
            .all(|target| self.photo(target.id).is_some())
    }
}
