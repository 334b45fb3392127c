use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{error, info};
use tokio::fs;

use super::store::SessionStore;
use crate::models::CaptureSession;

/// Session list kept as one pretty-printed JSON array on disk.
pub struct JsonSessionStore {
    path: PathBuf,
}

impl JsonSessionStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SessionStore for JsonSessionStore {
    async fn load_sessions(&self) -> Result<Vec<CaptureSession>> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to read sessions from {}", self.path.display())
                })
            }
        };

        // A corrupt file should not brick the app; start over with an empty list.
        match serde_json::from_str(&contents) {
            Ok(sessions) => Ok(sessions),
            Err(err) => {
                error!(
                    "Failed to parse sessions at {}: {err}; starting empty",
                    self.path.display()
                );
                Ok(Vec::new())
            }
        }
    }

    async fn save_sessions(&self, sessions: &[CaptureSession]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await.with_context(|| {
                format!("failed to create session directory {}", parent.display())
            })?;
        }

        let serialized = serde_json::to_string_pretty(sessions)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, serialized)
            .await
            .with_context(|| format!("Failed to write sessions to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &self.path)
            .await
            .with_context(|| format!("Failed to replace {}", self.path.display()))
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => {
                info!("Cleared sessions at {}", self.path.display());
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err)
                .with_context(|| format!("Failed to remove {}", self.path.display())),
        }
    }
}
