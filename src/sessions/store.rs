use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::models::CaptureSession;

/// Persistence seam for the session list. The whole list goes in and out.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_sessions(&self) -> Result<Vec<CaptureSession>>;

    async fn save_sessions(&self, sessions: &[CaptureSession]) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// Keeps the list in process memory. Used by tests and throwaway runs.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<Vec<CaptureSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sessions(sessions: Vec<CaptureSession>) -> Self {
        Self {
            sessions: Mutex::new(sessions),
        }
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load_sessions(&self) -> Result<Vec<CaptureSession>> {
        Ok(self.sessions.lock().await.clone())
    }

    async fn save_sessions(&self, sessions: &[CaptureSession]) -> Result<()> {
        *self.sessions.lock().await = sessions.to_vec();
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.sessions.lock().await.clear();
        Ok(())
    }
}
