use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use log::info;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::store::SessionStore;
use crate::camera::CapturedImage;
use crate::error::GuidanceError;
use crate::guidance::AngleId;
use crate::models::{CaptureSession, CapturedPhoto, GraftEstimate};

#[derive(Debug, Clone, Default)]
struct SessionBook {
    /// Newest first.
    sessions: Vec<CaptureSession>,
    active_id: Option<String>,
}

impl SessionBook {
    fn find_mut(&mut self, id: &str) -> Option<&mut CaptureSession> {
        self.sessions.iter_mut().find(|session| session.id == id)
    }

    fn active_mut(&mut self) -> Option<&mut CaptureSession> {
        let id = self.active_id.clone()?;
        self.find_mut(&id)
    }
}

/// In-memory session list with write-through persistence.
///
/// Every mutation is applied to a draft, the whole draft list is saved, and
/// only then does the draft replace the live list. A failed save leaves the
/// live list untouched.
#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    book: Arc<Mutex<SessionBook>>,
}

impl SessionManager {
    pub async fn load(store: Arc<dyn SessionStore>) -> Result<Self> {
        let sessions = store.load_sessions().await?;
        info!("Loaded {} capture sessions", sessions.len());

        Ok(Self {
            store,
            book: Arc::new(Mutex::new(SessionBook {
                sessions,
                active_id: None,
            })),
        })
    }

    pub async fn sessions(&self) -> Vec<CaptureSession> {
        self.book.lock().await.sessions.clone()
    }

    pub async fn get(&self, session_id: &str) -> Option<CaptureSession> {
        self.book
            .lock()
            .await
            .sessions
            .iter()
            .find(|session| session.id == session_id)
            .cloned()
    }

    pub async fn active_session_id(&self) -> Option<String> {
        self.book.lock().await.active_id.clone()
    }

    pub async fn active_session(&self) -> Option<CaptureSession> {
        let mut book = self.book.lock().await;
        book.active_mut().map(|session| session.clone())
    }

    pub async fn start_session(&self, locale: &str) -> Result<CaptureSession> {
        let session = CaptureSession::new(Uuid::new_v4().to_string(), locale, Utc::now());
        let created = session.clone();

        self.mutate(move |book| {
            book.active_id = Some(session.id.clone());
            book.sessions.insert(0, session);
            Ok(())
        })
        .await?;

        info!("Started capture session {} ({})", created.id, created.locale);
        Ok(created)
    }

    /// Reuse the active session, or start one if there is none.
    pub async fn ensure_active_session(&self, locale: &str) -> Result<CaptureSession> {
        if let Some(session) = self.active_session().await {
            return Ok(session);
        }
        self.start_session(locale).await
    }

    pub async fn set_active_session(&self, session_id: Option<&str>) -> Result<()> {
        let mut book = self.book.lock().await;
        match session_id {
            Some(id) if book.find_mut(id).is_none() => {
                Err(GuidanceError::UnknownSession(id.to_string()).into())
            }
            Some(id) => {
                book.active_id = Some(id.to_string());
                Ok(())
            }
            None => {
                book.active_id = None;
                Ok(())
            }
        }
    }

    /// Record a photo on the active session, replacing any earlier shot of `angle`.
    pub async fn append_photo(&self, angle: AngleId, image: CapturedImage) -> Result<CapturedPhoto> {
        let photo = CapturedPhoto {
            angle_id: angle,
            base64: image.base64,
            captured_at: Utc::now(),
            uri: image.uri,
        };
        let recorded = photo.clone();

        self.mutate(move |book| {
            let session = book.active_mut().ok_or(GuidanceError::NoActiveSession)?;
            session.upsert_photo(photo);
            Ok(())
        })
        .await?;

        Ok(recorded)
    }

    /// Close the active session, optionally attaching an estimate. Returns the closed session.
    pub async fn complete_session(
        &self,
        estimate: Option<GraftEstimate>,
    ) -> Result<Option<CaptureSession>> {
        self.mutate(move |book| {
            let Some(session) = book.active_mut() else {
                return Ok(None);
            };
            if estimate.is_some() {
                session.graft_estimate = estimate;
            }
            let closed = session.clone();
            book.active_id = None;
            Ok(Some(closed))
        })
        .await
    }

    pub async fn update_session_estimate(
        &self,
        session_id: &str,
        estimate: GraftEstimate,
    ) -> Result<()> {
        let session_id = session_id.to_string();
        self.mutate(move |book| {
            let session = book
                .find_mut(&session_id)
                .ok_or_else(|| GuidanceError::UnknownSession(session_id.clone()))?;
            session.graft_estimate = Some(estimate);
            Ok(())
        })
        .await
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool> {
        let session_id = session_id.to_string();
        self.mutate(move |book| {
            let before = book.sessions.len();
            book.sessions.retain(|session| session.id != session_id);
            if book.active_id.as_deref() == Some(session_id.as_str()) {
                book.active_id = None;
            }
            Ok(book.sessions.len() != before)
        })
        .await
    }

    pub async fn clear(&self) -> Result<()> {
        let mut book = self.book.lock().await;
        self.store.clear().await?;
        *book = SessionBook::default();
        Ok(())
    }

    async fn mutate<T, F>(&self, change: F) -> Result<T>
    where
        F: FnOnce(&mut SessionBook) -> Result<T>,
    {
        let mut book = self.book.lock().await;
        let mut draft = book.clone();
        let output = change(&mut draft)?;
        self.store.save_sessions(&draft.sessions).await?;
        *book = draft;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{JsonSessionStore, MemorySessionStore};
    use async_trait::async_trait;

    fn image(payload: &str) -> CapturedImage {
        CapturedImage {
            base64: payload.to_string(),
            uri: None,
        }
    }

    async fn manager() -> SessionManager {
        SessionManager::load(Arc::new(MemorySessionStore::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn new_sessions_are_prepended_and_active() {
        let manager = manager().await;
        let first = manager.start_session("en").await.unwrap();
        let second = manager.start_session("tr").await.unwrap();

        let ids: Vec<_> = manager.sessions().await.into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![second.id.clone(), first.id]);
        assert_eq!(manager.active_session_id().await, Some(second.id));
    }

    #[tokio::test]
    async fn one_photo_per_angle() {
        let manager = manager().await;
        manager.start_session("en").await.unwrap();
        manager.append_photo(AngleId::Front, image("a")).await.unwrap();
        manager.append_photo(AngleId::Top, image("b")).await.unwrap();
        manager.append_photo(AngleId::Front, image("c")).await.unwrap();

        let session = manager.active_session().await.unwrap();
        assert_eq!(session.photos.len(), 2);
        assert_eq!(session.photos[1].angle_id, AngleId::Front);
        assert_eq!(session.photos[1].base64, "c");
    }

    #[tokio::test]
    async fn photo_without_active_session_is_rejected() {
        let manager = manager().await;
        let err = manager
            .append_photo(AngleId::Front, image("a"))
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<GuidanceError>(),
            Some(&GuidanceError::NoActiveSession)
        );
    }

    #[tokio::test]
    async fn ensure_reuses_the_active_session() {
        let manager = manager().await;
        let first = manager.ensure_active_session("en").await.unwrap();
        let again = manager.ensure_active_session("tr").await.unwrap();
        assert_eq!(first.id, again.id);
        assert_eq!(manager.sessions().await.len(), 1);
    }

    #[tokio::test]
    async fn complete_keeps_prior_estimate_and_clears_active() {
        let manager = manager().await;
        let session = manager.start_session("en").await.unwrap();
        let estimate = GraftEstimate {
            min: 1800,
            max: 2200,
            min_price: 22500,
            max_price: 27500,
        };
        manager
            .update_session_estimate(&session.id, estimate)
            .await
            .unwrap();

        let closed = manager.complete_session(None).await.unwrap().unwrap();
        assert_eq!(closed.graft_estimate, Some(estimate));
        assert!(manager.active_session().await.is_none());
        assert!(manager.complete_session(None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_ids_are_errors() {
        let manager = manager().await;
        assert!(manager.set_active_session(Some("nope")).await.is_err());
        let estimate = GraftEstimate {
            min: 1,
            max: 2,
            min_price: 3,
            max_price: 4,
        };
        assert!(manager.update_session_estimate("nope", estimate).await.is_err());
        assert!(!manager.delete_session("nope").await.unwrap());
    }

    #[tokio::test]
    async fn every_mutation_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.json");
        let manager = SessionManager::load(Arc::new(JsonSessionStore::new(path.clone())))
            .await
            .unwrap();

        let session = manager.start_session("en").await.unwrap();
        manager.append_photo(AngleId::Donor, image("d")).await.unwrap();

        let reloaded = SessionManager::load(Arc::new(JsonSessionStore::new(path)))
            .await
            .unwrap();
        let stored = reloaded.get(&session.id).await.unwrap();
        assert_eq!(stored.photos.len(), 1);
        assert_eq!(stored.photos[0].angle_id, AngleId::Donor);
        // Active selection is process state, not persisted.
        assert!(reloaded.active_session().await.is_none());
    }

    #[tokio::test]
    async fn stored_session_can_be_resumed() {
        let earlier = CaptureSession::new("earlier".into(), "de", Utc::now());
        let store = MemorySessionStore::with_sessions(vec![earlier]);
        let manager = SessionManager::load(Arc::new(store)).await.unwrap();

        // Nothing is active until the user picks a session.
        assert!(manager.active_session().await.is_none());

        manager.set_active_session(Some("earlier")).await.unwrap();
        let resumed = manager.ensure_active_session("en").await.unwrap();
        assert_eq!(resumed.id, "earlier");
        assert_eq!(resumed.locale, "de");
        assert_eq!(manager.sessions().await.len(), 1);

        manager.append_photo(AngleId::Top, image("top")).await.unwrap();
        assert_eq!(manager.get("earlier").await.unwrap().photos.len(), 1);
    }

    struct FailingStore;

    #[async_trait]
    impl SessionStore for FailingStore {
        async fn load_sessions(&self) -> Result<Vec<CaptureSession>> {
            Ok(Vec::new())
        }

        async fn save_sessions(&self, _sessions: &[CaptureSession]) -> Result<()> {
            anyhow::bail!("disk full")
        }

        async fn clear(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn failed_save_leaves_list_untouched() {
        let manager = SessionManager::load(Arc::new(FailingStore)).await.unwrap();
        assert!(manager.start_session("en").await.is_err());
        assert!(manager.sessions().await.is_empty());
        assert!(manager.active_session_id().await.is_none());
    }
}
