//! In-process registry of running sessions.
//!
//! Status is polled through here; cancellation is requested through here.
//! Entries are removed when a session finishes, whatever the outcome.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dossier_core::{CancellationFlag, Error, GenerationState, Result, SessionKey};
use dossier_synthesis::ProgressHandle;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Live handles for one running session.
#[derive(Clone)]
pub struct SessionHandle {
    pub progress: ProgressHandle,
    pub cancel: CancellationFlag,
    pub started_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session. A key can only run once at a time.
    pub async fn register(&self, key: &SessionKey, handle: SessionHandle) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(key) {
            return Err(Error::validation(format!("session {key} is already running")));
        }
        sessions.insert(key.clone(), handle);
        debug!(session = %key, "Session registered");
        Ok(())
    }

    /// Current generation state of a running session.
    pub async fn status(&self, key: &SessionKey) -> Option<GenerationState> {
        self.sessions
            .read()
            .await
            .get(key)
            .map(|h| h.progress.snapshot())
    }

    /// Request cancellation; takes effect at the next section boundary.
    pub async fn cancel(&self, key: &SessionKey) -> bool {
        match self.sessions.read().await.get(key) {
            Some(handle) => {
                handle.cancel.cancel();
                info!(session = %key, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    pub async fn remove(&self, key: &SessionKey) -> bool {
        self.sessions.write().await.remove(key).is_some()
    }

    pub async fn active(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> SessionHandle {
        SessionHandle {
            progress: ProgressHandle::new(GenerationState::new("s1", 4)),
            cancel: CancellationFlag::new(),
            started_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn register_status_cancel_remove() {
        let registry = SessionRegistry::new();
        let key = SessionKey::new("s1", "acme").unwrap();
        let h = handle();
        registry.register(&key, h.clone()).await.unwrap();

        h.progress.update(|s| s.advance());
        assert_eq!(registry.status(&key).await.unwrap().sections_completed, 1);

        assert!(registry.cancel(&key).await);
        assert!(h.cancel.is_cancelled());

        assert_eq!(registry.active().await, vec![key.clone()]);
        assert!(registry.remove(&key).await);
        assert!(registry.status(&key).await.is_none());
        assert!(!registry.cancel(&key).await);
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let registry = SessionRegistry::new();
        let key = SessionKey::new("s1", "acme").unwrap();
        registry.register(&key, handle()).await.unwrap();
        assert!(matches!(
            registry.register(&key, handle()).await,
            Err(Error::Validation(_))
        ));
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = SessionRegistry::new();
        let a = SessionKey::new("s1", "acme").unwrap();
        let b = SessionKey::new("s2", "acme").unwrap();
        let (ha, hb) = (handle(), handle());
        registry.register(&a, ha.clone()).await.unwrap();
        registry.register(&b, hb.clone()).await.unwrap();

        registry.cancel(&a).await;
        assert!(ha.cancel.is_cancelled());
        assert!(!hb.cancel.is_cancelled());
    }
}
