//! File-backed, versioned knowledge store for Dossier.
//!
//! Each `(session_id, ticker)` pair is an isolated corpus with its own
//! directory, index, locks, and in-memory snapshot. Nothing is shared
//! between sessions; an artifact id from one session is simply unknown to
//! every other.
//!
//! Storage location: `<root>/sessions/<session>/<TICKER>/` (see [`layout`]).

pub mod index;
pub mod layout;
pub mod locks;
pub mod session;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dossier_core::{GenerationState, Result, SessionKey};
use tokio::sync::RwLock;
use tracing::{debug, info};

pub use index::{IndexEntry, SessionIndex};
pub use layout::SessionPaths;
pub use session::SessionStore;

/// Root of all session corpora.
///
/// Open sessions are cached; [`KnowledgeStore::close_session`] drops the
/// in-memory state once a session completes.
pub struct KnowledgeStore {
    root: PathBuf,
    lock_wait: Duration,
    sessions: RwLock<HashMap<SessionKey, Arc<SessionStore>>>,
}

impl KnowledgeStore {
    pub fn new(root: impl Into<PathBuf>, lock_wait: Duration) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "Knowledge store created");
        Self {
            root,
            lock_wait,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Open a session corpus, loading it from disk on first access.
    pub async fn open_session(&self, key: &SessionKey) -> Result<Arc<SessionStore>> {
        if let Some(store) = self.sessions.read().await.get(key) {
            return Ok(store.clone());
        }

        let mut sessions = self.sessions.write().await;
        if let Some(store) = sessions.get(key) {
            return Ok(store.clone());
        }
        let store = Arc::new(SessionStore::load(
            SessionPaths::new(&self.root, key),
            key.clone(),
            self.lock_wait,
        )?);
        sessions.insert(key.clone(), store.clone());
        info!(session = %key, "Session opened");
        Ok(store)
    }

    /// Drop a session's in-memory state. Files stay on disk.
    pub async fn close_session(&self, key: &SessionKey) -> bool {
        let closed = self.sessions.write().await.remove(key).is_some();
        if closed {
            info!(session = %key, "Session closed");
        }
        closed
    }

    pub async fn open_sessions(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Every session on disk that has an index.
    pub fn list_sessions(&self) -> Result<Vec<SessionKey>> {
        let sessions_dir = self.root.join("sessions");
        let mut keys = Vec::new();
        for session in read_dir_names(&sessions_dir)? {
            for ticker in read_dir_names(&sessions_dir.join(&session))? {
                if let Ok(key) = SessionKey::new(session.clone(), ticker) {
                    if SessionPaths::new(&self.root, &key).index().exists() {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Read a session's index from disk without opening it.
    pub fn read_index(&self, key: &SessionKey) -> Result<SessionIndex> {
        layout::read_json(&SessionPaths::new(&self.root, key).index())?
            .ok_or_else(|| dossier_core::Error::not_found("session", key.to_string()))
    }

    /// Read the persisted generation state, if the session has one.
    pub fn read_state(&self, key: &SessionKey) -> Result<Option<GenerationState>> {
        layout::read_json(&SessionPaths::new(&self.root, key).generation_state())
    }

    /// All `(session, ticker)` pairs recorded for a session id.
    pub fn tickers_for(&self, session_id: &str) -> Result<Vec<SessionKey>> {
        Ok(self
            .list_sessions()?
            .into_iter()
            .filter(|k| k.session_id == session_id)
            .collect())
    }
}

fn read_dir_names(dir: &Path) -> Result<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(layout::io_error("read directory", dir, e)),
    };
    Ok(entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::{ArtifactMetadata, Error};

    fn knowledge_store(dir: &Path) -> KnowledgeStore {
        KnowledgeStore::new(dir, Duration::from_millis(500))
    }

    #[tokio::test]
    async fn open_session_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let store = knowledge_store(dir.path());
        let key = SessionKey::new("s1", "AAPL").unwrap();
        let a = store.open_session(&key).await.unwrap();
        let b = store.open_session(&key).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(store.open_sessions().await, vec![key.clone()]);

        assert!(store.close_session(&key).await);
        assert!(!store.close_session(&key).await);
        assert!(store.open_sessions().await.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = knowledge_store(dir.path());
        let one = store
            .open_session(&SessionKey::new("s1", "AAPL").unwrap())
            .await
            .unwrap();
        let two = store
            .open_session(&SessionKey::new("s2", "AAPL").unwrap())
            .await
            .unwrap();

        let a = one
            .write("valuation", "valuation", "dcf", "private to s1", ArtifactMetadata::new("v"))
            .await
            .unwrap();

        assert!(matches!(two.get(&a.id).await, Err(Error::NotFound { .. })));
        assert!(two.read_all(None).await.is_empty());
        assert!(matches!(
            two.add_comment("x", &a.id, "cross-session").await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn reopened_session_has_same_latest_view() {
        let dir = tempfile::tempdir().unwrap();
        let key = SessionKey::new("s1", "MSFT").unwrap();
        let before = {
            let store = knowledge_store(dir.path());
            let session = store.open_session(&key).await.unwrap();
            for (sub, body) in [("dcf", "one"), ("dcf", "two"), ("moat", "three")] {
                session
                    .write("p", "analysis", sub, body, ArtifactMetadata::new("a"))
                    .await
                    .unwrap();
            }
            session.read_all(None).await
        };

        let store = knowledge_store(dir.path());
        let session = store.open_session(&key).await.unwrap();
        assert_eq!(session.read_all(None).await, before);
    }

    #[tokio::test]
    async fn listing_reads_index_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = knowledge_store(dir.path());
        let key = SessionKey::new("s9", "NVDA").unwrap();
        assert!(matches!(store.read_index(&key), Err(Error::NotFound { .. })));

        let session = store.open_session(&key).await.unwrap();
        session
            .write("p", "analysis", "moat", "text", ArtifactMetadata::new("a"))
            .await
            .unwrap();

        assert_eq!(store.list_sessions().unwrap(), vec![key.clone()]);
        assert_eq!(store.read_index(&key).unwrap().entries.len(), 1);
        assert_eq!(store.tickers_for("s9").unwrap().len(), 1);
        assert!(store.read_state(&key).unwrap().is_none());
    }
}
