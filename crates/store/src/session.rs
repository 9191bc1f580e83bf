//! One isolated session corpus.
//!
//! Committed artifacts live in an in-memory snapshot that mirrors the files
//! on disk. A write assembles and persists its artifact file while holding
//! only its key lock, then publishes to the snapshot under a short write
//! lock. Readers therefore never wait on an in-flight write, and only ever
//! see artifacts whose files are complete.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use dossier_core::artifact::{count_words, validate_segment};
use dossier_core::{
    Artifact, ArtifactId, ArtifactMetadata, Comment, CrossReference, Error, GenerationState,
    Result, SessionKey,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::index::{IndexEntry, SessionIndex};
use crate::layout::{self, SessionPaths};
use crate::locks::KeyLocks;

/// Committed state of a corpus.
#[derive(Debug, Default)]
struct Corpus {
    /// Commit order.
    artifacts: Vec<Artifact>,
    by_id: HashMap<ArtifactId, usize>,
    comments: Vec<Comment>,
    links: Vec<CrossReference>,
}

impl Corpus {
    fn insert(&mut self, artifact: Artifact) {
        self.by_id.insert(artifact.id.clone(), self.artifacts.len());
        self.artifacts.push(artifact);
    }

    fn get(&self, id: &str) -> Option<&Artifact> {
        self.by_id.get(id).map(|&i| &self.artifacts[i])
    }

    fn latest_version(&self, topic: &str, subtopic: &str) -> u32 {
        self.artifacts
            .iter()
            .filter(|a| a.topic == topic && a.subtopic == subtopic)
            .map(|a| a.version)
            .max()
            .unwrap_or(0)
    }

    /// Highest version per `(topic, subtopic)`, ordered by creation time.
    fn latest_view(&self) -> Vec<&Artifact> {
        let mut latest: BTreeMap<(&str, &str), &Artifact> = BTreeMap::new();
        for artifact in &self.artifacts {
            let key = (artifact.topic.as_str(), artifact.subtopic.as_str());
            match latest.get(&key) {
                Some(current) if current.version >= artifact.version => {}
                _ => {
                    latest.insert(key, artifact);
                }
            }
        }
        let mut view: Vec<&Artifact> = latest.into_values().collect();
        view.sort_by_key(|a| (a.created_at, self.by_id.get(&a.id).copied()));
        view
    }

    fn index(&self, key: &SessionKey) -> SessionIndex {
        SessionIndex {
            session_id: key.session_id.clone(),
            ticker: key.ticker.clone(),
            updated_at: Utc::now(),
            entries: self.artifacts.iter().map(IndexEntry::from_artifact).collect(),
        }
    }
}

/// The knowledge store scoped to one `(session_id, ticker)`.
pub struct SessionStore {
    key: SessionKey,
    paths: SessionPaths,
    locks: KeyLocks,
    corpus: RwLock<Corpus>,
    /// Serializes index and log writes.
    meta_io: Mutex<()>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("key", &self.key)
            .field("dir", &self.paths.dir())
            .finish()
    }
}

impl SessionStore {
    /// Load a session from disk, or start it empty when nothing is there yet.
    pub(crate) fn load(paths: SessionPaths, key: SessionKey, lock_wait: Duration) -> Result<Self> {
        let mut corpus = Corpus::default();

        if let Some(index) = layout::read_json::<SessionIndex>(&paths.index())? {
            for entry in &index.entries {
                let path = paths.resolve(&entry.path);
                let raw = match std::fs::read_to_string(&path) {
                    Ok(raw) => raw,
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Indexed artifact is missing, skipping");
                        continue;
                    }
                };
                match layout::decode_artifact(&raw) {
                    Ok(artifact) if artifact.id == entry.id => corpus.insert(artifact),
                    Ok(_) => warn!(path = %path.display(), "Artifact id does not match index, skipping"),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping corrupted artifact"),
                }
            }
        }
        corpus.comments = layout::read_jsonl(&paths.comments());
        corpus.links = layout::read_jsonl(&paths.cross_references());

        debug!(
            session = %key,
            artifacts = corpus.artifacts.len(),
            comments = corpus.comments.len(),
            "Session corpus loaded"
        );

        Ok(Self {
            key,
            paths,
            locks: KeyLocks::new(lock_wait),
            corpus: RwLock::new(corpus),
            meta_io: Mutex::new(()),
        })
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    pub fn dir(&self) -> &std::path::Path {
        self.paths.dir()
    }

    /// Commit a new artifact version for `(topic, subtopic)`.
    pub async fn write(
        &self,
        producer: &str,
        topic: &str,
        subtopic: &str,
        content: &str,
        metadata: ArtifactMetadata,
    ) -> Result<Artifact> {
        if producer.trim().is_empty() {
            return Err(Error::validation("producer is required"));
        }
        validate_segment("topic", topic)?;
        validate_segment("subtopic", subtopic)?;
        if content.trim().is_empty() {
            return Err(Error::validation(format!(
                "content for {topic}/{subtopic} is empty"
            )));
        }
        metadata.validate()?;

        let key = format!("{topic}/{subtopic}");
        let _guard = self.locks.acquire(&key).await?;

        let version = {
            let corpus = self.corpus.read().await;
            if let Some(missing) = metadata
                .cross_references
                .iter()
                .find(|id| corpus.get(id.as_str()).is_none())
            {
                return Err(Error::not_found("artifact", missing.clone()));
            }
            corpus.latest_version(topic, subtopic) + 1
        };

        let content = content.to_string();
        let artifact = Artifact {
            id: Uuid::new_v4().to_string(),
            session_id: self.key.session_id.clone(),
            ticker: self.key.ticker.clone(),
            topic: topic.to_string(),
            subtopic: subtopic.to_string(),
            version,
            producer: producer.to_string(),
            author: metadata.author,
            title: metadata.title,
            created_at: Utc::now(),
            cross_references: metadata.cross_references,
            confidence: metadata.confidence,
            data_sources: metadata.data_sources,
            word_count: count_words(&content),
            content,
        };

        let path = self.paths.resolve(&SessionPaths::artifact_relative(topic, subtopic, version));
        layout::write_atomic(&path, layout::encode_artifact(&artifact)?.as_bytes())?;

        // The index is written first so a failed commit is never visible.
        {
            let _io = self.meta_io.lock().await;
            let mut index = self.corpus.read().await.index(&self.key);
            index.entries.push(IndexEntry::from_artifact(&artifact));
            if let Err(e) = layout::write_json(&self.paths.index(), &index) {
                let _ = std::fs::remove_file(&path);
                warn!(session = %self.key, key = %key, version, error = %e, "Index write failed, artifact discarded");
                return Err(e);
            }
            self.corpus.write().await.insert(artifact.clone());
        }

        info!(
            session = %self.key,
            producer,
            key = %key,
            version,
            words = artifact.word_count,
            "Artifact committed"
        );
        Ok(artifact)
    }

    /// Latest view of the corpus rendered as one text, ordered by creation
    /// time, optionally leaving out one producer's artifacts.
    pub async fn read_all(&self, excluding_producer: Option<&str>) -> String {
        let corpus = self.corpus.read().await;
        corpus
            .latest_view()
            .into_iter()
            .filter(|a| excluding_producer != Some(a.producer.as_str()))
            .map(render_artifact)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Highest version per `(topic, subtopic)`, ordered by creation time.
    pub async fn latest(&self) -> Vec<Artifact> {
        let corpus = self.corpus.read().await;
        corpus.latest_view().into_iter().cloned().collect()
    }

    /// Every committed version of one key, ascending.
    pub async fn history(&self, topic: &str, subtopic: &str) -> Vec<Artifact> {
        let corpus = self.corpus.read().await;
        let mut versions: Vec<Artifact> = corpus
            .artifacts
            .iter()
            .filter(|a| a.topic == topic && a.subtopic == subtopic)
            .cloned()
            .collect();
        versions.sort_by_key(|a| a.version);
        versions
    }

    /// All committed artifacts in commit order.
    pub async fn artifacts(&self) -> Vec<Artifact> {
        self.corpus.read().await.artifacts.clone()
    }

    pub async fn get(&self, id: &str) -> Result<Artifact> {
        self.corpus
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found("artifact", id))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.corpus.read().await.get(id).is_some()
    }

    /// Attach a comment to an artifact of this session.
    pub async fn add_comment(&self, producer: &str, target: &str, body: &str) -> Result<Comment> {
        if producer.trim().is_empty() {
            return Err(Error::validation("comment author is required"));
        }
        if body.trim().is_empty() {
            return Err(Error::validation("comment body is empty"));
        }
        if !self.contains(target).await {
            return Err(Error::not_found("artifact", target));
        }

        let comment = Comment {
            id: Uuid::new_v4().to_string(),
            target_artifact_id: target.to_string(),
            author: producer.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };

        {
            let _io = self.meta_io.lock().await;
            layout::append_jsonl(&self.paths.comments(), &comment)?;
        }
        self.corpus.write().await.comments.push(comment.clone());
        debug!(session = %self.key, target, "Comment added");
        Ok(comment)
    }

    pub async fn comments(&self, target: &str) -> Vec<Comment> {
        self.corpus
            .read()
            .await
            .comments
            .iter()
            .filter(|c| c.target_artifact_id == target)
            .cloned()
            .collect()
    }

    /// Record a directed link between two existing artifacts.
    pub async fn link(
        &self,
        source: &str,
        target: &str,
        relationship: &str,
    ) -> Result<CrossReference> {
        if relationship.trim().is_empty() {
            return Err(Error::validation("relationship is required"));
        }
        {
            let corpus = self.corpus.read().await;
            for id in [source, target] {
                if corpus.get(id).is_none() {
                    return Err(Error::not_found("artifact", id));
                }
            }
        }

        let edge = CrossReference {
            source: source.to_string(),
            target: target.to_string(),
            relationship: relationship.to_string(),
            created_at: Utc::now(),
        };
        {
            let _io = self.meta_io.lock().await;
            layout::append_jsonl(&self.paths.cross_references(), &edge)?;
        }
        self.corpus.write().await.links.push(edge.clone());
        Ok(edge)
    }

    /// Outgoing references of an artifact: those declared at write time plus
    /// those linked afterwards.
    pub async fn get_cross_references(&self, id: &str) -> Result<BTreeSet<ArtifactId>> {
        let corpus = self.corpus.read().await;
        let artifact = corpus
            .get(id)
            .ok_or_else(|| Error::not_found("artifact", id))?;
        let mut refs = artifact.cross_references.clone();
        refs.extend(
            corpus
                .links
                .iter()
                .filter(|l| l.source == id)
                .map(|l| l.target.clone()),
        );
        Ok(refs)
    }

    /// Incoming references: artifacts that cite `id`.
    pub async fn cited_by(&self, id: &str) -> Result<BTreeSet<ArtifactId>> {
        let corpus = self.corpus.read().await;
        if corpus.get(id).is_none() {
            return Err(Error::not_found("artifact", id));
        }
        let mut refs: BTreeSet<ArtifactId> = corpus
            .artifacts
            .iter()
            .filter(|a| a.cross_references.contains(id))
            .map(|a| a.id.clone())
            .collect();
        refs.extend(
            corpus
                .links
                .iter()
                .filter(|l| l.target == id)
                .map(|l| l.source.clone()),
        );
        Ok(refs)
    }

    /// Index entries for every committed version.
    pub async fn list(&self) -> Vec<IndexEntry> {
        self.corpus.read().await.index(&self.key).entries
    }

    /// Persist the generation state next to the corpus for external polling.
    pub async fn save_state(&self, state: &GenerationState) -> Result<()> {
        let _io = self.meta_io.lock().await;
        layout::write_json(&self.paths.generation_state(), state)
    }

    /// Write the delivered document and return its path.
    pub async fn save_report(&self, extension: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.paths.report(&self.key.ticker, extension);
        layout::write_atomic(&path, bytes)?;
        info!(session = %self.key, path = %path.display(), "Report written");
        Ok(path)
    }
}

fn render_artifact(artifact: &Artifact) -> String {
    format!(
        "## {} (v{})\n[artifact: {} | producer: {} | author: {}]\n\n{}",
        artifact.display_title(),
        artifact.version,
        artifact.id,
        artifact.producer,
        artifact.author,
        artifact.content.trim()
    )
}
