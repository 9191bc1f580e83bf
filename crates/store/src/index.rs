//! Session index: enumerates every artifact of a corpus so listing never has
//! to parse artifact files.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use dossier_core::{Artifact, ArtifactId};
use serde::{Deserialize, Serialize};

use crate::layout::SessionPaths;

/// One artifact version as recorded in `meta/index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: ArtifactId,
    pub topic: String,
    pub subtopic: String,
    pub version: u32,
    pub producer: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    pub word_count: usize,
    pub confidence: f32,
    /// Relative to the session directory.
    pub path: PathBuf,
}

impl IndexEntry {
    pub fn from_artifact(artifact: &Artifact) -> Self {
        Self {
            id: artifact.id.clone(),
            topic: artifact.topic.clone(),
            subtopic: artifact.subtopic.clone(),
            version: artifact.version,
            producer: artifact.producer.clone(),
            author: artifact.author.clone(),
            title: artifact.title.clone(),
            created_at: artifact.created_at,
            word_count: artifact.word_count,
            confidence: artifact.confidence,
            path: SessionPaths::artifact_relative(
                &artifact.topic,
                &artifact.subtopic,
                artifact.version,
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionIndex {
    pub session_id: String,
    pub ticker: String,
    pub updated_at: DateTime<Utc>,
    /// In commit order.
    pub entries: Vec<IndexEntry>,
}

impl SessionIndex {
    pub fn total_words(&self) -> usize {
        self.entries.iter().map(|e| e.word_count).sum()
    }

    /// Distinct producers, in first-write order.
    pub fn producers(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&entry.producer) {
                seen.push(entry.producer.clone());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(producer: &str, words: usize) -> IndexEntry {
        IndexEntry {
            id: uuid::Uuid::new_v4().to_string(),
            topic: "t".into(),
            subtopic: "s".into(),
            version: 1,
            producer: producer.into(),
            author: producer.into(),
            title: None,
            created_at: Utc::now(),
            word_count: words,
            confidence: 0.5,
            path: PathBuf::from("t/s/v1.md"),
        }
    }

    #[test]
    fn summary_helpers() {
        let index = SessionIndex {
            session_id: "s1".into(),
            ticker: "AAPL".into(),
            updated_at: Utc::now(),
            entries: vec![entry("valuation", 10), entry("strategic", 5), entry("valuation", 1)],
        };
        assert_eq!(index.total_words(), 16);
        assert_eq!(index.producers(), vec!["valuation", "strategic"]);
    }
}
