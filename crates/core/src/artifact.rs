//! Research artifacts: the immutable, versioned unit of the knowledge store.
//!
//! An artifact is never edited in place. Writing to the same
//! `(topic, subtopic)` again produces a new version; older versions stay
//! available as history. Cross-references are plain id sets, resolved by
//! lookup in the owning session, so mutually-citing artifacts never form an
//! ownership cycle.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Artifact identifier (UUID v4, string form).
pub type ArtifactId = String;

/// Identifies one isolated session corpus: a session id plus the ticker
/// being researched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionKey {
    pub session_id: String,
    pub ticker: String,
}

impl SessionKey {
    /// Build a key, validating both parts as path segments.
    ///
    /// The ticker is upper-cased so `aapl` and `AAPL` share a corpus.
    pub fn new(session_id: impl Into<String>, ticker: impl Into<String>) -> Result<Self> {
        let session_id = session_id.into();
        let ticker = ticker.into().trim().to_uppercase();
        validate_segment("session_id", &session_id)?;
        validate_segment("ticker", &ticker)?;
        Ok(Self { session_id, ticker })
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.session_id, self.ticker)
    }
}

/// Caller-supplied metadata for a write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Who authored the content. Required.
    pub author: String,

    /// Optional human-readable title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Artifacts this one cites. Must already exist in the same session.
    #[serde(default)]
    pub cross_references: BTreeSet<ArtifactId>,

    /// Producer confidence in the content (0.0–1.0).
    #[serde(default = "default_confidence")]
    pub confidence: f32,

    /// Source labels backing the content, in citation order.
    #[serde(default)]
    pub data_sources: Vec<String>,
}

fn default_confidence() -> f32 {
    0.5
}

impl ArtifactMetadata {
    pub fn new(author: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            title: None,
            cross_references: BTreeSet::new(),
            confidence: default_confidence(),
            data_sources: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn with_sources(mut self, sources: impl IntoIterator<Item = String>) -> Self {
        self.data_sources.extend(sources);
        self
    }

    pub fn with_reference(mut self, id: impl Into<ArtifactId>) -> Self {
        self.cross_references.insert(id.into());
        self
    }

    /// Check the fields the store cannot repair on its own.
    pub fn validate(&self) -> Result<()> {
        if self.author.trim().is_empty() {
            return Err(Error::validation("artifact author is required"));
        }
        if !(0.0..=1.0).contains(&self.confidence) || self.confidence.is_nan() {
            return Err(Error::validation(format!(
                "confidence must be between 0.0 and 1.0, got {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

/// A committed, immutable research artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub id: ArtifactId,
    pub session_id: String,
    pub ticker: String,
    pub topic: String,
    pub subtopic: String,
    /// 1-based, strictly increasing per `(session, topic, subtopic)`.
    pub version: u32,
    /// The producer that wrote this artifact.
    pub producer: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub cross_references: BTreeSet<ArtifactId>,
    pub confidence: f32,
    #[serde(default)]
    pub data_sources: Vec<String>,
    pub word_count: usize,
    /// Body text. Not part of the on-disk header.
    #[serde(skip)]
    pub content: String,
}

impl Artifact {
    /// `topic/subtopic`, the versioning key inside a session.
    pub fn key(&self) -> String {
        format!("{}/{}", self.topic, self.subtopic)
    }

    /// Display title: explicit title or the key.
    pub fn display_title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.key())
    }
}

/// An append-only remark attached to an artifact in the same session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub target_artifact_id: ArtifactId,
    pub author: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// A directed link recorded after both artifacts were written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossReference {
    pub source: ArtifactId,
    pub target: ArtifactId,
    pub relationship: String,
    pub created_at: DateTime<Utc>,
}

/// Whitespace-delimited word count.
pub fn count_words(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Validate a value used as one directory level of the persisted layout.
pub fn validate_segment(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if value.starts_with('.') {
        return Err(Error::validation(format!(
            "{field} must not start with '.': {value}"
        )));
    }
    let valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if !valid {
        return Err(Error::validation(format!(
            "{field} may only contain ASCII letters, digits, '-', '_' and '.': {value}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_key_uppercases_ticker() {
        let key = SessionKey::new("abc-123", " msft ").unwrap();
        assert_eq!(key.ticker, "MSFT");
        assert_eq!(key.to_string(), "abc-123/MSFT");
    }

    #[test]
    fn session_key_rejects_traversal() {
        assert!(SessionKey::new("../etc", "AAPL").is_err());
        assert!(SessionKey::new("s1", "A/B").is_err());
        assert!(SessionKey::new("", "AAPL").is_err());
    }

    #[test]
    fn share_class_tickers_are_valid() {
        assert!(SessionKey::new("s1", "BRK.B").is_ok());
    }

    #[test]
    fn metadata_requires_author() {
        let meta = ArtifactMetadata::new("  ");
        assert!(matches!(meta.validate(), Err(Error::Validation(_))));
    }

    #[test]
    fn metadata_rejects_out_of_range_confidence() {
        let meta = ArtifactMetadata::new("valuation_agent").with_confidence(1.5);
        assert!(meta.validate().is_err());
        let meta = ArtifactMetadata::new("valuation_agent").with_confidence(0.8);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn word_count_ignores_extra_whitespace() {
        assert_eq!(count_words("  free   cash\nflow  "), 3);
        assert_eq!(count_words(""), 0);
    }
}
