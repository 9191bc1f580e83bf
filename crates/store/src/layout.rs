//! On-disk layout of a session corpus.
//!
//! ```text
//! <root>/sessions/<session>/<TICKER>/
//! ├── <topic>/<subtopic>/v<version>.md   YAML front-matter + body
//! ├── meta/index.json                    artifact listing
//! ├── meta/comments.jsonl                append-only
//! ├── meta/cross_references.jsonl        append-only
//! ├── meta/generation_state.json         status for polling
//! └── report/                            delivered documents
//! ```
//!
//! Whole-file writes go through a temp file and a rename so readers never
//! observe a half-written artifact or index.

use std::io::Write;
use std::path::{Path, PathBuf};

use dossier_core::{Artifact, Error, Result, SessionKey};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::warn;

const FRONT_MATTER_FENCE: &str = "---\n";

/// Paths for one `(session, ticker)` corpus.
#[derive(Debug, Clone)]
pub struct SessionPaths {
    dir: PathBuf,
}

impl SessionPaths {
    pub fn new(root: &Path, key: &SessionKey) -> Self {
        Self {
            dir: root
                .join("sessions")
                .join(&key.session_id)
                .join(&key.ticker),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of one artifact version, relative to the session directory.
    pub fn artifact_relative(topic: &str, subtopic: &str, version: u32) -> PathBuf {
        PathBuf::from(topic)
            .join(subtopic)
            .join(format!("v{version}.md"))
    }

    pub fn resolve(&self, relative: &Path) -> PathBuf {
        self.dir.join(relative)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.dir.join("meta")
    }

    pub fn index(&self) -> PathBuf {
        self.meta_dir().join("index.json")
    }

    pub fn comments(&self) -> PathBuf {
        self.meta_dir().join("comments.jsonl")
    }

    pub fn cross_references(&self) -> PathBuf {
        self.meta_dir().join("cross_references.jsonl")
    }

    pub fn generation_state(&self) -> PathBuf {
        self.meta_dir().join("generation_state.json")
    }

    pub fn report(&self, ticker: &str, extension: &str) -> PathBuf {
        self.dir
            .join("report")
            .join(format!("{ticker}_report.{extension}"))
    }
}

pub(crate) fn io_error(action: &str, path: &Path, e: std::io::Error) -> Error {
    Error::Storage(format!("Failed to {action} {}: {e}", path.display()))
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create directory", parent, e))?;
    }
    Ok(())
}

/// Write `bytes` to `path` via a sibling temp file and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    ensure_parent(path)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("artifact");
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));

    std::fs::write(&tmp, bytes).map_err(|e| io_error("write", &tmp, e))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(io_error("rename into", path, e));
    }
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_vec_pretty(value)?;
    write_atomic(path, &json)
}

/// Read a JSON file. `Ok(None)` when it does not exist.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(io_error("read", path, e)),
    }
}

/// Append one JSON line to an append-only log.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| io_error("open", path, e))?;
    file.write_all(line.as_bytes())
        .map_err(|e| io_error("append to", path, e))
}

/// Load a JSONL log, skipping corrupted lines.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return Vec::new(),
    };

    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<T>(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping corrupted log line");
                None
            }
        })
        .collect()
}

/// Render an artifact file: YAML header, fence, body.
pub fn encode_artifact(artifact: &Artifact) -> Result<String> {
    let header = serde_yaml::to_string(artifact)
        .map_err(|e| Error::Storage(format!("Failed to encode artifact header: {e}")))?;
    let mut out = String::with_capacity(header.len() + artifact.content.len() + 16);
    out.push_str(FRONT_MATTER_FENCE);
    out.push_str(&header);
    if !header.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(FRONT_MATTER_FENCE);
    out.push_str(&artifact.content);
    Ok(out)
}

/// Parse an artifact file produced by [`encode_artifact`].
pub fn decode_artifact(raw: &str) -> Result<Artifact> {
    let rest = raw
        .strip_prefix(FRONT_MATTER_FENCE)
        .ok_or_else(|| Error::Storage("artifact file has no front-matter".into()))?;
    let end = rest
        .find("\n---\n")
        .ok_or_else(|| Error::Storage("artifact front-matter is not terminated".into()))?;

    let mut artifact: Artifact = serde_yaml::from_str(&rest[..=end])
        .map_err(|e| Error::Storage(format!("Failed to parse artifact header: {e}")))?;
    artifact.content = rest[end + 5..].to_string();
    Ok(artifact)
}
