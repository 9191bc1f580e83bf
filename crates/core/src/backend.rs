//! External collaborator contracts: the text-generation backend and the
//! document compiler.
//!
//! Both are narrow on purpose. The pipeline decides budgets, retries, and
//! fallbacks; implementations only move text in and bytes out.
//!
//! Implementations: OpenAI-compatible HTTP backend, external-command compiler,
//! markdown passthrough (see `dossier-providers`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, CompileError};
use crate::expertise::ExpertiseLevel;

/// A generation prompt: standing instructions plus the task body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    /// Standing instructions (role, tone, format rules).
    pub system: String,
    /// The task itself, including any context excerpts.
    pub user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Flatten into one string, e.g. for size estimation.
    pub fn render(&self) -> String {
        if self.system.is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.system.contains(needle) || self.user.contains(needle)
    }
}

/// The text-generation backend.
///
/// Every call carries an explicit output ceiling; there is no unbounded
/// variant.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// A human-readable name (e.g. "openai", "scripted").
    fn name(&self) -> &str;

    /// Generate text for `prompt`, producing at most `target_token_budget`
    /// output tokens.
    async fn generate(
        &self,
        prompt: &Prompt,
        target_token_budget: u32,
    ) -> std::result::Result<String, BackendError>;

    /// Health check: can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}

/// Turns final markdown into a distributable binary (PDF, DOCX, ...).
#[async_trait]
pub trait DocumentCompiler: Send + Sync {
    fn name(&self) -> &str;

    /// File extension of the compiled output, without the dot.
    fn extension(&self) -> &str;

    async fn compile(
        &self,
        markdown: &str,
        expertise: ExpertiseLevel,
    ) -> std::result::Result<Vec<u8>, CompileError>;
}
