//! The producer contract and the per-session context producers run in.

use std::sync::Arc;

use async_trait::async_trait;
use dossier_budget::{SessionBudget, estimate_size};
use dossier_core::error::BackendError;
use dossier_core::{Artifact, Error, ExpertiseLevel, GenerationBackend, Prompt, Result, SessionKey};
use dossier_store::SessionStore;
use tracing::{debug, warn};

/// A research contributor. Each role reads what the session already holds,
/// calls the backend, and commits its findings to the store.
#[async_trait]
pub trait ResearchProducer: Send + Sync {
    /// Stable role name, also used as the store `producer` field.
    fn role(&self) -> &str;

    /// Roles that must finish before this one starts.
    fn depends_on(&self) -> &[&'static str] {
        &[]
    }

    /// Run one contribution and return the artifacts it committed.
    async fn conduct_research(&self, ctx: &ResearchContext) -> Result<Vec<Artifact>>;
}

/// Everything a producer needs for one session.
#[derive(Clone)]
pub struct ResearchContext {
    pub key: SessionKey,
    pub expertise: ExpertiseLevel,
    pub store: Arc<SessionStore>,
    pub backend: Arc<dyn GenerationBackend>,
    pub budget: Arc<SessionBudget>,
    /// Output ceiling for each producer backend call.
    pub max_output_tokens: u32,
}

impl ResearchContext {
    /// One costed backend call against the session budget. A refused
    /// reservation is retried once at half the output ceiling.
    pub async fn ask(&self, prompt: &Prompt) -> Result<String> {
        let prompt_tokens = estimate_size(&prompt.render()) as u64;
        let mut ceiling = self.max_output_tokens;
        let reserved = loop {
            let reserved = prompt_tokens + u64::from(ceiling);
            match self.budget.track(reserved) {
                Ok(_) => break reserved,
                Err(Error::BudgetExceeded { .. }) if ceiling == self.max_output_tokens && ceiling > 1 => {
                    ceiling = (ceiling / 2).max(1);
                    warn!(session = %self.key, ceiling, "Budget refused producer call, retrying at half length");
                }
                Err(e) => return Err(e),
            }
        };

        match self.backend.generate(prompt, ceiling).await {
            Ok(text) if !text.trim().is_empty() => {
                let actual = prompt_tokens + estimate_size(&text) as u64;
                self.budget.settle(reserved, actual);
                debug!(session = %self.key, prompt_tokens, actual, "Producer call settled");
                Ok(text)
            }
            Ok(_) => {
                self.budget.settle(reserved, prompt_tokens);
                Err(Error::Backend(BackendError::EmptyOutput(
                    "producer call returned no text".into(),
                )))
            }
            Err(e) => {
                self.budget.settle(reserved, prompt_tokens);
                Err(Error::Backend(e))
            }
        }
    }
}
