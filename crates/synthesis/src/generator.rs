//! Chunked, strictly sequential section generation.
//!
//! ```text
//!   outline ──► for each section (in order):
//!                 cancelled? ──► mark the rest skipped
//!                 excerpt  ◄── relevance map over the corpus
//!                 prompt   ◄── outline header + rolling context + excerpt
//!                 reserve  ──► session budget (one retry at half length)
//!                 generate ──► backend, section timeout, backoff on transient
//!                 ok:   append to rolling context, trim to budget
//!                 fail: placeholder + error log entry
//!                 advance progress
//! ```
//!
//! Section N only ever sees what sections 1..N-1 actually produced.
//! Placeholders never enter the rolling context.

use std::sync::Arc;
use std::time::Duration;

use dossier_budget::{SessionBudget, estimate_size, trim_to_budget};
use dossier_config::AppConfig;
use dossier_core::error::BackendError;
use dossier_core::{
    Artifact, ArtifactId, CancellationFlag, Error, ExpertiseLevel, GenerationBackend, Result,
    RetryPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::planner::SectionSpec;
use crate::progress::ProgressHandle;
use crate::prompt::{SectionPrompt, outline_header};
use crate::relevance::{RelevanceMap, TieBreak};

/// Body of a section whose generation failed.
pub const PLACEHOLDER: &str = "_Generation incomplete for this section._";

/// Knobs for one generation run.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub base_length_tokens: u32,
    pub per_call_cap_tokens: u32,
    pub rolling_context_tokens: usize,
    pub excerpt_tokens: usize,
    /// Section-level retries for transient backend failures.
    pub retry: RetryPolicy,
    /// Wall-clock limit for one backend call.
    pub section_timeout: Duration,
    pub tie_break: TieBreak,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            base_length_tokens: 1_500,
            per_call_cap_tokens: 8_000,
            rolling_context_tokens: 12_000,
            excerpt_tokens: 16_000,
            retry: RetryPolicy::default(),
            section_timeout: Duration::from_secs(300),
            tie_break: TieBreak::Shared,
        }
    }
}

impl GeneratorSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let generation = &config.generation;
        Ok(Self {
            base_length_tokens: generation.base_length_tokens,
            per_call_cap_tokens: generation.per_call_cap_tokens,
            rolling_context_tokens: config.budget.rolling_context_tokens,
            excerpt_tokens: config.budget.excerpt_tokens,
            retry: RetryPolicy::new(
                generation.max_retries,
                Duration::from_millis(generation.backoff_base_ms),
                Duration::from_millis(generation.backoff_max_ms),
            ),
            section_timeout: Duration::from_secs(generation.section_timeout_secs),
            tie_break: generation.tie_break.parse()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SectionOutcome {
    Generated,
    Placeholder { reason: String },
    /// Never attempted because the run was cancelled first.
    Skipped,
}

/// One section of the document, in final order.
#[derive(Debug, Clone)]
pub struct GeneratedSection {
    pub spec: SectionSpec,
    pub body: String,
    pub outcome: SectionOutcome,
    /// Artifacts whose text was in this section's excerpt.
    pub sources: Vec<ArtifactId>,
    pub attempts: u32,
}

impl GeneratedSection {
    fn placeholder(spec: &SectionSpec, reason: String, attempts: u32) -> Self {
        Self {
            spec: spec.clone(),
            body: PLACEHOLDER.to_string(),
            outcome: SectionOutcome::Placeholder { reason },
            sources: Vec::new(),
            attempts,
        }
    }

    fn skipped(spec: &SectionSpec) -> Self {
        Self {
            spec: spec.clone(),
            body: PLACEHOLDER.to_string(),
            outcome: SectionOutcome::Skipped,
            sources: Vec::new(),
            attempts: 0,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.outcome == SectionOutcome::Generated
    }
}

/// Inputs for one run.
pub struct GenerationRequest<'a> {
    pub ticker: &'a str,
    pub expertise: ExpertiseLevel,
    pub sections: &'a [SectionSpec],
    pub corpus: &'a [Artifact],
    pub budget: &'a SessionBudget,
    pub progress: &'a ProgressHandle,
    pub cancel: &'a CancellationFlag,
}

struct SectionFailure {
    error: Error,
    attempts: u32,
}

pub struct ChunkedGenerator {
    backend: Arc<dyn GenerationBackend>,
    settings: GeneratorSettings,
}

impl ChunkedGenerator {
    pub fn new(backend: Arc<dyn GenerationBackend>, settings: GeneratorSettings) -> Self {
        Self { backend, settings }
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Generate every section in order. A failing section becomes a
    /// placeholder; it never aborts the run.
    pub async fn generate(&self, request: GenerationRequest<'_>) -> Vec<GeneratedSection> {
        let total = request.sections.len();
        let header = outline_header(request.ticker, request.sections);
        let relevance = RelevanceMap::build(request.sections, request.corpus, self.settings.tie_break);
        let mut rolling = header.clone();
        let mut out = Vec::with_capacity(total);

        info!(
            ticker = request.ticker,
            sections = total,
            corpus = request.corpus.len(),
            backend = self.backend.name(),
            "Starting chunked generation"
        );

        for (index, spec) in request.sections.iter().enumerate() {
            if request.cancel.is_cancelled() {
                info!(completed = index, total, "Generation cancelled, skipping remaining sections");
                request.progress.update(|s| {
                    s.record_error(
                        "generation",
                        format!("cancelled before section {} of {total}", index + 1),
                    )
                });
                out.extend(request.sections[index..].iter().map(GeneratedSection::skipped));
                break;
            }

            let excerpt = relevance.excerpt(index, self.settings.excerpt_tokens);
            debug!(
                section = %spec.id,
                excerpt_tokens = estimate_size(&excerpt.text),
                artifacts = excerpt.artifact_ids.len(),
                fallback = excerpt.fallback,
                "Prepared section excerpt"
            );

            let prompt = SectionPrompt {
                ticker: request.ticker,
                expertise: request.expertise,
                section: spec,
                position: index + 1,
                total,
                rolling_context: &rolling,
                excerpt: &excerpt,
            };
            let ceiling = spec.output_ceiling(
                self.settings.base_length_tokens,
                self.settings.per_call_cap_tokens,
            );

            let section = match self.generate_section(&prompt, ceiling, request.budget).await {
                Ok((body, attempts)) => {
                    let body = body.trim().to_string();
                    let appended = format!("{rolling}\n## {}\n\n{body}\n", spec.title);
                    rolling = trim_to_budget(
                        &appended,
                        self.settings.rolling_context_tokens,
                        Some(&header),
                    );
                    info!(section = %spec.id, attempts, "Section generated");
                    GeneratedSection {
                        spec: spec.clone(),
                        body,
                        outcome: SectionOutcome::Generated,
                        sources: excerpt.artifact_ids.clone(),
                        attempts,
                    }
                }
                Err(failure) => {
                    warn!(
                        section = %spec.id,
                        attempts = failure.attempts,
                        error = %failure.error,
                        "Section failed, inserting placeholder"
                    );
                    let reason = failure.error.to_string();
                    request
                        .progress
                        .update(|s| s.record_error(spec.id.clone(), reason.clone()));
                    GeneratedSection::placeholder(spec, reason, failure.attempts)
                }
            };

            let context = estimate_size(&rolling);
            let used = request.budget.used();
            request.progress.update(|s| {
                s.advance();
                s.cumulative_context = context;
                s.token_usage = used;
            });
            out.push(section);
        }

        out
    }

    async fn generate_section(
        &self,
        prompt: &SectionPrompt<'_>,
        ceiling: u32,
        budget: &SessionBudget,
    ) -> std::result::Result<(String, u32), SectionFailure> {
        let policy = &self.settings.retry;
        let mut ceiling = ceiling;
        let mut shrunk = false;
        let mut attempts = 0;
        let mut retries = 0;

        loop {
            attempts += 1;
            let rendered = prompt.render(ceiling);
            let prompt_tokens = estimate_size(&rendered.render()) as u64;
            let reserved = prompt_tokens + u64::from(ceiling);

            if let Err(error) = budget.track(reserved) {
                if matches!(error, Error::BudgetExceeded { .. }) && !shrunk && ceiling > 1 {
                    shrunk = true;
                    ceiling = (ceiling / 2).max(1);
                    warn!(
                        section = %prompt.section.id,
                        ceiling,
                        "Budget refused section, retrying at half length"
                    );
                    continue;
                }
                return Err(SectionFailure { error, attempts });
            }

            let call = tokio::time::timeout(
                self.settings.section_timeout,
                self.backend.generate(&rendered, ceiling),
            )
            .await;

            let error = match call {
                Ok(Ok(text)) if !text.trim().is_empty() => {
                    budget.settle(reserved, prompt_tokens + estimate_size(&text) as u64);
                    return Ok((text, attempts));
                }
                Ok(Ok(_)) => Error::Backend(BackendError::EmptyOutput(format!(
                    "blank output for section {}",
                    prompt.section.id
                ))),
                Ok(Err(e)) => Error::Backend(e),
                Err(_) => Error::Backend(BackendError::Timeout(format!(
                    "section {} exceeded {}s",
                    prompt.section.id,
                    self.settings.section_timeout.as_secs()
                ))),
            };
            // The prompt went out; the output reservation is refunded.
            budget.settle(reserved, prompt_tokens);

            if !error.is_retryable() || retries >= policy.max_retries {
                return Err(SectionFailure { error, attempts });
            }
            retries += 1;
            let delay = policy.delay_for(retries);
            debug!(
                section = %prompt.section.id,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient section failure, backing off"
            );
            tokio::time::sleep(delay).await;
        }
    }
}
