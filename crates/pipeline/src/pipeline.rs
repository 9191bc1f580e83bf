//! Per-session report orchestration.
//!
//! ```text
//!   pending ──► generating ──► merging ──► converting ──► complete
//!  (research)   (sections)    (assemble)   (compile)
//!       └────────────── any failure ──────────────► error
//! ```
//!
//! Generation state is written to `meta/generation_state.json` on every
//! change so another process can poll it. In-memory session state is torn
//! down when the run ends, whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dossier_budget::{BudgetSnapshot, SessionBudget};
use dossier_config::AppConfig;
use dossier_core::{
    CancellationFlag, DocumentCompiler, ExpertiseLevel, GenerationBackend, GenerationState,
    GenerationStatus, Result, SessionKey,
};
use dossier_research::{
    CoordinatorSettings, ResearchContext, ResearchCoordinator, ResearchProducer, ResearchReport,
    default_roster,
};
use dossier_store::{KnowledgeStore, SessionStore};
use dossier_synthesis::{
    ChunkedGenerator, DegradationManifest, DocumentHeader, GenerationRequest, GeneratorSettings,
    ProgressHandle, SectionSpec, determine_sections, merge_sections,
};
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::registry::{SessionHandle, SessionRegistry};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub session_ceiling_tokens: u64,
    pub producer_output_tokens: u32,
    pub generator: GeneratorSettings,
    pub research: CoordinatorSettings,
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            session_ceiling_tokens: config.budget.session_ceiling_tokens,
            producer_output_tokens: config.research.max_output_tokens,
            generator: GeneratorSettings::from_config(config)?,
            research: CoordinatorSettings::from_config(&config.research),
        })
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            session_ceiling_tokens: 2_000_000,
            producer_output_tokens: 4_000,
            generator: GeneratorSettings::default(),
            research: CoordinatorSettings::default(),
        }
    }
}

/// One report request.
#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub key: SessionKey,
    pub expertise: ExpertiseLevel,
    /// Generate from whatever the session already holds.
    pub skip_research: bool,
}

/// What a finished run delivered.
#[derive(Debug, Clone, Serialize)]
pub struct ReportOutcome {
    pub key: SessionKey,
    /// The delivered artifact: compiled output, or the markdown when
    /// compilation failed or was not configured.
    pub report_path: PathBuf,
    pub markdown_path: PathBuf,
    pub compiled: bool,
    pub manifest: DegradationManifest,
    pub research: ResearchReport,
    pub state: GenerationState,
    pub budget: BudgetSnapshot,
}

pub struct ReportPipeline {
    store: Arc<KnowledgeStore>,
    backend: Arc<dyn GenerationBackend>,
    compiler: Arc<dyn DocumentCompiler>,
    producers: Vec<Arc<dyn ResearchProducer>>,
    registry: Arc<SessionRegistry>,
    settings: PipelineSettings,
}

impl ReportPipeline {
    pub fn new(
        store: Arc<KnowledgeStore>,
        backend: Arc<dyn GenerationBackend>,
        compiler: Arc<dyn DocumentCompiler>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            store,
            backend,
            compiler,
            producers: default_roster(),
            registry: Arc::new(SessionRegistry::new()),
            settings,
        }
    }

    /// Replace the producer roster.
    pub fn with_producers(mut self, producers: Vec<Arc<dyn ResearchProducer>>) -> Self {
        self.producers = producers;
        self
    }

    /// Share a registry with other pipelines or a status surface.
    pub fn with_registry(mut self, registry: Arc<SessionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Run one session end to end.
    pub async fn run(&self, request: ReportRequest) -> Result<ReportOutcome> {
        let key = request.key.clone();
        let session = self.store.open_session(&key).await?;
        let sections = determine_sections(request.expertise);

        let progress = ProgressHandle::new(GenerationState::new(&key.session_id, sections.len()));
        let cancel = CancellationFlag::new();
        self.registry
            .register(
                &key,
                SessionHandle {
                    progress: progress.clone(),
                    cancel: cancel.clone(),
                    started_at: Utc::now(),
                },
            )
            .await?;
        let persister = spawn_persister(session.clone(), &progress);

        info!(
            session = %key,
            expertise = %request.expertise,
            sections = sections.len(),
            "Report pipeline started"
        );

        let run = Run {
            pipeline: self,
            request: &request,
            session: &session,
            progress: &progress,
            cancel: &cancel,
        };
        let result = run.execute(&sections).await;

        if let Err(e) = &result {
            error!(session = %key, error = %e, "Report pipeline failed");
            progress.update(|s| {
                s.record_error("pipeline", e.to_string());
                // Error is reachable from every state.
                let _ = s.transition(GenerationStatus::Error);
            });
        }

        persister.abort();
        let _ = persister.await;
        if let Err(e) = session.save_state(&progress.snapshot()).await {
            warn!(session = %key, error = %e, "Could not persist final generation state");
        }

        self.registry.remove(&key).await;
        self.store.close_session(&key).await;
        info!(session = %key, "Session torn down");

        result
    }
}

/// Borrowed state for one run.
struct Run<'a> {
    pipeline: &'a ReportPipeline,
    request: &'a ReportRequest,
    session: &'a Arc<SessionStore>,
    progress: &'a ProgressHandle,
    cancel: &'a CancellationFlag,
}

impl Run<'_> {
    async fn execute(&self, sections: &[SectionSpec]) -> Result<ReportOutcome> {
        let settings = &self.pipeline.settings;
        let key = &self.request.key;
        let budget = Arc::new(SessionBudget::new(
            key.session_id.clone(),
            settings.session_ceiling_tokens,
        ));

        // Contribution.
        let research = if self.request.skip_research {
            info!(session = %key, "Skipping research, using stored corpus");
            ResearchReport::default()
        } else {
            let ctx = ResearchContext {
                key: key.clone(),
                expertise: self.request.expertise,
                store: self.session.clone(),
                backend: self.pipeline.backend.clone(),
                budget: budget.clone(),
                max_output_tokens: settings.producer_output_tokens,
            };
            let coordinator =
                ResearchCoordinator::new(self.pipeline.producers.clone(), settings.research.clone());
            let report = coordinator.run(&ctx, self.cancel).await?;
            for dropped in report.dropped() {
                let message = dropped.error.clone().unwrap_or_else(|| "dropped".into());
                self.progress
                    .update(|s| s.record_error(format!("research:{}", dropped.role), message));
            }
            report
        };

        // Generation.
        let corpus = self.session.latest().await;
        if corpus.is_empty() {
            warn!(session = %key, "Corpus is empty, sections will have no research excerpt");
        }
        self.transition(GenerationStatus::Generating)?;
        let generator =
            ChunkedGenerator::new(self.pipeline.backend.clone(), settings.generator.clone());
        let generated = generator
            .generate(GenerationRequest {
                ticker: &key.ticker,
                expertise: self.request.expertise,
                sections,
                corpus: &corpus,
                budget: &budget,
                progress: self.progress,
                cancel: self.cancel,
            })
            .await;

        // Merging.
        self.transition(GenerationStatus::Merging)?;
        let document = merge_sections(
            &DocumentHeader {
                ticker: &key.ticker,
                expertise: self.request.expertise,
                generated_at: Utc::now(),
            },
            &generated,
        );
        let markdown_path = self
            .session
            .save_report("md", document.markdown.as_bytes())
            .await?;

        // Converting.
        self.transition(GenerationStatus::Converting)?;
        let compiler = &self.pipeline.compiler;
        let (report_path, compiled) = if compiler.extension() == "md" {
            (markdown_path.clone(), false)
        } else {
            match compiler.compile(&document.markdown, self.request.expertise).await {
                Ok(bytes) => (
                    self.session.save_report(compiler.extension(), &bytes).await?,
                    true,
                ),
                Err(e) => {
                    warn!(
                        session = %key,
                        compiler = compiler.name(),
                        error = %e,
                        "Compilation failed, delivering markdown"
                    );
                    self.progress
                        .update(|s| s.record_error("compile", e.to_string()));
                    (markdown_path.clone(), false)
                }
            }
        };

        self.transition(GenerationStatus::Complete)?;
        let state = self.progress.snapshot();
        info!(
            session = %key,
            report = %report_path.display(),
            compiled,
            degraded = !document.manifest.is_clean(),
            tokens = budget.used(),
            errors = state.error_log.len(),
            "Report delivered"
        );

        Ok(ReportOutcome {
            key: key.clone(),
            report_path,
            markdown_path,
            compiled,
            manifest: document.manifest,
            research,
            state,
            budget: budget.snapshot(),
        })
    }

    fn transition(&self, next: GenerationStatus) -> Result<()> {
        let mut outcome = Ok(());
        self.progress.update(|s| outcome = s.transition(next));
        outcome
    }
}

/// Mirror every progress change to disk until aborted.
fn spawn_persister(session: Arc<SessionStore>, progress: &ProgressHandle) -> JoinHandle<()> {
    let mut rx = progress.subscribe();
    tokio::spawn(async move {
        loop {
            let state = rx.borrow_and_update().clone();
            if let Err(e) = session.save_state(&state).await {
                warn!(session = %session.key(), error = %e, "Could not persist generation state");
            }
            if rx.changed().await.is_err() {
                break;
            }
            // Coalesce bursts of updates into one write.
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    })
}
