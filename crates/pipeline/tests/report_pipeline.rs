//! End-to-end pipeline tests against scripted backends and real stores.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dossier_core::error::{BackendError, CompileError};
use dossier_core::{
    ArtifactMetadata, DocumentCompiler, ExpertiseLevel, GenerationBackend, GenerationStatus,
    Prompt, SessionKey,
};
use dossier_pipeline::{PipelineSettings, ReportPipeline, ReportRequest, SessionRegistry};
use dossier_providers::{CommandCompiler, MarkdownCompiler};
use dossier_store::KnowledgeStore;
use dossier_synthesis::PLACEHOLDER;

type Responder = Box<dyn Fn(usize, &Prompt) -> Result<String, BackendError> + Send + Sync>;

/// Answers through a closure; every successful answer is unique.
struct ScriptedBackend {
    respond: Responder,
    calls: AtomicUsize,
}

impl ScriptedBackend {
    fn new(
        respond: impl Fn(usize, &Prompt) -> Result<String, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: AtomicUsize::new(0),
        }
    }

    fn unique() -> Self {
        Self::new(|n, _| {
            Ok(format!(
                "Generated passage {n}: free cash flow grew [Source: 10-K, 2024]."
            ))
        })
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        prompt: &Prompt,
        _target_token_budget: u32,
    ) -> Result<String, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        (self.respond)(n, prompt)
    }
}

/// Requests cancellation through the registry on its `cancel_on`-th call.
struct CancellingBackend {
    registry: Arc<SessionRegistry>,
    key: SessionKey,
    cancel_on: usize,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerationBackend for CancellingBackend {
    fn name(&self) -> &str {
        "cancelling"
    }

    async fn generate(
        &self,
        _prompt: &Prompt,
        _target_token_budget: u32,
    ) -> Result<String, BackendError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.cancel_on {
            assert!(self.registry.cancel(&self.key).await);
        }
        Ok(format!("Section body {n}."))
    }
}

/// Pretends to typeset and returns fixed bytes.
struct FakePdf;

#[async_trait]
impl DocumentCompiler for FakePdf {
    fn name(&self) -> &str {
        "fake-pdf"
    }

    fn extension(&self) -> &str {
        "pdf"
    }

    async fn compile(
        &self,
        markdown: &str,
        _expertise: ExpertiseLevel,
    ) -> Result<Vec<u8>, CompileError> {
        Ok(format!("%PDF {}", markdown.len()).into_bytes())
    }
}

fn store(dir: &Path) -> Arc<KnowledgeStore> {
    Arc::new(KnowledgeStore::new(dir, Duration::from_secs(2)))
}

fn key(session: &str) -> SessionKey {
    SessionKey::new(session, "acme").unwrap()
}

fn request(session: &str, skip_research: bool) -> ReportRequest {
    ReportRequest {
        key: key(session),
        expertise: ExpertiseLevel::new(8).unwrap(),
        skip_research,
    }
}

async fn seed(store: &KnowledgeStore, key: &SessionKey) {
    let session = store.open_session(key).await.unwrap();
    for (topic, content) in [
        ("valuation", "DCF fair value of 42 per share, intrinsic value above price."),
        ("strategic", "Moat from switching costs; market share stable."),
        ("history", "Founded in 1901; a defining decision in 1987."),
    ] {
        session
            .write(topic, topic, "analysis", content, ArtifactMetadata::new(topic))
            .await
            .unwrap();
    }
    store.close_session(key).await;
}

#[tokio::test]
async fn full_run_researches_generates_and_delivers_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let pipeline = ReportPipeline::new(
        store.clone(),
        Arc::new(ScriptedBackend::unique()),
        Arc::new(MarkdownCompiler),
        PipelineSettings::default(),
    );

    let outcome = pipeline.run(request("s1", false)).await.unwrap();

    assert_eq!(outcome.state.status, GenerationStatus::Complete);
    assert_eq!(outcome.research.completed().count(), 5);
    assert!(outcome.manifest.is_clean());
    assert!(!outcome.compiled);
    assert_eq!(outcome.report_path, outcome.markdown_path);
    assert_eq!(outcome.state.percent_complete(), 100.0);

    let markdown = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert!(markdown.starts_with("# ACME Research Dossier"));
    assert!(markdown.contains("## Degradation Manifest"));
    assert!(markdown.contains("> Sources: `"));

    // Persisted for out-of-process polling.
    let persisted = store.read_state(&key("s1")).unwrap().unwrap();
    assert_eq!(persisted.status, GenerationStatus::Complete);
    assert_eq!(persisted.sections_completed, persisted.total_sections);

    // Torn down.
    assert!(pipeline.registry().active().await.is_empty());
    assert!(store.open_sessions().await.is_empty());
    assert!(outcome.budget.used > 0);
}

#[tokio::test(start_paused = true)]
async fn third_section_exhausting_retries_becomes_placeholder() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    seed(&store, &key("s1")).await;

    let backend = ScriptedBackend::new(|n, prompt| {
        if prompt.contains("Write section 3 of") {
            Err(BackendError::Network("connection reset".into()))
        } else {
            Ok(format!("Section text {n}."))
        }
    });
    let pipeline = ReportPipeline::new(
        store.clone(),
        Arc::new(backend),
        Arc::new(MarkdownCompiler),
        PipelineSettings::default(),
    );

    let outcome = pipeline.run(request("s1", true)).await.unwrap();

    assert_eq!(outcome.state.status, GenerationStatus::Complete);
    assert!(!outcome.state.error_log.is_empty());
    assert_eq!(outcome.manifest.placeholders.len(), 1);
    assert_eq!(outcome.manifest.placeholders[0].section_id, "valuation");

    let markdown = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert_eq!(markdown.matches(PLACEHOLDER).count(), 1);
    assert_eq!(
        markdown.matches("Section text").count(),
        outcome.state.total_sections - 1
    );
}

#[tokio::test]
async fn compiler_failure_delivers_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    seed(&store, &key("s1")).await;

    let compiler = CommandCompiler::new(
        "dossier-no-such-typesetter",
        vec![],
        "pdf",
        Duration::from_secs(5),
    );
    let pipeline = ReportPipeline::new(
        store,
        Arc::new(ScriptedBackend::unique()),
        Arc::new(compiler),
        PipelineSettings::default(),
    );

    let outcome = pipeline.run(request("s1", true)).await.unwrap();

    assert_eq!(outcome.state.status, GenerationStatus::Complete);
    assert!(!outcome.compiled);
    assert_eq!(outcome.report_path.extension().unwrap(), "md");
    assert!(outcome.report_path.exists());
    assert!(outcome.state.error_log.iter().any(|e| e.scope == "compile"));
}

#[tokio::test]
async fn compiled_output_is_delivered_beside_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    seed(&store, &key("s1")).await;

    let pipeline = ReportPipeline::new(
        store,
        Arc::new(ScriptedBackend::unique()),
        Arc::new(FakePdf),
        PipelineSettings::default(),
    );

    let outcome = pipeline.run(request("s1", true)).await.unwrap();

    assert!(outcome.compiled);
    assert_eq!(outcome.report_path.file_name().unwrap(), "ACME_report.pdf");
    assert!(std::fs::read(&outcome.report_path).unwrap().starts_with(b"%PDF"));
    assert!(outcome.markdown_path.exists());
}

#[tokio::test]
async fn cancellation_keeps_finished_sections() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    seed(&store, &key("s1")).await;

    let registry = Arc::new(SessionRegistry::new());
    let backend = CancellingBackend {
        registry: registry.clone(),
        key: key("s1"),
        cancel_on: 3,
        calls: AtomicUsize::new(0),
    };
    let pipeline = ReportPipeline::new(
        store,
        Arc::new(backend),
        Arc::new(MarkdownCompiler),
        PipelineSettings::default(),
    )
    .with_registry(registry.clone());

    let outcome = pipeline.run(request("s1", true)).await.unwrap();

    assert_eq!(outcome.state.status, GenerationStatus::Complete);
    assert_eq!(outcome.state.sections_completed, 3);
    assert_eq!(
        outcome.manifest.skipped.len(),
        outcome.state.total_sections - 3
    );
    assert!(
        outcome
            .state
            .error_log
            .iter()
            .any(|e| e.message.contains("cancelled"))
    );
    let markdown = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert!(markdown.contains("Section body 3."));
    assert!(registry.active().await.is_empty());
}

#[tokio::test]
async fn exhausted_budget_still_delivers_a_document() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    seed(&store, &key("s1")).await;

    let settings = PipelineSettings {
        session_ceiling_tokens: 50,
        ..PipelineSettings::default()
    };
    let pipeline = ReportPipeline::new(
        store,
        Arc::new(ScriptedBackend::unique()),
        Arc::new(MarkdownCompiler),
        settings,
    );

    let outcome = pipeline.run(request("s1", true)).await.unwrap();

    assert_eq!(outcome.state.status, GenerationStatus::Complete);
    assert_eq!(
        outcome.manifest.placeholders.len(),
        outcome.state.total_sections
    );
    assert!(outcome.budget.used <= 50);
    assert!(outcome.budget.rejections > 0);
}

#[tokio::test]
async fn concurrent_sessions_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let store = store(dir.path());
    let pipeline = ReportPipeline::new(
        store.clone(),
        Arc::new(ScriptedBackend::unique()),
        Arc::new(MarkdownCompiler),
        PipelineSettings::default(),
    );

    let (a, b) = tokio::join!(
        pipeline.run(request("s1", false)),
        pipeline.run(request("s2", false))
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_ne!(a.report_path, b.report_path);
    assert_eq!(a.state.session_id, "s1");
    assert_eq!(b.state.session_id, "s2");

    let index_a = store.read_index(&key("s1")).unwrap();
    let index_b = store.read_index(&key("s2")).unwrap();
    assert!(
        index_a
            .entries
            .iter()
            .all(|e| index_b.entries.iter().all(|f| f.id != e.id))
    );
    assert_eq!(store.list_sessions().unwrap().len(), 2);
}
