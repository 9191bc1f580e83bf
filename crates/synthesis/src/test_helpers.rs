//! Shared test utilities for synthesis tests.

use async_trait::async_trait;
use chrono::Utc;
use dossier_core::error::BackendError;
use dossier_core::{Artifact, GenerationBackend, Prompt};
use std::collections::BTreeSet;
use std::sync::Mutex;

type Responder = Box<dyn Fn(usize, &Prompt) -> Result<String, BackendError> + Send + Sync>;

/// A backend that answers each call through a closure and records every
/// prompt and output ceiling it was given.
pub struct ScriptedBackend {
    respond: Responder,
    calls: Mutex<Vec<(Prompt, u32)>>,
}

impl ScriptedBackend {
    /// `respond` receives the 1-based call number and the prompt.
    pub fn new(
        respond: impl Fn(usize, &Prompt) -> Result<String, BackendError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers call `n` with `marker-n-end`.
    pub fn numbered() -> Self {
        Self::new(|n, _| Ok(format!("Analysis text marker-{n}-end.")))
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn ceilings(&self) -> Vec<u32> {
        self.calls.lock().unwrap().iter().map(|(_, c)| *c).collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
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
        target_token_budget: u32,
    ) -> Result<String, BackendError> {
        let n = {
            let mut calls = self.calls.lock().unwrap();
            calls.push((prompt.clone(), target_token_budget));
            calls.len()
        };
        (self.respond)(n, prompt)
    }
}

pub fn artifact(id: &str, topic: &str, content: &str) -> Artifact {
    Artifact {
        id: id.into(),
        session_id: "s1".into(),
        ticker: "ACME".into(),
        topic: topic.into(),
        subtopic: "main".into(),
        version: 1,
        producer: "test".into(),
        author: "test".into(),
        title: None,
        created_at: Utc::now(),
        cross_references: BTreeSet::new(),
        confidence: 0.8,
        data_sources: vec![],
        word_count: content.split_whitespace().count(),
        content: content.into(),
    }
}
