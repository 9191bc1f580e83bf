//! Research coordination.
//!
//! Producers are grouped into dependency waves. Every producer in a wave
//! runs concurrently; waves run in order.
//!
//! ```text
//!   wave 1:  valuation   strategic   historian     (concurrent)
//!                │
//!   wave 2:  owner_returns
//!                │
//!   wave 3:  synthesis
//! ```
//!
//! A failing contribution is retried with exponential backoff, then dropped
//! and reported. It never aborts the session; dependents still run with
//! whatever the store holds.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dossier_config::ResearchConfig;
use dossier_core::error::BackendError;
use dossier_core::{ArtifactId, CancellationFlag, Error, Result, RetryPolicy};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::producer::{ResearchContext, ResearchProducer};

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub retry: RetryPolicy,
    /// Limit for a single contribution attempt.
    pub contribution_timeout: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(4))
                .with_jitter(Duration::ZERO),
            contribution_timeout: Duration::from_secs(120),
        }
    }
}

impl CoordinatorSettings {
    /// Backoff doubles from `backoff_base_ms` on each retry without jitter:
    /// 1s, 2s, 4s with the defaults.
    pub fn from_config(config: &ResearchConfig) -> Self {
        let base = Duration::from_millis(config.backoff_base_ms);
        let max = base.saturating_mul(1u32 << config.max_retries.saturating_sub(1).min(16));
        Self {
            retry: RetryPolicy::new(config.max_retries, base, max).with_jitter(Duration::ZERO),
            contribution_timeout: Duration::from_secs(config.contribution_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionStatus {
    Completed,
    Dropped,
}

/// Outcome of one producer's contribution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContributionReport {
    pub role: String,
    pub status: ContributionStatus,
    pub artifacts: Vec<ArtifactId>,
    pub attempts: u32,
    pub error: Option<String>,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchReport {
    pub contributions: Vec<ContributionReport>,
}

impl ResearchReport {
    pub fn completed(&self) -> impl Iterator<Item = &ContributionReport> {
        self.contributions
            .iter()
            .filter(|c| c.status == ContributionStatus::Completed)
    }

    pub fn dropped(&self) -> impl Iterator<Item = &ContributionReport> {
        self.contributions
            .iter()
            .filter(|c| c.status == ContributionStatus::Dropped)
    }

    pub fn artifacts_written(&self) -> usize {
        self.contributions.iter().map(|c| c.artifacts.len()).sum()
    }
}

pub struct ResearchCoordinator {
    producers: Vec<Arc<dyn ResearchProducer>>,
    settings: CoordinatorSettings,
}

impl ResearchCoordinator {
    pub fn new(producers: Vec<Arc<dyn ResearchProducer>>, settings: CoordinatorSettings) -> Self {
        Self {
            producers,
            settings,
        }
    }

    /// Group producers into dependency waves, preserving declaration order
    /// within a wave.
    pub fn waves(&self) -> Result<Vec<Vec<Arc<dyn ResearchProducer>>>> {
        let roles: HashSet<&str> = self.producers.iter().map(|p| p.role()).collect();
        if roles.len() != self.producers.len() {
            return Err(Error::validation("duplicate producer role"));
        }
        for producer in &self.producers {
            if let Some(missing) = producer.depends_on().iter().find(|d| !roles.contains(*d)) {
                return Err(Error::validation(format!(
                    "producer '{}' depends on unknown role '{missing}'",
                    producer.role()
                )));
            }
        }

        let mut done: HashSet<String> = HashSet::new();
        let mut remaining: Vec<Arc<dyn ResearchProducer>> = self.producers.clone();
        let mut waves = Vec::new();

        while !remaining.is_empty() {
            let (ready, blocked): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|p| p.depends_on().iter().all(|d| done.contains(*d)));
            if ready.is_empty() {
                let stuck: Vec<&str> = blocked.iter().map(|p| p.role()).collect();
                return Err(Error::validation(format!(
                    "dependency cycle among producers: {}",
                    stuck.join(", ")
                )));
            }
            done.extend(ready.iter().map(|p| p.role().to_string()));
            waves.push(ready);
            remaining = blocked;
        }

        Ok(waves)
    }

    /// Run every producer, wave by wave.
    pub async fn run(&self, ctx: &ResearchContext, cancel: &CancellationFlag) -> Result<ResearchReport> {
        let waves = self.waves()?;
        let mut report = ResearchReport::default();

        info!(session = %ctx.key, waves = waves.len(), producers = self.producers.len(), "Starting research");

        for (index, wave) in waves.iter().enumerate() {
            if cancel.is_cancelled() {
                warn!(session = %ctx.key, wave = index + 1, "Research cancelled");
                report
                    .contributions
                    .extend(wave.iter().chain(waves[index + 1..].iter().flatten()).map(|p| {
                        ContributionReport {
                            role: p.role().to_string(),
                            status: ContributionStatus::Dropped,
                            artifacts: Vec::new(),
                            attempts: 0,
                            error: Some("cancelled".into()),
                            elapsed_ms: 0,
                        }
                    }));
                break;
            }

            let roles: Vec<&str> = wave.iter().map(|p| p.role()).collect();
            info!(session = %ctx.key, wave = index + 1, ?roles, "Running research wave");

            let results = join_all(wave.iter().map(|p| self.contribute(p.as_ref(), ctx))).await;
            report.contributions.extend(results);
        }

        info!(
            session = %ctx.key,
            completed = report.completed().count(),
            dropped = report.dropped().count(),
            artifacts = report.artifacts_written(),
            "Research finished"
        );
        Ok(report)
    }

    async fn contribute(&self, producer: &dyn ResearchProducer, ctx: &ResearchContext) -> ContributionReport {
        let started = Instant::now();
        let policy = &self.settings.retry;
        let mut attempts = 0;
        let existing = committed_by(ctx, producer.role()).await;

        let outcome = loop {
            attempts += 1;
            let attempt = tokio::time::timeout(
                self.settings.contribution_timeout,
                producer.conduct_research(ctx),
            )
            .await
            .unwrap_or_else(|_| {
                Err(Error::Backend(BackendError::Timeout(format!(
                    "contribution exceeded {}s",
                    self.settings.contribution_timeout.as_secs()
                ))))
            });

            match attempt {
                Ok(artifacts) => break Ok(artifacts),
                Err(e) if e.is_retryable() && attempts <= policy.max_retries => {
                    let delay = policy.delay_for(attempts);
                    warn!(
                        role = producer.role(),
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Contribution failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => break Err(e),
            }
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(artifacts) => {
                info!(role = producer.role(), artifacts = artifacts.len(), attempts, "Contribution completed");
                ContributionReport {
                    role: producer.role().to_string(),
                    status: ContributionStatus::Completed,
                    artifacts: artifacts.into_iter().map(|a| a.id).collect(),
                    attempts,
                    error: None,
                    elapsed_ms,
                }
            }
            Err(e) => {
                // Whatever a failed attempt managed to commit is reported.
                let partial: Vec<ArtifactId> = committed_by(ctx, producer.role())
                    .await
                    .into_iter()
                    .filter(|id| !existing.contains(id))
                    .collect();
                warn!(
                    role = producer.role(),
                    attempts,
                    partial = partial.len(),
                    error = %e,
                    "Contribution dropped"
                );
                ContributionReport {
                    role: producer.role().to_string(),
                    status: ContributionStatus::Dropped,
                    artifacts: partial,
                    attempts,
                    error: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }
}

/// Ids committed under `role`, in commit order.
async fn committed_by(ctx: &ResearchContext, role: &str) -> Vec<ArtifactId> {
    ctx.store
        .list()
        .await
        .into_iter()
        .filter(|e| e.producer == role)
        .map(|e| e.id)
        .collect()
}
