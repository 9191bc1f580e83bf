use async_trait::async_trait;
use dossier_core::{Artifact, ArtifactMetadata, Prompt, Result};
use tracing::{info, warn};

use super::{ANALYSIS_SUBTOPIC, audience_note, link_dependencies, prior_research};
use crate::citations::extract_citations;
use crate::producer::{ResearchContext, ResearchProducer};

const ROLE: &str = "synthesis";
const DEPENDS_ON: &[&str] = &["valuation", "owner_returns", "strategic", "historian"];

/// Reads every other role's work and writes the integrated thesis.
#[derive(Debug, Default, Clone, Copy)]
pub struct SynthesisProducer;

#[async_trait]
impl ResearchProducer for SynthesisProducer {
    fn role(&self) -> &str {
        ROLE
    }

    fn depends_on(&self) -> &[&'static str] {
        DEPENDS_ON
    }

    async fn conduct_research(&self, ctx: &ResearchContext) -> Result<Vec<Artifact>> {
        let analyses: Vec<Artifact> = ctx
            .store
            .latest()
            .await
            .into_iter()
            .filter(|a| a.producer != ROLE && a.subtopic == ANALYSIS_SUBTOPIC)
            .collect();
        if analyses.is_empty() {
            warn!(session = %ctx.key, "No analyses to synthesize");
            return Ok(Vec::new());
        }

        let ticker = &ctx.key.ticker;
        let prior = prior_research(ctx, ROLE).await;
        let prompt = Prompt::new(
            format!(
                "You are the lead analyst integrating a team's research on {ticker} into one \
                 investment thesis. Resolve contradictions explicitly and keep citations."
            ),
            format!(
                "Write the integrated thesis for {ticker}:\n\
                 - The one-paragraph verdict\n\
                 - Where valuation, owner returns, strategy, and history agree\n\
                 - Where they conflict and which view you weigh more\n\
                 - The three things to monitor\n\n{audience}\n\n<research>\n{prior}\n</research>\n",
                audience = audience_note(ctx.expertise),
            ),
        );
        let thesis = ctx.ask(&prompt).await?;

        let metadata = analyses.iter().fold(
            ArtifactMetadata::new(ROLE)
                .with_title("Integrated Investment Thesis")
                .with_confidence(0.7)
                .with_sources(extract_citations(&thesis)),
            |meta, a| meta.with_reference(a.id.clone()),
        );
        let artifact = ctx
            .store
            .write(ROLE, "synthesis", "integrated_thesis", &thesis, metadata)
            .await?;

        for analysis in &analyses {
            let note = format!("Integrated into thesis {} (v{}).", artifact.id, artifact.version);
            if let Err(e) = ctx.store.add_comment(ROLE, &analysis.id, &note).await {
                warn!(target = %analysis.id, error = %e, "Could not annotate analysis");
            }
        }
        link_dependencies(ctx, &artifact, DEPENDS_ON).await;

        info!(
            session = %ctx.key,
            integrated = analyses.len(),
            "Integrated thesis written"
        );
        Ok(vec![artifact])
    }
}
