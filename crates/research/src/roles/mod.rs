//! The five contributor roles.
//!
//! Valuation, strategic, and historian research run first and in parallel.
//! Owner returns builds on the valuation. Synthesis reads everything and
//! writes the integrated thesis.
//!
//! The four analyst roles share one two-step workflow: a research pass that
//! gathers cited facts, then an analysis pass over those notes. Both passes
//! are committed as separate artifacts so the analysis can point back at its
//! notes.

mod historian;
mod owner_returns;
mod strategic;
mod synthesis;
mod valuation;

use std::sync::Arc;

use dossier_budget::trim_to_budget;
use dossier_core::{Artifact, ArtifactMetadata, ExpertiseLevel, Prompt, Result};
use tracing::{debug, info, warn};

use crate::citations::extract_citations;
use crate::producer::{ResearchContext, ResearchProducer};

pub use historian::HistorianProducer;
pub use owner_returns::OwnerReturnsProducer;
pub use strategic::StrategicProducer;
pub use synthesis::SynthesisProducer;
pub use valuation::ValuationProducer;

/// The standard roster, in declaration order.
pub fn default_roster() -> Vec<Arc<dyn ResearchProducer>> {
    vec![
        Arc::new(ValuationProducer),
        Arc::new(OwnerReturnsProducer),
        Arc::new(StrategicProducer),
        Arc::new(HistorianProducer),
        Arc::new(SynthesisProducer),
    ]
}

const RESEARCH_SUBTOPIC: &str = "research_notes";
const ANALYSIS_SUBTOPIC: &str = "analysis";

/// What an analyst role researches and how it analyses it.
pub(crate) struct Brief {
    pub role: &'static str,
    pub topic: &'static str,
    pub title: &'static str,
    pub depends_on: &'static [&'static str],
    pub research_task: &'static str,
    pub analysis_task: &'static str,
}

/// Expertise guidance appended to every producer prompt.
pub(crate) fn audience_note(level: ExpertiseLevel) -> String {
    let label = level.depth_label();
    let mut note = format!(
        "Audience: expertise level {level}/10 ({label}: {}).",
        label.detail()
    );
    if level.wants_educational_content() {
        note.push_str(" Explain terms and reasoning as you go.");
    }
    note
}

/// Earlier contributions from other roles, trimmed to fit one prompt.
pub(crate) async fn prior_research(ctx: &ResearchContext, role: &str) -> String {
    let context = ctx.store.read_all(Some(role)).await;
    trim_to_budget(&context, ctx.max_output_tokens as usize * 2, None)
}

/// Research pass, then analysis pass. Nothing is committed until both
/// passes have produced text, so a failed contribution leaves the store
/// untouched. The analysis is linked to the latest work of every role it
/// depends on.
pub(crate) async fn two_step(ctx: &ResearchContext, brief: &Brief) -> Result<Vec<Artifact>> {
    let ticker = &ctx.key.ticker;
    let audience = audience_note(ctx.expertise);
    let prior = prior_research(ctx, brief.role).await;

    info!(session = %ctx.key, role = brief.role, "Research pass");
    let research_prompt = Prompt::new(
        format!(
            "You are a financial research assistant gathering primary-source facts on {ticker}. \
             Cite every figure inline as [Source: document, date]."
        ),
        format!(
            "{task}\n\n{audience}\n\nReturn concise markdown bullet lists with actual numbers.",
            task = brief.research_task.replace("{ticker}", ticker),
        ),
    );
    let notes = ctx.ask(&research_prompt).await?;

    info!(session = %ctx.key, role = brief.role, "Analysis pass");
    let mut analysis_user = format!(
        "{task}\n\n{audience}\n\n<research_notes>\n{notes}\n</research_notes>\n",
        task = brief.analysis_task.replace("{ticker}", ticker),
    );
    if !prior.trim().is_empty() {
        analysis_user.push_str(&format!("\n<prior_research>\n{prior}\n</prior_research>\n"));
    }
    let analysis_prompt = Prompt::new(
        format!(
            "You are a senior analyst writing the {} section of a research file on {ticker}. \
             Keep every [Source: ...] citation from the notes you rely on.",
            brief.title
        ),
        analysis_user,
    );
    let analysis = ctx.ask(&analysis_prompt).await?;

    let note_sources = extract_citations(&notes);
    let mut sources = note_sources.clone();
    for source in extract_citations(&analysis) {
        if !sources.contains(&source) {
            sources.push(source);
        }
    }

    let notes_artifact = ctx
        .store
        .write(
            brief.role,
            brief.topic,
            RESEARCH_SUBTOPIC,
            &notes,
            ArtifactMetadata::new(brief.role)
                .with_title(format!("{} research notes", brief.title))
                .with_confidence(0.6)
                .with_sources(note_sources),
        )
        .await?;
    let analysis_artifact = ctx
        .store
        .write(
            brief.role,
            brief.topic,
            ANALYSIS_SUBTOPIC,
            &analysis,
            ArtifactMetadata::new(brief.role)
                .with_title(brief.title)
                .with_confidence(if sources.is_empty() { 0.5 } else { 0.8 })
                .with_sources(sources)
                .with_reference(notes_artifact.id.clone()),
        )
        .await?;

    link_dependencies(ctx, &analysis_artifact, brief.depends_on).await;

    Ok(vec![notes_artifact, analysis_artifact])
}

/// Link `artifact` to the latest analysis of each dependency role. Missing
/// dependencies are skipped; a failed link is logged, not fatal.
pub(crate) async fn link_dependencies(
    ctx: &ResearchContext,
    artifact: &Artifact,
    depends_on: &[&str],
) {
    if depends_on.is_empty() {
        return;
    }
    let latest = ctx.store.latest().await;
    for target in latest
        .iter()
        .filter(|a| depends_on.contains(&a.producer.as_str()) && a.subtopic == ANALYSIS_SUBTOPIC)
    {
        match ctx.store.link(&artifact.id, &target.id, "builds_on").await {
            Ok(_) => debug!(source = %artifact.id, target = %target.id, "Linked dependency"),
            Err(e) => warn!(source = %artifact.id, target = %target.id, error = %e, "Dependency link failed"),
        }
    }
}
