use async_trait::async_trait;
use dossier_core::{Artifact, Result};

use super::{Brief, two_step};
use crate::producer::{ResearchContext, ResearchProducer};

/// Corporate history and the decisions that shaped the company.
#[derive(Debug, Default, Clone, Copy)]
pub struct HistorianProducer;

const BRIEF: Brief = Brief {
    role: "historian",
    topic: "history",
    title: "Corporate History and Defining Decisions",
    depends_on: &[],
    research_task: "Collect the history of {ticker}:\n\
        1. Founding, founders, and the original business\n\
        2. Major eras with approximate dates\n\
        3. Defining decisions: acquisitions, pivots, divestitures, leadership changes\n\
        4. Crises and how the company came through them",
    analysis_task: "Write the corporate history of {ticker} as an owner would read it:\n\
        - A timeline of eras and turning points\n\
        - Which decisions created or destroyed the most value, and why\n\
        - Patterns in how leadership behaves under pressure\n\
        - What the history implies for the next decade",
};

#[async_trait]
impl ResearchProducer for HistorianProducer {
    fn role(&self) -> &str {
        BRIEF.role
    }

    async fn conduct_research(&self, ctx: &ResearchContext) -> Result<Vec<Artifact>> {
        two_step(ctx, &BRIEF).await
    }
}
