use async_trait::async_trait;
use dossier_core::{Artifact, Result};

use super::{Brief, two_step};
use crate::producer::{ResearchContext, ResearchProducer};

/// Competitive position, moat, and management.
#[derive(Debug, Default, Clone, Copy)]
pub struct StrategicProducer;

const BRIEF: Brief = Brief {
    role: "strategic",
    topic: "strategic",
    title: "Competitive Position and Moat",
    depends_on: &[],
    research_task: "Collect the strategic record for {ticker}:\n\
        1. Segments, products, and customers, with revenue mix\n\
        2. Market share and the main competitors\n\
        3. Evidence of pricing power: gross margin history, price increases\n\
        4. Management team, tenure, incentives, and capital allocation history\n\
        5. Regulatory and technology threats",
    analysis_task: "Assess the durability of {ticker}'s business:\n\
        - Moat sources (scale, switching costs, network effects, intangibles, cost advantage) and their trend\n\
        - Competitive threats ranked by likelihood and impact\n\
        - Management quality and capital allocation record\n\
        - Key risks and how resilient the business is to each",
};

#[async_trait]
impl ResearchProducer for StrategicProducer {
    fn role(&self) -> &str {
        BRIEF.role
    }

    async fn conduct_research(&self, ctx: &ResearchContext) -> Result<Vec<Artifact>> {
        two_step(ctx, &BRIEF).await
    }
}
