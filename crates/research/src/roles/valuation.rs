use async_trait::async_trait;
use dossier_core::{Artifact, Result};

use super::{Brief, two_step};
use crate::producer::{ResearchContext, ResearchProducer};

/// Financial data and intrinsic value.
#[derive(Debug, Default, Clone, Copy)]
pub struct ValuationProducer;

const BRIEF: Brief = Brief {
    role: "valuation",
    topic: "valuation",
    title: "Intrinsic Value Assessment",
    depends_on: &[],
    research_task: "Collect the financial record for {ticker}:\n\
        1. Revenue, operating cash flow, capex, and free cash flow for the last 5 years\n\
        2. Diluted shares outstanding and the net change per year\n\
        3. Current share price with the date of the quote\n\
        4. Net debt or net cash, total debt, cash position\n\
        5. Management guidance from the latest calls\n\
        Prefer SEC filings, investor relations pages, and earnings transcripts.",
    analysis_task: "Estimate the intrinsic value of {ticker}.\n\
        - Normalize free cash flow per share and explain the adjustments\n\
        - Build a 10-year discounted cash flow with a conservative growth fade\n\
        - Give bear, base, and bull fair value per share with the assumptions behind each\n\
        - Compare fair value with the current price and state the margin of safety",
};

#[async_trait]
impl ResearchProducer for ValuationProducer {
    fn role(&self) -> &str {
        BRIEF.role
    }

    async fn conduct_research(&self, ctx: &ResearchContext) -> Result<Vec<Artifact>> {
        two_step(ctx, &BRIEF).await
    }
}
