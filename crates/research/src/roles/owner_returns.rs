use async_trait::async_trait;
use dossier_core::{Artifact, Result};

use super::{Brief, two_step};
use crate::producer::{ResearchContext, ResearchProducer};

/// Owner-returns view: IRR decomposition and the price ladder. Builds on
/// the valuation.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnerReturnsProducer;

const BRIEF: Brief = Brief {
    role: "owner_returns",
    topic: "owner_returns",
    title: "Owner Returns and Price Ladder",
    depends_on: &["valuation"],
    research_task: "Collect per-share owner economics for {ticker}:\n\
        1. Free cash flow per share for the last 5-10 years\n\
        2. Buybacks, issuance, and dilution from stock compensation\n\
        3. Dividends per share and payout history\n\
        4. Pre-tax earnings for the latest fiscal year",
    analysis_task: "Compute the owner-returns case for {ticker}:\n\
        - Current free cash flow yield\n\
        - IRR decomposition: starting yield + per-share growth + multiple reversion - dilution\n\
        - Price ladder: 10x pre-tax earnings floor, price for a 10% IRR, price for a 15% IRR\n\
        - Stress tests: growth 250bp lower, terminal multiple 3 turns lower, both combined\n\
        - The KPIs that must hold for today's price to be justified",
};

#[async_trait]
impl ResearchProducer for OwnerReturnsProducer {
    fn role(&self) -> &str {
        BRIEF.role
    }

    fn depends_on(&self) -> &[&'static str] {
        BRIEF.depends_on
    }

    async fn conduct_research(&self, ctx: &ResearchContext) -> Result<Vec<Artifact>> {
        two_step(ctx, &BRIEF).await
    }
}
