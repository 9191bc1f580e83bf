//! Section planning: expertise level in, ordered outline out.
//!
//! The base outline is always present. Readers at level 5 or below also get
//! the primer outline. Every section inherits the level's depth multiplier
//! and educational flag, so lower expertise means longer, more explanatory
//! sections. Output is sorted by priority tier, then declared order.

use dossier_core::ExpertiseLevel;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionSpec {
    pub id: String,
    pub title: String,
    /// 1 = opening material, 2 = core analysis, 3 = closing and deep dives.
    pub priority_tier: u8,
    pub depth_multiplier: f32,
    pub include_educational_content: bool,
    pub relevance_keywords: Vec<String>,
}

impl SectionSpec {
    /// Output ceiling for this section: `tier × base × depth`, capped per
    /// call and never below one token.
    pub fn output_ceiling(&self, base_length_tokens: u32, per_call_cap_tokens: u32) -> u32 {
        let raw = f64::from(self.priority_tier)
            * f64::from(base_length_tokens)
            * f64::from(self.depth_multiplier);
        (raw.ceil() as u32).clamp(1, per_call_cap_tokens.max(1))
    }
}

struct Template {
    id: &'static str,
    title: &'static str,
    tier: u8,
    keywords: &'static [&'static str],
}

const BASE_OUTLINE: &[Template] = &[
    Template {
        id: "executive_summary",
        title: "Executive Summary",
        tier: 1,
        keywords: &["summary", "thesis", "verdict", "recommendation", "intrinsic value"],
    },
    Template {
        id: "business_overview",
        title: "Business Overview",
        tier: 1,
        keywords: &["business model", "products", "segments", "revenue", "customers"],
    },
    Template {
        id: "valuation",
        title: "Intrinsic Value Assessment",
        tier: 2,
        keywords: &["valuation", "dcf", "intrinsic", "fair value", "multiple", "discount rate"],
    },
    Template {
        id: "owner_returns",
        title: "Owner Returns and Price Ladder",
        tier: 2,
        keywords: &["owner", "irr", "free cash flow", "fcf", "dividend", "price ladder"],
    },
    Template {
        id: "competitive_position",
        title: "Competitive Position and Moat",
        tier: 2,
        keywords: &["moat", "competitive", "competitor", "market share", "pricing power", "switching"],
    },
    Template {
        id: "management",
        title: "Management and Capital Allocation",
        tier: 2,
        keywords: &["management", "ceo", "capital allocation", "acquisition", "buyback", "leadership"],
    },
    Template {
        id: "financial_health",
        title: "Financial Health",
        tier: 2,
        keywords: &["balance sheet", "debt", "liquidity", "margin", "leverage", "cash flow"],
    },
    Template {
        id: "history",
        title: "Corporate History and Defining Decisions",
        tier: 3,
        keywords: &["history", "founded", "founder", "timeline", "era", "decision"],
    },
    Template {
        id: "risks",
        title: "Risks and Resilience",
        tier: 3,
        keywords: &["risk", "threat", "regulation", "downside", "resilience", "cyclical"],
    },
    Template {
        id: "conclusion",
        title: "Conclusion and Investment Thesis",
        tier: 3,
        keywords: &["thesis", "conclusion", "outlook", "recommendation"],
    },
];

const PRIMER_OUTLINE: &[Template] = &[
    Template {
        id: "primer_ownership",
        title: "Primer: Thinking Like a Business Owner",
        tier: 1,
        keywords: &["owner", "shareholder", "business", "stock"],
    },
    Template {
        id: "primer_valuation",
        title: "Primer: How Valuation Works",
        tier: 1,
        keywords: &["valuation", "discount", "intrinsic", "present value"],
    },
    Template {
        id: "primer_statements",
        title: "Primer: Reading the Financial Statements",
        tier: 2,
        keywords: &["income statement", "balance sheet", "cash flow", "margin"],
    },
    Template {
        id: "glossary",
        title: "Glossary of Key Terms",
        tier: 3,
        keywords: &["definition", "term", "ratio"],
    },
];

/// Map an expertise level to the ordered document outline.
pub fn determine_sections(level: ExpertiseLevel) -> Vec<SectionSpec> {
    let depth_multiplier = level.depth_multiplier();
    let educational = level.wants_educational_content();

    let templates = BASE_OUTLINE
        .iter()
        .chain(PRIMER_OUTLINE.iter().filter(|_| educational));

    let mut sections: Vec<SectionSpec> = templates
        .map(|t| SectionSpec {
            id: t.id.to_string(),
            title: t.title.to_string(),
            priority_tier: t.tier,
            depth_multiplier,
            include_educational_content: educational,
            relevance_keywords: t.keywords.iter().map(|k| k.to_string()).collect(),
        })
        .collect();

    // Stable: declared order is kept within a tier.
    sections.sort_by_key(|s| s.priority_tier);
    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    fn level(n: u8) -> ExpertiseLevel {
        ExpertiseLevel::new(n).unwrap()
    }

    #[test]
    fn deterministic() {
        for n in 1..=10 {
            assert_eq!(determine_sections(level(n)), determine_sections(level(n)));
        }
    }

    #[test]
    fn novice_outline_is_educational_and_deep() {
        let sections = determine_sections(level(3));
        assert!(sections.iter().any(|s| s.id == "primer_valuation"));
        assert!(
            sections
                .iter()
                .any(|s| s.include_educational_content && s.depth_multiplier >= 1.8)
        );
    }

    #[test]
    fn expert_outline_is_lean() {
        let sections = determine_sections(level(8));
        assert_eq!(sections.len(), BASE_OUTLINE.len());
        assert!(sections.iter().all(|s| !s.include_educational_content));
        assert!(sections.iter().all(|s| s.depth_multiplier <= 0.7));
    }

    #[test]
    fn primers_appear_at_level_five_not_six() {
        assert!(determine_sections(level(5)).len() > BASE_OUTLINE.len());
        assert_eq!(determine_sections(level(6)).len(), BASE_OUTLINE.len());
    }

    #[test]
    fn sorted_by_tier_then_declared_order() {
        let sections = determine_sections(level(2));
        let tiers: Vec<u8> = sections.iter().map(|s| s.priority_tier).collect();
        let mut sorted = tiers.clone();
        sorted.sort();
        assert_eq!(tiers, sorted);

        let tier_one: Vec<&str> = sections
            .iter()
            .filter(|s| s.priority_tier == 1)
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(
            tier_one,
            vec![
                "executive_summary",
                "business_overview",
                "primer_ownership",
                "primer_valuation"
            ]
        );
    }

    #[test]
    fn ceiling_scales_and_caps() {
        let mut spec = determine_sections(level(6)).remove(0);
        assert_eq!(spec.output_ceiling(1_000, 8_000), 1_000);
        spec.priority_tier = 3;
        spec.depth_multiplier = 2.5;
        assert_eq!(spec.output_ceiling(1_000, 4_000), 4_000);
        spec.depth_multiplier = 0.0;
        assert_eq!(spec.output_ceiling(1_000, 4_000), 1);
    }
}
