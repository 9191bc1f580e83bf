//! Section prompt construction.

use dossier_core::{ExpertiseLevel, Prompt};

use crate::planner::SectionSpec;
use crate::relevance::Excerpt;

/// Rough words-per-token ratio used to phrase length targets.
const WORDS_PER_TOKEN: f32 = 0.75;

/// Everything a section prompt is built from. Rendering takes the output
/// ceiling separately so a budget retry can ask for a shorter section
/// without rebuilding the rest.
pub struct SectionPrompt<'a> {
    pub ticker: &'a str,
    pub expertise: ExpertiseLevel,
    pub section: &'a SectionSpec,
    pub position: usize,
    pub total: usize,
    /// Outline header plus the trimmed text of earlier sections.
    pub rolling_context: &'a str,
    pub excerpt: &'a Excerpt,
}

impl SectionPrompt<'_> {
    pub fn render(&self, output_ceiling: u32) -> Prompt {
        let depth = self.expertise.depth_label();
        let target_words = (output_ceiling as f32 * WORDS_PER_TOKEN).round() as u32;

        let mut system = format!(
            "You are a senior equity analyst writing one section of a research \
             dossier on {ticker}. Write for a reader at expertise level {level}/10 \
             ({depth}: {detail}).",
            ticker = self.ticker,
            level = self.expertise,
            depth = depth,
            detail = depth.detail(),
        );
        if self.section.include_educational_content {
            system.push_str(
                " Define every financial term the first time it appears and walk \
                 through reasoning step by step with concrete examples.",
            );
        } else {
            system.push_str(" Assume fluency with financial vocabulary; be dense and direct.");
        }
        system.push_str(
            " Ground claims in the research excerpt. Do not repeat material already \
             covered in earlier sections. Output markdown without a top-level heading.",
        );

        let mut user = format!(
            "Write section {pos} of {total}: \"{title}\".\nTarget length: about \
             {target_words} words.\n",
            pos = self.position,
            total = self.total,
            title = self.section.title,
        );

        if !self.rolling_context.trim().is_empty() {
            user.push_str("\n<document_so_far>\n");
            user.push_str(self.rolling_context.trim());
            user.push_str("\n</document_so_far>\n");
        }

        user.push_str("\n<research_excerpt>\n");
        if self.excerpt.text.trim().is_empty() {
            user.push_str("(no research available for this section)");
        } else {
            user.push_str(self.excerpt.text.trim());
        }
        user.push_str("\n</research_excerpt>\n");

        Prompt::new(system, user)
    }
}

/// Header pinned at the start of the rolling context.
pub fn outline_header(ticker: &str, sections: &[SectionSpec]) -> String {
    let mut header = format!("# {ticker} research dossier outline\n");
    for (i, section) in sections.iter().enumerate() {
        header.push_str(&format!("{}. {}\n", i + 1, section.title));
    }
    header
}
