//! Section-relevant excerpts of the research corpus.
//!
//! Each section gets the artifacts that match its keywords. Excerpts are
//! rendered least relevant first so the budget trimmer, which keeps the
//! tail, drops the weakest material before anything else. A section with no
//! matches falls back to the whole corpus.

use std::fmt;
use std::str::FromStr;

use dossier_budget::trim_to_budget;
use dossier_core::{Artifact, ArtifactId, Error};
use serde::{Deserialize, Serialize};

use crate::planner::SectionSpec;

/// How an artifact matching several sections is handed out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Every matching section sees the artifact.
    #[default]
    Shared,
    /// Only the section with the most keyword hits sees it; ties go to the
    /// earliest section.
    BestMatch,
}

impl FromStr for TieBreak {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shared" => Ok(Self::Shared),
            "best_match" => Ok(Self::BestMatch),
            other => Err(Error::validation(format!(
                "unknown tie_break '{other}', expected 'shared' or 'best_match'"
            ))),
        }
    }
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Shared => "shared",
            Self::BestMatch => "best_match",
        })
    }
}

/// Excerpt handed to one section prompt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Excerpt {
    pub text: String,
    /// Artifacts that survived trimming, in rendered order.
    pub artifact_ids: Vec<ArtifactId>,
    /// True when no artifact matched and the whole corpus was used.
    pub fallback: bool,
}

/// Number of distinct section keywords found in an artifact.
pub fn keyword_hits(section: &SectionSpec, artifact: &Artifact) -> usize {
    let haystack = format!(
        "{} {} {} {}",
        artifact.topic.replace('_', " "),
        artifact.subtopic.replace('_', " "),
        artifact.title.as_deref().unwrap_or_default(),
        artifact.content
    )
    .to_lowercase();

    section
        .relevance_keywords
        .iter()
        .filter(|k| !k.is_empty() && haystack.contains(&k.to_lowercase()))
        .count()
}

/// Per-section relevance scores over a fixed corpus.
pub struct RelevanceMap<'a> {
    corpus: &'a [Artifact],
    /// `scores[section][artifact]`, zero when not assigned.
    scores: Vec<Vec<usize>>,
}

impl<'a> RelevanceMap<'a> {
    pub fn build(sections: &[SectionSpec], corpus: &'a [Artifact], tie_break: TieBreak) -> Self {
        let mut scores: Vec<Vec<usize>> = sections
            .iter()
            .map(|s| corpus.iter().map(|a| keyword_hits(s, a)).collect())
            .collect();

        if tie_break == TieBreak::BestMatch {
            for artifact in 0..corpus.len() {
                let winner = scores
                    .iter()
                    .enumerate()
                    .filter(|(_, row)| row[artifact] > 0)
                    // max_by_key keeps the last maximum; reverse to keep the first.
                    .rev()
                    .max_by_key(|(_, row)| row[artifact])
                    .map(|(i, _)| i);
                for (i, row) in scores.iter_mut().enumerate() {
                    if Some(i) != winner {
                        row[artifact] = 0;
                    }
                }
            }
        }

        Self { corpus, scores }
    }

    /// Artifacts assigned to a section, with their scores.
    pub fn matches(&self, section: usize) -> Vec<(&'a Artifact, usize)> {
        let Some(row) = self.scores.get(section) else {
            return Vec::new();
        };
        self.corpus
            .iter()
            .zip(row.iter().copied())
            .filter(|(_, score)| *score > 0)
            .collect()
    }

    /// Render the excerpt for one section within `max_tokens`.
    pub fn excerpt(&self, section: usize, max_tokens: usize) -> Excerpt {
        let mut picked = self.matches(section);
        let fallback = picked.is_empty();
        if fallback {
            picked = self.corpus.iter().map(|a| (a, 0)).collect();
        }
        // Stable, so equal scores keep store order and newer artifacts sit
        // closer to the kept tail.
        picked.sort_by_key(|(_, score)| *score);

        let text = picked
            .iter()
            .map(|(a, _)| render_artifact(a))
            .collect::<Vec<_>>()
            .join("\n\n");
        let text = trim_to_budget(&text, max_tokens, None);

        let artifact_ids = picked
            .iter()
            .filter(|(a, _)| text.contains(&source_tag(a)))
            .map(|(a, _)| a.id.clone())
            .collect();

        Excerpt {
            text,
            artifact_ids,
            fallback,
        }
    }
}

fn source_tag(artifact: &Artifact) -> String {
    format!("[artifact: {}]", artifact.id)
}

fn render_artifact(artifact: &Artifact) -> String {
    format!(
        "{}\n### {} ({}/{})\n\n{}",
        source_tag(artifact),
        artifact.display_title(),
        artifact.topic,
        artifact.subtopic,
        artifact.content.trim()
    )
}
