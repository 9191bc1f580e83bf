//! Final document assembly.
//!
//! Sections are stitched in planned order under a title and table of
//! contents. Each section closes with the artifacts it drew on. Identical
//! section bodies are flagged, not removed. The degradation manifest is
//! always the last block of the document, even when nothing went wrong.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use dossier_core::ExpertiseLevel;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::generator::{GeneratedSection, SectionOutcome};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub section_id: String,
    pub title: String,
    pub reason: String,
}

/// Two sections whose bodies hash identically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateFlag {
    pub section_id: String,
    pub duplicate_of: String,
    pub sha256: String,
}

/// Everything that kept the document from being whole.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DegradationManifest {
    pub placeholders: Vec<ManifestEntry>,
    pub skipped: Vec<ManifestEntry>,
    pub duplicates: Vec<DuplicateFlag>,
}

impl DegradationManifest {
    pub fn is_clean(&self) -> bool {
        self.placeholders.is_empty() && self.skipped.is_empty() && self.duplicates.is_empty()
    }

    fn render(&self) -> String {
        let mut out = String::from("## Degradation Manifest\n\n");
        if self.is_clean() {
            out.push_str("None. Every section was generated in full.\n");
            return out;
        }
        for entry in &self.placeholders {
            out.push_str(&format!(
                "- **Incomplete:** {} (`{}`): {}\n",
                entry.title, entry.section_id, entry.reason
            ));
        }
        for entry in &self.skipped {
            out.push_str(&format!(
                "- **Skipped:** {} (`{}`): {}\n",
                entry.title, entry.section_id, entry.reason
            ));
        }
        for flag in &self.duplicates {
            out.push_str(&format!(
                "- **Duplicate:** `{}` repeats `{}` (sha256 {})\n",
                flag.section_id,
                flag.duplicate_of,
                &flag.sha256[..12]
            ));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct AssembledDocument {
    pub markdown: String,
    pub manifest: DegradationManifest,
}

/// Heading block for the document.
pub struct DocumentHeader<'a> {
    pub ticker: &'a str,
    pub expertise: ExpertiseLevel,
    pub generated_at: DateTime<Utc>,
}

/// Merge ordered sections into one markdown document.
pub fn merge_sections(header: &DocumentHeader<'_>, sections: &[GeneratedSection]) -> AssembledDocument {
    let manifest = build_manifest(sections);

    let mut doc = format!(
        "# {} Research Dossier\n\n_Expertise level {} ({}). Generated {}._\n\n",
        header.ticker,
        header.expertise,
        header.expertise.depth_label(),
        header.generated_at.format("%Y-%m-%d %H:%M UTC"),
    );

    doc.push_str("## Contents\n\n");
    for (i, section) in sections.iter().enumerate() {
        doc.push_str(&format!(
            "{}. [{}](#{})\n",
            i + 1,
            section.spec.title,
            anchor(&section.spec.title)
        ));
    }
    doc.push('\n');

    for section in sections {
        doc.push_str(&format!("## {}\n\n", section.spec.title));
        doc.push_str(section.body.trim());
        doc.push_str("\n\n");
        doc.push_str(&sources_footer(section));
        doc.push_str("\n---\n\n");
    }

    doc.push_str(&manifest.render());

    AssembledDocument {
        markdown: doc,
        manifest,
    }
}

fn sources_footer(section: &GeneratedSection) -> String {
    if section.sources.is_empty() {
        return "> Sources: none\n".to_string();
    }
    let ids: Vec<String> = section.sources.iter().map(|id| format!("`{id}`")).collect();
    format!("> Sources: {}\n", ids.join(", "))
}

fn build_manifest(sections: &[GeneratedSection]) -> DegradationManifest {
    let mut manifest = DegradationManifest::default();
    let mut seen: HashMap<String, &str> = HashMap::new();

    for section in sections {
        let entry = |reason: &str| ManifestEntry {
            section_id: section.spec.id.clone(),
            title: section.spec.title.clone(),
            reason: reason.to_string(),
        };
        match &section.outcome {
            SectionOutcome::Generated => {
                let digest = hex::encode(Sha256::digest(section.body.trim().as_bytes()));
                if let Some(first) = seen.get(&digest) {
                    warn!(
                        section = %section.spec.id,
                        duplicate_of = %first,
                        "Duplicate section content detected"
                    );
                    manifest.duplicates.push(DuplicateFlag {
                        section_id: section.spec.id.clone(),
                        duplicate_of: first.to_string(),
                        sha256: digest,
                    });
                } else {
                    seen.insert(digest, &section.spec.id);
                }
            }
            SectionOutcome::Placeholder { reason } => manifest.placeholders.push(entry(reason)),
            SectionOutcome::Skipped => manifest.skipped.push(entry("run cancelled")),
        }
    }

    manifest
}

/// GitHub-style heading anchor.
fn anchor(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter_map(|c| match c {
            c if c.is_alphanumeric() => Some(c),
            ' ' | '-' => Some('-'),
            _ => None,
        })
        .collect()
}
