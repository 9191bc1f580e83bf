//! Document synthesis for Dossier.
//!
//! Turns a session's research corpus into one long document without ever
//! sending the whole thing to the backend at once:
//!
//! 1. **Plan** the outline from the reader's expertise level
//! 2. **Select** section-relevant excerpts of the corpus
//! 3. **Generate** sections one at a time, each seeing a trimmed rolling
//!    context of what came before
//! 4. **Assemble** the sections, with sources and a degradation manifest

pub mod assembler;
pub mod generator;
pub mod planner;
pub mod progress;
pub mod prompt;
pub mod relevance;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use assembler::{
    AssembledDocument, DegradationManifest, DocumentHeader, DuplicateFlag, ManifestEntry,
    merge_sections,
};
pub use generator::{
    ChunkedGenerator, GeneratedSection, GenerationRequest, GeneratorSettings, PLACEHOLDER,
    SectionOutcome,
};
pub use planner::{SectionSpec, determine_sections};
pub use progress::ProgressHandle;
pub use relevance::{Excerpt, RelevanceMap, TieBreak};
