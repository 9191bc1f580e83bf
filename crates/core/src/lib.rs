//! # Dossier Core
//!
//! Domain types, traits, and error definitions for the Dossier research
//! pipeline. This crate has **no framework dependencies**: it defines the
//! domain model that the store, budgeter, synthesis, and pipeline crates
//! implement against.
//!
//! ## Design Philosophy
//!
//! External collaborators (the text-generation backend and the document
//! compiler) are traits here. Implementations live in `dossier-providers`,
//! which keeps every other crate testable against scripted stand-ins.

pub mod artifact;
pub mod backend;
pub mod cancel;
pub mod error;
pub mod expertise;
pub mod retry;
pub mod state;

// Re-export key types at crate root for ergonomics
pub use artifact::{Artifact, ArtifactId, ArtifactMetadata, Comment, CrossReference, SessionKey};
pub use backend::{DocumentCompiler, GenerationBackend, Prompt};
pub use cancel::CancellationFlag;
pub use error::{BackendError, CompileError, Error, Result};
pub use expertise::{DepthLabel, ExpertiseLevel};
pub use retry::RetryPolicy;
pub use state::{ErrorEntry, GenerationState, GenerationStatus};
