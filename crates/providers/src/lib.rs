//! Generation backends and document compilers for Dossier.
//!
//! Backends implement `dossier_core::GenerationBackend`; compilers implement
//! `dossier_core::DocumentCompiler`. The router builds both from
//! configuration.

pub mod compiler;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use compiler::{CommandCompiler, MarkdownCompiler};
pub use openai_compat::OpenAiCompatBackend;
pub use retry::RetryingBackend;
pub use router::{build_backend, build_compiler, default_base_url};
