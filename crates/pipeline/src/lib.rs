//! Report orchestration for Dossier.
//!
//! [`ReportPipeline`] drives one session from research through the
//! delivered document. [`SessionRegistry`] exposes running sessions for
//! status polling and cancellation.

pub mod pipeline;
pub mod registry;

pub use pipeline::{PipelineSettings, ReportOutcome, ReportPipeline, ReportRequest};
pub use registry::{SessionHandle, SessionRegistry};
