//! Research producers for Dossier.
//!
//! Five roles share the [`ResearchProducer`] contract and write into a
//! session's knowledge store. The [`ResearchCoordinator`] runs them in
//! dependency waves with retry, timeout, and per-contribution reporting.

pub mod citations;
pub mod coordinator;
pub mod producer;
pub mod roles;

pub use citations::extract_citations;
pub use coordinator::{
    ContributionReport, ContributionStatus, CoordinatorSettings, ResearchCoordinator,
    ResearchReport,
};
pub use producer::{ResearchContext, ResearchProducer};
pub use roles::{
    HistorianProducer, OwnerReturnsProducer, StrategicProducer, SynthesisProducer,
    ValuationProducer, default_roster,
};
