//! Link persistence and orchestration.
//!
//! [`LinkRepository`] owns the replace-if-better policy and the dual-sided
//! write protocol; [`LinkingOrchestrator`] drives a full run over pending
//! evidence.

mod orchestrator;
mod repository;

pub use orchestrator::{ItemOutcome, LinkingOrchestrator, RunReport, RunScope};
pub use repository::{LinkOutcome, LinkRepository};
