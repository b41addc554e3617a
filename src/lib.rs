//! PromiseTrack: Evidence-to-Promise Linking Engine
//!
//! Matches incoming evidence items (bill events, orders in council, news)
//! against recorded government promises and maintains bidirectional links
//! between the two collections.
//!
//! # Core Concepts
//!
//! - **Promises**: recorded political commitments, scoped by parliament
//!   session and party
//! - **Evidence**: discrete factual records that may substantiate a promise
//! - **Links**: scored, confidence-bucketed records stored redundantly on
//!   both sides, written idempotently with a replace-if-better policy
//!
//! # Example
//!
//! ```
//! use promisetrack::{OpenStore, SqliteStore};
//!
//! let store = SqliteStore::open_in_memory().unwrap();
//! // Store is ready for promises and evidence
//! ```

pub mod config;
pub mod departments;
pub mod generate;
pub mod integrity;
pub mod link;
mod model;
pub mod retry;
pub mod scoring;
pub mod store;
pub mod text;

pub use config::{ConfigError, LinkerConfig};
pub use departments::{AliasTable, DepartmentStandardizer};
pub use integrity::{
    Discrepancy, DiscrepancyKind, FixOp, IntegrityChecker, IntegrityReport, RemediationOutcome,
    RemediationPlan,
};
pub use link::{ItemOutcome, LinkOutcome, LinkRepository, LinkingOrchestrator, RunReport, RunScope};
pub use model::{
    Algorithm, ConfidenceLevel, EvidenceItem, EvidenceLink, LinkingStatus, Promise,
};
pub use scoring::{
    CandidateScore, CandidateScorer, ConfidenceThresholds, EmbeddingScorer, LexicalScorer,
    LlmBatchScorer, PromiseCandidate, ScoringError,
};
pub use store::{
    DocumentStore, EvidenceFilter, OpenStore, PromiseFilter, SqliteStore, StorageError,
    StorageResult,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
