//! Document-store trait definitions.
//!
//! The linking engine depends on a generic persistent store with
//! get-by-id, equality-filter queries with an optional limit,
//! create-or-overwrite, and atomic per-document read-modify-write
//! (including additive set-union updates for the evidence-side
//! `promise_ids` array). No transaction spans both collections; the
//! integrity checker is the compensating control for partial dual writes.

use crate::model::{EvidenceItem, EvidenceLink, LinkingStatus, Promise};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Promise not found: {0}")]
    PromiseNotFound(String),

    #[error("Evidence not found: {0}")]
    EvidenceNotFound(String),

    #[error("Invalid stored field: {0}")]
    InvalidField(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Equality filter for querying promises.
#[derive(Debug, Clone, Default)]
pub struct PromiseFilter {
    pub parliament_session_id: Option<String>,
    pub party_code: Option<String>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl PromiseFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.parliament_session_id = Some(session.into());
        self
    }

    pub fn with_party(mut self, party: impl Into<String>) -> Self {
        self.party_code = Some(party.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Equality filter for querying evidence items.
#[derive(Debug, Clone, Default)]
pub struct EvidenceFilter {
    pub parliament_session_id: Option<String>,
    pub linking_status: Option<LinkingStatus>,
    /// Maximum number of results.
    pub limit: Option<usize>,
}

impl EvidenceFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.parliament_session_id = Some(session.into());
        self
    }

    pub fn with_status(mut self, status: LinkingStatus) -> Self {
        self.linking_status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Trait for promise/evidence storage backends.
///
/// Implementations must be thread-safe (Send + Sync). Each mutating
/// operation is atomic per document; none spans both collections.
pub trait DocumentStore: Send + Sync {
    // === Promise operations ===

    /// Create or overwrite a promise document.
    fn save_promise(&self, promise: &Promise) -> StorageResult<()>;

    /// Load a promise by id.
    fn get_promise(&self, promise_id: &str) -> StorageResult<Option<Promise>>;

    /// Find promises matching the filter.
    fn find_promises(&self, filter: &PromiseFilter) -> StorageResult<Vec<Promise>>;

    // === Evidence operations ===

    /// Create or overwrite an evidence document.
    fn save_evidence(&self, evidence: &EvidenceItem) -> StorageResult<()>;

    /// Load an evidence item by id.
    fn get_evidence(&self, evidence_id: &str) -> StorageResult<Option<EvidenceItem>>;

    /// Find evidence items matching the filter.
    fn find_evidence(&self, filter: &EvidenceFilter) -> StorageResult<Vec<EvidenceItem>>;

    // === Atomic link mutations (promise side) ===

    /// Insert or replace the link record for `link.evidence_id` on the
    /// promise, atomically. At most one record per evidence id survives.
    fn upsert_promise_link(&self, promise_id: &str, link: &EvidenceLink) -> StorageResult<()>;

    /// Remove all link records for the pair; returns whether any existed.
    fn remove_promise_link(&self, promise_id: &str, evidence_id: &str) -> StorageResult<bool>;

    /// Collapse duplicate link records (same evidence id) keeping the
    /// first; returns how many records were removed.
    fn dedupe_promise_links(&self, promise_id: &str) -> StorageResult<usize>;

    // === Atomic link mutations (evidence side) ===

    /// Add `promise_id` to the evidence item's `promise_ids` with union
    /// semantics; returns false if it was already present.
    fn add_promise_ref(&self, evidence_id: &str, promise_id: &str) -> StorageResult<bool>;

    /// Remove all occurrences of `promise_id` from the evidence item's
    /// `promise_ids`; returns whether any existed.
    fn remove_promise_ref(&self, evidence_id: &str, promise_id: &str) -> StorageResult<bool>;

    /// Collapse duplicate promise references; returns how many were removed.
    fn dedupe_promise_refs(&self, evidence_id: &str) -> StorageResult<usize>;

    /// Set the linking status (and optional error message) on an evidence
    /// item.
    fn set_linking_status(
        &self,
        evidence_id: &str,
        status: LinkingStatus,
        error: Option<&str>,
    ) -> StorageResult<()>;
}

/// Extension trait for opening stores from paths.
pub trait OpenStore: DocumentStore + Sized {
    /// Open or create a store at the given path.
    fn open(path: impl AsRef<Path>) -> StorageResult<Self>;

    /// Create an in-memory store (useful for testing).
    fn open_in_memory() -> StorageResult<Self>;
}
