//! Idempotent, dual-sided link persistence.
//!
//! Every accepted candidate is written to both sides: a full link record on
//! the promise's `linked_evidence`, a bare id in the evidence item's
//! `promise_ids` (union semantics). The two writes are not transactional;
//! the promise side is written first and is the authoritative one, and the
//! integrity checker reconciles partial writes after the fact.

use crate::model::{Algorithm, ConfidenceLevel, EvidenceLink, LinkingStatus};
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, StorageError, StorageResult};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// What happened to one candidate link on upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    /// No link existed for the pair; one was created.
    Created,
    /// An existing link was overwritten with the new score.
    Updated,
    /// An existing link was kept; the new score did not beat it.
    Skipped,
}

/// Writes links with replace-if-better semantics.
pub struct LinkRepository {
    store: Arc<dyn DocumentStore>,
    replace_margin: f64,
    retry: RetryPolicy,
}

impl LinkRepository {
    pub fn new(store: Arc<dyn DocumentStore>, replace_margin: f64, retry: RetryPolicy) -> Self {
        Self {
            store,
            replace_margin,
            retry,
        }
    }

    /// Whether a new score from `algorithm` should overwrite `existing`.
    ///
    /// An existing link survives unless the new pass used a different
    /// algorithm than a non-enhanced prior one, or the new score beats the
    /// stored score by more than the margin. Enhanced scores (LLM, embedding)
    /// are never displaced by a merely different algorithm.
    fn should_replace(&self, existing: &EvidenceLink, algorithm: Algorithm, score: f64) -> bool {
        let algorithm_upgrade =
            algorithm != existing.algorithm && !existing.algorithm.is_enhanced();
        algorithm_upgrade || score > existing.similarity_score + self.replace_margin
    }

    /// Persist one accepted candidate link on both sides.
    ///
    /// Reads the promise fresh so the decision reflects the stored link, not
    /// a snapshot from the start of the run. The evidence-side reference is
    /// added unconditionally (union semantics), which also repairs a missing
    /// back-reference on a skipped pair.
    pub async fn upsert_link(
        &self,
        promise_id: &str,
        evidence_id: &str,
        score: f64,
        confidence: ConfidenceLevel,
        algorithm: Algorithm,
    ) -> StorageResult<LinkOutcome> {
        let promise = self
            .retry
            .run("load promise", || self.store.get_promise(promise_id))
            .await?
            .ok_or_else(|| StorageError::PromiseNotFound(promise_id.to_string()))?;

        let outcome = match promise.find_link(evidence_id) {
            None => {
                let link = EvidenceLink::new(evidence_id, score, confidence, algorithm);
                self.retry
                    .run("create link", || {
                        self.store.upsert_promise_link(promise_id, &link)
                    })
                    .await?;
                LinkOutcome::Created
            }
            Some(existing) if self.should_replace(existing, algorithm, score) => {
                let link = EvidenceLink {
                    evidence_id: evidence_id.to_string(),
                    similarity_score: score,
                    confidence_level: confidence,
                    algorithm,
                    // Creation time survives the overwrite.
                    created_at: existing.created_at,
                    updated_at: Some(Utc::now()),
                };
                self.retry
                    .run("update link", || {
                        self.store.upsert_promise_link(promise_id, &link)
                    })
                    .await?;
                LinkOutcome::Updated
            }
            Some(existing) => {
                debug!(
                    promise_id,
                    evidence_id,
                    existing_score = existing.similarity_score,
                    existing_algorithm = %existing.algorithm,
                    new_score = score,
                    "existing link kept"
                );
                LinkOutcome::Skipped
            }
        };

        self.retry
            .run("add promise ref", || {
                self.store.add_promise_ref(evidence_id, promise_id)
            })
            .await?;

        Ok(outcome)
    }

    /// Mark an evidence item fully processed, clearing any prior error.
    pub async fn mark_processed(&self, evidence_id: &str) -> StorageResult<()> {
        self.retry
            .run("mark processed", || {
                self.store
                    .set_linking_status(evidence_id, LinkingStatus::Processed, None)
            })
            .await
    }

    /// Mark an evidence item failed with a message.
    pub async fn mark_error(&self, evidence_id: &str, message: &str) -> StorageResult<()> {
        self.retry
            .run("mark error", || {
                self.store
                    .set_linking_status(evidence_id, LinkingStatus::Error, Some(message))
            })
            .await
    }
}
