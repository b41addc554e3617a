//! Run orchestration: fetch scope, score, classify, persist, report.
//!
//! One run processes every pending evidence item in scope against a
//! candidate set fetched once at the start. Failures are contained per item:
//! the item moves to `error` status with a message and the run continues.

use crate::config::LinkerConfig;
use crate::departments::DepartmentStandardizer;
use crate::link::repository::{LinkOutcome, LinkRepository};
use crate::model::LinkingStatus;
use crate::retry::RetryPolicy;
use crate::scoring::{CandidateScorer, PromiseCandidate};
use crate::store::{DocumentStore, EvidenceFilter, PromiseFilter, StorageResult};
use crate::text::{normalize_evidence, normalize_promise};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Which promises and evidence a run covers.
#[derive(Debug, Clone)]
pub struct RunScope {
    pub parliament_session_id: String,
    /// Restrict candidate promises to one party.
    pub party_code: Option<String>,
    /// Cap on pending evidence items processed this run.
    pub limit: Option<usize>,
}

impl RunScope {
    pub fn new(parliament_session_id: impl Into<String>) -> Self {
        Self {
            parliament_session_id: parliament_session_id.into(),
            party_code: None,
            limit: None,
        }
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

/// Per-item result within a run.
#[derive(Debug, Clone)]
pub struct ItemOutcome {
    pub evidence_id: String,
    pub status: LinkingStatus,
    pub links_created: usize,
    pub links_updated: usize,
    pub links_skipped: usize,
    pub error: Option<String>,
}

/// Summary of one orchestrated run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub candidates_in_scope: usize,
    pub items: Vec<ItemOutcome>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == LinkingStatus::Processed)
            .count()
    }

    pub fn errored(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == LinkingStatus::Error)
            .count()
    }

    pub fn links_created(&self) -> usize {
        self.items.iter().map(|i| i.links_created).sum()
    }

    pub fn links_updated(&self) -> usize {
        self.items.iter().map(|i| i.links_updated).sum()
    }
}

/// Drives a linking run end to end.
pub struct LinkingOrchestrator {
    store: Arc<dyn DocumentStore>,
    repository: LinkRepository,
    scorer: Arc<dyn CandidateScorer>,
    departments: DepartmentStandardizer,
    config: LinkerConfig,
}

impl LinkingOrchestrator {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        scorer: Arc<dyn CandidateScorer>,
        departments: DepartmentStandardizer,
        config: LinkerConfig,
    ) -> Self {
        let retry = RetryPolicy::new(
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
        );
        let repository = LinkRepository::new(store.clone(), config.replace_margin, retry);
        Self {
            store,
            repository,
            scorer,
            departments,
            config,
        }
    }

    /// Process every pending evidence item in scope.
    ///
    /// Returns an error only when the run cannot start (scope queries fail);
    /// per-item failures are captured in the report.
    pub async fn run(&self, scope: &RunScope) -> StorageResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();

        let candidates = self.fetch_candidates(scope)?;
        let pending = self.fetch_pending(scope)?;
        info!(
            %run_id,
            session = %scope.parliament_session_id,
            party = scope.party_code.as_deref().unwrap_or("any"),
            scorer = %self.scorer.algorithm(),
            candidates = candidates.len(),
            pending = pending.len(),
            "linking run started"
        );

        let mut items = Vec::with_capacity(pending.len());
        let total = pending.len();
        for (index, evidence) in pending.into_iter().enumerate() {
            let outcome = self.process_item(&evidence, &candidates).await;
            items.push(outcome);

            // Fixed pacing delay for remote scorers, skipped after the last item.
            if self.scorer.is_remote() && index + 1 < total && self.config.inter_call_delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.inter_call_delay_ms)).await;
            }
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            candidates_in_scope: candidates.len(),
            items,
        };
        info!(
            %run_id,
            processed = report.processed(),
            errored = report.errored(),
            created = report.links_created(),
            updated = report.links_updated(),
            "linking run finished"
        );
        Ok(report)
    }

    fn fetch_candidates(&self, scope: &RunScope) -> StorageResult<Vec<PromiseCandidate>> {
        let mut filter = PromiseFilter::new().with_session(&scope.parliament_session_id);
        if let Some(party) = &scope.party_code {
            filter = filter.with_party(party);
        }
        if let Some(limit) = self.config.candidate_limit {
            filter = filter.with_limit(limit);
        }
        let promises = self.store.find_promises(&filter)?;
        Ok(promises
            .into_iter()
            .map(|promise| {
                let terms = normalize_promise(&promise, &self.departments);
                PromiseCandidate::new(promise, terms)
            })
            .collect())
    }

    fn fetch_pending(&self, scope: &RunScope) -> StorageResult<Vec<crate::model::EvidenceItem>> {
        let mut filter = EvidenceFilter::new()
            .with_session(&scope.parliament_session_id)
            .with_status(LinkingStatus::Pending);
        if let Some(limit) = scope.limit.or(self.config.batch_limit) {
            filter = filter.with_limit(limit);
        }
        self.store.find_evidence(&filter)
    }

    async fn process_item(
        &self,
        evidence: &crate::model::EvidenceItem,
        candidates: &[PromiseCandidate],
    ) -> ItemOutcome {
        match self.link_item(evidence, candidates).await {
            Ok((created, updated, skipped)) => ItemOutcome {
                evidence_id: evidence.evidence_id.clone(),
                status: LinkingStatus::Processed,
                links_created: created,
                links_updated: updated,
                links_skipped: skipped,
                error: None,
            },
            Err(message) => {
                warn!(evidence_id = %evidence.evidence_id, error = %message, "evidence item failed");
                if let Err(err) = self.repository.mark_error(&evidence.evidence_id, &message).await
                {
                    warn!(
                        evidence_id = %evidence.evidence_id,
                        error = %err,
                        "could not record error status"
                    );
                }
                ItemOutcome {
                    evidence_id: evidence.evidence_id.clone(),
                    status: LinkingStatus::Error,
                    links_created: 0,
                    links_updated: 0,
                    links_skipped: 0,
                    error: Some(message),
                }
            }
        }
    }

    /// Score, classify, and persist one evidence item. Returns
    /// (created, updated, skipped) counts or an error message.
    async fn link_item(
        &self,
        evidence: &crate::model::EvidenceItem,
        candidates: &[PromiseCandidate],
    ) -> Result<(usize, usize, usize), String> {
        let evidence_terms = normalize_evidence(evidence, &self.departments);

        let scores = self
            .score_with_retry(evidence, &evidence_terms, candidates)
            .await
            .map_err(|err| format!("scoring failed: {}", err))?;

        let mut created = 0;
        let mut updated = 0;
        let mut skipped = 0;
        for score in &scores {
            let Some(confidence) = self.config.thresholds.classify(score.raw_score) else {
                continue;
            };
            debug!(
                evidence_id = %evidence.evidence_id,
                promise_id = %score.promise_id,
                score = score.raw_score,
                confidence = %confidence,
                signals = ?score.matched_signals,
                "candidate accepted"
            );
            let outcome = self
                .repository
                .upsert_link(
                    &score.promise_id,
                    &evidence.evidence_id,
                    score.raw_score,
                    confidence,
                    self.scorer.algorithm(),
                )
                .await
                .map_err(|err| format!("link persistence failed: {}", err))?;
            match outcome {
                LinkOutcome::Created => created += 1,
                LinkOutcome::Updated => updated += 1,
                LinkOutcome::Skipped => skipped += 1,
            }
        }

        self.repository
            .mark_processed(&evidence.evidence_id)
            .await
            .map_err(|err| format!("status update failed: {}", err))?;
        Ok((created, updated, skipped))
    }

    /// The scoring contract is async, so retries live here rather than in
    /// [`RetryPolicy`]; the semantics match (linear backoff, last error wins).
    async fn score_with_retry(
        &self,
        evidence: &crate::model::EvidenceItem,
        evidence_terms: &crate::text::TermSet,
        candidates: &[PromiseCandidate],
    ) -> Result<Vec<crate::scoring::CandidateScore>, crate::scoring::ScoringError> {
        let max_attempts = self.config.max_retries.max(1);
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempt = 1u32;
        loop {
            match self
                .scorer
                .score_candidates(evidence, evidence_terms, candidates)
                .await
            {
                Ok(scores) => return Ok(scores),
                Err(err) if attempt < max_attempts => {
                    warn!(
                        %attempt,
                        evidence_id = %evidence.evidence_id,
                        error = %err,
                        "scoring failed, retrying"
                    );
                    tokio::time::sleep(backoff * attempt).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
