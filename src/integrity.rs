//! Integrity checking for the bidirectional link invariants.
//!
//! The scan is read-only and runs independently of the orchestrator; it is
//! the compensating control for the non-transactional dual writes the link
//! repository performs. Discrepancies are reported, never silently fixed:
//! remediation is a separate, explicit pass over a machine-generated plan.

use crate::model::EvidenceItem;
use crate::store::{DocumentStore, EvidenceFilter, PromiseFilter, StorageResult};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Cap on sampled offending pairs per discrepancy kind in a report.
const SAMPLE_LIMIT: usize = 25;

/// Typed link-integrity defects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    /// A promise's `linked_evidence` references an evidence item that does
    /// not exist.
    OrphanedEvidenceReference,
    /// An evidence item's `promise_ids` references a promise that does not
    /// exist.
    OrphanedPromiseReference,
    /// The promise declares the link but the evidence item does not.
    MissingReverseLink,
    /// The evidence item declares the link but the promise does not.
    MissingForwardLink,
    /// A repeated identifier within a single side's link collection.
    DuplicateLink,
}

/// Which collection a discrepancy was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Promise,
    Evidence,
}

/// One observed invariant violation.
#[derive(Debug, Clone, Serialize)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub side: Side,
    pub promise_id: String,
    pub evidence_id: String,
}

/// Structured scan result: counts per kind plus a bounded sample of
/// offending pairs, suitable for machine consumption or human review.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub report_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub parliament_session_id: Option<String>,
    pub promises_scanned: usize,
    pub evidence_scanned: usize,
    pub counts: BTreeMap<DiscrepancyKind, usize>,
    pub samples: Vec<Discrepancy>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

/// An atomic fix operation in a remediation plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FixOp {
    /// Drop the promise-side link record for the pair.
    RemovePromiseLink {
        promise_id: String,
        evidence_id: String,
    },
    /// Drop the evidence-side reference for the pair.
    RemoveEvidenceRef {
        evidence_id: String,
        promise_id: String,
    },
    /// Add the missing evidence-side reference for the pair.
    AddEvidenceRef {
        evidence_id: String,
        promise_id: String,
    },
    /// Collapse duplicate link records on the promise.
    DedupePromiseLinks { promise_id: String },
    /// Collapse duplicate promise references on the evidence item.
    DedupeEvidenceRefs { evidence_id: String },
}

/// Machine-generated remediation plan derived from a scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemediationPlan {
    pub ops: Vec<FixOp>,
}

impl RemediationPlan {
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Map each discrepancy to its fix. The promise side is authoritative:
    /// a score-bearing link record cannot be reconstructed from a bare id,
    /// so a missing forward link is repaired by removing the evidence-side
    /// reference, while a missing reverse link is repaired additively.
    fn from_discrepancies(discrepancies: &[Discrepancy]) -> Self {
        let mut ops = Vec::new();
        for d in discrepancies {
            let op = match (d.kind, d.side) {
                (DiscrepancyKind::OrphanedEvidenceReference, _) => FixOp::RemovePromiseLink {
                    promise_id: d.promise_id.clone(),
                    evidence_id: d.evidence_id.clone(),
                },
                (DiscrepancyKind::OrphanedPromiseReference, _)
                | (DiscrepancyKind::MissingForwardLink, _) => FixOp::RemoveEvidenceRef {
                    evidence_id: d.evidence_id.clone(),
                    promise_id: d.promise_id.clone(),
                },
                (DiscrepancyKind::MissingReverseLink, _) => FixOp::AddEvidenceRef {
                    evidence_id: d.evidence_id.clone(),
                    promise_id: d.promise_id.clone(),
                },
                (DiscrepancyKind::DuplicateLink, Side::Promise) => FixOp::DedupePromiseLinks {
                    promise_id: d.promise_id.clone(),
                },
                (DiscrepancyKind::DuplicateLink, Side::Evidence) => FixOp::DedupeEvidenceRefs {
                    evidence_id: d.evidence_id.clone(),
                },
            };
            if !ops.contains(&op) {
                ops.push(op);
            }
        }
        Self { ops }
    }
}

/// Result of applying (or dry-running) a remediation plan.
#[derive(Debug, Clone, Serialize)]
pub struct RemediationOutcome {
    pub dry_run: bool,
    pub planned: usize,
    pub applied: usize,
    pub failures: Vec<String>,
}

/// Read-only scanner over both collections, plus explicit remediation.
pub struct IntegrityChecker {
    store: Arc<dyn DocumentStore>,
}

impl IntegrityChecker {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Scan both collections and report every invariant violation.
    pub fn check(&self, session: Option<&str>) -> StorageResult<IntegrityReport> {
        let (discrepancies, promises_scanned, evidence_scanned) = self.scan(session)?;

        let mut counts: BTreeMap<DiscrepancyKind, usize> = BTreeMap::new();
        let mut samples = Vec::new();
        for d in &discrepancies {
            let count = counts.entry(d.kind).or_insert(0);
            if *count < SAMPLE_LIMIT {
                samples.push(d.clone());
            }
            *count += 1;
        }

        let report = IntegrityReport {
            report_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            parliament_session_id: session.map(str::to_string),
            promises_scanned,
            evidence_scanned,
            counts,
            samples,
        };
        info!(
            report_id = %report.report_id,
            promises = promises_scanned,
            evidence = evidence_scanned,
            discrepancies = report.total(),
            "integrity scan complete"
        );
        Ok(report)
    }

    /// Scan and derive the remediation plan for everything found.
    pub fn plan(&self, session: Option<&str>) -> StorageResult<RemediationPlan> {
        let (discrepancies, _, _) = self.scan(session)?;
        Ok(RemediationPlan::from_discrepancies(&discrepancies))
    }

    /// Apply a remediation plan. With `dry_run` nothing is written; the
    /// outcome reports what would have been done. Individual op failures
    /// are collected and do not abort the rest of the plan.
    pub fn apply(&self, plan: &RemediationPlan, dry_run: bool) -> StorageResult<RemediationOutcome> {
        let mut applied = 0;
        let mut failures = Vec::new();

        for op in &plan.ops {
            if dry_run {
                info!(?op, "would apply");
                continue;
            }
            let result = match op {
                FixOp::RemovePromiseLink {
                    promise_id,
                    evidence_id,
                } => self
                    .store
                    .remove_promise_link(promise_id, evidence_id)
                    .map(|_| ()),
                FixOp::RemoveEvidenceRef {
                    evidence_id,
                    promise_id,
                } => self
                    .store
                    .remove_promise_ref(evidence_id, promise_id)
                    .map(|_| ()),
                FixOp::AddEvidenceRef {
                    evidence_id,
                    promise_id,
                } => self
                    .store
                    .add_promise_ref(evidence_id, promise_id)
                    .map(|_| ()),
                FixOp::DedupePromiseLinks { promise_id } => {
                    self.store.dedupe_promise_links(promise_id).map(|_| ())
                }
                FixOp::DedupeEvidenceRefs { evidence_id } => {
                    self.store.dedupe_promise_refs(evidence_id).map(|_| ())
                }
            };
            match result {
                Ok(()) => applied += 1,
                Err(err) => {
                    warn!(?op, error = %err, "remediation op failed");
                    failures.push(format!("{:?}: {}", op, err));
                }
            }
        }

        Ok(RemediationOutcome {
            dry_run,
            planned: plan.ops.len(),
            applied,
            failures,
        })
    }

    /// The read-only scan. Never writes, never aborts on a bad document.
    fn scan(&self, session: Option<&str>) -> StorageResult<(Vec<Discrepancy>, usize, usize)> {
        let mut promise_filter = PromiseFilter::new();
        let mut evidence_filter = EvidenceFilter::new();
        if let Some(session) = session {
            promise_filter = promise_filter.with_session(session);
            evidence_filter = evidence_filter.with_session(session);
        }
        let promises = self.store.find_promises(&promise_filter)?;
        let evidence = self.store.find_evidence(&evidence_filter)?;

        let evidence_by_id: HashMap<&str, &EvidenceItem> = evidence
            .iter()
            .map(|e| (e.evidence_id.as_str(), e))
            .collect();
        let promise_by_id: HashMap<&str, &crate::model::Promise> = promises
            .iter()
            .map(|p| (p.promise_id.as_str(), p))
            .collect();

        let mut discrepancies = Vec::new();

        for promise in &promises {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for link in &promise.linked_evidence {
                *seen.entry(link.evidence_id.as_str()).or_insert(0) += 1;
            }
            for (evidence_id, count) in &seen {
                if *count > 1 {
                    discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::DuplicateLink,
                        side: Side::Promise,
                        promise_id: promise.promise_id.clone(),
                        evidence_id: evidence_id.to_string(),
                    });
                }
                // A session-scoped scan still resolves references that fall
                // outside the scope before calling them orphaned.
                let target = match evidence_by_id.get(evidence_id) {
                    Some(e) => Some((*e).clone()),
                    None => self.store.get_evidence(evidence_id)?,
                };
                match target {
                    None => discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::OrphanedEvidenceReference,
                        side: Side::Promise,
                        promise_id: promise.promise_id.clone(),
                        evidence_id: evidence_id.to_string(),
                    }),
                    Some(e) if !e.is_linked_to(&promise.promise_id) => {
                        discrepancies.push(Discrepancy {
                            kind: DiscrepancyKind::MissingReverseLink,
                            side: Side::Promise,
                            promise_id: promise.promise_id.clone(),
                            evidence_id: evidence_id.to_string(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        for item in &evidence {
            let mut seen: HashMap<&str, usize> = HashMap::new();
            for promise_id in &item.promise_ids {
                *seen.entry(promise_id.as_str()).or_insert(0) += 1;
            }
            for (promise_id, count) in &seen {
                if *count > 1 {
                    discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::DuplicateLink,
                        side: Side::Evidence,
                        promise_id: promise_id.to_string(),
                        evidence_id: item.evidence_id.clone(),
                    });
                }
                let target = match promise_by_id.get(promise_id) {
                    Some(p) => Some((*p).clone()),
                    None => self.store.get_promise(promise_id)?,
                };
                match target {
                    None => discrepancies.push(Discrepancy {
                        kind: DiscrepancyKind::OrphanedPromiseReference,
                        side: Side::Evidence,
                        promise_id: promise_id.to_string(),
                        evidence_id: item.evidence_id.clone(),
                    }),
                    Some(p) if p.find_link(&item.evidence_id).is_none() => {
                        discrepancies.push(Discrepancy {
                            kind: DiscrepancyKind::MissingForwardLink,
                            side: Side::Evidence,
                            promise_id: promise_id.to_string(),
                            evidence_id: item.evidence_id.clone(),
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        Ok((discrepancies, promises.len(), evidence.len()))
    }
}
