//! Core domain types: promises, evidence items, and the link records
//! stored redundantly on both sides.
//!
//! `linked_evidence` and `promise_ids` are plain vectors rather than maps or
//! sets so that corrupted states (duplicate pairs, one-sided links) remain
//! representable: the repository enforces the invariants on write, and the
//! integrity checker detects violations after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Which scoring strategy produced a link.
///
/// LLM-batch and embedding scores are "enhanced": a cheaper algorithm never
/// overwrites them just by being different (see replace-if-better policy in
/// the link repository).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Algorithm {
    Lexical,
    LlmBatch,
    Embedding,
}

impl Algorithm {
    /// Whether this algorithm counts as enhanced for replace-if-better.
    pub fn is_enhanced(&self) -> bool {
        matches!(self, Algorithm::LlmBatch | Algorithm::Embedding)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Lexical => "lexical",
            Algorithm::LlmBatch => "llm_batch",
            Algorithm::Embedding => "embedding",
        }
    }
}

impl std::fmt::Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discretized confidence bucket derived from a continuous similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal processing state of an evidence item with respect to linking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkingStatus {
    #[default]
    Pending,
    Processed,
    Error,
}

impl LinkingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkingStatus::Pending => "pending",
            LinkingStatus::Processed => "processed",
            LinkingStatus::Error => "error",
        }
    }

    /// Parse a stored status string. Unknown strings are a data defect.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(LinkingStatus::Pending),
            "processed" => Some(LinkingStatus::Processed),
            "error" => Some(LinkingStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for LinkingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Promise-side link record. The `(promise_id, evidence_id)` pair is the
/// natural key; at most one record per evidence id is the invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceLink {
    pub evidence_id: String,
    pub similarity_score: f64,
    pub confidence_level: ConfidenceLevel,
    pub algorithm: Algorithm,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl EvidenceLink {
    pub fn new(
        evidence_id: impl Into<String>,
        similarity_score: f64,
        confidence_level: ConfidenceLevel,
        algorithm: Algorithm,
    ) -> Self {
        Self {
            evidence_id: evidence_id.into(),
            similarity_score,
            confidence_level,
            algorithm,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}

/// A recorded political commitment. Created by ingestion; `linked_evidence`
/// is mutated only by the link repository; never deleted by the linking
/// engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promise {
    pub promise_id: String,
    pub text: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub background_and_context: Option<String>,
    /// Free-text department name as ingested; standardized at scoring time.
    #[serde(default)]
    pub responsible_department_lead: Option<String>,
    pub party_code: String,
    pub parliament_session_id: String,
    #[serde(default)]
    pub extracted_keywords_concepts: Vec<String>,
    #[serde(default)]
    pub linked_evidence: Vec<EvidenceLink>,
}

impl Promise {
    pub fn new(
        promise_id: impl Into<String>,
        text: impl Into<String>,
        party_code: impl Into<String>,
        parliament_session_id: impl Into<String>,
    ) -> Self {
        Self {
            promise_id: promise_id.into(),
            text: text.into(),
            description: None,
            background_and_context: None,
            responsible_department_lead: None,
            party_code: party_code.into(),
            parliament_session_id: parliament_session_id.into(),
            extracted_keywords_concepts: Vec::new(),
            linked_evidence: Vec::new(),
        }
    }

    /// Evidence ids currently linked from this side.
    pub fn linked_evidence_ids(&self) -> Vec<&str> {
        self.linked_evidence
            .iter()
            .map(|l| l.evidence_id.as_str())
            .collect()
    }

    /// The link record for a given evidence id, if present.
    pub fn find_link(&self, evidence_id: &str) -> Option<&EvidenceLink> {
        self.linked_evidence
            .iter()
            .find(|l| l.evidence_id == evidence_id)
    }
}

/// A discrete factual record (bill event, order-in-council, news release)
/// that may substantiate a promise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub evidence_id: String,
    pub title_or_summary: String,
    #[serde(default)]
    pub description_or_details: Option<String>,
    /// Enum-like source tag, e.g. "Bill Event", "OrderInCouncil", "News".
    pub evidence_source_type: String,
    #[serde(default)]
    pub linked_departments: Vec<String>,
    pub parliament_session_id: String,
    /// Denormalized mirror of the promise-side links.
    #[serde(default)]
    pub promise_ids: Vec<String>,
    #[serde(default)]
    pub promise_linking_status: LinkingStatus,
    /// Failure message when `promise_linking_status` is `error`.
    #[serde(default)]
    pub linking_error: Option<String>,
}

impl EvidenceItem {
    pub fn new(
        evidence_id: impl Into<String>,
        title_or_summary: impl Into<String>,
        evidence_source_type: impl Into<String>,
        parliament_session_id: impl Into<String>,
    ) -> Self {
        Self {
            evidence_id: evidence_id.into(),
            title_or_summary: title_or_summary.into(),
            description_or_details: None,
            evidence_source_type: evidence_source_type.into(),
            linked_departments: Vec::new(),
            parliament_session_id: parliament_session_id.into(),
            promise_ids: Vec::new(),
            promise_linking_status: LinkingStatus::Pending,
            linking_error: None,
        }
    }

    pub fn is_linked_to(&self, promise_id: &str) -> bool {
        self.promise_ids.iter().any(|p| p == promise_id)
    }
}
