//! Candidate scoring: one contract, three interchangeable strategies.
//!
//! The orchestrator is agnostic to which scorer is configured. The contract
//! is batch-shaped — one evidence item against the full candidate slice —
//! because the LLM scorer evaluates all candidates in a single call and the
//! embedding scorer embeds them in a single batch; the lexical scorer simply
//! loops pairwise.

mod classify;
mod embedding;
mod lexical;
mod llm;

pub use classify::ConfidenceThresholds;
pub use embedding::{cosine_similarity, Embedder, EmbeddingError, EmbeddingScorer};
#[cfg(feature = "embeddings")]
pub use embedding::FastEmbedEmbedder;
pub use lexical::LexicalScorer;
pub use llm::LlmBatchScorer;

use crate::generate::GenerateError;
use crate::model::{Algorithm, EvidenceItem, Promise};
use crate::text::TermSet;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from a scoring pass over one evidence item.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("text generation failed: {0}")]
    Generate(#[from] GenerateError),

    #[error("embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("scorer response invalid: {0}")]
    InvalidResponse(String),
}

/// A candidate promise prepared for scoring: the raw record plus its
/// normalized term set.
#[derive(Debug, Clone)]
pub struct PromiseCandidate {
    pub promise: Promise,
    pub terms: TermSet,
}

impl PromiseCandidate {
    pub fn new(promise: Promise, terms: TermSet) -> Self {
        Self { promise, terms }
    }
}

/// One scored candidate: raw score in [0, 1], a short explanation, and the
/// signals that matched.
#[derive(Debug, Clone)]
pub struct CandidateScore {
    pub promise_id: String,
    pub raw_score: f64,
    pub explanation: String,
    pub matched_signals: Vec<String>,
}

/// The scoring contract all strategies implement.
#[async_trait]
pub trait CandidateScorer: Send + Sync {
    /// Which algorithm this scorer records on links it produces.
    fn algorithm(&self) -> Algorithm;

    /// Whether scoring calls out to a remote service. Remote scorers get a
    /// fixed inter-call delay from the orchestrator.
    fn is_remote(&self) -> bool {
        false
    }

    /// Score one evidence item against every candidate in scope.
    ///
    /// Candidates a strategy cannot place (below its own floor, or not
    /// identifiable in a model response) are simply absent from the result;
    /// that is not an error.
    async fn score_candidates(
        &self,
        evidence: &EvidenceItem,
        evidence_terms: &TermSet,
        candidates: &[PromiseCandidate],
    ) -> Result<Vec<CandidateScore>, ScoringError>;
}

/// Clamp a raw score into [0, 1].
pub(crate) fn clamp_score(score: f64) -> f64 {
    score.clamp(0.0, 1.0)
}
