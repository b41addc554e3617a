//! Embedding scorer: batched vector embeddings plus cosine similarity.
//!
//! Uses a trait-based embedding backend (`Embedder`) so production code can
//! use fastembed while tests use deterministic mock embedders. Candidates
//! below the configured similarity floor are discarded before confidence
//! classification ever sees them.

use super::{clamp_score, CandidateScore, CandidateScorer, PromiseCandidate, ScoringError};
use crate::model::{Algorithm, EvidenceItem};
use crate::text::TermSet;
use async_trait::async_trait;
use thiserror::Error;

/// Errors from embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding returned no results")]
    EmptyResult,

    #[error("embedding model error: {0}")]
    Model(String),
}

/// Trait for embedding text into fixed-dimension vectors, batchable.
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;
}

/// Cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| (*x as f64) * (*y as f64)).sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64) * (*x as f64)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Default similarity floor below which matches are discarded.
pub const DEFAULT_SIMILARITY_FLOOR: f64 = 0.4;

/// Scores by cosine similarity over batched embeddings.
pub struct EmbeddingScorer {
    embedder: Box<dyn Embedder>,
    similarity_floor: f64,
}

impl EmbeddingScorer {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            similarity_floor: DEFAULT_SIMILARITY_FLOOR,
        }
    }

    pub fn with_similarity_floor(mut self, floor: f64) -> Self {
        self.similarity_floor = floor;
        self
    }

    /// The text embedded for an evidence item.
    fn evidence_text(evidence: &EvidenceItem) -> String {
        match &evidence.description_or_details {
            Some(details) => format!("{} {}", evidence.title_or_summary, details),
            None => evidence.title_or_summary.clone(),
        }
    }
}

#[async_trait]
impl CandidateScorer for EmbeddingScorer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Embedding
    }

    fn is_remote(&self) -> bool {
        true
    }

    async fn score_candidates(
        &self,
        evidence: &EvidenceItem,
        _evidence_terms: &TermSet,
        candidates: &[PromiseCandidate],
    ) -> Result<Vec<CandidateScore>, ScoringError> {
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        // One batch: the evidence text first, then every candidate.
        let evidence_text = Self::evidence_text(evidence);
        let mut texts: Vec<&str> = Vec::with_capacity(candidates.len() + 1);
        texts.push(&evidence_text);
        for candidate in candidates {
            texts.push(&candidate.promise.text);
        }

        let mut vectors = self.embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(ScoringError::InvalidResponse(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }
        let evidence_vector = vectors.remove(0);

        let mut scores = Vec::new();
        for (candidate, vector) in candidates.iter().zip(vectors.iter()) {
            let similarity = cosine_similarity(&evidence_vector, vector);
            if similarity < self.similarity_floor {
                continue;
            }
            scores.push(CandidateScore {
                promise_id: candidate.promise.promise_id.clone(),
                raw_score: clamp_score(similarity),
                explanation: format!("cosine similarity {:.3}", similarity),
                matched_signals: vec!["embedding_cosine".to_string()],
            });
        }
        Ok(scores)
    }
}

// ---------------------------------------------------------------------------
// FastEmbedEmbedder — production embedder behind `embeddings` feature
// ---------------------------------------------------------------------------

#[cfg(feature = "embeddings")]
mod fastembed_impl {
    use super::{Embedder, EmbeddingError};
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::Mutex;

    /// Production embedder backed by fastembed (ONNX Runtime).
    ///
    /// Wraps `fastembed::TextEmbedding` in a `Mutex` because its `embed`
    /// method requires `&mut self`, while the `Embedder` trait uses `&self`.
    pub struct FastEmbedEmbedder {
        model: Mutex<TextEmbedding>,
    }

    impl FastEmbedEmbedder {
        pub fn new(model: EmbeddingModel) -> Result<Self, EmbeddingError> {
            let options = InitOptions::new(model).with_show_download_progress(false);
            let embedding = TextEmbedding::try_new(options)
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;
            Ok(Self {
                model: Mutex::new(embedding),
            })
        }

        /// Default model (nomic-embed-text-v1.5).
        pub fn default_model() -> Result<Self, EmbeddingError> {
            Self::new(EmbeddingModel::NomicEmbedTextV15)
        }
    }

    impl Embedder for FastEmbedEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            let mut model = self.model.lock().unwrap();
            let embeddings = model
                .embed(texts.to_vec(), None)
                .map_err(|e| EmbeddingError::Model(e.to_string()))?;
            if embeddings.is_empty() {
                return Err(EmbeddingError::EmptyResult);
            }
            Ok(embeddings)
        }
    }
}

#[cfg(feature = "embeddings")]
pub use fastembed_impl::FastEmbedEmbedder;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Promise;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Mock embedder that returns predetermined vectors keyed by text,
    /// counting batch calls.
    struct MockEmbedder {
        vectors: HashMap<String, Vec<f32>>,
        calls: Arc<AtomicUsize>,
    }

    impl MockEmbedder {
        fn new(pairs: &[(&str, &[f32])]) -> (Self, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let vectors = pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect();
            (
                Self {
                    vectors,
                    calls: calls.clone(),
                },
                calls,
            )
        }
    }

    impl Embedder for MockEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(texts
                .iter()
                .map(|t| self.vectors.get(*t).cloned().unwrap_or_else(|| vec![0.0; 3]))
                .collect())
        }
    }

    fn candidate(id: &str, text: &str) -> PromiseCandidate {
        PromiseCandidate::new(Promise::new(id, text, "LPC", "44-1"), TermSet::default())
    }

    fn evidence(title: &str) -> EvidenceItem {
        EvidenceItem::new("e1", title, "News", "44-1")
    }

    // === Scenario: one batch call covers evidence and all candidates ===

    #[tokio::test]
    async fn embeds_evidence_and_candidates_in_one_batch() {
        let (embedder, calls) = MockEmbedder::new(&[
            ("clean electricity funding", &[0.9, 0.3, 0.1]),
            ("deliver a clean grid", &[0.85, 0.35, 0.15]),
            ("plant trees", &[0.1, 0.2, 0.95]),
        ]);
        let scorer = EmbeddingScorer::new(Box::new(embedder));

        let scores = scorer
            .score_candidates(
                &evidence("clean electricity funding"),
                &TermSet::default(),
                &[
                    candidate("p1", "deliver a clean grid"),
                    candidate("p2", "plant trees"),
                ],
            )
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::Relaxed), 1, "single batch call");
        assert_eq!(scores.len(), 1, "dissimilar candidate below the floor");
        assert_eq!(scores[0].promise_id, "p1");
        assert!(scores[0].raw_score > 0.9);
    }

    // === Scenario: floor filters before classification ===

    #[tokio::test]
    async fn floor_discards_weak_matches() {
        let (embedder, _) = MockEmbedder::new(&[
            ("title", &[1.0, 0.0, 0.0]),
            ("somewhat related", &[0.7, 0.7, 0.0]),
        ]);
        // cosine([1,0,0],[0.7,0.7,0]) ~ 0.707
        let strict = EmbeddingScorer::new(Box::new(embedder)).with_similarity_floor(0.8);
        let scores = strict
            .score_candidates(
                &evidence("title"),
                &TermSet::default(),
                &[candidate("p1", "somewhat related")],
            )
            .await
            .unwrap();
        assert!(scores.is_empty());
    }

    // === Scenario: determinism for a fixed backend ===

    #[tokio::test]
    async fn repeated_scoring_is_deterministic() {
        let pairs: &[(&str, &[f32])] = &[
            ("title", &[0.5, 0.5, 0.1]),
            ("promise text", &[0.4, 0.6, 0.2]),
        ];
        let (embedder, _) = MockEmbedder::new(pairs);
        let scorer = EmbeddingScorer::new(Box::new(embedder)).with_similarity_floor(0.1);
        let cands = [candidate("p1", "promise text")];

        let first = scorer
            .score_candidates(&evidence("title"), &TermSet::default(), &cands)
            .await
            .unwrap();
        let second = scorer
            .score_candidates(&evidence("title"), &TermSet::default(), &cands)
            .await
            .unwrap();
        assert_eq!(first[0].raw_score, second[0].raw_score);
    }

    #[tokio::test]
    async fn vector_count_mismatch_is_invalid_response() {
        struct ShortEmbedder;
        impl Embedder for ShortEmbedder {
            fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
                Ok(vec![vec![1.0, 0.0]])
            }
        }
        let scorer = EmbeddingScorer::new(Box::new(ShortEmbedder));
        let err = scorer
            .score_candidates(
                &evidence("title"),
                &TermSet::default(),
                &[candidate("p1", "text")],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ScoringError::InvalidResponse(_)));
    }

    // === Unit: cosine similarity ===

    #[test]
    fn cosine_similarity_basics() {
        let a = [1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &[1.0, 0.0, 0.0]) - 1.0).abs() < 1e-9);
        assert!(cosine_similarity(&a, &[0.0, 1.0, 0.0]).abs() < 1e-9);
        assert!((cosine_similarity(&a, &[-1.0, 0.0, 0.0]) + 1.0).abs() < 1e-9);
        assert_eq!(cosine_similarity(&a, &[0.0, 0.0, 0.0]), 0.0);
    }
}
