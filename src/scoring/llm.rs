//! LLM-batch scorer: one generation call evaluates one evidence item
//! against every candidate promise in scope.
//!
//! The model is not trusted to return stable identifiers. Candidates are
//! sent as condensed text; the response must echo that text back, and each
//! echo is mapped to a promise id by exact lookup. References that do not
//! match any candidate are dropped and logged.

use super::{clamp_score, CandidateScore, CandidateScorer, PromiseCandidate, ScoringError};
use crate::generate::{extract_json, TextGenerator};
use crate::model::{Algorithm, EvidenceItem};
use crate::text::TermSet;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Maximum characters of promise text sent per candidate.
const CONDENSED_LEN: usize = 200;

/// Scores candidates with a single batched generation call per evidence item.
pub struct LlmBatchScorer {
    generator: Arc<dyn TextGenerator>,
}

impl LlmBatchScorer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    /// Condense a promise text for the prompt: collapsed whitespace,
    /// truncated on a character boundary. The condensed form is also the
    /// lookup key for echoes in the response.
    fn condense(text: &str) -> String {
        let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
        collapsed.chars().take(CONDENSED_LEN).collect()
    }

    fn build_prompt(evidence: &EvidenceItem, candidates: &[PromiseCandidate]) -> String {
        let mut prompt = String::new();
        prompt.push_str(
            "You are matching a piece of government evidence against political promises.\n\
             Evidence:\n",
        );
        prompt.push_str(&format!(
            "  type: {}\n  title: {}\n",
            evidence.evidence_source_type, evidence.title_or_summary
        ));
        if let Some(details) = &evidence.description_or_details {
            prompt.push_str(&format!("  details: {}\n", details));
        }
        prompt.push_str("\nCandidate promises (one per line):\n");
        for candidate in candidates {
            prompt.push_str("- ");
            prompt.push_str(&Self::condense(&candidate.promise.text));
            prompt.push('\n');
        }
        prompt.push_str(
            "\nFor each promise this evidence substantiates, return a JSON object:\n\
             {\"matches\": [{\"promise_text\": \"<the promise line, verbatim>\", \
             \"relevance\": <0-10>, \"explanation\": \"<one sentence>\", \
             \"link_type\": \"<e.g. implements, funds, announces>\"}]}\n\
             Return only promises that are actually relevant; an empty list is fine.\n",
        );
        prompt
    }
}

#[async_trait]
impl CandidateScorer for LlmBatchScorer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::LlmBatch
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

        // Echo-text -> promise id map, built locally; the model never sees ids.
        let id_map: HashMap<String, &str> = candidates
            .iter()
            .map(|c| {
                (
                    Self::condense(&c.promise.text),
                    c.promise.promise_id.as_str(),
                )
            })
            .collect();

        let prompt = Self::build_prompt(evidence, candidates);
        let response = self.generator.generate(&prompt).await?;

        let parsed = extract_json(&response).ok_or_else(|| {
            // Truncate on char boundaries: model output is arbitrary text.
            let preview: String = response.chars().take(200).collect();
            ScoringError::InvalidResponse(format!(
                "no JSON object in generator output: {}",
                preview
            ))
        })?;

        let matches = parsed
            .get("matches")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                ScoringError::InvalidResponse("response missing 'matches' array".to_string())
            })?;

        let mut scores = Vec::new();
        for entry in matches {
            let echoed = entry
                .get("promise_text")
                .and_then(|v| v.as_str())
                .unwrap_or_default();
            let key = Self::condense(echoed);

            let Some(promise_id) = id_map.get(&key) else {
                let preview: String = key.chars().take(80).collect();
                warn!(
                    evidence_id = %evidence.evidence_id,
                    echoed = %preview,
                    "dropping model reference that matches no candidate"
                );
                continue;
            };

            let relevance = entry
                .get("relevance")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0)
                .clamp(0.0, 10.0);
            let explanation = entry
                .get("explanation")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string();
            let link_type = entry
                .get("link_type")
                .and_then(|v| v.as_str())
                .unwrap_or("related");

            scores.push(CandidateScore {
                promise_id: promise_id.to_string(),
                raw_score: clamp_score(relevance / 10.0),
                explanation,
                matched_signals: vec![format!("link_type:{}", link_type)],
            });
        }

        debug!(
            evidence_id = %evidence.evidence_id,
            candidates = candidates.len(),
            matched = scores.len(),
            "llm batch scoring complete"
        );
        Ok(scores)
    }
}
