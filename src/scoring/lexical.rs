//! Lexical scorer: Jaccard similarity over normalized term sets plus
//! additive boosts for domain-boosted terms and structural tag alignment.
//!
//! Symmetric and order-independent; deterministic for fixed inputs.

use super::{clamp_score, CandidateScore, CandidateScorer, PromiseCandidate, ScoringError};
use crate::model::{Algorithm, EvidenceItem};
use crate::text::TermSet;
use async_trait::async_trait;

/// Boost per `_important`-tagged term present in the intersection.
const IMPORTANT_BOOST: f64 = 0.1;
/// Boost per matching `dept_*` tag.
const DEPT_BOOST: f64 = 0.2;
/// Boost per matching `concept_*` tag.
const CONCEPT_BOOST: f64 = 0.15;

/// Jaccard-with-boosts scorer. No external calls.
#[derive(Debug, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn new() -> Self {
        Self
    }

    /// Score one pair of term sets. Public because the pair function is the
    /// spec of the strategy; the trait impl loops over it.
    pub fn score_pair(evidence_terms: &TermSet, promise_terms: &TermSet) -> (f64, Vec<String>, String) {
        let jaccard = evidence_terms.jaccard(promise_terms);
        let important = evidence_terms.shared_important(promise_terms);
        let depts = evidence_terms.shared_with_prefix(promise_terms, "dept_");
        let concepts = evidence_terms.shared_with_prefix(promise_terms, "concept_");

        let score = clamp_score(
            jaccard
                + important as f64 * IMPORTANT_BOOST
                + depts as f64 * DEPT_BOOST
                + concepts as f64 * CONCEPT_BOOST,
        );

        let matched: Vec<String> = evidence_terms
            .intersection_sorted(promise_terms)
            .into_iter()
            .map(|s| s.to_string())
            .collect();

        let explanation = format!(
            "jaccard {:.3} over {} shared terms; boosts: {} important, {} dept, {} concept",
            jaccard,
            matched.len(),
            important,
            depts,
            concepts
        );

        (score, matched, explanation)
    }
}

#[async_trait]
impl CandidateScorer for LexicalScorer {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Lexical
    }

    async fn score_candidates(
        &self,
        _evidence: &EvidenceItem,
        evidence_terms: &TermSet,
        candidates: &[PromiseCandidate],
    ) -> Result<Vec<CandidateScore>, ScoringError> {
        let mut scores = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let (raw_score, matched_signals, explanation) =
                Self::score_pair(evidence_terms, &candidate.terms);
            scores.push(CandidateScore {
                promise_id: candidate.promise.promise_id.clone(),
                raw_score,
                explanation,
                matched_signals,
            });
        }
        Ok(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::departments::DepartmentStandardizer;
    use crate::model::Promise;
    use crate::text::{normalize_evidence, normalize_promise};

    fn terms_for(promise_text: &str) -> TermSet {
        let departments = DepartmentStandardizer::builtin();
        normalize_promise(
            &Promise::new("p", promise_text, "LPC", "44-1"),
            &departments,
        )
    }

    // === Scenario: scoring is symmetric ===

    #[test]
    fn score_pair_is_symmetric() {
        let a = terms_for("invest in affordable housing and public transit");
        let b = terms_for("housing accelerator fund expands affordable housing supply");
        let (fwd, _, _) = LexicalScorer::score_pair(&a, &b);
        let (rev, _, _) = LexicalScorer::score_pair(&b, &a);
        assert!((fwd - rev).abs() < 1e-12);
    }

    // === Scenario: boosts are additive over jaccard ===

    #[test]
    fn boosts_raise_score_above_bare_jaccard() {
        let mut a = TermSet::default();
        let mut b = TermSet::default();
        for t in ["housing", "housing_important", "dept_finance", "concept_housing_supply"] {
            a.insert(t);
            b.insert(t);
        }
        for t in ["expand", "announce", "measures"] {
            a.insert(t);
        }
        for t in ["accelerator", "fund", "municipal"] {
            b.insert(t);
        }

        let (score, matched, explanation) = LexicalScorer::score_pair(&a, &b);
        // jaccard = 4/10; boosts: 0.1 + 0.2 + 0.15
        let expected = 4.0 / 10.0 + 0.1 + 0.2 + 0.15;
        assert!((score - expected).abs() < 1e-9, "got {} ({})", score, explanation);
        assert_eq!(matched.len(), 4);
    }

    #[test]
    fn score_is_clamped_to_one() {
        let mut a = TermSet::default();
        let mut b = TermSet::default();
        for i in 0..8 {
            let t = format!("concept_group_{}", i);
            a.insert(t.clone());
            b.insert(t);
        }
        let (score, _, _) = LexicalScorer::score_pair(&a, &b);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn disjoint_sets_score_zero() {
        let mut a = TermSet::default();
        let mut b = TermSet::default();
        a.insert("trees");
        b.insert("pharmacare");
        let (score, matched, _) = LexicalScorer::score_pair(&a, &b);
        assert_eq!(score, 0.0);
        assert!(matched.is_empty());
    }

    // === Scenario: determinism ===

    #[tokio::test]
    async fn repeated_scoring_returns_identical_values() {
        let departments = DepartmentStandardizer::builtin();
        let evidence = crate::model::EvidenceItem::new(
            "e1",
            "Bill C-50 receives Royal Assent",
            "Bill Event",
            "44-1",
        );
        let evidence_terms = normalize_evidence(&evidence, &departments);
        let promise = Promise::new(
            "p1",
            "Ensure a just transition to sustainable jobs for energy workers",
            "LPC",
            "44-1",
        );
        let candidate =
            PromiseCandidate::new(promise.clone(), normalize_promise(&promise, &departments));

        let scorer = LexicalScorer::new();
        let first = scorer
            .score_candidates(&evidence, &evidence_terms, std::slice::from_ref(&candidate))
            .await
            .unwrap();
        let second = scorer
            .score_candidates(&evidence, &evidence_terms, std::slice::from_ref(&candidate))
            .await
            .unwrap();

        assert_eq!(first[0].raw_score, second[0].raw_score);
        assert_eq!(first[0].matched_signals, second[0].matched_signals);
    }

    // === Scenario: Bill C-50 vs the sustainable jobs promise clears the low bar ===

    #[tokio::test]
    async fn bill_c50_scores_above_low_threshold() {
        let departments = DepartmentStandardizer::builtin();
        let evidence = crate::model::EvidenceItem::new(
            "e1",
            "Bill C-50 receives Royal Assent",
            "Bill Event",
            "44-1",
        );
        let promise = Promise::new(
            "p1",
            "Ensure a just transition to sustainable jobs for energy workers",
            "LPC",
            "44-1",
        );
        let evidence_terms = normalize_evidence(&evidence, &departments);
        let candidate =
            PromiseCandidate::new(promise.clone(), normalize_promise(&promise, &departments));

        let scores = LexicalScorer::new()
            .score_candidates(&evidence, &evidence_terms, &[candidate])
            .await
            .unwrap();

        assert!(
            scores[0].raw_score >= 0.10,
            "concept tagging should carry the pair over the low threshold, got {}",
            scores[0].raw_score
        );
        assert!(scores[0]
            .matched_signals
            .iter()
            .any(|s| s == "concept_sustainable_jobs"));
    }
}
