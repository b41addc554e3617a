//! Text normalization: canonical bag-of-terms extraction from the free-text
//! fields of a promise or an evidence item.
//!
//! Pure functions of the input text and the fixed vocabularies below — no
//! external calls, so normalization is deterministic and safe to repeat.
//!
//! Besides plain tokens, the term set carries three kinds of markers:
//! - `<term>_important` — a second copy of any token found in the
//!   important-term vocabulary, so scorers can weight it;
//! - `type_*` / `dept_*` / `party_*` — structural tags for source type,
//!   standardized department, and party;
//! - `concept_*` — emitted when any phrase of a concept group appears in the
//!   raw text. Phrases are matched by substring (not tokens) so that bill
//!   numbers like "C-50" survive the alphabetic tokenizer.

use crate::departments::DepartmentStandardizer;
use crate::model::{EvidenceItem, Promise};
use std::collections::HashSet;

/// Marker suffix for domain-boosted tokens.
pub const IMPORTANT_SUFFIX: &str = "_important";

/// Common English and legislative stop-words removed during tokenization.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "this", "from", "will", "are", "was",
    "were", "has", "have", "had", "been", "its", "their", "they", "them",
    "our", "all", "any", "can", "may", "must", "shall", "would", "could",
    "should", "about", "into", "over", "under", "between", "through", "also",
    "such", "than", "then", "there", "these", "those", "which", "while",
    "who", "whom", "whose", "what", "when", "where", "how", "why", "not",
    "but", "per", "via", "upon", "within", "without", "including", "more",
    "most", "other", "some", "just", "new", "act", "bill", "government",
    "canada", "canadian", "federal", "minister", "ministry", "department",
];

/// Domain terms worth boosting. A matching token is emitted twice: once
/// plain, once with [`IMPORTANT_SUFFIX`].
const IMPORTANT_TERMS: &[&str] = &[
    "affordability",
    "carbon",
    "childcare",
    "climate",
    "dental",
    "emissions",
    "energy",
    "firearms",
    "healthcare",
    "housing",
    "immigration",
    "indigenous",
    "infrastructure",
    "pension",
    "pharmacare",
    "pollution",
    "reconciliation",
    "sustainable",
    "transition",
    "veterans",
    "workers",
];

/// Concept groups: a canonical group key and the phrases that signal it.
/// Phrases are matched case-insensitively as substrings of the raw text,
/// which lets bill numbers and multi-word phrases act as synonyms for the
/// policy concept they implement.
const CONCEPT_GROUPS: &[(&str, &[&str])] = &[
    (
        "sustainable_jobs",
        &[
            "sustainable jobs",
            "just transition",
            "energy workers",
            "c-50",
            "clean energy jobs",
        ],
    ),
    (
        "dental_care",
        &["dental care", "dental coverage", "c-31", "oral health"],
    ),
    (
        "pharmacare",
        &["pharmacare", "universal drug coverage", "c-64", "prescription drug"],
    ),
    (
        "housing_supply",
        &[
            "housing accelerator",
            "housing supply",
            "affordable housing",
            "build homes",
            "c-56",
        ],
    ),
    (
        "child_care",
        &["child care", "childcare", "early learning", "c-35", "$10-a-day"],
    ),
    (
        "carbon_pricing",
        &["carbon pricing", "carbon tax", "price on pollution", "carbon rebate"],
    ),
    (
        "firearms_control",
        &["assault-style firearms", "firearms buyback", "c-21", "handgun freeze"],
    ),
    (
        "reconciliation",
        &[
            "truth and reconciliation",
            "undrip",
            "residential school",
            "indigenous rights",
        ],
    ),
    (
        "online_safety",
        &["online harms", "online safety", "c-63", "online streaming", "c-11"],
    ),
    (
        "climate_targets",
        &[
            "net-zero",
            "net zero",
            "emissions reduction",
            "2030 target",
            "clean electricity",
        ],
    ),
];

/// Canonical term set for one promise or one evidence item.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TermSet {
    tokens: HashSet<String>,
}

impl TermSet {
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens.contains(token)
    }

    pub fn insert(&mut self, token: impl Into<String>) {
        self.tokens.insert(token.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(|s| s.as_str())
    }

    /// Tokens present in both sets, sorted for deterministic output.
    pub fn intersection_sorted<'a>(&'a self, other: &'a TermSet) -> Vec<&'a str> {
        let mut shared: Vec<&str> = self
            .tokens
            .intersection(&other.tokens)
            .map(|s| s.as_str())
            .collect();
        shared.sort_unstable();
        shared
    }

    /// Jaccard similarity of the two token sets.
    pub fn jaccard(&self, other: &TermSet) -> f64 {
        let intersection = self.tokens.intersection(&other.tokens).count();
        let union = self.tokens.union(&other.tokens).count();
        if union == 0 {
            return 0.0;
        }
        intersection as f64 / union as f64
    }

    /// Count of shared tokens carrying the given prefix.
    pub fn shared_with_prefix(&self, other: &TermSet, prefix: &str) -> usize {
        self.tokens
            .intersection(&other.tokens)
            .filter(|t| t.starts_with(prefix))
            .count()
    }

    /// Count of shared important-suffixed tokens.
    pub fn shared_important(&self, other: &TermSet) -> usize {
        self.tokens
            .intersection(&other.tokens)
            .filter(|t| t.ends_with(IMPORTANT_SUFFIX))
            .count()
    }
}

/// Lowercase alphabetic tokens of length >= 3, stop-words removed,
/// important terms doubled with the boost suffix.
fn tokenize_into(text: &str, out: &mut TermSet) {
    let lower = text.to_lowercase();
    for raw in lower.split(|c: char| !c.is_alphabetic()) {
        if raw.len() < 3 || STOP_WORDS.contains(&raw) {
            continue;
        }
        if IMPORTANT_TERMS.contains(&raw) {
            out.insert(format!("{}{}", raw, IMPORTANT_SUFFIX));
        }
        out.insert(raw);
    }
}

/// Emit one `concept_<group>` tag per concept group whose phrases appear
/// anywhere in the raw text.
fn tag_concepts(raw_text: &str, out: &mut TermSet) {
    let lower = raw_text.to_lowercase();
    for (group, phrases) in CONCEPT_GROUPS {
        if phrases.iter().any(|p| lower.contains(p)) {
            out.insert(format!("concept_{}", group));
        }
    }
}

/// Lowercase a tag value and collapse non-alphanumerics to underscores,
/// e.g. "Bill Event" -> "bill_event".
fn tag_value(raw: &str) -> String {
    let mut value = String::with_capacity(raw.len());
    let mut last_underscore = false;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            value.extend(c.to_lowercase());
            last_underscore = false;
        } else if !last_underscore && !value.is_empty() {
            value.push('_');
            last_underscore = true;
        }
    }
    while value.ends_with('_') {
        value.pop();
    }
    value
}

/// Normalize a promise into its canonical term set.
///
/// Empty or absent fields contribute nothing.
pub fn normalize_promise(promise: &Promise, departments: &DepartmentStandardizer) -> TermSet {
    let mut terms = TermSet::default();

    let mut raw = String::new();
    raw.push_str(&promise.text);
    for field in [&promise.description, &promise.background_and_context] {
        if let Some(text) = field {
            raw.push(' ');
            raw.push_str(text);
        }
    }
    for keyword in &promise.extracted_keywords_concepts {
        raw.push(' ');
        raw.push_str(keyword);
    }

    tokenize_into(&raw, &mut terms);
    tag_concepts(&raw, &mut terms);

    if !promise.party_code.trim().is_empty() {
        terms.insert(format!("party_{}", tag_value(&promise.party_code)));
    }
    if let Some(dept) = &promise.responsible_department_lead {
        if let Some(canonical) = departments.standardize(dept) {
            terms.insert(format!("dept_{}", canonical));
        }
    }

    terms
}

/// Normalize an evidence item into its canonical term set.
pub fn normalize_evidence(evidence: &EvidenceItem, departments: &DepartmentStandardizer) -> TermSet {
    let mut terms = TermSet::default();

    let mut raw = String::new();
    raw.push_str(&evidence.title_or_summary);
    if let Some(details) = &evidence.description_or_details {
        raw.push(' ');
        raw.push_str(details);
    }

    tokenize_into(&raw, &mut terms);
    tag_concepts(&raw, &mut terms);

    if !evidence.evidence_source_type.trim().is_empty() {
        terms.insert(format!("type_{}", tag_value(&evidence.evidence_source_type)));
    }
    for dept in &evidence.linked_departments {
        if let Some(canonical) = departments.standardize(dept) {
            terms.insert(format!("dept_{}", canonical));
        }
    }

    terms
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::departments::DepartmentStandardizer;

    fn departments() -> DepartmentStandardizer {
        DepartmentStandardizer::builtin()
    }

    fn promise(text: &str) -> Promise {
        Promise::new("p1", text, "LPC", "44-1")
    }

    fn evidence(title: &str, source_type: &str) -> EvidenceItem {
        EvidenceItem::new("e1", title, source_type, "44-1")
    }

    // === Scenario: plain tokenization drops short words and stop-words ===

    #[test]
    fn tokenizer_drops_short_and_stop_words() {
        let terms = normalize_promise(
            &promise("Ensure that the CRA is fair to all taxpayers"),
            &departments(),
        );
        assert!(terms.contains("ensure"));
        assert!(terms.contains("fair"));
        assert!(terms.contains("taxpayers"));
        assert!(!terms.contains("the"), "stop-word removed");
        assert!(!terms.contains("is"), "too short");
        assert!(!terms.contains("to"), "too short");
    }

    // === Scenario: important terms are emitted twice ===

    #[test]
    fn important_terms_are_doubled() {
        let terms = normalize_promise(
            &promise("Invest in affordable housing across the country"),
            &departments(),
        );
        assert!(terms.contains("housing"));
        assert!(terms.contains("housing_important"));
        assert!(terms.contains("invest"));
        assert!(!terms.contains("invest_important"));
    }

    // === Scenario: structural tags for type, party, and department ===

    #[test]
    fn structural_tags_emitted() {
        let mut p = promise("Lower emissions from heavy industry");
        p.responsible_department_lead =
            Some("Environment and Climate Change Canada".to_string());
        let terms = normalize_promise(&p, &departments());
        assert!(terms.contains("party_lpc"));
        assert!(terms.contains("dept_environment_climate_change"));

        let mut e = evidence("Order amending the clean fuel regulations", "OrderInCouncil");
        e.linked_departments = vec!["Environment Canada".to_string()];
        let terms = normalize_evidence(&e, &departments());
        assert!(terms.contains("type_orderincouncil"));
        assert!(terms.contains("dept_environment_climate_change"));
    }

    #[test]
    fn source_type_tag_collapses_whitespace() {
        let terms = normalize_evidence(&evidence("Royal Assent", "Bill Event"), &departments());
        assert!(terms.contains("type_bill_event"));
    }

    // === Scenario: concept phrases match by substring, not tokens ===

    #[test]
    fn bill_number_maps_to_concept_group() {
        let terms = normalize_evidence(
            &evidence("Bill C-50 receives Royal Assent", "Bill Event"),
            &departments(),
        );
        assert!(
            terms.contains("concept_sustainable_jobs"),
            "C-50 is the sustainable jobs bill"
        );
    }

    #[test]
    fn promise_and_evidence_share_concept_tag() {
        let p_terms = normalize_promise(
            &promise("Ensure a just transition to sustainable jobs for energy workers"),
            &departments(),
        );
        let e_terms = normalize_evidence(
            &evidence("Bill C-50 receives Royal Assent", "Bill Event"),
            &departments(),
        );
        assert!(p_terms.contains("concept_sustainable_jobs"));
        assert_eq!(p_terms.shared_with_prefix(&e_terms, "concept_"), 1);
    }

    // === Scenario: empty fields contribute nothing ===

    #[test]
    fn empty_fields_are_not_an_error() {
        let mut p = promise("");
        p.party_code = String::new();
        let terms = normalize_promise(&p, &departments());
        assert!(terms.is_empty());
    }

    // === Scenario: normalization is deterministic ===

    #[test]
    fn normalization_is_deterministic() {
        let p = promise("Deliver pharmacare legislation by the end of 2023");
        let a = normalize_promise(&p, &departments());
        let b = normalize_promise(&p, &departments());
        assert_eq!(a, b);
    }

    #[test]
    fn jaccard_of_disjoint_sets_is_zero() {
        let a = normalize_promise(&promise("plant trees"), &departments());
        let mut other = Promise::new("p2", "reduce wait times", "CPC", "44-1");
        other.party_code = "CPC".to_string();
        let b = normalize_promise(&other, &departments());
        assert_eq!(a.jaccard(&b), 0.0);
    }

    #[test]
    fn intersection_is_sorted_and_outlives_the_call() {
        let a = normalize_promise(&promise("expand dental care coverage"), &departments());
        let b = normalize_promise(&promise("dental coverage for seniors"), &departments());
        let shared = a.intersection_sorted(&b);
        assert_eq!(shared, vec!["concept_dental_care", "coverage", "dental", "dental_important", "party_lpc"]);
        // Returned refs stay usable alongside both sets.
        assert!(a.contains(shared[1]) && b.contains(shared[1]));
    }

    #[test]
    fn jaccard_of_identical_sets_is_one() {
        let a = normalize_promise(&promise("plant two billion trees"), &departments());
        assert_eq!(a.jaccard(&a), 1.0);
    }
}
