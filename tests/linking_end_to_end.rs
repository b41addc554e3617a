//! End-to-end linking flow against an in-memory store: a bill-event
//! evidence item is linked to the promise it implements, the run is
//! idempotent, and the resulting state passes an integrity scan.

use promisetrack::{
    Algorithm, CandidateScorer, ConfidenceLevel, DepartmentStandardizer, DocumentStore,
    EvidenceItem, IntegrityChecker, LexicalScorer, LinkerConfig, LinkingOrchestrator,
    LinkingStatus, LlmBatchScorer, OpenStore, Promise, RunScope, SqliteStore,
};
use promisetrack::generate::MockGenerator;
use std::sync::Arc;

fn config() -> LinkerConfig {
    LinkerConfig {
        inter_call_delay_ms: 0,
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

fn orchestrator(
    store: Arc<dyn DocumentStore>,
    scorer: Arc<dyn CandidateScorer>,
) -> LinkingOrchestrator {
    LinkingOrchestrator::new(store, scorer, DepartmentStandardizer::builtin(), config())
}

/// A just-transition promise and the bill event that implements it. The two
/// share almost no plain tokens; the match rides on the concept vocabulary.
fn seed_sustainable_jobs(store: &dyn DocumentStore) {
    let mut promise = Promise::new(
        "p-sustjobs",
        "Ensure a just transition to sustainable jobs for energy workers",
        "LPC",
        "44-1",
    );
    promise.responsible_department_lead =
        Some("Natural Resources Canada".to_string());
    store.save_promise(&promise).unwrap();

    let mut evidence = EvidenceItem::new(
        "e-c50-assent",
        "Bill C-50 receives Royal Assent",
        "Bill Event",
        "44-1",
    );
    evidence.linked_departments = vec!["Natural Resources Canada".to_string()];
    store.save_evidence(&evidence).unwrap();
}

#[tokio::test]
async fn bill_event_links_to_the_promise_it_implements() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_sustainable_jobs(store.as_ref());

    let report = orchestrator(store.clone(), Arc::new(LexicalScorer::new()))
        .run(&RunScope::new("44-1"))
        .await
        .unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.links_created(), 1);

    // Both sides carry the link.
    let promise = store.get_promise("p-sustjobs").unwrap().unwrap();
    let link = promise.find_link("e-c50-assent").expect("link on promise side");
    assert!(link.similarity_score >= 0.10);
    assert_eq!(link.algorithm, Algorithm::Lexical);

    let evidence = store.get_evidence("e-c50-assent").unwrap().unwrap();
    assert!(evidence.is_linked_to("p-sustjobs"));
    assert_eq!(evidence.promise_linking_status, LinkingStatus::Processed);

    // The resulting state satisfies the link invariants.
    let integrity = IntegrityChecker::new(store).check(None).unwrap();
    assert!(integrity.is_clean(), "found {:?}", integrity.counts);
}

#[tokio::test]
async fn reruns_are_idempotent() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_sustainable_jobs(store.as_ref());
    let orch = orchestrator(store.clone(), Arc::new(LexicalScorer::new()));

    orch.run(&RunScope::new("44-1")).await.unwrap();
    let first = store
        .get_promise("p-sustjobs")
        .unwrap()
        .unwrap()
        .find_link("e-c50-assent")
        .unwrap()
        .clone();

    // Reset to pending and rerun with no data change: the link is kept
    // as-is, not duplicated, not rescored.
    store
        .set_linking_status("e-c50-assent", LinkingStatus::Pending, None)
        .unwrap();
    let report = orch.run(&RunScope::new("44-1")).await.unwrap();
    assert_eq!(report.links_created(), 0);
    assert_eq!(report.links_updated(), 0);

    let promise = store.get_promise("p-sustjobs").unwrap().unwrap();
    assert_eq!(promise.linked_evidence.len(), 1);
    let second = promise.find_link("e-c50-assent").unwrap();
    assert_eq!(second.similarity_score, first.similarity_score);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at.is_none());

    let evidence = store.get_evidence("e-c50-assent").unwrap().unwrap();
    assert_eq!(evidence.promise_ids, vec!["p-sustjobs"]);
}

#[tokio::test]
async fn llm_scorer_drives_the_same_pipeline() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_sustainable_jobs(store.as_ref());

    // The model echoes the candidate's condensed text with a relevance of 8,
    // wrapped in a code fence the engine must strip.
    let response = r#"```json
{"matches": [{"promise_text": "Ensure a just transition to sustainable jobs for energy workers", "relevance": 8, "explanation": "C-50 is the sustainable jobs act", "link_type": "implementation"}]}
```"#;
    let generator = Arc::new(MockGenerator::new().with_response(response));
    let scorer = Arc::new(LlmBatchScorer::new(generator));

    let report = orchestrator(store.clone(), scorer)
        .run(&RunScope::new("44-1"))
        .await
        .unwrap();
    assert_eq!(report.links_created(), 1);

    let promise = store.get_promise("p-sustjobs").unwrap().unwrap();
    let link = promise.find_link("e-c50-assent").unwrap();
    assert_eq!(link.algorithm, Algorithm::LlmBatch);
    assert_eq!(link.similarity_score, 0.8);
    assert_eq!(link.confidence_level, ConfidenceLevel::High);
}

#[tokio::test]
async fn enhanced_link_survives_a_later_lexical_pass() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_sustainable_jobs(store.as_ref());

    let response = r#"{"matches": [{"promise_text": "Ensure a just transition to sustainable jobs for energy workers", "relevance": 9, "explanation": "direct implementation", "link_type": "implementation"}]}"#;
    let llm = Arc::new(LlmBatchScorer::new(Arc::new(
        MockGenerator::new().with_response(response),
    )));
    orchestrator(store.clone(), llm)
        .run(&RunScope::new("44-1"))
        .await
        .unwrap();

    // A later lexical pass over the same (re-pended) item cannot displace
    // the LLM-produced link with its lower score.
    store
        .set_linking_status("e-c50-assent", LinkingStatus::Pending, None)
        .unwrap();
    orchestrator(store.clone(), Arc::new(LexicalScorer::new()))
        .run(&RunScope::new("44-1"))
        .await
        .unwrap();

    let promise = store.get_promise("p-sustjobs").unwrap().unwrap();
    let link = promise.find_link("e-c50-assent").unwrap();
    assert_eq!(link.algorithm, Algorithm::LlmBatch);
    assert_eq!(link.similarity_score, 0.9);
}

#[tokio::test]
async fn integrity_scan_survives_corruption_introduced_behind_its_back() {
    let store: Arc<dyn DocumentStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    seed_sustainable_jobs(store.as_ref());
    orchestrator(store.clone(), Arc::new(LexicalScorer::new()))
        .run(&RunScope::new("44-1"))
        .await
        .unwrap();

    // Simulate a partial dual write: drop the evidence-side reference.
    store.remove_promise_ref("e-c50-assent", "p-sustjobs").unwrap();
    // And an orphaned reference on a second item.
    let mut stray = EvidenceItem::new("e-stray", "Unrelated notice", "News", "44-1");
    stray.promise_ids = vec!["p-deleted".to_string()];
    store.save_evidence(&stray).unwrap();

    let checker = IntegrityChecker::new(store.clone());
    let report = checker.check(None).unwrap();
    assert_eq!(report.total(), 2);

    let plan = checker.plan(None).unwrap();
    let outcome = checker.apply(&plan, false).unwrap();
    assert!(outcome.failures.is_empty());
    assert!(checker.check(None).unwrap().is_clean());

    // Remediation restored the real link and dropped the orphan.
    let evidence = store.get_evidence("e-c50-assent").unwrap().unwrap();
    assert!(evidence.is_linked_to("p-sustjobs"));
    let stray = store.get_evidence("e-stray").unwrap().unwrap();
    assert!(stray.promise_ids.is_empty());
}
