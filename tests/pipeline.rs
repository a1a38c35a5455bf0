//! End-to-end pipeline tests: dataset on disk → index → answer/trace/eval.

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use support_rag::config::Config;
use support_rag::dataset::load_all;
use support_rag::eval::{evaluate, safe_load_test_queries};
use support_rag::index::CorpusIndex;
use support_rag::pipeline::{answer_query, trace_query};

fn write_dataset(root: &Path) -> PathBuf {
    let docs = r#"{
      "product_docs": [
        {
          "id": "doc_001",
          "title": "Troubleshooting Sync Issues",
          "type": "troubleshooting_guide",
          "version": "v2.1",
          "last_updated": "2024-06-10",
          "content": "**Common Sync Problems**\n\nIf files are not syncing between devices, work through these steps in order.\n\n1. Check your internet connection and confirm the sync status icon in the system tray.\n2. Restart the application to force a fresh sync cycle.\n\n**Sync Conflicts**\n\nWhen two devices edit the same file while offline, both copies are kept and one is renamed with a conflict suffix."
        },
        {
          "id": "doc_002",
          "title": "Billing Guide",
          "type": "billing_guide",
          "content": "Open account settings and choose Billing to see your billing history or update the payment method."
        }
      ]
    }"#;
    let tickets = r#"{
      "support_tickets": [
        {
          "id": "tkt_101",
          "title": "Sync stopped after update",
          "category": "sync_issue",
          "user_version": "v2.0",
          "created_date": "2024-05-20",
          "resolved_date": "2024-05-21",
          "status": "resolved",
          "content": "Firewall was blocking the sync agent. Added it to the allow list and sync resumed."
        },
        {
          "id": "tkt_102",
          "title": "Sync conflict files multiplying",
          "category": "sync_issue",
          "user_version": "v2.1",
          "created_date": "2024-06-01",
          "status": "pending",
          "content": "Customer reports duplicate conflict copies appearing after every sync. Engineering is investigating."
        }
      ]
    }"#;
    fs::write(root.join("product_docs.json"), docs).unwrap();
    fs::write(root.join("support_tickets.json"), tickets).unwrap();
    root.to_path_buf()
}

async fn build_index(dir: &Path) -> CorpusIndex {
    let mut config = Config::default();
    config.dataset.dir = dir.to_path_buf();
    let documents = load_all(dir).unwrap();
    CorpusIndex::build(&config, documents).await.unwrap()
}

#[tokio::test]
async fn answers_sync_question_with_steps_and_citation() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let index = build_index(tmp.path()).await;

    let resp = answer_query(&index, "How do I fix sync issues?", 6).await;
    let lower = resp.answer.to_lowercase();

    assert!(resp.answer.starts_with("Here are the steps:"));
    assert!(lower.contains("check your internet connection"));
    assert!(lower.contains("restart the application"));
    assert!(resp.confidence >= 0.35 && resp.confidence <= 0.95);
    assert!(resp.citations.iter().any(|c| c.contains("(doc_001)")));
}

#[tokio::test]
async fn flags_pending_ticket_in_mixed_results() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let index = build_index(tmp.path()).await;

    let resp = answer_query(&index, "sync conflict duplicate copies", 6).await;
    assert!(resp.answer.contains("Conflicting/ongoing issue detected"));
}

#[tokio::test]
async fn unrelated_query_still_answers_within_bounds() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let index = build_index(tmp.path()).await;

    let resp = answer_query(&index, "completely unrelated zebra question", 6).await;
    assert!(!resp.answer.is_empty());
    assert!(resp.confidence >= 0.35 && resp.confidence <= 0.95);
}

#[tokio::test]
async fn trace_reports_all_signal_channels() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let index = build_index(tmp.path()).await;

    let trace = trace_query(&index, "sync conflicts", 3).await;
    assert!(!trace.semantic.is_empty());
    assert!(!trace.bm25.is_empty());
    assert!(!trace.combined.is_empty());
    assert!(trace.combined.len() <= 3);
    for entry in &trace.combined {
        assert!(index.chunk_by_id(&entry.id).is_some());
        assert!(entry.text_preview.chars().count() <= 201);
    }
}

#[tokio::test]
async fn eval_harness_runs_repaired_test_file() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let index = build_index(tmp.path()).await;

    // Hand-edited file with a missing comma before "notes"
    let queries_path = tmp.path().join("test_queries.json");
    fs::write(
        &queries_path,
        "{\"test_queries\": [\n  {\"id\": \"tq_001\", \"query\": \"How do I fix sync issues?\",\n   \"expected_sources\": [\"doc_001\"],\n   \"expected_answer_contains\": [\"internet connection\"]\n   \"notes\": \"edited by hand\"},\n  {\"id\": \"tq_002\", \"query\": \"how do i see billing history\",\n   \"expected_answer_contains\": [\"billing history\"]}\n]}",
    )
    .unwrap();

    let queries = safe_load_test_queries(&queries_path);
    assert_eq!(queries.len(), 2);

    let report = evaluate(&index, &queries).await;
    assert_eq!(report.total, 2);
    assert_eq!(report.passed, 2, "notes: {:?}", report.notes);
}

#[tokio::test]
async fn version_mention_changes_ranking_not_correctness() {
    let tmp = TempDir::new().unwrap();
    write_dataset(tmp.path());
    let index = build_index(tmp.path()).await;

    // tkt_101 carries v2.0; asking about v2.0 should surface it over the
    // v2.1 conflict ticket for otherwise similar sync wording
    let results_plain = trace_query(&index, "sync stopped", 6).await;
    let results_versioned = trace_query(&index, "sync stopped on v2.0", 6).await;
    assert!(!results_plain.combined.is_empty());

    let pos = |trace: &support_rag::pipeline::Trace, doc: &str| {
        trace
            .combined
            .iter()
            .position(|e| e.doc_id == doc)
            .unwrap_or(usize::MAX)
    };
    assert!(pos(&results_versioned, "tkt_101") <= pos(&results_versioned, "tkt_102"));
}
