//! Query pipeline: rank, synthesize, and shape the wire-level response,
//! plus the trace view that exposes the raw signals behind a ranking.

use serde::{Deserialize, Serialize};

use crate::index::CorpusIndex;
use crate::rank::{lexical_candidates, rank, semantic_candidates};
use crate::synth::synthesize;

/// The response contract shared by the CLI and the HTTP API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub query: String,
    pub answer: String,
    pub confidence: f64,
    pub citations: Vec<String>,
}

/// Per-channel raw signals plus the final ranked list for one query.
#[derive(Debug, Clone, Serialize)]
pub struct Trace {
    pub query: String,
    pub semantic: Vec<SemanticTraceEntry>,
    pub bm25: Vec<Bm25TraceEntry>,
    pub combined: Vec<CombinedTraceEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SemanticTraceEntry {
    pub id: String,
    pub semantic: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Bm25TraceEntry {
    pub id: String,
    pub bm25: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CombinedTraceEntry {
    pub id: String,
    pub score: f64,
    pub doc_id: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    pub title: String,
    pub text_preview: String,
}

/// Answer one query over the snapshot.
pub async fn answer_query(index: &CorpusIndex, query: &str, top_k: usize) -> QueryResponse {
    let results = rank(index, query, top_k).await;
    let answer = synthesize(query, &results);
    QueryResponse {
        query: query.to_string(),
        answer: answer.text,
        confidence: round4(answer.confidence),
        citations: answer.citations,
    }
}

/// Expose the raw per-channel candidates next to the final ranking.
pub async fn trace_query(index: &CorpusIndex, query: &str, top_k: usize) -> Trace {
    let semantic = semantic_candidates(index, query, top_k)
        .await
        .into_iter()
        .map(|(id, similarity)| SemanticTraceEntry {
            id,
            semantic: similarity,
        })
        .collect();

    let bm25 = lexical_candidates(index, query, top_k)
        .into_iter()
        .map(|(id, score)| Bm25TraceEntry { id, bm25: score })
        .collect();

    let combined = rank(index, query, top_k)
        .await
        .into_iter()
        .map(|r| CombinedTraceEntry {
            id: r.chunk.chunk_id.clone(),
            score: r.score,
            doc_id: r.chunk.doc_id.clone(),
            source: r.chunk.source.as_str().to_string(),
            version: r.chunk.version.clone(),
            section: r.chunk.section.clone(),
            title: r.chunk.title.clone(),
            text_preview: preview(&r.chunk.text),
        })
        .collect();

    Trace {
        query: query.to_string(),
        semantic,
        bm25,
        combined,
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// First 200 scalar values of the text, with an ellipsis when truncated.
fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(200).collect();
    if text.chars().count() > 200 {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{Document, Source};
    use std::collections::BTreeMap;

    fn doc(id: &str, content: &str) -> Document {
        Document {
            id: id.to_string(),
            title: format!("Title {}", id),
            doc_type: "user_guide".to_string(),
            version: None,
            last_updated: None,
            tags: vec![],
            content: content.to_string(),
            source: Source::Doc,
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_round4() {
        assert_eq!(round4(0.123456), 0.1235);
        assert_eq!(round4(0.95), 0.95);
        assert_eq!(round4(0.0), 0.0);
    }

    #[test]
    fn test_preview_truncates_with_ellipsis() {
        let short = preview("short text");
        assert_eq!(short, "short text");
        let long_src = "x".repeat(300);
        let long = preview(&long_src);
        assert_eq!(long.chars().count(), 201);
        assert!(long.ends_with('…'));
    }

    #[tokio::test]
    async fn test_answer_query_shape() {
        let config = Config::default();
        let docs = vec![doc("d1", "Sync conflicts happen when two devices edit a file.")];
        let index = crate::index::CorpusIndex::build(&config, docs).await.unwrap();
        let resp = answer_query(&index, "sync conflicts", 6).await;
        assert_eq!(resp.query, "sync conflicts");
        assert!(resp.confidence >= 0.35 && resp.confidence <= 0.95);
        assert_eq!(resp.citations.len(), 1);
        assert!(resp.citations[0].contains("(d1)"));
    }

    #[tokio::test]
    async fn test_trace_exposes_all_channels() {
        let config = Config::default();
        let docs = vec![
            doc("d1", "Sync conflicts happen when two devices edit a file."),
            doc("d2", "Billing history lives in account settings."),
        ];
        let index = crate::index::CorpusIndex::build(&config, docs).await.unwrap();
        let trace = trace_query(&index, "sync conflicts", 2).await;
        assert!(!trace.semantic.is_empty());
        assert!(!trace.bm25.is_empty());
        assert!(!trace.combined.is_empty());
        assert!(trace.combined.len() <= 2);
        assert_eq!(trace.combined[0].doc_id, "d1");
        // Serializes without versions/sections when absent
        let json = serde_json::to_value(&trace).unwrap();
        assert!(json["combined"][0].get("version").is_none());
    }
}
