//! Snapshot inspection backing the `db` CLI subcommands and the
//! `/api/db/*` endpoints: corpus stats, filtered chunk listings, and
//! single-chunk lookup.

use anyhow::{bail, Result};
use serde_json::{json, Value};

use crate::index::CorpusIndex;
use crate::models::{chunk_metadata, Source};

/// Corpus-level counts.
pub fn stats(index: &CorpusIndex) -> Value {
    let docs = index
        .documents()
        .iter()
        .filter(|d| d.source == Source::Doc)
        .count();
    let tickets = index.documents().len() - docs;
    json!({
        "documents": index.documents().len(),
        "product_docs": docs,
        "support_tickets": tickets,
        "chunks": index.chunks().len(),
    })
}

/// Chunk previews with metadata, optionally equality-filtered on metadata
/// fields.
///
/// `where_filter` must be a JSON object; each key must equal the chunk's
/// metadata value exactly (string comparison against the flattened view).
pub fn list(index: &CorpusIndex, limit: usize, where_filter: Option<&Value>) -> Result<Vec<Value>> {
    let filter = match where_filter {
        Some(Value::Object(map)) => Some(map),
        Some(_) => bail!("where filter must be a JSON object"),
        None => None,
    };

    let mut out = Vec::new();
    for chunk in index.chunks() {
        let meta = chunk_metadata(chunk);
        if let Some(map) = filter {
            let matches = map.iter().all(|(k, v)| meta.get(k) == Some(v));
            if !matches {
                continue;
            }
        }
        out.push(json!({
            "chunk_id": chunk.chunk_id,
            "preview": preview(&chunk.text),
            "metadata": meta,
        }));
        if out.len() >= limit {
            break;
        }
    }
    Ok(out)
}

/// Full chunk by id, `None` when unknown.
pub fn show(index: &CorpusIndex, id: &str) -> Option<Value> {
    index.chunk_by_id(id).map(|chunk| {
        json!({
            "chunk_id": chunk.chunk_id,
            "text": chunk.text,
            "metadata": chunk_metadata(chunk),
        })
    })
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(120).collect();
    if text.chars().count() > 120 {
        out.push('…');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::Document;
    use std::collections::BTreeMap;

    async fn sample_index() -> CorpusIndex {
        let docs = vec![
            Document {
                id: "d1".to_string(),
                title: "Guide".to_string(),
                doc_type: "user_guide".to_string(),
                version: Some("v2.1".to_string()),
                last_updated: None,
                tags: vec![],
                content: "First doc content.".to_string(),
                source: Source::Doc,
                extra: BTreeMap::new(),
            },
            Document {
                id: "t1".to_string(),
                title: "Ticket".to_string(),
                doc_type: "sync_issue".to_string(),
                version: None,
                last_updated: None,
                tags: vec![],
                content: "Ticket content.".to_string(),
                source: Source::Ticket,
                extra: BTreeMap::new(),
            },
        ];
        CorpusIndex::build(&Config::default(), docs).await.unwrap()
    }

    #[tokio::test]
    async fn test_stats_counts() {
        let index = sample_index().await;
        let s = stats(&index);
        assert_eq!(s["documents"], 2);
        assert_eq!(s["product_docs"], 1);
        assert_eq!(s["support_tickets"], 1);
        assert_eq!(s["chunks"].as_u64().unwrap() as usize, index.chunks().len());
    }

    #[tokio::test]
    async fn test_list_where_filter() {
        let index = sample_index().await;
        let all = list(&index, 100, None).unwrap();
        assert_eq!(all.len(), index.chunks().len());

        let filter = serde_json::json!({"source": "ticket"});
        let tickets = list(&index, 100, Some(&filter)).unwrap();
        assert!(!tickets.is_empty());
        assert!(tickets
            .iter()
            .all(|e| e["metadata"]["source"] == "ticket"));

        let none = list(&index, 100, Some(&serde_json::json!({"source": "nope"}))).unwrap();
        assert!(none.is_empty());

        assert!(list(&index, 100, Some(&serde_json::json!("not an object"))).is_err());
    }

    #[tokio::test]
    async fn test_list_respects_limit() {
        let index = sample_index().await;
        let one = list(&index, 1, None).unwrap();
        assert_eq!(one.len(), 1);
    }

    #[tokio::test]
    async fn test_show_lookup() {
        let index = sample_index().await;
        let id = index.chunks()[0].chunk_id.clone();
        let shown = show(&index, &id).unwrap();
        assert_eq!(shown["chunk_id"], serde_json::json!(id));
        assert!(show(&index, "missing:::id").is_none());
    }
}
