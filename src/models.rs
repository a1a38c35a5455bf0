//! Core data types shared across the pipeline.
//!
//! [`Document`] is a source unit (product doc or support ticket), loaded once
//! and never mutated. [`Chunk`] is a bounded slice of one document's content —
//! the unit of retrieval and citation. [`RetrievalResult`] pairs a chunk with
//! a per-query relevance score.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;

/// Where a document came from: official docs or the support ticket queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Doc,
    Ticket,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Doc => "doc",
            Source::Ticket => "ticket",
        }
    }
}

/// A source unit: one product doc or one support ticket.
///
/// Immutable once loaded. Ticket-specific fields (`status`, `priority`,
/// dates) live in `extra`.
#[derive(Debug, Clone, Serialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub doc_type: String,
    pub version: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub content: String,
    pub source: Source,
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A contiguous slice of one document's content, carrying the document
/// metadata by value so citations and scoring never need a doc lookup.
///
/// Created once per indexing pass and never mutated; a re-index replaces
/// the whole chunk set.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub doc_id: String,
    pub title: String,
    pub source: Source,
    pub doc_type: String,
    pub version: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
    pub tags: Vec<String>,
    pub text: String,
    pub section: Option<String>,
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Human-readable reference string: `"<title> | (<doc_id>)"` plus
    /// optional section and version segments, pipe-separated.
    pub fn citation(&self) -> String {
        let mut parts = vec![self.title.clone(), format!("({})", self.doc_id)];
        if let Some(section) = &self.section {
            parts.push(format!("section: {}", section));
        }
        if let Some(version) = &self.version {
            parts.push(format!("version: {}", version));
        }
        parts.join(" | ")
    }

    /// Ticket status from `extra`, lowercased; empty string when absent.
    pub fn status(&self) -> String {
        self.extra
            .get("status")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_lowercase()
    }
}

/// A chunk paired with its relevance score for one query.
///
/// Scores are heuristic and unnormalized — comparable only within a single
/// query's result set.
#[derive(Debug, Clone)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub score: f64,
}

/// Flat metadata view of a chunk, as exposed by the `db` inspection
/// commands and endpoints. `None` values render as empty strings.
pub fn chunk_metadata(c: &Chunk) -> serde_json::Value {
    let mut meta = serde_json::Map::new();
    meta.insert("chunk_id".into(), c.chunk_id.clone().into());
    meta.insert("doc_id".into(), c.doc_id.clone().into());
    meta.insert("title".into(), c.title.clone().into());
    meta.insert("source".into(), c.source.as_str().into());
    meta.insert("doc_type".into(), c.doc_type.clone().into());
    meta.insert("version".into(), c.version.clone().unwrap_or_default().into());
    meta.insert(
        "last_updated".into(),
        c.last_updated
            .map(|d| d.to_rfc3339())
            .unwrap_or_default()
            .into(),
    );
    meta.insert("tags".into(), c.tags.join(",").into());
    meta.insert("section".into(), c.section.clone().unwrap_or_default().into());
    for (k, v) in &c.extra {
        let clean = match v {
            serde_json::Value::Null => serde_json::Value::String(String::new()),
            serde_json::Value::String(_)
            | serde_json::Value::Number(_)
            | serde_json::Value::Bool(_) => v.clone(),
            other => serde_json::Value::String(other.to_string()),
        };
        meta.insert(k.clone(), clean);
    }
    serde_json::Value::Object(meta)
}

/// Parse a date string, falling back through the formats that appear in the
/// datasets. Anything unparseable yields `None` — downstream recency scoring
/// treats that as "no bonus", never as an error.
pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(ndt.and_utc());
    }
    for fmt in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(nd) = NaiveDate::parse_from_str(s, fmt) {
            return Some(nd.and_hms_opt(0, 0, 0)?.and_utc());
        }
    }
    None
}

static VERSION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"v\d+\.\d+").unwrap());

/// Extract the first `v<major>.<minor>` token from free text,
/// case-insensitive, normalized to lowercase. `None` when absent.
pub fn extract_version(text: &str) -> Option<String> {
    VERSION_RE.find(&text.to_lowercase()).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_chunk() -> Chunk {
        Chunk {
            chunk_id: "doc_001:::abc".to_string(),
            doc_id: "doc_001".to_string(),
            title: "Getting Started".to_string(),
            source: Source::Doc,
            doc_type: "user_guide".to_string(),
            version: Some("v2.1".to_string()),
            last_updated: None,
            tags: vec![],
            text: "Hello.".to_string(),
            section: Some("Setup".to_string()),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_citation_contains_doc_id_in_parens() {
        let c = sample_chunk();
        let citation = c.citation();
        assert!(citation.contains("(doc_001)"));
        assert!(citation.contains("section: Setup"));
        assert!(citation.contains("version: v2.1"));
        assert_eq!(
            citation,
            "Getting Started | (doc_001) | section: Setup | version: v2.1"
        );
    }

    #[test]
    fn test_citation_omits_missing_segments() {
        let mut c = sample_chunk();
        c.section = None;
        c.version = None;
        assert_eq!(c.citation(), "Getting Started | (doc_001)");
    }

    #[test]
    fn test_parse_date_rfc3339() {
        let dt = parse_date("2024-03-01T10:30:00Z").unwrap();
        assert_eq!(dt.to_rfc3339(), "2024-03-01T10:30:00+00:00");
    }

    #[test]
    fn test_parse_date_fallback_formats() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024/03/01").is_some());
        assert!(parse_date("2024-03-01T10:30:00").is_some());
    }

    #[test]
    fn test_parse_date_garbage_is_none() {
        assert!(parse_date("").is_none());
        assert!(parse_date("last tuesday").is_none());
        assert!(parse_date("03-2024").is_none());
    }

    #[test]
    fn test_extract_version() {
        assert_eq!(
            extract_version("Does v2.1 support X?"),
            Some("v2.1".to_string())
        );
        assert_eq!(extract_version("On V2.0 it fails"), Some("v2.0".to_string()));
        assert_eq!(extract_version("no version here"), None);
    }

    #[test]
    fn test_ticket_status_lookup() {
        let mut c = sample_chunk();
        c.extra
            .insert("status".to_string(), serde_json::json!("Pending"));
        assert_eq!(c.status(), "pending");
        c.extra.insert("status".to_string(), serde_json::Value::Null);
        assert_eq!(c.status(), "");
    }
}
