//! Dataset loading: product docs and support tickets from JSON files.
//!
//! Two collections map onto the [`Document`] shape: `product_docs.json`
//! records become `source = doc`; `support_tickets.json` records become
//! `source = ticket`, with `category` flowing into `doc_type`,
//! `user_version` into `version`, `resolved_date || created_date` into
//! `last_updated`, and status/priority/dates into `extra`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::models::{parse_date, Document, Source};

#[derive(Deserialize)]
struct ProductDocsFile {
    product_docs: Vec<RawProductDoc>,
}

#[derive(Deserialize)]
struct RawProductDoc {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "type", default)]
    doc_type: String,
    #[serde(default)]
    version: Option<String>,
    #[serde(default)]
    last_updated: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct SupportTicketsFile {
    support_tickets: Vec<RawTicket>,
}

#[derive(Deserialize)]
struct RawTicket {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    user_version: Option<String>,
    #[serde(default)]
    created_date: Option<String>,
    #[serde(default)]
    resolved_date: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    content: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    priority: Option<String>,
}

pub fn load_product_docs(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: ProductDocsFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(file
        .product_docs
        .into_iter()
        .map(|d| Document {
            id: d.id,
            title: d.title,
            doc_type: d.doc_type,
            version: d.version,
            last_updated: d.last_updated.as_deref().and_then(parse_date),
            tags: d.tags.unwrap_or_default(),
            content: d.content,
            source: Source::Doc,
            extra: BTreeMap::new(),
        })
        .collect())
}

pub fn load_support_tickets(path: &Path) -> Result<Vec<Document>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file: SupportTicketsFile = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(file
        .support_tickets
        .into_iter()
        .map(|t| {
            let last_updated = t
                .resolved_date
                .as_deref()
                .or(t.created_date.as_deref())
                .and_then(parse_date);
            let mut extra = BTreeMap::new();
            extra.insert("status".to_string(), opt_str(&t.status));
            extra.insert("priority".to_string(), opt_str(&t.priority));
            extra.insert("created_date".to_string(), opt_str(&t.created_date));
            extra.insert("resolved_date".to_string(), opt_str(&t.resolved_date));
            Document {
                id: t.id,
                title: t.title,
                doc_type: t.category.unwrap_or_else(|| "ticket".to_string()),
                version: t.user_version,
                last_updated,
                tags: t.tags.unwrap_or_default(),
                content: t.content,
                source: Source::Ticket,
                extra,
            }
        })
        .collect())
}

fn opt_str(v: &Option<String>) -> serde_json::Value {
    match v {
        Some(s) => serde_json::Value::String(s.clone()),
        None => serde_json::Value::Null,
    }
}

/// Load both collections from `dataset_dir` and return all documents,
/// product docs first.
pub fn load_all(dataset_dir: &Path) -> Result<Vec<Document>> {
    let mut docs = load_product_docs(&dataset_dir.join("product_docs.json"))?;
    let tickets = load_support_tickets(&dataset_dir.join("support_tickets.json"))?;
    docs.extend(tickets);
    Ok(docs)
}
