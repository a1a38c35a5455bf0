//! Immutable corpus snapshot: documents, chunks, lexical index, and the
//! populated semantic backend bundled as one object.
//!
//! [`CorpusIndex::build`] is the only constructor, so a query can never
//! observe a half-built index — ranking before indexing is unrepresentable.
//! The HTTP server holds the snapshot behind `RwLock<Arc<CorpusIndex>>` and
//! a rebuild swaps the `Arc` after a complete build: readers see the fully
//! old or fully new index, never a mix.

use anyhow::Result;
use std::collections::HashMap;

use crate::config::Config;
use crate::lexical::{tokenize, Bm25Index};
use crate::models::{Chunk, Document};
use crate::segment::segment;
use crate::semantic::{self, SemanticIndex};

pub struct CorpusIndex {
    documents: Vec<Document>,
    chunks: Vec<Chunk>,
    chunk_by_id: HashMap<String, usize>,
    bm25: Bm25Index,
    semantic: Box<dyn SemanticIndex>,
}

impl CorpusIndex {
    /// Segment all documents, fit the BM25 index, and populate the semantic
    /// backend selected by the config.
    pub async fn build(config: &Config, documents: Vec<Document>) -> Result<Self> {
        let mut chunks: Vec<Chunk> = Vec::new();
        for doc in &documents {
            chunks.extend(segment(doc, config.chunking.max_chars));
        }

        let tokenized: Vec<Vec<String>> = chunks.iter().map(|c| tokenize(&c.text)).collect();
        let bm25 = Bm25Index::fit(&tokenized);

        let chunk_by_id = chunks
            .iter()
            .enumerate()
            .map(|(i, c)| (c.chunk_id.clone(), i))
            .collect();

        let mut backend = semantic::create_backend(&config.semantic)?;
        backend.index(&chunks).await?;

        Ok(Self {
            documents,
            chunks,
            chunk_by_id,
            bm25,
            semantic: backend,
        })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// All chunks in emission order (corpus order for BM25 scores).
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_by_id(&self, id: &str) -> Option<&Chunk> {
        self.chunk_by_id.get(id).map(|&i| &self.chunks[i])
    }

    pub fn bm25(&self) -> &Bm25Index {
        &self.bm25
    }

    pub fn semantic(&self) -> &dyn SemanticIndex {
        self.semantic.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
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

    #[tokio::test]
    async fn test_build_wires_all_structures() {
        let config = Config::default();
        let docs = vec![
            doc("d1", "First paragraph.\n\nSecond paragraph."),
            doc("d2", "Another document entirely."),
        ];
        let index = CorpusIndex::build(&config, docs).await.unwrap();

        assert_eq!(index.documents().len(), 2);
        assert!(!index.chunks().is_empty());
        assert_eq!(index.bm25().len(), index.chunks().len());
        for c in index.chunks() {
            assert_eq!(index.chunk_by_id(&c.chunk_id).unwrap().chunk_id, c.chunk_id);
        }
    }

    #[tokio::test]
    async fn test_rebuild_is_deterministic() {
        let config = Config::default();
        let docs = vec![doc("d1", "Some content here.\n\nMore content there.")];
        let a = CorpusIndex::build(&config, docs.clone()).await.unwrap();
        let b = CorpusIndex::build(&config, docs).await.unwrap();
        let ids_a: Vec<&str> = a.chunks().iter().map(|c| c.chunk_id.as_str()).collect();
        let ids_b: Vec<&str> = b.chunks().iter().map(|c| c.chunk_id.as_str()).collect();
        assert_eq!(ids_a, ids_b);
    }
}
