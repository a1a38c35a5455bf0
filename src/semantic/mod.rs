//! Semantic search capability and concrete backends.
//!
//! The ranking core only sees the narrow [`SemanticIndex`] trait
//! (index/query), so it can be exercised against the deterministic in-process
//! TF-IDF backend in tests while production configs may point at the OpenAI
//! embedding backend.
//!
//! Backends return ascending *distances*; callers derive similarity as
//! `1 − distance`.

pub mod openai;
pub mod tfidf;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::config::SemanticConfig;
use crate::models::Chunk;

/// One similarity hit: a chunk id and its distance from the query
/// (lower is closer).
#[derive(Debug, Clone)]
pub struct SemanticHit {
    pub chunk_id: String,
    pub distance: f64,
}

/// Narrow capability interface over a vector search backend.
#[async_trait]
pub trait SemanticIndex: Send + Sync {
    /// (Re)build the collection wholesale from the chunk set.
    async fn index(&mut self, chunks: &[Chunk]) -> Result<()>;

    /// Return up to `top_n` hits ordered by ascending distance. When
    /// `version_filter` is set, only chunks whose version exactly equals
    /// the filter are considered.
    async fn query(
        &self,
        text: &str,
        top_n: usize,
        version_filter: Option<&str>,
    ) -> Result<Vec<SemanticHit>>;
}

/// Instantiate the backend named by `[semantic] provider`.
pub fn create_backend(config: &SemanticConfig) -> Result<Box<dyn SemanticIndex>> {
    match config.provider.as_str() {
        "tfidf" => Ok(Box::new(tfidf::TfidfBackend::new(config.max_features))),
        "openai" => Ok(Box::new(openai::OpenAiBackend::new(config)?)),
        other => bail!("Unknown semantic provider: {}", other),
    }
}
