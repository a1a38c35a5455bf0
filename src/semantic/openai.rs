//! OpenAI embedding backend.
//!
//! Embeds chunk texts at index time via `POST /v1/embeddings` (batched),
//! holds the vectors in memory, and answers queries by embedding the query
//! text and ranking by cosine similarity. Requires the `OPENAI_API_KEY`
//! environment variable.
//!
//! Retry strategy for the API call:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{SemanticHit, SemanticIndex};
use crate::config::SemanticConfig;
use crate::models::Chunk;

struct Entry {
    chunk_id: String,
    version: Option<String>,
    vector: Vec<f32>,
}

/// Semantic backend over the OpenAI embeddings API.
pub struct OpenAiBackend {
    model: String,
    batch_size: usize,
    max_retries: u32,
    timeout_secs: u64,
    entries: Vec<Entry>,
}

impl OpenAiBackend {
    /// # Errors
    ///
    /// Returns an error if `semantic.model` is not configured or
    /// `OPENAI_API_KEY` is not in the environment.
    pub fn new(config: &SemanticConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("semantic.model required for OpenAI backend"))?;
        if std::env::var("OPENAI_API_KEY").is_err() {
            bail!("OPENAI_API_KEY environment variable not set");
        }
        Ok(Self {
            model,
            batch_size: config.batch_size.max(1),
            max_retries: config.max_retries,
            timeout_secs: config.timeout_secs,
            entries: Vec::new(),
        })
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", api_key))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_embeddings_response(&json);
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "OpenAI API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Embedding failed after retries")))
    }
}

#[async_trait]
impl SemanticIndex for OpenAiBackend {
    async fn index(&mut self, chunks: &[Chunk]) -> Result<()> {
        let mut entries = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self.embed(&texts).await?;
            if vectors.len() != batch.len() {
                bail!(
                    "OpenAI returned {} embeddings for {} inputs",
                    vectors.len(),
                    batch.len()
                );
            }
            for (c, vector) in batch.iter().zip(vectors) {
                entries.push(Entry {
                    chunk_id: c.chunk_id.clone(),
                    version: c.version.clone(),
                    vector,
                });
            }
        }
        self.entries = entries;
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_n: usize,
        version_filter: Option<&str>,
    ) -> Result<Vec<SemanticHit>> {
        let qv = self
            .embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Empty embedding response"))?;

        let mut hits: Vec<SemanticHit> = self
            .entries
            .iter()
            .filter(|e| match version_filter {
                Some(v) => e.version.as_deref() == Some(v),
                None => true,
            })
            .map(|e| SemanticHit {
                chunk_id: e.chunk_id.clone(),
                distance: 1.0 - cosine_similarity(&qv, &e.vector) as f64,
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_n);
        Ok(hits)
    }
}

/// Extract the `data[].embedding` arrays in input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut embeddings = Vec::with_capacity(data.len());
    for item in data {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow::anyhow!("Invalid OpenAI response: missing embedding"))?;
        let vec: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();
        embeddings.push(vec);
    }
    Ok(embeddings)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}
