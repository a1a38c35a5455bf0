//! In-process TF-IDF similarity backend.
//!
//! A lightweight vectorizer plus cosine similarity — no network, no model
//! downloads, fully deterministic for a fixed corpus. The default backend,
//! and the stub the ranking tests run against.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use super::{SemanticHit, SemanticIndex};
use crate::lexical::tokenize;
use crate::models::Chunk;

struct Entry {
    chunk_id: String,
    version: Option<String>,
    vector: Vec<f64>,
}

/// TF-IDF vectorizer over the chunk corpus: vocabulary capped at the
/// `max_features` most document-frequent tokens, `idf = ln((N+1)/(df+1)) + 1`,
/// `tf = 1 + ln(count)`, L2-normalized vectors. Query terms outside the
/// vocabulary are ignored; `distance = 1 − cosine`.
pub struct TfidfBackend {
    max_features: usize,
    vocab: HashMap<String, usize>,
    idf: Vec<f64>,
    entries: Vec<Entry>,
}

impl TfidfBackend {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            vocab: HashMap::new(),
            idf: Vec::new(),
            entries: Vec::new(),
        }
    }

    fn fit(&mut self, texts: &[&str]) {
        // Document frequency, tracked in first-seen order so vocabulary
        // selection is deterministic under ties.
        let mut df: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for text in texts {
            let mut seen: Vec<String> = Vec::new();
            for tok in tokenize(text) {
                if !seen.contains(&tok) {
                    seen.push(tok);
                }
            }
            for tok in seen {
                if !df.contains_key(&tok) {
                    order.push(tok.clone());
                }
                *df.entry(tok).or_insert(0) += 1;
            }
        }

        let mut ranked: Vec<&String> = order.iter().collect();
        ranked.sort_by(|a, b| df[*b].cmp(&df[*a]));
        ranked.truncate(self.max_features);

        let n_docs = texts.len().max(1) as f64;
        self.vocab = ranked
            .iter()
            .enumerate()
            .map(|(i, w)| ((*w).clone(), i))
            .collect();
        self.idf = ranked
            .iter()
            .map(|w| ((n_docs + 1.0) / (df[*w] as f64 + 1.0)).ln() + 1.0)
            .collect();
    }

    fn transform(&self, text: &str) -> Vec<f64> {
        let mut counts: HashMap<usize, usize> = HashMap::new();
        for tok in tokenize(text) {
            if let Some(&j) = self.vocab.get(&tok) {
                *counts.entry(j).or_insert(0) += 1;
            }
        }
        let mut vec = vec![0.0; self.vocab.len()];
        for (j, c) in counts {
            vec[j] = (1.0 + (c as f64).ln()) * self.idf[j];
        }
        l2_normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl SemanticIndex for TfidfBackend {
    async fn index(&mut self, chunks: &[Chunk]) -> Result<()> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        self.fit(&texts);
        self.entries = chunks
            .iter()
            .map(|c| Entry {
                chunk_id: c.chunk_id.clone(),
                version: c.version.clone(),
                vector: self.transform(&c.text),
            })
            .collect();
        Ok(())
    }

    async fn query(
        &self,
        text: &str,
        top_n: usize,
        version_filter: Option<&str>,
    ) -> Result<Vec<SemanticHit>> {
        let qv = self.transform(text);
        let mut hits: Vec<SemanticHit> = self
            .entries
            .iter()
            .filter(|e| match version_filter {
                Some(v) => e.version.as_deref() == Some(v),
                None => true,
            })
            .map(|e| SemanticHit {
                chunk_id: e.chunk_id.clone(),
                distance: 1.0 - dot(&qv, &e.vector),
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

fn l2_normalize(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Both sides are L2-normalized, so the dot product is the cosine.
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
