//! Lexical scoring: tokenization, synonym expansion, keyword overlap, and a
//! corpus-level Okapi BM25 index.
//!
//! [`keyword_overlap_score`] is the cheap per-text signal used by the ranker
//! and the answer synthesizer; [`Bm25Index`] is the corpus-calibrated signal
//! built once per indexing pass.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9_]+").unwrap());

/// Bidirectional synonym groups: a query token equal to the key or any
/// variant pulls the entire group into the expanded term set.
static SYNONYMS: &[(&str, &[&str])] = &[
    ("login", &["sign-in", "sign in", "log in", "signin"]),
    ("sync", &["synchronization", "synchronise", "synchronize"]),
    ("folder", &["directory"]),
    ("2fa", &["two-factor", "two factor", "multi-factor", "mfa"]),
];

/// High-value multi-word phrases worth a fixed boost when found verbatim.
static PHRASES: &[&str] = &["sign in", "system tray", "version history", "rate limits"];

/// Word-level, case-insensitive tokenization. No stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Query token set plus synonym closures.
pub fn expand_query_terms(query: &str) -> HashSet<String> {
    let tokens = tokenize(query);
    let mut expanded: HashSet<String> = tokens.iter().cloned().collect();
    for t in &tokens {
        for (key, variants) in SYNONYMS {
            if t == key || variants.contains(&t.as_str()) {
                expanded.insert(key.to_string());
                expanded.extend(variants.iter().map(|v| v.to_string()));
            }
        }
    }
    expanded
}

/// Keyword-overlap relevance of `text` to `query`:
/// `|expanded ∩ text_tokens| / sqrt(|expanded|)` plus a +0.2 phrase boost
/// per high-value phrase found verbatim. 0.0 when either side is empty.
pub fn keyword_overlap_score(query: &str, text: &str) -> f64 {
    let q_set = expand_query_terms(query);
    let t_set: HashSet<String> = tokenize(text).into_iter().collect();
    if q_set.is_empty() || t_set.is_empty() {
        return 0.0;
    }
    let inter = q_set.intersection(&t_set).count();

    let text_lower = text.to_lowercase();
    let phrase_boost = PHRASES
        .iter()
        .filter(|p| text_lower.contains(*p))
        .count() as f64
        * 0.2;

    inter as f64 / (q_set.len() as f64).sqrt() + phrase_boost
}

/// Okapi BM25 over a tokenized chunk corpus.
///
/// Standard term-frequency/inverse-document-frequency ranking with
/// saturation (`k1`) and length normalization (`b`). Negative IDFs are
/// floored to `epsilon × average_idf` so very common terms still
/// contribute a small positive amount.
pub struct Bm25Index {
    doc_freqs: Vec<HashMap<String, usize>>,
    idf: HashMap<String, f64>,
    doc_len: Vec<usize>,
    avgdl: f64,
    k1: f64,
    b: f64,
}

const BM25_K1: f64 = 1.5;
const BM25_B: f64 = 0.75;
const BM25_EPSILON: f64 = 0.25;

impl Bm25Index {
    /// Build the index from the tokenized corpus, one token list per chunk
    /// in corpus order.
    pub fn fit(corpus: &[Vec<String>]) -> Self {
        let n_docs = corpus.len();
        let mut doc_freqs: Vec<HashMap<String, usize>> = Vec::with_capacity(n_docs);
        let mut doc_len: Vec<usize> = Vec::with_capacity(n_docs);
        let mut nd: HashMap<String, usize> = HashMap::new();

        for tokens in corpus {
            doc_len.push(tokens.len());
            let mut freqs: HashMap<String, usize> = HashMap::new();
            for t in tokens {
                *freqs.entry(t.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *nd.entry(term.clone()).or_insert(0) += 1;
            }
            doc_freqs.push(freqs);
        }

        let avgdl = if n_docs > 0 {
            doc_len.iter().sum::<usize>() as f64 / n_docs as f64
        } else {
            0.0
        };

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(nd.len());
        let mut idf_sum = 0.0;
        let mut negative: Vec<String> = Vec::new();
        for (term, df) in &nd {
            let val = ((n_docs as f64 - *df as f64 + 0.5) / (*df as f64 + 0.5)).ln();
            idf_sum += val;
            if val < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term.clone(), val);
        }
        if !idf.is_empty() {
            let average_idf = idf_sum / idf.len() as f64;
            let eps = BM25_EPSILON * average_idf;
            for term in negative {
                idf.insert(term, eps);
            }
        }

        Self {
            doc_freqs,
            idf,
            doc_len,
            avgdl,
            k1: BM25_K1,
            b: BM25_B,
        }
    }

    /// Number of chunks in the indexed corpus.
    pub fn len(&self) -> usize {
        self.doc_freqs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_freqs.is_empty()
    }

    /// Raw BM25 score of the tokenized query against every chunk, in corpus
    /// order. Empty corpus yields an empty vector.
    pub fn get_scores(&self, query: &[String]) -> Vec<f64> {
        let mut scores = vec![0.0; self.doc_freqs.len()];
        if self.avgdl == 0.0 {
            return scores;
        }
        for term in query {
            let Some(idf) = self.idf.get(term) else {
                continue;
            };
            for (i, freqs) in self.doc_freqs.iter().enumerate() {
                let tf = *freqs.get(term).unwrap_or(&0) as f64;
                if tf == 0.0 {
                    continue;
                }
                let norm = self.k1 * (1.0 - self.b + self.b * self.doc_len[i] as f64 / self.avgdl);
                scores[i] += idf * (tf * (self.k1 + 1.0)) / (tf + norm);
            }
        }
        scores
    }
}
