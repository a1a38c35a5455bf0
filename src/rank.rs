//! Hybrid ranking: merges semantic and lexical candidates, applies heuristic
//! boosts, and produces the top-k results for a query.
//!
//! Candidates come from two channels over one [`CorpusIndex`] snapshot:
//! the semantic backend (queried twice when the query names a version —
//! once version-filtered, once unfiltered) and raw BM25 over the full
//! corpus. The union is scored with a weighted combination plus source,
//! intent, doc-type, recency, and version multipliers.
//!
//! A failed semantic call contributes an empty candidate list; the query
//! still completes on the lexical signal alone.

use crate::classify::{classify, QueryType, SourcePreference};
use crate::index::CorpusIndex;
use crate::lexical::{keyword_overlap_score, tokenize};
use crate::models::{extract_version, Chunk, RetrievalResult, Source};

/// Source/status multipliers: official docs beat resolved tickets beat
/// pending tickets.
const BOOST_DOC: f64 = 1.10;
const BOOST_TICKET_RESOLVED: f64 = 1.05;
const BOOST_TICKET_PENDING: f64 = 0.90;
/// Extra multiplier when the intent's source preference matches the chunk.
const BOOST_PREFERRED_SOURCE: f64 = 1.08;

/// Candidate pool size per channel.
fn candidate_pool(top_k: usize) -> usize {
    (4 * top_k).max(32)
}

/// Rank the corpus against `query` and return at most `top_k` results,
/// descending by score. Deterministic for a fixed snapshot and query;
/// ties keep candidate encounter order (semantic first, then BM25).
pub async fn rank(index: &CorpusIndex, query: &str, top_k: usize) -> Vec<RetrievalResult> {
    let query_version = extract_version(query);
    let qtype = classify(query);

    let semantic = semantic_candidates(index, query, top_k).await;
    let lexical = lexical_candidates(index, query, top_k);

    // Union of candidate ids in first-seen order
    let mut candidate_ids: Vec<&str> = Vec::new();
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();
    for (cid, _) in &semantic {
        if seen.insert(cid.as_str()) {
            candidate_ids.push(cid);
        }
    }
    for (cid, _) in &lexical {
        if seen.insert(cid.as_str()) {
            candidate_ids.push(cid);
        }
    }

    let sem_map: std::collections::HashMap<&str, f64> = semantic
        .iter()
        .map(|(cid, s)| (cid.as_str(), *s))
        .collect();
    let kw_map: std::collections::HashMap<&str, f64> = lexical
        .iter()
        .map(|(cid, s)| (cid.as_str(), *s))
        .collect();

    let mut results: Vec<RetrievalResult> = Vec::with_capacity(candidate_ids.len());
    for cid in candidate_ids {
        // An id absent from the chunk table cannot happen in a consistent
        // snapshot; skip rather than fail.
        let Some(chunk) = index.chunk_by_id(cid) else {
            continue;
        };
        let sem = sem_map.get(cid).copied().unwrap_or(0.0);
        let kw = kw_map.get(cid).copied().unwrap_or(0.0);
        let score = combined_score(chunk, sem, kw, query, qtype, query_version.as_deref());
        results.push(RetrievalResult {
            chunk: chunk.clone(),
            score,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_k);
    results
}

/// Semantic candidates as `(chunk_id, similarity)`, descending, merged from
/// the version-filtered and unfiltered provider calls keeping the max
/// similarity per id, truncated to the candidate pool size.
pub async fn semantic_candidates(
    index: &CorpusIndex,
    query: &str,
    top_k: usize,
) -> Vec<(String, f64)> {
    let n_big = candidate_pool(top_k);
    let query_version = extract_version(query);

    let mut merged: Vec<(String, f64)> = Vec::new();
    let mut pos: std::collections::HashMap<String, usize> = std::collections::HashMap::new();

    let mut absorb = |hits: Vec<crate::semantic::SemanticHit>| {
        for hit in hits {
            let similarity = 1.0 - hit.distance;
            match pos.get(&hit.chunk_id) {
                Some(&i) => {
                    if similarity > merged[i].1 {
                        merged[i].1 = similarity;
                    }
                }
                None => {
                    pos.insert(hit.chunk_id.clone(), merged.len());
                    merged.push((hit.chunk_id, similarity));
                }
            }
        }
    };

    if let Some(version) = &query_version {
        match index.semantic().query(query, n_big, Some(version)).await {
            Ok(hits) => absorb(hits),
            Err(e) => eprintln!("semantic query (version-filtered) failed: {:#}", e),
        }
    }
    match index.semantic().query(query, n_big, None).await {
        Ok(hits) => absorb(hits),
        Err(e) => eprintln!("semantic query failed: {:#}", e),
    }

    merged.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(n_big);
    merged
}

/// Lexical candidates as `(chunk_id, raw BM25 score)`: the top pool-size
/// chunks by raw score, ties keeping corpus order.
pub fn lexical_candidates(index: &CorpusIndex, query: &str, top_k: usize) -> Vec<(String, f64)> {
    let scores = index.bm25().get_scores(&tokenize(query));
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| {
        scores[*b]
            .partial_cmp(&scores[*a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    order.truncate(candidate_pool(top_k));
    order
        .into_iter()
        .map(|i| (index.chunks()[i].chunk_id.clone(), scores[i]))
        .collect()
}

/// Combine the raw signals for one candidate into its final score.
pub(crate) fn combined_score(
    c: &Chunk,
    sem: f64,
    kw: f64,
    query: &str,
    qtype: QueryType,
    query_version: Option<&str>,
) -> f64 {
    // Scale alignment for BM25, which can be large
    let kw_norm = if kw > 0.0 { kw / (kw + 10.0) } else { 0.0 };
    let mut score = 0.65 * sem + 0.25 * kw_norm;

    // Lightweight phrase/synonym overlap
    score += 0.10 * keyword_overlap_score(query, &c.text).min(1.0);

    // Source/status boost, plus the intent's source preference
    let profile = qtype.profile();
    let mut mult = match c.source {
        Source::Doc => BOOST_DOC,
        Source::Ticket => {
            if c.status() == "resolved" {
                BOOST_TICKET_RESOLVED
            } else {
                BOOST_TICKET_PENDING
            }
        }
    };
    let preferred = match (profile.prefers, c.source) {
        (SourcePreference::Docs, Source::Doc) => true,
        (SourcePreference::Tickets, Source::Ticket) => true,
        _ => false,
    };
    if preferred {
        mult *= BOOST_PREFERRED_SOURCE;
    }
    score *= mult;

    // Domain-type affinity from the intent profile, applied at most once
    // even when the free-text doc-type contains several needles
    let doc_type = c.doc_type.to_lowercase();
    if profile
        .doc_type_affinity
        .iter()
        .any(|needle| doc_type.contains(needle))
    {
        score *= profile.affinity_boost;
    }

    // Recency: linear decay to zero bonus at one year; undated chunks get none
    score *= 1.0 + 0.10 * recency_factor(c.last_updated);

    // Version affinity: exact match rewarded, mismatch slightly penalized
    if let (Some(qv), Some(cv)) = (query_version, c.version.as_deref()) {
        score *= if qv == cv { 1.15 } else { 0.92 };
    }

    score
}

fn recency_factor(last_updated: Option<chrono::DateTime<chrono::Utc>>) -> f64 {
    let Some(dt) = last_updated else {
        return 0.0;
    };
    let days = (chrono::Utc::now() - dt).num_days().clamp(0, 365) as f64;
    1.0 - days / 365.0
}
