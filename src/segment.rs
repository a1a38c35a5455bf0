//! Structure-preserving text segmenter.
//!
//! Splits a [`Document`]'s content into bounded-size [`Chunk`]s on paragraph
//! boundaries. Section-header paragraphs (bold-wrapped lines, or short
//! title-cased lines ending in a colon) set the current section label without
//! being emitted. List-item paragraphs are flushed immediately as their own
//! chunks so numbered/bulleted runs keep their identity. Ordinary paragraphs
//! accumulate until the size bound, then flush.
//!
//! Oversize flushed text splits by a three-level cascade: paragraph
//! boundaries, then sentence boundaries, then a hard fixed-width cut.
//!
//! Chunk ids are a pure function of `(doc_id, section, first 64 chars of
//! text)`, so re-segmenting identical content always yields identical ids.
//!
//! All length checks count Unicode scalars, never bytes — a hard cut can
//! never split a code point.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::models::{Chunk, Document};

static PARAGRAPH_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());
static SECTION_HEADER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\*\*[^*]+\*\*|[A-Z][A-Za-z ]+:)\s*$").unwrap());
static LIST_ITEM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(\d+\.|[-*]|step\s*\d+\s*:)\s+").unwrap());
static BLANK_RUN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\n+").unwrap());

/// Split a document into ordered chunks of at most `max_chars` characters
/// (except for a single token/sentence that itself exceeds the bound).
pub fn segment(doc: &Document, max_chars: usize) -> Vec<Chunk> {
    let mut chunks: Vec<Chunk> = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut section: Option<String> = None;

    for para in paragraphs(&doc.content) {
        if SECTION_HEADER_RE.is_match(para) {
            // New section header: flush, relabel, don't emit
            flush_buf(doc, &mut chunks, &mut buf, &section, max_chars);
            section = Some(clean_section_title(para));
            continue;
        }

        if LIST_ITEM_RE.is_match(para) {
            // List items are flushed individually so their identity survives.
            // Adjacent items become adjacent chunks sharing one section label;
            // there is no lookahead merging.
            flush_buf(doc, &mut chunks, &mut buf, &section, max_chars);
            chunks.push(make_chunk(doc, para, section.clone()));
            continue;
        }

        let buf_len: usize = buf.iter().map(|p| char_len(p)).sum();
        if buf_len + char_len(para) + 2 <= max_chars {
            buf.push(para);
        } else {
            flush_buf(doc, &mut chunks, &mut buf, &section, max_chars);
            buf.push(para);
        }
    }
    flush_buf(doc, &mut chunks, &mut buf, &section, max_chars);

    // Positional labels for anything still unlabeled, so citations are
    // never label-less.
    for (i, c) in chunks.iter_mut().enumerate() {
        if c.section.is_none() {
            c.section = Some(format!("part {}", i + 1));
        }
    }
    chunks
}

fn paragraphs(text: &str) -> Vec<&str> {
    PARAGRAPH_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect()
}

fn flush_buf(
    doc: &Document,
    chunks: &mut Vec<Chunk>,
    buf: &mut Vec<&str>,
    section: &Option<String>,
    max_chars: usize,
) {
    if buf.is_empty() {
        return;
    }
    let text = buf.join("\n\n");
    let text = text.trim();
    buf.clear();

    if char_len(text) <= max_chars {
        chunks.push(make_chunk(doc, text, section.clone()));
        return;
    }
    for (i, piece) in split_long(text, max_chars).iter().enumerate() {
        let label = if i == 0 {
            section.clone()
        } else {
            Some(format!(
                "{} (cont. {})",
                section.as_deref().unwrap_or("section"),
                i + 1
            ))
        };
        chunks.push(make_chunk(doc, piece, label));
    }
}

/// Oversize split cascade: paragraph boundaries first, then sentence
/// boundaries, then a hard fixed-width cut as last resort.
fn split_long(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces: Vec<String> = Vec::new();
    let mut cur: Vec<&str> = Vec::new();
    let mut cur_len = 0usize;

    let parts: Vec<&str> = BLANK_RUN_RE
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    for part in parts {
        let plen = char_len(part);
        if cur_len + plen + 2 <= max_chars {
            cur.push(part);
            cur_len += plen + 2;
        } else {
            if !cur.is_empty() {
                pieces.push(cur.join("\n\n"));
                cur.clear();
                cur_len = 0;
            }
            if plen <= max_chars {
                pieces.push(part.to_string());
            } else {
                split_sentences_into(part, max_chars, &mut pieces);
            }
        }
    }
    if !cur.is_empty() {
        pieces.push(cur.join("\n\n"));
    }
    pieces
}

fn split_sentences_into(part: &str, max_chars: usize, pieces: &mut Vec<String>) {
    let mut buf: Vec<String> = Vec::new();
    let mut buf_len = 0usize;
    for sentence in split_sentences(part) {
        let slen = char_len(&sentence);
        if buf_len + slen + 1 <= max_chars {
            buf.push(sentence);
            buf_len += slen + 1;
        } else {
            if !buf.is_empty() {
                pieces.push(buf.join(" "));
                buf.clear();
                buf_len = 0;
            }
            if slen <= max_chars {
                pieces.push(sentence);
            } else {
                // Hard cut at fixed char widths
                pieces.extend(hard_cut(&sentence, max_chars));
            }
        }
    }
    if !buf.is_empty() {
        pieces.push(buf.join(" "));
    }
}

/// Split on `.`/`!`/`?` followed by whitespace, keeping the punctuation
/// with the preceding sentence and collapsing the whitespace run.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut cur = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        cur.push(c);
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|n| n.is_whitespace()) {
            while chars.peek().is_some_and(|n| n.is_whitespace()) {
                chars.next();
            }
            sentences.push(std::mem::take(&mut cur));
        }
    }
    if !cur.is_empty() {
        sentences.push(cur);
    }
    sentences
}

fn hard_cut(s: &str, max_chars: usize) -> Vec<String> {
    s.chars()
        .collect::<Vec<char>>()
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

fn clean_section_title(p: &str) -> String {
    let mut p = p.trim();
    if p.starts_with("**") && p.ends_with("**") {
        p = p.trim_matches('*');
    }
    p.trim_end_matches([':', ' ']).to_string()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn make_chunk(doc: &Document, text: &str, section: Option<String>) -> Chunk {
    let text = text.trim();
    let head: String = text.chars().take(64).collect();
    let mut hasher = Sha256::new();
    hasher.update(doc.id.as_bytes());
    hasher.update(b"\x1f");
    hasher.update(section.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\x1f");
    hasher.update(head.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    Chunk {
        chunk_id: format!("{}:::{}", doc.id, &digest[..16]),
        doc_id: doc.id.clone(),
        title: doc.title.clone(),
        source: doc.source,
        doc_type: doc.doc_type.clone(),
        version: doc.version.clone(),
        last_updated: doc.last_updated,
        tags: doc.tags.clone(),
        text: text.to_string(),
        section,
        extra: doc.extra.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use std::collections::BTreeMap;

    fn doc(content: &str) -> Document {
        Document {
            id: "doc_001".to_string(),
            title: "Test Doc".to_string(),
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
    fn test_single_paragraph_single_chunk() {
        let chunks = segment(&doc("Just one small paragraph."), 1200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "Just one small paragraph.");
        assert_eq!(chunks[0].section.as_deref(), Some("part 1"));
    }

    #[test]
    fn test_empty_document_yields_no_chunks() {
        assert!(segment(&doc(""), 1200).is_empty());
        assert!(segment(&doc("\n\n  \n\n"), 1200).is_empty());
    }

    #[test]
    fn test_section_header_labels_following_chunks() {
        let content = "**Installation**\n\nRun the installer.\n\nTroubleshooting Tips:\n\nCheck the logs.";
        let chunks = segment(&doc(content), 1200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].section.as_deref(), Some("Installation"));
        assert_eq!(chunks[0].text, "Run the installer.");
        assert_eq!(chunks[1].section.as_deref(), Some("Troubleshooting Tips"));
        assert_eq!(chunks[1].text, "Check the logs.");
    }

    #[test]
    fn test_header_is_not_emitted_as_chunk() {
        let chunks = segment(&doc("**Setup**\n\nDo the thing."), 1200);
        assert!(chunks.iter().all(|c| !c.text.contains("**")));
    }

    #[test]
    fn test_numbered_list_preserved_in_order() {
        let content = "Steps:\n\n1. A\n\n2. B\n\n3. C";
        let chunks = segment(&doc(content), 1200);
        let joined: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, vec!["1. A", "2. B", "3. C"]);
        // Adjacent items share one section label, as separate chunks
        for c in &chunks {
            assert_eq!(c.section.as_deref(), Some("Steps"));
        }
    }

    #[test]
    fn test_list_item_flushes_running_buffer() {
        let content = "Intro paragraph.\n\n- first bullet\n\nOutro paragraph.";
        let chunks = segment(&doc(content), 1200);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Intro paragraph.");
        assert_eq!(chunks[1].text, "- first bullet");
        assert_eq!(chunks[2].text, "Outro paragraph.");
    }

    #[test]
    fn test_step_prefix_is_a_list_item() {
        let content = "Step 1: open settings\n\nStep 2: toggle sync";
        let chunks = segment(&doc(content), 1200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "Step 1: open settings");
    }

    #[test]
    fn test_paragraph_accumulation_respects_bound() {
        let content = "aaaa aaaa.\n\nbbbb bbbb.\n\ncccc cccc.";
        let chunks = segment(&doc(content), 25);
        // Each paragraph is 10 chars; 10+10+2 <= 25 packs two, third flushes
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "aaaa aaaa.\n\nbbbb bbbb.");
        assert_eq!(chunks[1].text, "cccc cccc.");
    }

    #[test]
    fn test_oversize_paragraph_split_on_sentences() {
        let long = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = segment(&doc(long), 30);
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.chars().count() <= 30, "chunk too long: {:?}", c.text);
        }
        let rejoined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert!(rejoined.contains("First sentence here."));
        assert!(rejoined.contains("Third sentence here."));
    }

    #[test]
    fn test_hard_cut_for_unsplittable_run() {
        let long = "x".repeat(100);
        let chunks = segment(&doc(&long), 30);
        assert_eq!(chunks.len(), 4);
        for c in &chunks[..3] {
            assert_eq!(c.text.chars().count(), 30);
        }
        assert_eq!(chunks[3].text.chars().count(), 10);
    }

    #[test]
    fn test_hard_cut_never_splits_code_point() {
        let long = "é".repeat(50);
        let chunks = segment(&doc(&long), 20);
        for c in &chunks {
            assert!(c.text.chars().count() <= 20);
            // Would panic on invalid boundaries when byte-sliced; also check
            // nothing was replaced or lost.
            assert!(c.text.chars().all(|ch| ch == 'é'));
        }
    }

    #[test]
    fn test_continuation_labels() {
        let content = format!(
            "**Details**\n\n{} {} {}",
            "A long opening sentence that is fairly verbose overall.",
            "A second long sentence that also runs on for quite a while.",
            "A third long sentence to push the text past the boundary."
        );
        let chunks = segment(&doc(&content), 60);
        assert!(chunks.len() >= 2);
        assert_eq!(chunks[0].section.as_deref(), Some("Details"));
        assert_eq!(chunks[1].section.as_deref(), Some("Details (cont. 2)"));
    }

    #[test]
    fn test_deterministic_ids_across_runs() {
        let content = "**Setup**\n\n1. A\n\n2. B\n\nSome closing prose.";
        let a = segment(&doc(content), 1200);
        let b = segment(&doc(content), 1200);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.chunk_id, y.chunk_id);
            assert_eq!(x.text, y.text);
            assert_eq!(x.section, y.section);
        }
    }

    #[test]
    fn test_ids_carry_doc_id_prefix() {
        let chunks = segment(&doc("Hello there."), 1200);
        assert!(chunks[0].chunk_id.starts_with("doc_001:::"));
    }

    #[test]
    fn test_different_sections_different_ids() {
        let a = segment(&doc("**One**\n\nSame text."), 1200);
        let b = segment(&doc("**Two**\n\nSame text."), 1200);
        assert_ne!(a[0].chunk_id, b[0].chunk_id);
    }
}
