//! Markdown-aware chunking.
//!
//! Markdown is split into text and fenced-code blocks. Header lines
//! maintain a section path; paragraphs accumulate until adding another
//! would exceed `chunk_size` characters. Code blocks stay whole when
//! they fit and are hard-split when they don't. A character-level
//! overlap is applied across consecutive chunks afterwards.
//!
//! All sizes and slices are measured in characters, not bytes, so
//! multi-byte text never splits mid-codepoint.

use serde_json::{Map, Value};
use std::sync::OnceLock;
use uuid::Uuid;

/// One chunk ready for upsert: a deterministic id plus its payload
/// fields. Re-chunking identical content yields identical ids.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source: String,
    pub meta: Map<String, Value>,
}

impl Chunk {
    /// Stable id derived from `docset|source|heading_path|index`, so
    /// re-indexing the same content upserts in place instead of
    /// duplicating points.
    pub fn stable_id(docset: &str, source: &str, heading_path: &str, index: usize) -> String {
        let name = format!("{docset}|{source}|{heading_path}|{index}");
        Uuid::new_v5(&Uuid::NAMESPACE_URL, name.as_bytes()).to_string()
    }
}

/// A chunk of text plus the heading path it was cut from. The indexer
/// attaches ids and payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Piece {
    pub text: String,
    pub heading_path: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Block splitting
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq)]
enum BlockKind {
    Text,
    Code,
}

/// Split markdown into alternating text and fenced-code blocks. The
/// fence lines themselves stay inside the code block.
fn split_blocks(text: &str) -> Vec<(BlockKind, String)> {
    let mut out = Vec::new();
    let mut buf: Vec<&str> = Vec::new();
    let mut in_code = false;

    fn flush(kind: BlockKind, buf: &mut Vec<&str>, out: &mut Vec<(BlockKind, String)>) {
        if buf.is_empty() {
            return;
        }
        let joined = buf.join("\n");
        let trimmed = joined.trim_matches('\n').to_string();
        out.push((kind, trimmed));
        buf.clear();
    }

    for line in text.lines() {
        if line.trim_start().starts_with("```") {
            if in_code {
                buf.push(line);
                flush(BlockKind::Code, &mut buf, &mut out);
                in_code = false;
            } else {
                flush(BlockKind::Text, &mut buf, &mut out);
                in_code = true;
                buf.push(line);
            }
            continue;
        }
        buf.push(line);
    }
    flush(
        if in_code { BlockKind::Code } else { BlockKind::Text },
        &mut buf,
        &mut out,
    );
    out
}

/// Paragraphs separated by blank lines, trimmed, empties dropped.
fn paragraphs(text: &str) -> Vec<String> {
    static PARA_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = PARA_RE.get_or_init(|| regex::Regex::new(r"\n\s*\n").unwrap());
    re.split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// The last `n` characters of `s` (whole string when shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    let len = char_len(s);
    if len <= n {
        return s;
    }
    let (idx, _) = s.char_indices().nth(len - n).unwrap_or((0, ' '));
    &s[idx..]
}

/// Split `s` into pieces of at most `n` characters.
fn hard_split(s: &str, n: usize) -> Vec<String> {
    let chars: Vec<char> = s.chars().collect();
    chars.chunks(n.max(1)).map(|c| c.iter().collect()).collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Markdown chunking
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct HeadingStack {
    stack: Vec<(usize, String)>,
}

impl HeadingStack {
    fn new() -> Self {
        Self { stack: Vec::new() }
    }

    fn set(&mut self, level: usize, title: &str) {
        while self
            .stack
            .last()
            .map(|(l, _)| *l >= level)
            .unwrap_or(false)
        {
            self.stack.pop();
        }
        self.stack.push((level, title.trim().to_string()));
    }

    fn path(&self) -> String {
        self.stack
            .iter()
            .filter(|(_, t)| !t.is_empty())
            .map(|(_, t)| t.as_str())
            .collect::<Vec<_>>()
            .join(" > ")
    }
}

fn heading_of(line: &str) -> Option<(usize, &str)> {
    static HEADING_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = HEADING_RE.get_or_init(|| regex::Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
    let caps = re.captures(line.trim())?;
    let level = caps.get(1)?.as_str().len();
    Some((level, caps.get(2)?.as_str()))
}

struct Accumulator {
    chunk_size: usize,
    buf: String,
    section: String,
    pieces: Vec<Piece>,
}

impl Accumulator {
    fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            buf: String::new(),
            section: String::new(),
            pieces: Vec::new(),
        }
    }

    fn emit(&mut self, text: &str) {
        let t = text.trim();
        if t.is_empty() {
            return;
        }
        self.pieces.push(Piece {
            text: t.to_string(),
            heading_path: self.section.clone(),
        });
    }

    fn flush(&mut self) {
        if !self.buf.trim().is_empty() {
            let buf = std::mem::take(&mut self.buf);
            self.emit(&buf);
        } else {
            self.buf.clear();
        }
    }

    /// Accumulate one paragraph, emitting the buffer first when the
    /// paragraph would overflow it.
    fn push_paragraph(&mut self, p: &str) {
        if self.buf.is_empty() {
            self.buf = p.to_string();
        } else if char_len(&self.buf) + 2 + char_len(p) <= self.chunk_size {
            self.buf.push_str("\n\n");
            self.buf.push_str(p);
        } else {
            self.flush();
            self.buf = p.to_string();
        }
    }
}

/// Chunk markdown, returning pieces annotated with their heading path.
pub fn chunk_markdown(text: &str, chunk_size: usize, overlap: usize) -> Vec<Piece> {
    let mut headings = HeadingStack::new();
    let mut acc = Accumulator::new(chunk_size);

    for (kind, block) in split_blocks(text) {
        if kind == BlockKind::Code {
            let code = block.trim_matches('\n');
            if code.trim().is_empty() {
                continue;
            }
            if char_len(code) > chunk_size {
                // Oversized code block: flush and hard-split.
                acc.flush();
                for part in hard_split(code, chunk_size) {
                    acc.emit(&part);
                }
            } else {
                if !acc.buf.is_empty()
                    && char_len(&acc.buf) + 2 + char_len(code) > chunk_size
                {
                    acc.flush();
                }
                if acc.buf.is_empty() {
                    acc.buf = code.to_string();
                } else {
                    acc.buf.push_str("\n\n");
                    acc.buf.push_str(code);
                }
            }
            continue;
        }

        // Text block: headers change the section, everything else
        // accumulates paragraph by paragraph.
        let mut pending: Vec<&str> = Vec::new();
        for line in block.lines() {
            if let Some((level, title)) = heading_of(line) {
                if !pending.is_empty() {
                    for p in paragraphs(&pending.join("\n")) {
                        acc.push_paragraph(&p);
                    }
                    pending.clear();
                }
                // Section boundary: emit what we have under the old path.
                acc.flush();
                headings.set(level, title);
                acc.section = headings.path();
                continue;
            }
            pending.push(line);
        }
        if !pending.is_empty() {
            for p in paragraphs(&pending.join("\n")) {
                acc.push_paragraph(&p);
            }
        }
    }
    acc.flush();

    apply_overlap(acc.pieces, overlap)
}

/// Chunk non-markdown text: paragraph accumulation only.
pub fn chunk_text_fallback(text: &str, chunk_size: usize, overlap: usize) -> Vec<Piece> {
    let mut acc = Accumulator::new(chunk_size);
    for p in paragraphs(text) {
        acc.push_paragraph(&p);
    }
    acc.flush();
    apply_overlap(acc.pieces, overlap)
}

/// Prefix chunk `i > 0` with the last `overlap` characters of the
/// previous chunk's original text.
fn apply_overlap(pieces: Vec<Piece>, overlap: usize) -> Vec<Piece> {
    if overlap == 0 || pieces.len() <= 1 {
        return pieces;
    }
    let mut out = Vec::with_capacity(pieces.len());
    let mut prev_tail = String::new();
    for piece in pieces {
        let original = piece.text.clone();
        if prev_tail.is_empty() {
            out.push(piece);
        } else {
            out.push(Piece {
                text: format!("{prev_tail}{}", piece.text),
                heading_path: piece.heading_path,
            });
        }
        prev_tail = tail_chars(&original, overlap).to_string();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
# 가이드

첫 번째 문단입니다.

두 번째 문단입니다.

## 설치

설치 방법을 설명합니다.

```bash
cargo build --release
```

설치 후 확인하세요.
";

    #[test]
    fn heading_path_tracks_sections() {
        let pieces = chunk_markdown(DOC, 900, 0);
        assert!(!pieces.is_empty());
        assert!(pieces.iter().any(|p| p.heading_path == "가이드"));
        assert!(pieces.iter().any(|p| p.heading_path == "가이드 > 설치"));
    }

    #[test]
    fn sibling_heading_replaces_deeper_levels() {
        let doc = "# A\n\ntext a\n\n## B\n\ntext b\n\n## C\n\ntext c\n";
        let pieces = chunk_markdown(doc, 900, 0);
        let paths: Vec<&str> = pieces.iter().map(|p| p.heading_path.as_str()).collect();
        assert!(paths.contains(&"A > B"));
        assert!(paths.contains(&"A > C"));
        assert!(!paths.iter().any(|p| p.contains("B > C")));
    }

    #[test]
    fn small_code_block_stays_whole() {
        let pieces = chunk_markdown(DOC, 900, 0);
        let with_code: Vec<_> = pieces
            .iter()
            .filter(|p| p.text.contains("```bash"))
            .collect();
        assert_eq!(with_code.len(), 1);
        assert!(with_code[0].text.contains("cargo build --release"));
    }

    #[test]
    fn oversized_code_block_is_hard_split() {
        let long_code = format!("```\n{}\n```", "x".repeat(500));
        let doc = format!("# T\n\n{long_code}\n");
        let pieces = chunk_markdown(&doc, 100, 0);
        assert!(pieces.len() > 1);
        assert!(pieces.iter().all(|p| char_len(&p.text) <= 100));
    }

    #[test]
    fn paragraph_accumulation_respects_chunk_size() {
        let doc = "p1 aaaa\n\np2 bbbb\n\np3 cccc\n\np4 dddd";
        let pieces = chunk_text_fallback(doc, 18, 0);
        assert!(pieces.len() >= 2);
        for p in &pieces {
            assert!(char_len(&p.text) <= 18);
        }
    }

    #[test]
    fn overlap_prefixes_previous_tail() {
        let doc = "aaaaaa\n\nbbbbbb\n\ncccccc";
        let pieces = chunk_text_fallback(doc, 6, 3);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].text, "aaaaaa");
        assert_eq!(pieces[1].text, "aaabbbbbb");
        // Overlap comes from the original chunk text, not the prefixed one.
        assert_eq!(pieces[2].text, "bbbcccccc");
    }

    #[test]
    fn overlap_is_char_based_for_multibyte_text() {
        let doc = "가나다라마바\n\n사아자차카타";
        let pieces = chunk_text_fallback(doc, 6, 2);
        assert_eq!(pieces.len(), 2);
        assert_eq!(pieces[1].text, "마바사아자차카타");
    }

    #[test]
    fn chunking_is_deterministic() {
        let a = chunk_markdown(DOC, 120, 30);
        let b = chunk_markdown(DOC, 120, 30);
        assert_eq!(a, b);
    }

    #[test]
    fn stable_ids_are_reproducible_and_distinct() {
        let a = Chunk::stable_id("docs", "guide.md", "가이드", 0);
        let b = Chunk::stable_id("docs", "guide.md", "가이드", 0);
        let c = Chunk::stable_id("docs", "guide.md", "가이드", 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn fallback_has_empty_heading_path() {
        let pieces = chunk_text_fallback("하나\n\n둘", 900, 0);
        assert!(pieces.iter().all(|p| p.heading_path.is_empty()));
    }
}
