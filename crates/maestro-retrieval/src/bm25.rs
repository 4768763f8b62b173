//! In-memory Okapi BM25 index.
//!
//! Lexical counterpart to the vector store for hybrid retrieval. The
//! corpus lives behind one lock; rebuilds construct the new corpus
//! completely, then swap it in under the lock.

use std::collections::HashMap;
use std::sync::OnceLock;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::filter::PayloadFilter;

const K1: f64 = 1.5;
const B: f64 = 0.75;

/// Maximal runs of alphanumerics and Hangul, lowercased. No stemming
/// or morphological analysis.
pub fn tokenize(text: &str) -> Vec<String> {
    static TOKEN_RE: OnceLock<regex::Regex> = OnceLock::new();
    let re = TOKEN_RE.get_or_init(|| regex::Regex::new(r"[A-Za-z0-9가-힣]+").unwrap());
    re.find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Documents
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct Bm25Document {
    pub id: String,
    pub text: String,
    pub payload: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub id: String,
    pub bm25_score: f64,
    pub payload: Map<String, Value>,
}

struct IndexedDoc {
    id: String,
    payload: Map<String, Value>,
    token_count: usize,
    tf: HashMap<String, u32>,
}

#[derive(Default)]
struct Corpus {
    docs: Vec<IndexedDoc>,
    df: HashMap<String, u32>,
    avgdl: f64,
}

impl Corpus {
    fn add(&mut self, doc: Bm25Document) {
        let tokens = tokenize(&doc.text);
        let mut tf: HashMap<String, u32> = HashMap::new();
        for t in &tokens {
            *tf.entry(t.clone()).or_insert(0) += 1;
        }
        // Document frequency counts each term once per document.
        for term in tf.keys() {
            *self.df.entry(term.clone()).or_insert(0) += 1;
        }
        self.docs.push(IndexedDoc {
            id: doc.id,
            payload: doc.payload,
            token_count: tokens.len(),
            tf,
        });
    }

    fn recompute_stats(&mut self) {
        if self.docs.is_empty() {
            self.avgdl = 0.0;
            return;
        }
        let total: usize = self.docs.iter().map(|d| d.token_count).sum();
        self.avgdl = total as f64 / self.docs.len() as f64;
    }

    /// Okapi idf: `ln(1 + (N - df + 0.5)/(df + 0.5))`. Non-negative for
    /// every term of any non-empty corpus.
    fn idf(&self, term: &str) -> f64 {
        let n = self.docs.len() as f64;
        let df = *self.df.get(term).unwrap_or(&0) as f64;
        (1.0 + (n - df + 0.5) / (df + 0.5)).ln()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Index
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Bm25Index {
    corpus: RwLock<Corpus>,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new()
    }
}

impl Bm25Index {
    pub fn new() -> Self {
        Self {
            corpus: RwLock::new(Corpus::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.corpus.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.read().docs.is_empty()
    }

    pub fn clear(&self) {
        *self.corpus.write() = Corpus::default();
    }

    /// Replace the corpus wholesale. The new corpus is built outside
    /// the lock and swapped in atomically.
    pub fn build(&self, docs: impl IntoIterator<Item = Bm25Document>) {
        let mut corpus = Corpus::default();
        for doc in docs {
            corpus.add(doc);
        }
        corpus.recompute_stats();
        *self.corpus.write() = corpus;
    }

    /// Append documents without deduplication. Callers that re-index a
    /// source recreate instead to avoid duplicates.
    pub fn upsert_many(&self, docs: impl IntoIterator<Item = Bm25Document>) {
        let mut corpus = self.corpus.write();
        for doc in docs {
            corpus.add(doc);
        }
        corpus.recompute_stats();
    }

    /// Score the corpus against the query, keep the global top-`k`, and
    /// apply payload filters to that candidate slice.
    pub fn search(&self, query: &str, k: usize, filters: Option<&PayloadFilter>) -> Vec<Bm25Hit> {
        let corpus = self.corpus.read();
        if corpus.docs.is_empty() {
            return Vec::new();
        }

        let mut terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }
        // Dedup query terms so repeats do not over-weight.
        let mut seen = std::collections::HashSet::new();
        terms.retain(|t| seen.insert(t.clone()));

        let avgdl = if corpus.avgdl > 0.0 { corpus.avgdl } else { 1.0 };
        let mut scored: Vec<(usize, f64)> = Vec::new();

        for (i, doc) in corpus.docs.iter().enumerate() {
            let dl = doc.token_count.max(1) as f64;
            let mut score = 0.0;
            for term in &terms {
                let f = *doc.tf.get(term).unwrap_or(&0) as f64;
                if f <= 0.0 {
                    continue;
                }
                let denom = f + K1 * (1.0 - B + B * dl / avgdl);
                score += corpus.idf(term) * (f * (K1 + 1.0)) / denom.max(f64::MIN_POSITIVE);
            }
            if score > 0.0 {
                scored.push((i, score));
            }
        }

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        let mut out = Vec::new();
        for (i, score) in scored {
            let doc = &corpus.docs[i];
            if let Some(f) = filters {
                if !f.matches(&doc.payload) {
                    continue;
                }
            }
            out.push(Bm25Hit {
                id: doc.id.clone(),
                bm25_score: score,
                payload: doc.payload.clone(),
            });
            if out.len() >= k {
                break;
            }
        }
        out
    }
}
