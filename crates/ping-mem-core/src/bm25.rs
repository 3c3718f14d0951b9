//! In-memory BM25 sparse keyword index (C4).
//!
//! Maintains tokenized postings per document plus the global statistics
//! (document count, average length, per-term document frequency) that
//! the BM25 formula needs. `add`/`remove` keep `df` and `avg_len`
//! consistent: re-adding the same `memory_id` first removes its previous
//! postings, so repeated `add` calls are idempotent, and `add` followed
//! by `remove` returns the index to its exact pre-add state.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::property::Properties;

const DEFAULT_K1: f64 = 1.5;
const DEFAULT_B: f64 = 0.75;

/// A scored keyword hit.
#[derive(Debug, Clone)]
pub struct Bm25Hit {
    pub memory_id: String,
    pub session_id: String,
    pub content: String,
    pub metadata: Properties,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct Bm25Stats {
    pub docs: usize,
    pub terms: usize,
    pub avg_len: f64,
}

struct DocEntry {
    session_id: String,
    content: String,
    metadata: Properties,
    #[allow(dead_code)]
    indexed_at: DateTime<Utc>,
    term_counts: HashMap<String, usize>,
    length: usize,
}

struct Inner {
    docs: HashMap<String, DocEntry>,
    doc_freq: HashMap<String, usize>,
    total_len: u64,
}

/// Tokenize: lowercase, replace non-word characters with whitespace,
/// split, drop tokens of length <= 1.
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut cleaned = String::with_capacity(lowered.len());
    for c in lowered.chars() {
        if c.is_alphanumeric() || c == '_' || c.is_whitespace() {
            cleaned.push(c);
        } else {
            cleaned.push(' ');
        }
    }
    cleaned
        .split_whitespace()
        .filter(|t| t.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// In-memory BM25 index.
pub struct Bm25Index {
    k1: f64,
    b: f64,
    inner: RwLock<Inner>,
}

impl Default for Bm25Index {
    fn default() -> Self {
        Self::new(DEFAULT_K1, DEFAULT_B)
    }
}

impl Bm25Index {
    pub fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            inner: RwLock::new(Inner {
                docs: HashMap::new(),
                doc_freq: HashMap::new(),
                total_len: 0,
            }),
        }
    }

    /// Add or replace a document. Idempotent in `memory_id`: re-adding the
    /// same id removes its previous postings first.
    pub fn add(
        &self,
        memory_id: &str,
        session_id: &str,
        content: &str,
        indexed_at: DateTime<Utc>,
        metadata: Option<Properties>,
    ) {
        let mut inner = self.inner.write().unwrap();
        Self::remove_locked(&mut inner, memory_id);

        let terms = tokenize(content);
        let mut term_counts: HashMap<String, usize> = HashMap::new();
        for t in &terms {
            *term_counts.entry(t.clone()).or_insert(0) += 1;
        }
        for term in term_counts.keys() {
            *inner.doc_freq.entry(term.clone()).or_insert(0) += 1;
        }
        let length = terms.len();
        inner.total_len += length as u64;
        inner.docs.insert(
            memory_id.to_string(),
            DocEntry {
                session_id: session_id.to_string(),
                content: content.to_string(),
                metadata: metadata.unwrap_or_default(),
                indexed_at,
                term_counts,
                length,
            },
        );
    }

    /// Remove a document. Returns whether it existed.
    pub fn remove(&self, memory_id: &str) -> bool {
        let mut inner = self.inner.write().unwrap();
        Self::remove_locked(&mut inner, memory_id)
    }

    fn remove_locked(inner: &mut Inner, memory_id: &str) -> bool {
        if let Some(entry) = inner.docs.remove(memory_id) {
            for term in entry.term_counts.keys() {
                if let Some(df) = inner.doc_freq.get_mut(term) {
                    *df -= 1;
                    if *df == 0 {
                        inner.doc_freq.remove(term);
                    }
                }
            }
            inner.total_len -= entry.length as u64;
            true
        } else {
            false
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().unwrap();
        inner.docs.clear();
        inner.doc_freq.clear();
        inner.total_len = 0;
    }

    /// Score and rank documents for `query`. Empty tokenized query
    /// returns `[]`. If `session_id` is given, only documents in that
    /// session are scored.
    pub fn search(&self, query: &str, limit: usize, session_id: Option<&str>) -> Vec<Bm25Hit> {
        let terms = tokenize(query);
        if terms.is_empty() {
            return Vec::new();
        }

        let inner = self.inner.read().unwrap();
        let n = inner.docs.len();
        if n == 0 {
            return Vec::new();
        }
        let avg_len = inner.total_len as f64 / n as f64;

        let idf: HashMap<&str, f64> = terms
            .iter()
            .map(|t| {
                let df = inner.doc_freq.get(t).copied().unwrap_or(0) as f64;
                let score = ((n as f64 - df + 0.5) / (df + 0.5) + 1.0).ln();
                (t.as_str(), score)
            })
            .collect();

        let mut hits: Vec<Bm25Hit> = inner
            .docs
            .iter()
            .filter(|(_, entry)| {
                session_id
                    .map(|sid| entry.session_id == sid)
                    .unwrap_or(true)
            })
            .filter_map(|(memory_id, entry)| {
                let mut score = 0.0f64;
                for t in &terms {
                    let tf = *entry.term_counts.get(t).unwrap_or(&0) as f64;
                    if tf == 0.0 {
                        continue;
                    }
                    let idf_t = idf.get(t.as_str()).copied().unwrap_or(0.0);
                    let denom = tf + self.k1 * (1.0 - self.b + self.b * entry.length as f64 / avg_len);
                    score += idf_t * (tf * (self.k1 + 1.0)) / denom;
                }
                if score > 0.0 {
                    Some(Bm25Hit {
                        memory_id: memory_id.clone(),
                        session_id: entry.session_id.clone(),
                        content: entry.content.clone(),
                        metadata: entry.metadata.clone(),
                        score,
                    })
                } else {
                    None
                }
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(if limit == 0 { 10 } else { limit });
        hits
    }

    pub fn stats(&self) -> Bm25Stats {
        let inner = self.inner.read().unwrap();
        let docs = inner.docs.len();
        Bm25Stats {
            docs,
            terms: inner.doc_freq.len(),
            avg_len: if docs == 0 {
                0.0
            } else {
                inner.total_len as f64 / docs as f64
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_returns_empty() {
        let idx = Bm25Index::default();
        idx.add("m1", "s1", "hello world", Utc::now(), None);
        assert!(idx.search("!!!", 10, None).is_empty());
        assert!(idx.search("", 10, None).is_empty());
    }

    #[test]
    fn add_remove_restores_pre_add_state() {
        let idx = Bm25Index::default();
        idx.add("m1", "s1", "alpha beta gamma", Utc::now(), None);
        let before = idx.stats();
        idx.add("m2", "s1", "alpha delta", Utc::now(), None);
        assert!(idx.remove("m2"));
        let after = idx.stats();
        assert_eq!(before.docs, after.docs);
        assert!((before.avg_len - after.avg_len).abs() < 1e-9);
    }

    #[test]
    fn readd_same_id_is_idempotent() {
        let idx = Bm25Index::default();
        idx.add("m1", "s1", "alpha beta", Utc::now(), None);
        idx.add("m1", "s1", "alpha beta", Utc::now(), None);
        let stats = idx.stats();
        assert_eq!(stats.docs, 1);
        assert_eq!(stats.terms, 2);
    }

    #[test]
    fn search_ranks_more_relevant_doc_higher() {
        let idx = Bm25Index::default();
        idx.add(
            "m1",
            "s1",
            "machine learning machine learning models",
            Utc::now(),
            None,
        );
        idx.add("m2", "s1", "a completely unrelated document about cooking", Utc::now(), None);
        let hits = idx.search("machine learning", 10, None);
        assert_eq!(hits[0].memory_id, "m1");
    }

    #[test]
    fn session_filter_restricts_candidates() {
        let idx = Bm25Index::default();
        idx.add("m1", "s1", "rust programming language", Utc::now(), None);
        idx.add("m2", "s2", "rust programming language", Utc::now(), None);
        let hits = idx.search("rust programming", 10, Some("s1"));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].memory_id, "m1");
    }

    #[test]
    fn clear_resets_everything() {
        let idx = Bm25Index::default();
        idx.add("m1", "s1", "hello world", Utc::now(), None);
        idx.clear();
        let stats = idx.stats();
        assert_eq!(stats.docs, 0);
        assert_eq!(stats.terms, 0);
        assert_eq!(stats.avg_len, 0.0);
    }
}
