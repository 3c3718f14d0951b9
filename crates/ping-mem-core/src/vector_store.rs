//! Vector store abstraction and in-memory implementation (C3).
//!
//! Stores `(memory-id, session-id, content, category, vector, metadata,
//! indexed-at)` records and answers cosine-similarity top-k queries with
//! optional session/category filters. The trait boundary lets a real
//! external vector service sit behind the same interface; this crate
//! ships the in-memory implementation that also serves as the documented
//! "fallback" of record — if an external service is unreachable at
//! startup, the caller constructs this instead and reports
//! `using_fallback: true` in [`VectorStoreStats`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::property::Properties;

/// A single vector record, keyed by `memory_id`.
#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub memory_id: String,
    pub session_id: String,
    pub content: String,
    pub category: Option<String>,
    pub vector: Vec<f32>,
    pub metadata: Properties,
    pub indexed_at: DateTime<Utc>,
}

/// Filters accepted by [`VectorStore::search`].
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    pub limit: usize,
    pub threshold: f32,
    pub session_id: Option<String>,
    pub category: Option<String>,
}

/// A scored search hit.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub similarity: f32,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct VectorStoreStats {
    pub count: usize,
    pub dims: usize,
    pub threshold: f32,
    pub using_fallback: bool,
}

/// Abstract vector storage backend.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Upsert a record by `memory_id`. Rejects dimension mismatches.
    async fn store(&self, record: VectorRecord) -> Result<()>;

    /// Cosine-similarity top-k search with optional filters. Results are
    /// sorted descending by similarity and satisfy
    /// `similarity >= filter.threshold`.
    async fn search(&self, query_vec: &[f32], filter: SearchFilter) -> Result<Vec<ScoredRecord>>;

    /// Delete a record by id. Returns whether it existed.
    async fn delete(&self, memory_id: &str) -> Result<bool>;

    /// Delete every record in `session_id`. Returns the count removed.
    /// Used by project-scoped cascade delete (ingestion uses the project
    /// id as the session id for code-chunk vectors).
    async fn delete_session(&self, session_id: &str) -> Result<usize>;

    /// List records for a session, most-recently-indexed first.
    async fn list(&self, session_id: &str, limit: usize) -> Result<Vec<VectorRecord>>;

    async fn stats(&self) -> VectorStoreStats;
}

/// Brute-force in-memory vector store; also the documented fallback
/// implementation (§4.3).
pub struct InMemoryVectorStore {
    dims: usize,
    default_threshold: f32,
    records: RwLock<HashMap<String, VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            default_threshold: 0.0,
            records: RwLock::new(HashMap::new()),
        }
    }
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
        0.0
    } else {
        (dot / denom).clamp(-1.0, 1.0)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn store(&self, record: VectorRecord) -> Result<()> {
        if record.vector.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: record.vector.len(),
            });
        }
        let mut records = self.records.write().unwrap();
        records.insert(record.memory_id.clone(), record);
        Ok(())
    }

    async fn search(&self, query_vec: &[f32], filter: SearchFilter) -> Result<Vec<ScoredRecord>> {
        if query_vec.len() != self.dims {
            return Err(Error::DimensionMismatch {
                expected: self.dims,
                actual: query_vec.len(),
            });
        }
        let records = self.records.read().unwrap();
        let threshold = if filter.threshold > 0.0 {
            filter.threshold
        } else {
            self.default_threshold
        };

        let mut hits: Vec<ScoredRecord> = records
            .values()
            .filter(|r| {
                filter
                    .session_id
                    .as_ref()
                    .map(|sid| &r.session_id == sid)
                    .unwrap_or(true)
                    && filter
                        .category
                        .as_ref()
                        .map(|cat| r.category.as_deref() == Some(cat.as_str()))
                        .unwrap_or(true)
            })
            .map(|r| ScoredRecord {
                record: r.clone(),
                similarity: cosine_similarity(query_vec, &r.vector),
            })
            .filter(|s| s.similarity >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let limit = if filter.limit == 0 { 10 } else { filter.limit };
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete(&self, memory_id: &str) -> Result<bool> {
        let mut records = self.records.write().unwrap();
        Ok(records.remove(memory_id).is_some())
    }

    async fn delete_session(&self, session_id: &str) -> Result<usize> {
        let mut records = self.records.write().unwrap();
        let before = records.len();
        records.retain(|_, r| r.session_id != session_id);
        Ok(before - records.len())
    }

    async fn list(&self, session_id: &str, limit: usize) -> Result<Vec<VectorRecord>> {
        let records = self.records.read().unwrap();
        let mut items: Vec<VectorRecord> = records
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        items.truncate(if limit == 0 { 50 } else { limit });
        Ok(items)
    }

    async fn stats(&self) -> VectorStoreStats {
        let records = self.records.read().unwrap();
        VectorStoreStats {
            count: records.len(),
            dims: self.dims,
            threshold: self.default_threshold,
            using_fallback: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: &str, session: &str, v: Vec<f32>) -> VectorRecord {
        VectorRecord {
            memory_id: id.to_string(),
            session_id: session.to_string(),
            content: format!("content for {id}"),
            category: None,
            vector: v,
            metadata: Properties::new(),
            indexed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected() {
        let store = InMemoryVectorStore::new(4);
        let err = store.store(rec("m1", "s1", vec![1.0, 0.0])).await;
        assert!(matches!(err, Err(Error::DimensionMismatch { .. })));
    }

    #[tokio::test]
    async fn search_sorted_descending_by_similarity() {
        let store = InMemoryVectorStore::new(2);
        store.store(rec("a", "s1", vec![1.0, 0.0])).await.unwrap();
        store.store(rec("b", "s1", vec![0.0, 1.0])).await.unwrap();
        store
            .store(rec("c", "s1", vec![0.9, 0.1]))
            .await
            .unwrap();

        let hits = store
            .search(
                &[1.0, 0.0],
                SearchFilter {
                    limit: 10,
                    threshold: 0.0,
                    session_id: None,
                    category: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(hits[0].record.memory_id, "a");
        assert!(hits[0].similarity >= hits[1].similarity);
    }

    #[tokio::test]
    async fn delete_then_search_never_returns_it() {
        let store = InMemoryVectorStore::new(2);
        store.store(rec("a", "s1", vec![1.0, 0.0])).await.unwrap();
        assert!(store.delete("a").await.unwrap());
        let hits = store
            .search(&[1.0, 0.0], SearchFilter { limit: 10, ..Default::default() })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn session_filter_applied() {
        let store = InMemoryVectorStore::new(2);
        store.store(rec("a", "s1", vec![1.0, 0.0])).await.unwrap();
        store.store(rec("b", "s2", vec![1.0, 0.0])).await.unwrap();
        let hits = store
            .search(
                &[1.0, 0.0],
                SearchFilter {
                    limit: 10,
                    threshold: 0.0,
                    session_id: Some("s1".to_string()),
                    category: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.memory_id, "a");
    }
}
