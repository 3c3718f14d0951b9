//! Hybrid Search Engine (C14): fuses BM25 keyword search, vector
//! semantic search, and graph-proximity search with reciprocal rank
//! fusion.
//!
//! The three modes run concurrently (`tokio::join!`) and are combined
//! purely by rank, not raw score, so a keyword hit and a semantic hit on
//! different scales still compose sensibly. Graph mode is a silent
//! no-op without a seed entity; every other enabled mode that errors
//! fails the whole call, attributed to that mode.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use std::sync::RwLock;

use crate::bm25::Bm25Index;
use crate::embedding::EmbeddingService;
use crate::error::{Error, Result};
use crate::graph::{GraphStore, RelationshipType};
use crate::property::{Properties, PropertyValue};
use crate::vector_store::{SearchFilter, VectorRecord, VectorStore};

const RRF_K: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Keyword,
    Graph,
}

#[derive(Debug, Clone, Copy)]
pub struct SearchWeights {
    pub semantic: f64,
    pub keyword: f64,
    pub graph: f64,
}

impl Default for SearchWeights {
    fn default() -> Self {
        Self {
            semantic: 0.5,
            keyword: 0.3,
            graph: 0.2,
        }
    }
}

impl SearchWeights {
    fn of(&self, mode: SearchMode) -> f64 {
        match mode {
            SearchMode::Semantic => self.semantic,
            SearchMode::Keyword => self.keyword,
            SearchMode::Graph => self.graph,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub limit: usize,
    pub threshold: f64,
    pub session_id: Option<String>,
    pub category: Option<String>,
    /// `None` = all available modes. `Some(vec![])` = no modes, `[]` result.
    pub modes: Option<Vec<SearchMode>>,
    pub weights: SearchWeights,
    pub graph_entity_id: Option<String>,
    pub graph_depth: usize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 10,
            threshold: 0.0,
            session_id: None,
            category: None,
            modes: None,
            weights: SearchWeights::default(),
            graph_entity_id: None,
            graph_depth: 1,
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphContext {
    pub related_entity_ids: Vec<String>,
    pub relationship_types: Vec<RelationshipType>,
    pub hop_distance: usize,
}

#[derive(Debug, Clone)]
pub struct HybridResult {
    pub memory_id: String,
    pub session_id: String,
    pub content: String,
    pub hybrid_score: f64,
    pub search_modes: Vec<SearchMode>,
    pub mode_scores: Option<HashMap<SearchMode, f64>>,
    pub graph_context: Option<GraphContext>,
}

#[derive(Debug, Clone)]
struct DocMeta {
    session_id: String,
    content: String,
    category: Option<String>,
    metadata: Properties,
    indexed_at: DateTime<Utc>,
}

/// Ties BM25 (C4), the vector store (C3, optional), the embedding service
/// (C2), and the graph store (C5, optional) together behind one search
/// surface.
pub struct HybridSearchEngine {
    bm25: Arc<Bm25Index>,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedding: Arc<EmbeddingService>,
    graph: Option<Arc<dyn GraphStore>>,
    documents: RwLock<HashMap<String, DocMeta>>,
}

impl HybridSearchEngine {
    pub fn new(
        bm25: Arc<Bm25Index>,
        embedding: Arc<EmbeddingService>,
        vector_store: Option<Arc<dyn VectorStore>>,
        graph: Option<Arc<dyn GraphStore>>,
    ) -> Self {
        Self {
            bm25,
            vector_store,
            embedding,
            graph,
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Update C4 unconditionally, then embed and store in C3 if
    /// configured. C2/C3 failures propagate; the BM25 write already
    /// landed and is not rolled back (documented asymmetry — keyword
    /// availability is preferred over all-or-nothing consistency).
    pub async fn index_document(
        &self,
        memory_id: &str,
        session_id: &str,
        content: &str,
        indexed_at: DateTime<Utc>,
        category: Option<String>,
        metadata: Option<Properties>,
    ) -> Result<()> {
        self.bm25.add(
            memory_id,
            session_id,
            content,
            indexed_at,
            metadata.clone(),
        );
        self.documents.write().unwrap().insert(
            memory_id.to_string(),
            DocMeta {
                session_id: session_id.to_string(),
                content: content.to_string(),
                category: category.clone(),
                metadata: metadata.clone().unwrap_or_default(),
                indexed_at,
            },
        );

        if let Some(store) = &self.vector_store {
            let vector = self.embedding.embed(content).await?;
            store
                .store(VectorRecord {
                    memory_id: memory_id.to_string(),
                    session_id: session_id.to_string(),
                    content: content.to_string(),
                    category,
                    vector,
                    metadata: metadata.unwrap_or_default(),
                    indexed_at,
                })
                .await?;
        }
        Ok(())
    }

    /// Remove from C4 and C3. Returns whether either store acknowledged.
    pub async fn remove_document(&self, memory_id: &str) -> Result<bool> {
        let removed_bm25 = self.bm25.remove(memory_id);
        let removed_vector = if let Some(store) = &self.vector_store {
            store.delete(memory_id).await?
        } else {
            false
        };
        self.documents.write().unwrap().remove(memory_id);
        Ok(removed_bm25 || removed_vector)
    }

    fn enabled_modes(&self, opts: &SearchOptions) -> Vec<SearchMode> {
        match &opts.modes {
            Some(list) => list.clone(),
            None => {
                let mut modes = vec![SearchMode::Keyword];
                if self.vector_store.is_some() {
                    modes.push(SearchMode::Semantic);
                }
                if self.graph.is_some() && opts.graph_entity_id.is_some() {
                    modes.push(SearchMode::Graph);
                }
                modes
            }
        }
    }

    pub async fn search(&self, query: &str, opts: SearchOptions) -> Result<Vec<HybridResult>> {
        let modes = self.enabled_modes(&opts);
        if modes.is_empty() {
            return Ok(Vec::new());
        }
        let overfetch = opts.limit.max(1) * 2;

        let mut mode_rankings: HashMap<SearchMode, Vec<(String, f64)>> = HashMap::new();
        let mut graph_contexts: HashMap<String, GraphContext> = HashMap::new();

        let run_keyword = modes.contains(&SearchMode::Keyword);
        let run_semantic = modes.contains(&SearchMode::Semantic);
        let run_graph = modes.contains(&SearchMode::Graph);

        let keyword_fut = async {
            if !run_keyword {
                return Ok(None);
            }
            let hits = self.bm25.search(query, overfetch, opts.session_id.as_deref());
            let docs = self.documents.read().unwrap();
            let ranked = hits
                .into_iter()
                .filter(|h| {
                    opts.category
                        .as_ref()
                        .map(|c| {
                            docs.get(&h.memory_id)
                                .and_then(|d| d.category.as_ref())
                                .map(|dc| dc == c)
                                .unwrap_or(false)
                        })
                        .unwrap_or(true)
                })
                .map(|h| (h.memory_id, h.score))
                .collect::<Vec<_>>();
            Ok::<_, Error>(Some(ranked))
        };

        let semantic_fut = async {
            if !run_semantic {
                return Ok(None);
            }
            let Some(store) = &self.vector_store else {
                return Ok(None);
            };
            let query_vec = self
                .embedding
                .embed(query)
                .await
                .map_err(|e| Error::search_mode("semantic", e))?;
            let hits = store
                .search(
                    &query_vec,
                    SearchFilter {
                        limit: overfetch,
                        threshold: 0.0,
                        session_id: opts.session_id.clone(),
                        category: opts.category.clone(),
                    },
                )
                .await
                .map_err(|e| Error::search_mode("semantic", e))?;
            let ranked = hits
                .into_iter()
                .map(|h| (h.record.memory_id, h.similarity as f64))
                .collect::<Vec<_>>();
            Ok::<_, Error>(Some(ranked))
        };

        let graph_fut = async {
            if !run_graph {
                return Ok(None);
            }
            let (Some(graph), Some(seed)) = (&self.graph, &opts.graph_entity_id) else {
                return Ok(None);
            };
            let hits = graph_search(graph.as_ref(), seed, opts.graph_depth)
                .await
                .map_err(|e| Error::search_mode("graph", e))?;
            Ok::<_, Error>(Some(hits))
        };

        let (keyword_ranked, semantic_ranked, graph_hits) =
            tokio::join!(keyword_fut, semantic_fut, graph_fut);

        if let Some(ranked) = keyword_ranked? {
            mode_rankings.insert(SearchMode::Keyword, ranked);
        }
        if let Some(ranked) = semantic_ranked? {
            mode_rankings.insert(SearchMode::Semantic, ranked);
        }
        if let Some(hits) = graph_hits? {
            let ranked = hits
                .iter()
                .map(|h| (h.memory_id.clone(), 1.0 / (h.hop as f64 + 1.0)))
                .collect();
            mode_rankings.insert(SearchMode::Graph, ranked);

            for h in &hits {
                graph_contexts
                    .entry(h.memory_id.clone())
                    .or_insert_with(|| GraphContext {
                        related_entity_ids: vec![h.entity_id.clone()],
                        relationship_types: vec![h.rel_type],
                        hop_distance: h.hop,
                    });
            }
        }

        let mut ranks: HashMap<SearchMode, HashMap<String, (usize, f64)>> = HashMap::new();
        for (mode, ranked) in &mode_rankings {
            let by_id = ranked
                .iter()
                .enumerate()
                .map(|(i, (id, score))| (id.clone(), (i + 1, *score)))
                .collect();
            ranks.insert(*mode, by_id);
        }

        let mut all_ids: HashSet<String> = HashSet::new();
        for ranked in mode_rankings.values() {
            all_ids.extend(ranked.iter().map(|(id, _)| id.clone()));
        }

        let docs = self.documents.read().unwrap();

        let mut results = Vec::new();
        for id in all_ids {
            let Some(doc) = docs.get(&id) else { continue };
            if let Some(category) = &opts.category {
                if doc.category.as_deref() != Some(category.as_str()) {
                    continue;
                }
            }
            if let Some(session_id) = &opts.session_id {
                if &doc.session_id != session_id {
                    continue;
                }
            }

            let mut rrf = 0.0;
            let mut total_w = 0.0;
            let mut contributing = Vec::new();
            let mut mode_scores = HashMap::new();

            for mode in [SearchMode::Semantic, SearchMode::Keyword, SearchMode::Graph] {
                if let Some((rank, score)) = ranks.get(&mode).and_then(|m| m.get(&id)) {
                    let w = opts.weights.of(mode);
                    rrf += w * (1.0 / (RRF_K + *rank as f64));
                    total_w += w;
                    contributing.push(mode);
                    mode_scores.insert(mode, *score);
                }
            }
            if total_w <= 0.0 {
                continue;
            }
            let fused = rrf / total_w;
            let hybrid_score = (fused * RRF_K).min(1.0);
            if hybrid_score < opts.threshold {
                continue;
            }

            results.push(HybridResult {
                memory_id: id.clone(),
                session_id: doc.session_id.clone(),
                content: doc.content.clone(),
                hybrid_score,
                search_modes: contributing,
                mode_scores: Some(mode_scores),
                graph_context: graph_contexts.get(&id).cloned(),
            });
        }

        results.sort_by(|a, b| {
            b.hybrid_score
                .partial_cmp(&a.hybrid_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(opts.limit.max(1));
        Ok(results)
    }
}

struct GraphHit {
    memory_id: String,
    entity_id: String,
    rel_type: RelationshipType,
    hop: usize,
}

async fn graph_search(graph: &dyn GraphStore, seed: &str, depth: usize) -> Result<Vec<GraphHit>> {
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(seed.to_string());
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((seed.to_string(), 0));

    let mut hits = Vec::new();
    let mut seen_memory_ids: HashSet<String> = HashSet::new();

    while let Some((current, hop)) = queue.pop_front() {
        if hop >= depth {
            continue;
        }
        let neighbors = graph.neighborhood(&current).await?;
        for n in neighbors {
            let next_id = if n.source_id == current {
                n.target_id.clone()
            } else {
                n.source_id.clone()
            };
            let next_hop = hop + 1;
            if visited.insert(next_id.clone()) {
                if let Some(entity) = graph.get_entity(&next_id).await? {
                    if let Some(PropertyValue::Array(items)) =
                        entity.properties.get("related_memory_ids")
                    {
                        for item in items {
                            if let Some(mem_id) = item.as_str() {
                                if seen_memory_ids.insert(mem_id.to_string()) {
                                    hits.push(GraphHit {
                                        memory_id: mem_id.to_string(),
                                        entity_id: next_id.clone(),
                                        rel_type: n.rel_type,
                                        hop: next_hop,
                                    });
                                }
                            }
                        }
                    }
                }
                queue.push_back((next_id, next_hop));
            }
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingService;
    use crate::vector_store::InMemoryVectorStore;

    fn engine_with_vectors() -> HybridSearchEngine {
        HybridSearchEngine::new(
            Arc::new(Bm25Index::default()),
            Arc::new(EmbeddingService::local(64)),
            Some(Arc::new(InMemoryVectorStore::new(64))),
            None,
        )
    }

    #[tokio::test]
    async fn index_then_remove_never_returns_document() {
        let engine = engine_with_vectors();
        engine
            .index_document("m1", "s1", "machine learning models", Utc::now(), None, None)
            .await
            .unwrap();
        assert!(engine.remove_document("m1").await.unwrap());

        let results = engine
            .search("machine learning", SearchOptions::default())
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.memory_id != "m1"));
    }

    #[tokio::test]
    async fn reindexing_same_id_does_not_duplicate() {
        let engine = engine_with_vectors();
        engine
            .index_document("m1", "s1", "rust programming", Utc::now(), None, None)
            .await
            .unwrap();
        engine
            .index_document("m1", "s1", "rust programming", Utc::now(), None, None)
            .await
            .unwrap();

        let stats = engine.bm25.stats();
        assert_eq!(stats.docs, 1);
    }

    #[tokio::test]
    async fn empty_modes_returns_empty() {
        let engine = engine_with_vectors();
        engine
            .index_document("m1", "s1", "hello world", Utc::now(), None, None)
            .await
            .unwrap();
        let opts = SearchOptions {
            modes: Some(vec![]),
            ..Default::default()
        };
        let results = engine.search("hello", opts).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn graph_mode_without_seed_is_silent_noop() {
        let engine = engine_with_vectors();
        engine
            .index_document("m1", "s1", "hello world", Utc::now(), None, None)
            .await
            .unwrap();
        let opts = SearchOptions {
            modes: Some(vec![SearchMode::Keyword, SearchMode::Graph]),
            graph_entity_id: None,
            ..Default::default()
        };
        let results = engine.search("hello", opts).await.unwrap();
        assert!(!results.is_empty());
        assert!(results[0].search_modes.contains(&SearchMode::Keyword));
        assert!(!results[0].search_modes.contains(&SearchMode::Graph));
    }

    /// Keyword ranks "widget" [mem-002, mem-001, mem-003] (by BM25 term
    /// frequency vs. length); graph ranks the same three memories
    /// [mem-001, mem-002, mem-003] (by hop distance along a seed chain).
    /// With weights keyword=0.4/graph=0.6 the RRF-fused order is
    /// [mem-001, mem-002, mem-003], mem-001 narrowly ahead of mem-002.
    #[tokio::test]
    async fn hybrid_fusion_scenario_h1() {
        use crate::graph::{EntityType, InMemoryGraphStore};

        let graph = InMemoryGraphStore::new();
        let now = Utc::now();
        let seed = graph
            .merge_entity(EntityType::Concept, "seed", Properties::new(), now)
            .await
            .unwrap();
        let mut props_a = Properties::new();
        props_a.insert(
            "related_memory_ids".to_string(),
            PropertyValue::Array(vec![PropertyValue::from("mem-001")]),
        );
        let node_a = graph
            .merge_entity(EntityType::Concept, "a", props_a, now)
            .await
            .unwrap();
        let mut props_b = Properties::new();
        props_b.insert(
            "related_memory_ids".to_string(),
            PropertyValue::Array(vec![PropertyValue::from("mem-002")]),
        );
        let node_b = graph
            .merge_entity(EntityType::Concept, "b", props_b, now)
            .await
            .unwrap();
        let mut props_c = Properties::new();
        props_c.insert(
            "related_memory_ids".to_string(),
            PropertyValue::Array(vec![PropertyValue::from("mem-003")]),
        );
        let node_c = graph
            .merge_entity(EntityType::Concept, "c", props_c, now)
            .await
            .unwrap();

        for (n, (src, dst)) in [(&seed, &node_a), (&node_a, &node_b), (&node_b, &node_c)]
            .into_iter()
            .enumerate()
        {
            graph
                .create_relationship(crate::graph::Relationship {
                    id: format!("r{n}"),
                    rel_type: RelationshipType::RelatedTo,
                    source_id: src.id.clone(),
                    target_id: dst.id.clone(),
                    properties: Properties::new(),
                    weight: 1.0,
                    event_time: now,
                    ingestion_time: now,
                    valid_from: now,
                    valid_to: None,
                    version: 1,
                    created_at: now,
                    updated_at: now,
                })
                .await
                .unwrap();
        }

        let engine = HybridSearchEngine::new(
            Arc::new(Bm25Index::default()),
            Arc::new(EmbeddingService::local(8)),
            None,
            Some(Arc::new(graph)),
        );

        // tf=3/len=5, tf=2/len=2, tf=1/len=11 ranks "widget" as B, A, C.
        engine
            .index_document("mem-001", "s", "widget widget widget filler filler", now, None, None)
            .await
            .unwrap();
        engine
            .index_document("mem-002", "s", "widget widget", now, None, None)
            .await
            .unwrap();
        engine
            .index_document(
                "mem-003",
                "s",
                "widget filler filler filler filler filler filler filler filler filler filler",
                now,
                None,
                None,
            )
            .await
            .unwrap();

        let opts = SearchOptions {
            limit: 10,
            modes: Some(vec![SearchMode::Keyword, SearchMode::Graph]),
            weights: SearchWeights {
                semantic: 0.0,
                keyword: 0.4,
                graph: 0.6,
            },
            graph_entity_id: Some(seed.id.clone()),
            graph_depth: 3,
            ..Default::default()
        };
        let results = engine.search("widget", opts).await.unwrap();

        let ids: Vec<&str> = results.iter().map(|r| r.memory_id.as_str()).collect();
        assert_eq!(ids, vec!["mem-001", "mem-002", "mem-003"]);
        assert!(results[0].hybrid_score > results[1].hybrid_score);
        assert!(results[1].hybrid_score > results[2].hybrid_score);
    }
}
