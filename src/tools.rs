//! The Tool-RPC operations (§6), implemented as typed methods on the
//! [`PingMem`] facade. One method per table row; each returns the typed
//! result struct named in the table's "Returns" column. No transport
//! framing lives here — `main.rs`'s CLI is ambient developer tooling over
//! the same surface, not the RPC boundary itself.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use ping_mem_core::bm25::Bm25Index;
use ping_mem_core::embedding::EmbeddingService;
use ping_mem_core::error::Error as CoreError;
use ping_mem_core::evolution::{self, EvolutionOptions};
use ping_mem_core::extraction::{self, ContextInput};
use ping_mem_core::graph::{EntityType, GraphStore, InMemoryGraphStore, RelationshipType};
use ping_mem_core::inference;
use ping_mem_core::lineage;
use ping_mem_core::property::{Properties, PropertyValue};
use ping_mem_core::search::{GraphContext, HybridSearchEngine, SearchMode, SearchOptions, SearchWeights};
use ping_mem_core::temporal::TemporalStore;
use ping_mem_core::vector_store::{InMemoryVectorStore, SearchFilter, VectorStore};

use ping_mem_ingest::pipeline::{IngestRequest, IngestionPipeline};

use crate::config::Config;

fn json_to_properties(value: &serde_json::Value) -> Properties {
    match PropertyValue::from_json(value) {
        PropertyValue::Map(map) => map,
        other => {
            let mut props = Properties::new();
            props.insert("value".to_string(), other);
            props
        }
    }
}

fn entity_type_label(t: EntityType) -> &'static str {
    match t {
        EntityType::Person => "person",
        EntityType::Organization => "organization",
        EntityType::Concept => "concept",
        EntityType::Task => "task",
        EntityType::Decision => "decision",
        EntityType::Event => "event",
        EntityType::Fact => "fact",
        EntityType::Error => "error",
        EntityType::CodeFile => "code-file",
        EntityType::CodeFunction => "code-function",
        EntityType::CodeClass => "code-class",
    }
}

fn category_to_entity_type(category: Option<&str>) -> Option<EntityType> {
    match category {
        Some("task") => Some(EntityType::Task),
        Some("decision") => Some(EntityType::Decision),
        Some("error") => Some(EntityType::Error),
        Some("fact") | Some("observation") => Some(EntityType::Fact),
        _ => None,
    }
}

// ---------------------------------------------------------------------
// context_save
// ---------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ContextSaveRequest {
    pub key: String,
    pub value: String,
    pub category: Option<String>,
    pub priority: Option<String>,
    pub channel: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub extract_entities: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextSaveResult {
    pub memory_id: String,
    pub entity_ids: Option<Vec<String>>,
}

// ---------------------------------------------------------------------
// context_search / context_hybrid_search
// ---------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchHit {
    pub memory_id: String,
    pub session_id: String,
    pub content: String,
    pub score: f64,
    pub modes: Vec<SearchMode>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextSearchResult {
    pub count: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContextHybridSearchResult {
    pub query: String,
    pub count: usize,
    pub results: Vec<HybridSearchHit>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct HybridSearchHit {
    pub memory_id: String,
    pub session_id: String,
    pub content: String,
    pub hybrid_score: f64,
    pub modes: Vec<SearchMode>,
    pub graph_context: Option<GraphContext>,
}

// ---------------------------------------------------------------------
// context_query_relationships
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationshipEntity {
    pub id: String,
    pub entity_type: &'static str,
    pub name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct RelationshipEdge {
    pub id: String,
    pub rel_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    pub weight: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryRelationshipsResult {
    pub entities: Vec<RelationshipEntity>,
    pub relationships: Vec<RelationshipEdge>,
    pub paths: Vec<Vec<String>>,
}

// ---------------------------------------------------------------------
// context_get_lineage
// ---------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineageDirection {
    Upstream,
    Downstream,
    Both,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct LineageCounts {
    pub upstream: usize,
    pub downstream: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct GetLineageResult {
    pub upstream: Vec<String>,
    pub downstream: Vec<String>,
    pub counts: LineageCounts,
}

// ---------------------------------------------------------------------
// context_query_evolution
// ---------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryEvolutionResult {
    pub entity_id: String,
    pub entity_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub total_changes: usize,
    pub changes: Vec<evolution::EntityChange>,
}

// ---------------------------------------------------------------------
// codebase_search / codebase_timeline
// ---------------------------------------------------------------------

#[derive(Debug, Clone, serde::Serialize)]
pub struct CodebaseSearchHit {
    pub chunk_id: String,
    pub file_path: String,
    pub chunk_type: String,
    pub content: String,
    pub similarity: f64,
    pub line_start: i64,
    pub line_end: i64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CodebaseSearchResult {
    pub query: String,
    pub result_count: usize,
    pub results: Vec<CodebaseSearchHit>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineEvent {
    pub sha: String,
    pub author: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CodebaseTimelineResult {
    pub project_id: String,
    pub file_path: Option<String>,
    pub event_count: usize,
    pub events: Vec<TimelineEvent>,
}

/// Ties every component (C1–C14) together behind the Tool-RPC
/// operations. Only the in-memory backends are wired up; external
/// vector/graph backends are a configuration surface this workspace
/// validates but does not implement a client for (see DESIGN.md).
pub struct PingMem {
    graph: Arc<dyn GraphStore>,
    temporal: TemporalStore,
    vector_store: Option<Arc<dyn VectorStore>>,
    embedding: Arc<EmbeddingService>,
    search: HybridSearchEngine,
    ingestion: IngestionPipeline,
    config: Config,
}

impl PingMem {
    pub fn new(config: Config) -> Result<Self> {
        if config.vector_store.backend != "in-memory" {
            bail!(
                "vector_store backend '{}' has no client implementation in this workspace",
                config.vector_store.backend
            );
        }
        if config.graph_store.backend != "in-memory" {
            bail!(
                "graph_store backend '{}' has no client implementation in this workspace",
                config.graph_store.backend
            );
        }

        let graph: Arc<dyn GraphStore> = Arc::new(InMemoryGraphStore::new());
        let vector_store: Arc<dyn VectorStore> =
            Arc::new(InMemoryVectorStore::new(config.embedding.dims));
        let embedding = Arc::new(Self::build_embedding_service(&config.embedding)?);
        let bm25 = Arc::new(Bm25Index::new(config.bm25.k1, config.bm25.b));

        let search = HybridSearchEngine::new(
            bm25,
            embedding.clone(),
            Some(vector_store.clone()),
            Some(graph.clone()),
        );
        let ingestion = IngestionPipeline::new(vector_store.clone(), graph.clone(), embedding.clone());
        let temporal = TemporalStore::new(graph.clone());

        Ok(Self {
            graph,
            temporal,
            vector_store: Some(vector_store),
            embedding,
            search,
            ingestion,
            config,
        })
    }

    /// "openai" gets the network provider from the app layer; anything
    /// else (including "disabled") falls back to the always-available
    /// deterministic local provider rather than leaving semantic search
    /// unusable.
    fn build_embedding_service(config: &crate::config::EmbeddingConfig) -> Result<EmbeddingService> {
        if config.is_external() {
            let provider = crate::openai_embedding::OpenAiProvider::new(config)?;
            return Ok(EmbeddingService::new(
                Box::new(provider),
                ping_mem_core::embedding::EmbeddingCache::new(
                    10_000,
                    std::time::Duration::from_secs(3600),
                ),
            ));
        }
        Ok(EmbeddingService::local(config.dims))
    }

    fn default_weights(&self) -> SearchWeights {
        SearchWeights {
            semantic: self.config.search.weight_semantic,
            keyword: self.config.search.weight_keyword,
            graph: self.config.search.weight_graph,
        }
    }

    pub async fn context_save(&self, request: ContextSaveRequest) -> Result<ContextSaveResult> {
        if request.key.trim().is_empty() || request.value.trim().is_empty() {
            bail!("context_save requires non-empty key and value");
        }
        let memory_id = Uuid::new_v4().to_string();
        let channel = request.channel.clone().unwrap_or_else(|| "default".to_string());
        let now = Utc::now();

        let mut metadata = request
            .metadata
            .as_ref()
            .map(json_to_properties)
            .unwrap_or_default();
        if let Some(priority) = &request.priority {
            metadata.insert("priority".to_string(), priority.as_str().into());
        }
        metadata.insert("key".to_string(), request.key.as_str().into());

        self.search
            .index_document(
                &memory_id,
                &channel,
                &request.value,
                now,
                request.category.clone(),
                Some(metadata),
            )
            .await
            .context("context_save: indexing failed")?;

        let entity_ids = if request.extract_entities {
            let input = ContextInput {
                key: &request.key,
                value: &request.value,
                category: request.category.as_deref(),
            };
            let patterns = extraction::default_patterns();
            let extracted = extraction::extract_from_context(&input, &patterns);

            let mut ids = Vec::with_capacity(extracted.entities.len());
            let mut stored_by_name: HashMap<String, (String, EntityType)> = HashMap::new();
            for entity in &extracted.entities {
                let mut props = Properties::new();
                props.insert("confidence".to_string(), entity.confidence.into());
                props.insert(
                    "related_memory_ids".to_string(),
                    PropertyValue::Array(vec![PropertyValue::from(memory_id.as_str())]),
                );
                let stored = self
                    .graph
                    .merge_entity(entity.entity_type, &entity.name, props, now)
                    .await
                    .context("context_save: entity merge failed")?;
                stored_by_name.insert(stored.name.clone(), (stored.id.clone(), stored.entity_type));
                ids.push(stored.id);
            }
            if let Some(derived) = category_to_entity_type(request.category.as_deref()) {
                if ids.is_empty() {
                    let mut props = Properties::new();
                    props.insert(
                        "related_memory_ids".to_string(),
                        PropertyValue::Array(vec![PropertyValue::from(memory_id.as_str())]),
                    );
                    let stored = self
                        .graph
                        .merge_entity(derived, &request.key, props, now)
                        .await
                        .context("context_save: category entity merge failed")?;
                    stored_by_name.insert(stored.name.clone(), (stored.id.clone(), stored.entity_type));
                    ids.push(stored.id);
                }
            }

            if stored_by_name.len() >= 2 {
                let candidates: Vec<inference::CandidateEntity> = stored_by_name
                    .iter()
                    .map(|(name, (_, entity_type))| inference::CandidateEntity {
                        name: name.clone(),
                        entity_type: *entity_type,
                    })
                    .collect();
                let rules = inference::default_rules();
                let opts = inference::InferenceOptions::default();
                let inferred = inference::infer_relationships(&candidates, &request.value, &rules, &opts);

                // Fresh timestamp: the entities above were just merged and
                // stamp their own valid_from internally, which can postdate
                // any timestamp captured before those calls ran.
                let rel_event_time = Utc::now();
                for rel in inferred.relationships {
                    let (Some((source_id, _)), Some((target_id, _))) = (
                        stored_by_name.get(&rel.source_name),
                        stored_by_name.get(&rel.target_name),
                    ) else {
                        continue;
                    };
                    let rel_id = format!("infer:{source_id}:{target_id}:{:?}", rel.rel_type);
                    if self.graph.get_relationship(&rel_id).await?.is_some() {
                        continue;
                    }
                    let mut props = Properties::new();
                    props.insert("inferred".to_string(), true.into());
                    self.graph
                        .create_relationship(ping_mem_core::graph::Relationship {
                            id: rel_id,
                            rel_type: rel.rel_type,
                            source_id: source_id.clone(),
                            target_id: target_id.clone(),
                            properties: props,
                            weight: rel.weight,
                            event_time: rel_event_time,
                            ingestion_time: rel_event_time,
                            valid_from: rel_event_time,
                            valid_to: None,
                            version: 1,
                            created_at: rel_event_time,
                            updated_at: rel_event_time,
                        })
                        .await
                        .context("context_save: inferred relationship creation failed")?;
                }
            }

            Some(ids)
        } else {
            None
        };

        Ok(ContextSaveResult {
            memory_id,
            entity_ids,
        })
    }

    pub async fn context_search(
        &self,
        query: &str,
        min_similarity: Option<f64>,
        category: Option<String>,
        channel: Option<String>,
        limit: Option<usize>,
    ) -> Result<ContextSearchResult> {
        let opts = SearchOptions {
            limit: limit.unwrap_or(self.config.search.default_limit),
            threshold: min_similarity.unwrap_or(0.0),
            session_id: channel,
            category,
            modes: None,
            weights: self.default_weights(),
            graph_entity_id: None,
            graph_depth: 1,
        };
        let results = self.search.search(query, opts).await?;
        let hits: Vec<SearchHit> = results
            .into_iter()
            .map(|r| SearchHit {
                memory_id: r.memory_id,
                session_id: r.session_id,
                content: r.content,
                score: r.hybrid_score,
                modes: r.search_modes,
            })
            .collect();
        Ok(ContextSearchResult {
            count: hits.len(),
            results: hits,
        })
    }

    pub async fn context_hybrid_search(
        &self,
        query: &str,
        limit: Option<usize>,
        weights: Option<SearchWeights>,
        session_id: Option<String>,
    ) -> Result<ContextHybridSearchResult> {
        let opts = SearchOptions {
            limit: limit.unwrap_or(self.config.search.default_limit),
            threshold: 0.0,
            session_id,
            category: None,
            modes: None,
            weights: weights.unwrap_or_else(|| self.default_weights()),
            graph_entity_id: None,
            graph_depth: 1,
        };
        let results = self.search.search(query, opts).await?;
        let hits: Vec<HybridSearchHit> = results
            .into_iter()
            .map(|r| HybridSearchHit {
                memory_id: r.memory_id,
                session_id: r.session_id,
                content: r.content,
                hybrid_score: r.hybrid_score,
                modes: r.search_modes,
                graph_context: r.graph_context,
            })
            .collect();
        Ok(ContextHybridSearchResult {
            query: query.to_string(),
            count: hits.len(),
            results: hits,
        })
    }

    pub async fn context_query_relationships(
        &self,
        entity_id: &str,
        depth: Option<usize>,
        relationship_types: Option<Vec<RelationshipType>>,
        direction: Direction,
    ) -> Result<QueryRelationshipsResult> {
        let depth = depth.unwrap_or(1).min(self.config.lineage.max_depth);
        let mut visited = std::collections::HashSet::new();
        visited.insert(entity_id.to_string());
        let mut queue: std::collections::VecDeque<(String, usize, Vec<String>)> =
            std::collections::VecDeque::new();
        queue.push_back((entity_id.to_string(), 0, vec![entity_id.to_string()]));

        let mut entities = HashMap::new();
        let mut relationships = HashMap::new();
        let mut paths = Vec::new();

        while let Some((current, hop, path)) = queue.pop_front() {
            if hop >= depth {
                continue;
            }
            let neighbors = self
                .graph
                .neighborhood(&current)
                .await
                .context("context_query_relationships: neighborhood lookup failed")?;
            for n in neighbors {
                if let Some(types) = &relationship_types {
                    if !types.contains(&n.rel_type) {
                        continue;
                    }
                }
                let is_outgoing = n.source_id == current;
                let matches_direction = match direction {
                    Direction::Both => true,
                    Direction::Outgoing => is_outgoing,
                    Direction::Incoming => !is_outgoing,
                };
                if !matches_direction {
                    continue;
                }
                let next_id = if is_outgoing {
                    n.target_id.clone()
                } else {
                    n.source_id.clone()
                };
                let rel_id = format!("{}->{}:{:?}", n.source_id, n.target_id, n.rel_type);
                relationships.entry(rel_id).or_insert_with(|| RelationshipEdge {
                    id: format!("{}:{}", n.source_id, n.target_id),
                    rel_type: n.rel_type,
                    source_id: n.source_id.clone(),
                    target_id: n.target_id.clone(),
                    weight: n.weight,
                });

                if visited.insert(next_id.clone()) {
                    let mut next_path = path.clone();
                    next_path.push(next_id.clone());
                    if let Some(entity) = self.graph.get_entity(&next_id).await? {
                        entities.insert(
                            next_id.clone(),
                            RelationshipEntity {
                                id: entity.id.clone(),
                                entity_type: entity_type_label(entity.entity_type),
                                name: entity.name.clone(),
                            },
                        );
                    }
                    paths.push(next_path.clone());
                    queue.push_back((next_id, hop + 1, next_path));
                }
            }
        }

        Ok(QueryRelationshipsResult {
            entities: entities.into_values().collect(),
            relationships: relationships.into_values().collect(),
            paths,
        })
    }

    pub async fn context_get_lineage(
        &self,
        entity_id: &str,
        direction: LineageDirection,
        max_depth: Option<usize>,
    ) -> Result<GetLineageResult> {
        let cap = max_depth
            .unwrap_or(self.config.lineage.max_depth)
            .min(lineage::DEFAULT_MAX_DEPTH);

        let upstream = if matches!(direction, LineageDirection::Upstream | LineageDirection::Both) {
            lineage::ancestors(self.graph.as_ref(), entity_id, Some(cap)).await?
        } else {
            Vec::new()
        };
        let downstream = if matches!(direction, LineageDirection::Downstream | LineageDirection::Both) {
            lineage::descendants(self.graph.as_ref(), entity_id, Some(cap)).await?
        } else {
            Vec::new()
        };

        Ok(GetLineageResult {
            counts: LineageCounts {
                upstream: upstream.len(),
                downstream: downstream.len(),
            },
            upstream,
            downstream,
        })
    }

    pub async fn context_query_evolution(
        &self,
        entity_id: &str,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<QueryEvolutionResult> {
        let options = EvolutionOptions {
            start_time,
            end_time,
            change_types: None,
            max_timeline_depth: self.config.evolution.max_timeline_depth,
            include_related: false,
            max_depth: 1,
        };
        let timeline = evolution::get_evolution(&self.temporal, entity_id, &options)
            .await
            .map_err(|e| match e {
                CoreError::NotFound(msg) => anyhow::anyhow!("context_query_evolution: {msg}"),
                other => anyhow::anyhow!(other),
            })?;

        let entity_name = timeline
            .changes
            .last()
            .and_then(|c| c.current_state.as_ref().or(c.previous_state.as_ref()))
            .map(|s| s.name.clone())
            .unwrap_or_default();

        Ok(QueryEvolutionResult {
            entity_id: timeline.entity_id,
            entity_name,
            start_time: timeline.start_time,
            end_time: timeline.end_time,
            total_changes: timeline.changes.len(),
            changes: timeline.changes,
        })
    }

    pub async fn codebase_ingest(
        &self,
        project_dir: PathBuf,
        force_reingest: bool,
    ) -> Result<Option<ping_mem_ingest::pipeline::IngestResult>> {
        self.ingestion
            .ingest(IngestRequest {
                project_dir,
                force_reingest,
            })
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }

    pub async fn codebase_verify(
        &self,
        project_dir: &std::path::Path,
    ) -> Result<ping_mem_ingest::pipeline::VerifyResult> {
        self.ingestion
            .verify(project_dir)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }

    pub async fn codebase_search(
        &self,
        query: &str,
        project_id: Option<String>,
        file_path: Option<String>,
        chunk_type: Option<String>,
        limit: Option<usize>,
    ) -> Result<CodebaseSearchResult> {
        let Some(store) = &self.vector_store else {
            return Ok(CodebaseSearchResult {
                query: query.to_string(),
                result_count: 0,
                results: Vec::new(),
            });
        };
        let query_vec = self.embedding.embed(query).await?;
        let limit = limit.unwrap_or(self.config.search.default_limit);
        let hits = store
            .search(
                &query_vec,
                SearchFilter {
                    limit: limit * 4,
                    threshold: 0.0,
                    session_id: project_id,
                    category: chunk_type,
                },
            )
            .await?;

        let hits: Vec<_> = hits
            .into_iter()
            .filter(|h| {
                file_path
                    .as_ref()
                    .map(|fp| {
                        h.record
                            .metadata
                            .get("file_path")
                            .and_then(|v| v.as_str())
                            .map(|p| p == fp)
                            .unwrap_or(false)
                    })
                    .unwrap_or(true)
            })
            .take(limit)
            .collect();

        // Chunk content lives on the graph entity, not the vector payload
        // (see DESIGN.md); join on `chunk_id` to fetch it back.
        let mut results = Vec::with_capacity(hits.len());
        for h in hits {
            let meta = &h.record.metadata;
            let content = self
                .graph
                .find_entities_by_property("chunk_id", &h.record.memory_id)
                .await?
                .into_iter()
                .next()
                .and_then(|e| e.properties.get("content").and_then(|v| v.as_str().map(str::to_string)))
                .unwrap_or_default();
            results.push(CodebaseSearchHit {
                chunk_id: h.record.memory_id,
                file_path: meta
                    .get("file_path")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                chunk_type: meta
                    .get("type")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                content,
                similarity: h.similarity as f64,
                line_start: meta.get("line_start").and_then(|v| v.as_f64()).unwrap_or(0.0) as i64,
                line_end: meta.get("line_end").and_then(|v| v.as_f64()).unwrap_or(0.0) as i64,
            });
        }

        Ok(CodebaseSearchResult {
            query: query.to_string(),
            result_count: results.len(),
            results,
        })
    }

    pub async fn codebase_timeline(
        &self,
        project_id: &str,
        file_path: Option<String>,
        limit: Option<usize>,
    ) -> Result<CodebaseTimelineResult> {
        let commits = self
            .graph
            .find_entities_by_type(EntityType::Event)
            .await?
            .into_iter()
            .filter(|e| {
                e.properties.get("project_id").and_then(|v| v.as_str()) == Some(project_id)
            });

        let mut events: Vec<TimelineEvent> = commits
            .filter(|e| {
                file_path
                    .as_ref()
                    .map(|fp| {
                        matches!(e.properties.get("files"), Some(PropertyValue::Array(items))
                            if items.iter().any(|i| i.as_str() == Some(fp.as_str())))
                    })
                    .unwrap_or(true)
            })
            .map(|e| TimelineEvent {
                sha: e
                    .properties
                    .get("sha")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                author: e
                    .properties
                    .get("author")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                message: e
                    .properties
                    .get("message")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string(),
                timestamp: e.event_time,
            })
            .collect();

        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        if let Some(limit) = limit {
            events.truncate(limit);
        }

        Ok(CodebaseTimelineResult {
            project_id: project_id.to_string(),
            file_path,
            event_count: events.len(),
            events,
        })
    }

    pub async fn project_delete(
        &self,
        project_dir: &std::path::Path,
    ) -> Result<ping_mem_ingest::pipeline::DeleteResult> {
        self.ingestion
            .delete(project_dir)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}
