//! Ingestion Pipeline (C13): scan, chunk, embed, and upsert a project
//! tree, and the inverse (`verify`, `delete`).
//!
//! Every write is keyed by a content-addressed id (chunk-id, or
//! `(project_id, path)` for file/commit entities via [`GraphStore::merge_entity`]),
//! so re-running `ingest` on unchanged content is a safe no-op and a
//! partially-applied ingest is always safe to retry.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use ping_mem_core::embedding::EmbeddingService;
use ping_mem_core::graph::{EntityType, GraphStore, Relationship, RelationshipType};
use ping_mem_core::property::{Properties, PropertyValue};
use ping_mem_core::vector_store::{VectorRecord, VectorStore};

use crate::chunker::{chunk_file, CodeChunk};
use crate::error::{IngestError, Result};
use crate::scanner::{scan, Manifest};

#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub project_dir: std::path::PathBuf,
    pub force_reingest: bool,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IngestResult {
    pub project_id: String,
    pub tree_hash: String,
    pub files_indexed: usize,
    pub chunks_indexed: usize,
    pub commits_indexed: usize,
    pub ingested_at: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct VerifyResult {
    pub project_id: String,
    pub valid: bool,
    pub manifest_tree_hash: Option<String>,
    pub current_tree_hash: String,
    pub message: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct DeleteResult {
    pub success: bool,
    pub project_id: String,
    pub project_dir: String,
    pub sessions_deleted: usize,
}

struct CommitInfo {
    sha: String,
    author_date: DateTime<Utc>,
    author: String,
    message: String,
    files: Vec<String>,
}

/// Ties the scanner (C11) and chunker (C12) to the vector store (C3) and
/// graph store (C5) it upserts into.
pub struct IngestionPipeline {
    vector_store: Arc<dyn VectorStore>,
    graph: Arc<dyn GraphStore>,
    embedding: Arc<EmbeddingService>,
}

impl IngestionPipeline {
    pub fn new(
        vector_store: Arc<dyn VectorStore>,
        graph: Arc<dyn GraphStore>,
        embedding: Arc<EmbeddingService>,
    ) -> Self {
        Self {
            vector_store,
            graph,
            embedding,
        }
    }

    fn manifest_path(project_dir: &Path) -> std::path::PathBuf {
        project_dir.join(".ping-mem").join("manifest.json")
    }

    fn read_previous_manifest(project_dir: &Path) -> Option<Manifest> {
        let path = Self::manifest_path(project_dir);
        let text = std::fs::read_to_string(path).ok()?;
        serde_json::from_str(&text).ok()
    }

    fn persist_manifest(project_dir: &Path, manifest: &Manifest) -> Result<()> {
        let dir = project_dir.join(".ping-mem");
        std::fs::create_dir_all(&dir)
            .map_err(|e| IngestError::Io(format!("create {}: {e}", dir.display())))?;
        let text = serde_json::to_string(manifest)
            .map_err(|e| IngestError::Io(format!("serialize manifest: {e}")))?;
        std::fs::write(Self::manifest_path(project_dir), text)
            .map_err(|e| IngestError::Io(format!("write manifest: {e}")))
    }

    pub async fn ingest(&self, request: IngestRequest) -> Result<Option<IngestResult>> {
        let project_dir = request
            .project_dir
            .canonicalize()
            .map_err(|e| IngestError::InvalidProjectDir(format!("{}: {e}", request.project_dir.display())))?;

        let manifest = scan(&project_dir)?;
        let previous = Self::read_previous_manifest(&project_dir);

        if !request.force_reingest {
            if let Some(prev) = &previous {
                if prev.tree_hash == manifest.tree_hash {
                    return Ok(None);
                }
            }
        }

        let now = Utc::now();
        let root_path = project_dir.to_string_lossy().to_string();
        let project_entity = self
            .graph
            .merge_entity(
                EntityType::Concept,
                &manifest.project_id,
                props([("kind", "project"), ("root_path", root_path.as_str())]),
                now,
            )
            .await?;

        let mut chunks_indexed = 0usize;

        for file in &manifest.files {
            let abs_path = project_dir.join(&file.path);
            let Ok(content) = std::fs::read_to_string(&abs_path) else {
                tracing::warn!(path = %file.path, "skipping unreadable (likely binary) file");
                continue;
            };

            let file_entity_name = format!("{}:{}", manifest.project_id, file.path);
            let file_entity = self
                .graph
                .merge_entity(
                    EntityType::CodeFile,
                    &file_entity_name,
                    props([
                        ("project_id", manifest.project_id.as_str()),
                        ("path", file.path.as_str()),
                        ("sha256", file.sha256.as_str()),
                    ]),
                    now,
                )
                .await?;
            self.link_contains(&project_entity.id, &file_entity.id)
                .await?;

            for chunk in chunk_file(&content) {
                self.upsert_chunk(&manifest.project_id, &file.path, &file_entity.id, &chunk, now)
                    .await?;
                chunks_indexed += 1;
            }
        }

        let commits = walk_commit_history(&project_dir);
        for commit in &commits {
            let mut properties = props([
                ("project_id", manifest.project_id.as_str()),
                ("sha", commit.sha.as_str()),
                ("author", commit.author.as_str()),
                ("message", commit.message.as_str()),
            ]);
            properties.insert(
                "files".to_string(),
                PropertyValue::Array(commit.files.iter().cloned().map(PropertyValue::from).collect()),
            );
            let commit_entity = self
                .graph
                .merge_entity(
                    EntityType::Event,
                    &format!("{}:commit:{}", manifest.project_id, commit.sha),
                    properties,
                    commit.author_date,
                )
                .await?;
            self.link_contains(&project_entity.id, &commit_entity.id)
                .await?;
        }

        Self::persist_manifest(&project_dir, &manifest)?;

        Ok(Some(IngestResult {
            project_id: manifest.project_id,
            tree_hash: manifest.tree_hash,
            files_indexed: manifest.files.len(),
            chunks_indexed,
            commits_indexed: commits.len(),
            ingested_at: now,
        }))
    }

    /// Link `source_id -> target_id` with a `Contains` relationship,
    /// idempotently. Stamps with a freshly-observed `Utc::now()` rather
    /// than a timestamp captured earlier in the caller, since both
    /// endpoints' `valid_from` are themselves stamped by `merge_entity`
    /// at the moment it runs — a stale caller-side `now` can predate
    /// them and fail the endpoint-existence check.
    async fn link_contains(&self, source_id: &str, target_id: &str) -> Result<()> {
        let rel_id = format!("contains:{source_id}:{target_id}");
        if self.graph.get_relationship(&rel_id).await?.is_some() {
            return Ok(());
        }
        let event_time = Utc::now();
        self.graph
            .create_relationship(Relationship {
                id: rel_id,
                rel_type: RelationshipType::Contains,
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
                properties: Properties::new(),
                weight: 1.0,
                event_time,
                ingestion_time: event_time,
                valid_from: event_time,
                valid_to: None,
                version: 1,
                created_at: event_time,
                updated_at: event_time,
            })
            .await?;
        Ok(())
    }

    async fn upsert_chunk(
        &self,
        project_id: &str,
        file_path: &str,
        file_entity_id: &str,
        chunk: &CodeChunk,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let kind_label = match chunk.kind {
            crate::chunker::ChunkKind::Code => "code",
            crate::chunker::ChunkKind::Comment => "comment",
            crate::chunker::ChunkKind::Docstring => "docstring",
        };

        let mut chunk_props = props([
            ("project_id", project_id),
            ("file_path", file_path),
            ("kind", kind_label),
            ("file_entity_id", file_entity_id),
            ("chunk_id", chunk.chunk_id.as_str()),
        ]);
        chunk_props.insert("content".to_string(), PropertyValue::from(chunk.content.as_str()));

        let chunk_entity = self
            .graph
            .merge_entity(EntityType::CodeFile, &chunk.chunk_id, chunk_props, now)
            .await?;
        self.link_contains(file_entity_id, &chunk_entity.id).await?;

        let vector = self
            .embedding
            .embed(&chunk.content)
            .await
            .map_err(IngestError::Core)?;

        // `content` lives on the chunk's graph entity (above), not here —
        // the vector payload carries only the keys a retrieval join needs.
        let mut metadata = Properties::new();
        metadata.insert("project_id".to_string(), project_id.into());
        metadata.insert("file_path".to_string(), file_path.into());
        metadata.insert("chunk_id".to_string(), chunk.chunk_id.clone().into());
        metadata.insert("type".to_string(), kind_label.into());
        metadata.insert("start".to_string(), (chunk.start as i64).into());
        metadata.insert("end".to_string(), (chunk.end as i64).into());
        metadata.insert("line_start".to_string(), (chunk.line_start as i64).into());
        metadata.insert("line_end".to_string(), (chunk.line_end as i64).into());

        self.vector_store
            .store(VectorRecord {
                memory_id: chunk.chunk_id.clone(),
                session_id: project_id.to_string(),
                content: String::new(),
                category: Some(kind_label.to_string()),
                vector,
                metadata,
                indexed_at: now,
            })
            .await
            .map_err(IngestError::Core)?;
        Ok(())
    }

    pub async fn verify(&self, project_dir: &Path) -> Result<VerifyResult> {
        let canonical = project_dir
            .canonicalize()
            .map_err(|e| IngestError::InvalidProjectDir(format!("{}: {e}", project_dir.display())))?;
        let current = scan(&canonical)?;
        let previous = Self::read_previous_manifest(&canonical);

        let (valid, message) = match &previous {
            Some(prev) if prev.tree_hash == current.tree_hash => {
                (true, "manifest matches current tree".to_string())
            }
            Some(_) => (false, "tree hash differs from manifest".to_string()),
            None => (false, "no manifest on disk".to_string()),
        };

        Ok(VerifyResult {
            project_id: current.project_id.clone(),
            valid,
            manifest_tree_hash: previous.map(|p| p.tree_hash),
            current_tree_hash: current.tree_hash,
            message,
        })
    }

    pub async fn delete(&self, project_dir: &Path) -> Result<DeleteResult> {
        let canonical = project_dir
            .canonicalize()
            .map_err(|e| IngestError::InvalidProjectDir(format!("{}: {e}", project_dir.display())))?;
        let manifest = scan(&canonical)?;
        let project_id = manifest.project_id.clone();

        let sessions_deleted = self
            .vector_store
            .delete_session(&project_id)
            .await
            .map_err(IngestError::Core)?;

        let entities = self
            .graph
            .find_entities_by_property("project_id", &project_id)
            .await
            .map_err(IngestError::Core)?;
        for entity in &entities {
            let rels = self
                .graph
                .find_relationships_by_entity(&entity.id)
                .await
                .map_err(IngestError::Core)?;
            for rel in rels {
                self.graph
                    .delete_relationship(&rel.id)
                    .await
                    .map_err(IngestError::Core)?;
            }
            self.graph.delete_entity(&entity.id).await.map_err(IngestError::Core)?;
        }

        let _ = std::fs::remove_file(Self::manifest_path(&canonical));

        Ok(DeleteResult {
            success: true,
            project_id,
            project_dir: canonical.to_string_lossy().to_string(),
            sessions_deleted,
        })
    }
}

fn props<const N: usize>(pairs: [(&str, &str); N]) -> Properties {
    let mut out = Properties::new();
    for (k, v) in pairs {
        out.insert(k.to_string(), PropertyValue::from(v));
    }
    out
}

/// Sentinel marking the start of a commit record in `git log` output, so
/// the per-commit `--name-only` file list can be told apart from the next
/// commit's header line.
const RECORD_SEP: &str = "\u{1e}";

/// Walk `git log --name-only` for author-dated commits and the files each
/// one touched. Absence of a usable `git` binary or repository is not an
/// error: logs a warning and returns no commits.
fn walk_commit_history(project_dir: &Path) -> Vec<CommitInfo> {
    if !project_dir.join(".git").exists() {
        tracing::warn!(dir = %project_dir.display(), "no .git directory, skipping commit history");
        return Vec::new();
    }

    let output = Command::new("git")
        .args([
            "log",
            "--name-only",
            &format!("--format={RECORD_SEP}%H|%aI|%an|%s"),
        ])
        .current_dir(project_dir)
        .output();

    let output = match output {
        Ok(o) if o.status.success() => o,
        Ok(o) => {
            tracing::warn!(
                status = ?o.status,
                "git log failed, skipping commit history"
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "git binary unavailable, skipping commit history");
            return Vec::new();
        }
    };

    let text = String::from_utf8_lossy(&output.stdout);
    text.split(RECORD_SEP)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let mut lines = record.lines();
            let header = lines.next()?;
            let mut parts = header.splitn(4, '|');
            let sha = parts.next()?.to_string();
            let date_str = parts.next()?;
            let author = parts.next()?.to_string();
            let message = parts.next().unwrap_or("").to_string();
            let author_date = DateTime::parse_from_rfc3339(date_str)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap());
            let files = lines
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            Some(CommitInfo {
                sha,
                author_date,
                author,
                message,
                files,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ping_mem_core::embedding::EmbeddingService;
    use ping_mem_core::graph::InMemoryGraphStore;
    use ping_mem_core::vector_store::InMemoryVectorStore;
    use std::fs;
    use tempfile::TempDir;

    fn pipeline() -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(InMemoryVectorStore::new(64)),
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(EmbeddingService::local(64)),
        )
    }

    #[tokio::test]
    async fn ingestion_idempotency_scenario_i1() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        fs::write(dir.path().join("b.txt"), "world").unwrap();
        let pipeline = pipeline();

        let first = pipeline
            .ingest(IngestRequest {
                project_dir: dir.path().to_path_buf(),
                force_reingest: false,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.files_indexed, 2);

        let second = pipeline
            .ingest(IngestRequest {
                project_dir: dir.path().to_path_buf(),
                force_reingest: false,
            })
            .await
            .unwrap();
        assert!(second.is_none());

        fs::write(dir.path().join("a.txt"), "hello!").unwrap();
        let third = pipeline
            .ingest(IngestRequest {
                project_dir: dir.path().to_path_buf(),
                force_reingest: false,
            })
            .await
            .unwrap()
            .unwrap();
        assert_ne!(third.tree_hash, first.tree_hash);
    }

    #[tokio::test]
    async fn verify_reports_mismatch_after_external_edit() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello").unwrap();
        let pipeline = pipeline();
        pipeline
            .ingest(IngestRequest {
                project_dir: dir.path().to_path_buf(),
                force_reingest: false,
            })
            .await
            .unwrap();

        fs::write(dir.path().join("a.txt"), "changed").unwrap();
        let result = pipeline.verify(dir.path()).await.unwrap();
        assert!(!result.valid);
    }

    #[tokio::test]
    async fn delete_cascades_vectors_and_entities() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let pipeline = pipeline();
        pipeline
            .ingest(IngestRequest {
                project_dir: dir.path().to_path_buf(),
                force_reingest: false,
            })
            .await
            .unwrap();

        let result = pipeline.delete(dir.path()).await.unwrap();
        assert!(result.success);
        assert!(result.sessions_deleted > 0);
    }
}
