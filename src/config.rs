//! Configuration parsing and validation.
//!
//! ping-mem is configured via a TOML file (default: `config/ping-mem.toml`).
//! The config selects the vector/graph store backends, tunes BM25 and the
//! RRF fusion weights, sets lineage/evolution depth caps, and lists the
//! ingestion ignore set.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub vector_store: VectorStoreConfig,
    #[serde(default)]
    pub graph_store: GraphStoreConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub bm25: Bm25Config,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub lineage: LineageConfig,
    #[serde(default)]
    pub evolution: EvolutionConfig,
    #[serde(default)]
    pub ingestion: IngestionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VectorStoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub connection_string: Option<String>,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            connection_string: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GraphStoreConfig {
    #[serde(default = "default_backend")]
    pub backend: String,
    #[serde(default)]
    pub connection_string: Option<String>,
}

impl Default for GraphStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            connection_string: None,
        }
    }
}

fn default_backend() -> String {
    "in-memory".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_dims")]
    pub dims: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            dims: default_dims(),
        }
    }
}

fn default_provider() -> String {
    "local".to_string()
}
fn default_dims() -> usize {
    256
}

impl EmbeddingConfig {
    pub fn is_external(&self) -> bool {
        self.provider == "openai"
    }
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Bm25Config {
    #[serde(default = "default_k1")]
    pub k1: f64,
    #[serde(default = "default_b")]
    pub b: f64,
}

impl Default for Bm25Config {
    fn default() -> Self {
        Self {
            k1: default_k1(),
            b: default_b(),
        }
    }
}

fn default_k1() -> f64 {
    1.5
}
fn default_b() -> f64 {
    0.75
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct SearchConfig {
    #[serde(default = "default_weight_semantic")]
    pub weight_semantic: f64,
    #[serde(default = "default_weight_keyword")]
    pub weight_keyword: f64,
    #[serde(default = "default_weight_graph")]
    pub weight_graph: f64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            weight_semantic: default_weight_semantic(),
            weight_keyword: default_weight_keyword(),
            weight_graph: default_weight_graph(),
            default_limit: default_limit(),
        }
    }
}

fn default_weight_semantic() -> f64 {
    0.5
}
fn default_weight_keyword() -> f64 {
    0.3
}
fn default_weight_graph() -> f64 {
    0.2
}
fn default_limit() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct LineageConfig {
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for LineageConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
        }
    }
}

fn default_max_depth() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct EvolutionConfig {
    #[serde(default = "default_max_timeline_depth")]
    pub max_timeline_depth: usize,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            max_timeline_depth: default_max_timeline_depth(),
        }
    }
}

fn default_max_timeline_depth() -> usize {
    100
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct IngestionConfig {
    #[serde(default)]
    pub extra_ignored_dirs: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, or local.",
            other
        ),
    }
    if config.embedding.is_external() && config.embedding.api_key.is_none() {
        anyhow::bail!("embedding.api_key is required when embedding.provider = 'openai'");
    }

    if !(0.0..=2.0).contains(&config.bm25.b) {
        anyhow::bail!("bm25.b must be in [0.0, 2.0]");
    }
    if config.bm25.k1 < 0.0 {
        anyhow::bail!("bm25.k1 must be >= 0.0");
    }

    let weight_sum =
        config.search.weight_semantic + config.search.weight_keyword + config.search.weight_graph;
    if weight_sum <= 0.0 {
        anyhow::bail!("search weights must sum to a positive value");
    }
    if config.search.default_limit == 0 {
        anyhow::bail!("search.default_limit must be > 0");
    }

    match config.vector_store.backend.as_str() {
        "in-memory" => {}
        other => {
            if config.vector_store.connection_string.is_none() {
                anyhow::bail!(
                    "vector_store.connection_string is required for backend '{}'",
                    other
                );
            }
        }
    }
    match config.graph_store.backend.as_str() {
        "in-memory" => {}
        other => {
            if config.graph_store.connection_string.is_none() {
                anyhow::bail!(
                    "graph_store.connection_string is required for backend '{}'",
                    other
                );
            }
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_toml(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_load_with_empty_file() {
        let file = write_toml("");
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.embedding.provider, "local");
        assert_eq!(config.bm25.k1, 1.5);
    }

    #[test]
    fn openai_provider_without_api_key_is_rejected() {
        let file = write_toml("[embedding]\nprovider = \"openai\"\ndims = 1536\n");
        let err = load_config(file.path());
        assert!(err.is_err());
    }

    #[test]
    fn unknown_embedding_provider_is_rejected() {
        let file = write_toml("[embedding]\nprovider = \"mystery\"\n");
        let err = load_config(file.path());
        assert!(err.is_err());
    }

    #[test]
    fn external_vector_backend_requires_connection_string() {
        let file = write_toml("[vector_store]\nbackend = \"qdrant\"\n");
        let err = load_config(file.path());
        assert!(err.is_err());
    }
}
