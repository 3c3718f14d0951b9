//! # ping-mem
//!
//! A persistent memory and knowledge service for AI agents: hybrid
//! search over saved memories, a bi-temporal knowledge graph, and
//! deterministic codebase ingestion.
//!
//! This binary (`pingmem`) exposes the Tool-RPC operations of
//! [`ping_mem::tools::PingMem`] as subcommands, for local use and
//! scripting. It is not the RPC transport itself — see [`ping_mem::tools`].

use std::path::PathBuf;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use ping_mem::config;
use ping_mem::tools::{ContextSaveRequest, Direction, LineageDirection, PingMem};
use ping_mem_core::graph::RelationshipType;
use ping_mem_core::search::SearchWeights;

#[derive(Parser)]
#[command(
    name = "pingmem",
    about = "ping-mem — persistent memory and knowledge service for AI agents",
    version
)]
struct Cli {
    /// Path to configuration file
    #[arg(long, global = true, default_value = "./config/ping-mem.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Save a memory, optionally extracting entities into the graph
    Save {
        key: String,
        value: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long)]
        metadata: Option<String>,
        #[arg(long)]
        extract_entities: bool,
    },

    /// Keyword + semantic search over saved memories
    Search {
        query: String,
        #[arg(long)]
        min_similarity: Option<f64>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Reciprocal-rank-fused search across keyword, semantic, and graph modes
    HybridSearch {
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long)]
        session_id: Option<String>,
        #[arg(long)]
        weight_semantic: Option<f64>,
        #[arg(long)]
        weight_keyword: Option<f64>,
        #[arg(long)]
        weight_graph: Option<f64>,
    },

    /// Traverse relationships around an entity
    Relationships {
        entity_id: String,
        #[arg(long, default_value_t = 1)]
        depth: usize,
        #[arg(long, default_value = "both")]
        direction: String,
        /// Comma-separated relationship types, e.g. depends-on,implements
        #[arg(long)]
        types: Option<String>,
    },

    /// Ancestor/descendant lineage of an entity
    Lineage {
        entity_id: String,
        #[arg(long, default_value = "both")]
        direction: String,
        #[arg(long)]
        max_depth: Option<usize>,
    },

    /// Version-chain timeline of an entity
    Evolution {
        entity_id: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },

    /// Scan a project, chunk its code, and index its commit history
    Ingest {
        project_dir: PathBuf,
        #[arg(long)]
        force: bool,
    },

    /// Check a previously ingested project for drift
    Verify { project_dir: PathBuf },

    /// Semantic search over ingested code chunks
    CodebaseSearch {
        query: String,
        #[arg(long)]
        project_id: Option<String>,
        #[arg(long)]
        file_path: Option<String>,
        #[arg(long)]
        chunk_type: Option<String>,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Commit timeline for an ingested project
    Timeline {
        project_id: String,
        #[arg(long)]
        file_path: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Remove a project's ingested vectors, entities, and manifest
    Delete { project_dir: PathBuf },
}

fn parse_direction(s: &str) -> Result<Direction> {
    match s {
        "incoming" => Ok(Direction::Incoming),
        "outgoing" => Ok(Direction::Outgoing),
        "both" => Ok(Direction::Both),
        other => bail!("unknown direction '{other}', expected incoming, outgoing, or both"),
    }
}

fn parse_lineage_direction(s: &str) -> Result<LineageDirection> {
    match s {
        "upstream" => Ok(LineageDirection::Upstream),
        "downstream" => Ok(LineageDirection::Downstream),
        "both" => Ok(LineageDirection::Both),
        other => bail!("unknown direction '{other}', expected upstream, downstream, or both"),
    }
}

fn parse_relationship_type(s: &str) -> Result<RelationshipType> {
    Ok(match s {
        "depends-on" => RelationshipType::DependsOn,
        "implements" => RelationshipType::Implements,
        "uses" => RelationshipType::Uses,
        "references" => RelationshipType::References,
        "causes" => RelationshipType::Causes,
        "blocks" => RelationshipType::Blocks,
        "related-to" => RelationshipType::RelatedTo,
        "contains" => RelationshipType::Contains,
        "follows" => RelationshipType::Follows,
        "derived-from" => RelationshipType::DerivedFrom,
        other => bail!("unknown relationship type '{other}'"),
    })
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ping_mem=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let ping_mem = PingMem::new(cfg)?;

    match cli.command {
        Commands::Save {
            key,
            value,
            category,
            priority,
            channel,
            metadata,
            extract_entities,
        } => {
            let metadata = metadata
                .map(|raw| serde_json::from_str(&raw))
                .transpose()?;
            let result = ping_mem
                .context_save(ContextSaveRequest {
                    key,
                    value,
                    category,
                    priority,
                    channel,
                    metadata,
                    extract_entities,
                })
                .await?;
            print_json(&result)?;
        }
        Commands::Search {
            query,
            min_similarity,
            category,
            channel,
            limit,
        } => {
            let result = ping_mem
                .context_search(&query, min_similarity, category, channel, Some(limit))
                .await?;
            print_json(&result)?;
        }
        Commands::HybridSearch {
            query,
            limit,
            session_id,
            weight_semantic,
            weight_keyword,
            weight_graph,
        } => {
            let weights = if weight_semantic.is_some() || weight_keyword.is_some() || weight_graph.is_some() {
                let defaults = SearchWeights::default();
                Some(SearchWeights {
                    semantic: weight_semantic.unwrap_or(defaults.semantic),
                    keyword: weight_keyword.unwrap_or(defaults.keyword),
                    graph: weight_graph.unwrap_or(defaults.graph),
                })
            } else {
                None
            };
            let result = ping_mem
                .context_hybrid_search(&query, Some(limit), weights, session_id)
                .await?;
            print_json(&result)?;
        }
        Commands::Relationships {
            entity_id,
            depth,
            direction,
            types,
        } => {
            let direction = parse_direction(&direction)?;
            let types = types
                .map(|raw| {
                    raw.split(',')
                        .map(|t| parse_relationship_type(t.trim()))
                        .collect::<Result<Vec<_>>>()
                })
                .transpose()?;
            let result = ping_mem
                .context_query_relationships(&entity_id, Some(depth), types, direction)
                .await?;
            print_json(&result)?;
        }
        Commands::Lineage {
            entity_id,
            direction,
            max_depth,
        } => {
            let direction = parse_lineage_direction(&direction)?;
            let result = ping_mem
                .context_get_lineage(&entity_id, direction, max_depth)
                .await?;
            print_json(&result)?;
        }
        Commands::Evolution {
            entity_id,
            start,
            end,
        } => {
            let start_time = start
                .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
                .transpose()?;
            let end_time = end
                .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
                .transpose()?;
            let result = ping_mem
                .context_query_evolution(&entity_id, start_time, end_time)
                .await?;
            print_json(&result)?;
        }
        Commands::Ingest { project_dir, force } => {
            let result = ping_mem.codebase_ingest(project_dir, force).await?;
            match result {
                Some(result) => print_json(&result)?,
                None => println!("Project unchanged since last ingest; skipped."),
            }
        }
        Commands::Verify { project_dir } => {
            let result = ping_mem.codebase_verify(&project_dir).await?;
            print_json(&result)?;
        }
        Commands::CodebaseSearch {
            query,
            project_id,
            file_path,
            chunk_type,
            limit,
        } => {
            let result = ping_mem
                .codebase_search(&query, project_id, file_path, chunk_type, Some(limit))
                .await?;
            print_json(&result)?;
        }
        Commands::Timeline {
            project_id,
            file_path,
            limit,
        } => {
            let result = ping_mem
                .codebase_timeline(&project_id, file_path, limit)
                .await?;
            print_json(&result)?;
        }
        Commands::Delete { project_dir } => {
            let result = ping_mem.project_delete(&project_dir).await?;
            print_json(&result)?;
        }
    }

    Ok(())
}
