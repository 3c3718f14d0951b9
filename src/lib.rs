//! # ping-mem
//!
//! **A persistent memory and knowledge service for AI agents.**
//!
//! ping-mem stores what an agent learns as it works — free-text memories,
//! extracted entities and relationships, and deterministic code/commit
//! ingestion — and answers it back through hybrid search, graph traversal,
//! and bi-temporal evolution queries.
//!
//! ## Data Flow
//!
//! 1. [`tools::PingMem::context_save`] writes a memory into BM25 and the
//!    vector store, and optionally runs pattern extraction
//!    (`ping_mem_core::extraction`) to merge entities into the graph.
//! 2. [`tools::PingMem::context_search`] / `context_hybrid_search` fuse
//!    keyword, semantic, and graph-proximity rankings with reciprocal
//!    rank fusion (`ping_mem_core::search`).
//! 3. [`tools::PingMem::codebase_ingest`] walks a project tree and its
//!    git history, producing a deterministic tree-hash manifest
//!    (`ping_mem_ingest::scanner`), content-addressed chunks
//!    (`ping_mem_ingest::chunker`), and graph entities for files, chunks,
//!    and commits.
//! 4. [`tools::PingMem::context_get_lineage`] / `context_query_evolution`
//!    read the bi-temporal version chain (`ping_mem_core::temporal`)
//!    through the lineage and evolution engines.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`openai_embedding`] | Network embedding provider (OpenAI), the app-layer counterpart to the core's local provider |
//! | [`tools`] | The Tool-RPC operations, as typed methods on [`tools::PingMem`] |
//!
//! Everything else — stores, search, extraction, inference, lineage,
//! evolution, temporal versioning, chunking, scanning — lives in the
//! `ping-mem-core` and `ping-mem-ingest` workspace members this crate
//! wires together.
//!
//! ## Configuration
//!
//! ping-mem is configured via a TOML file (default: `config/ping-mem.toml`).
//! See [`config`] for all available options and [`config::load_config`] for
//! validation rules.

pub mod config;
pub mod openai_embedding;
pub mod tools;
