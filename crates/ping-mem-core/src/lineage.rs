//! Lineage Engine (C9): ancestor/descendant BFS over the graph store.
//!
//! Both traversals are cycle-safe via a visited set and bounded by a
//! `max_depth` that defaults to "infinite" (in practice: capped at
//! [`DEFAULT_MAX_DEPTH`], the store-defined limit the spec allows for the
//! unbounded case).

use std::collections::{HashSet, VecDeque};

use crate::error::Result;
use crate::graph::GraphStore;

/// Cap applied when the caller asks for unbounded depth.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// BFS over incoming edges: entities that causally precede `seed`,
/// in discovery order, excluding `seed` itself.
pub async fn ancestors(
    graph: &dyn GraphStore,
    seed: &str,
    max_depth: Option<usize>,
) -> Result<Vec<String>> {
    traverse(graph, seed, max_depth, Direction::Incoming).await
}

/// BFS over outgoing edges: entities that causally follow `seed`.
pub async fn descendants(
    graph: &dyn GraphStore,
    seed: &str,
    max_depth: Option<usize>,
) -> Result<Vec<String>> {
    traverse(graph, seed, max_depth, Direction::Outgoing).await
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Direction {
    Incoming,
    Outgoing,
}

async fn traverse(
    graph: &dyn GraphStore,
    seed: &str,
    max_depth: Option<usize>,
    direction: Direction,
) -> Result<Vec<String>> {
    let limit = max_depth.unwrap_or(DEFAULT_MAX_DEPTH).min(DEFAULT_MAX_DEPTH);

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(seed.to_string());
    let mut order = Vec::new();
    let mut queue: VecDeque<(String, usize)> = VecDeque::new();
    queue.push_back((seed.to_string(), 0));

    while let Some((current, depth)) = queue.pop_front() {
        if depth >= limit {
            continue;
        }
        let rels = graph.find_relationships_by_entity(&current).await?;
        for rel in rels {
            let next = match direction {
                Direction::Incoming if rel.target_id == current => Some(rel.source_id.clone()),
                Direction::Outgoing if rel.source_id == current => Some(rel.target_id.clone()),
                _ => None,
            };
            let Some(next_id) = next else { continue };
            if visited.insert(next_id.clone()) {
                order.push(next_id.clone());
                queue.push_back((next_id, depth + 1));
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Entity, EntityType, InMemoryGraphStore, Relationship, RelationshipType};
    use crate::property::Properties;
    use chrono::Utc;

    fn entity(id: &str) -> Entity {
        let now = Utc::now();
        Entity {
            id: id.to_string(),
            entity_type: EntityType::Concept,
            name: id.to_string(),
            properties: Properties::new(),
            event_time: now,
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Relationship {
        let now = Utc::now();
        Relationship {
            id: id.to_string(),
            rel_type: RelationshipType::DependsOn,
            source_id: source.to_string(),
            target_id: target.to_string(),
            properties: Properties::new(),
            weight: 1.0,
            event_time: now,
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }

    async fn chain_store() -> InMemoryGraphStore {
        // a -> b -> c, cycle c -> a to exercise cycle-safety
        let store = InMemoryGraphStore::new();
        store.create_entity(entity("a")).await.unwrap();
        store.create_entity(entity("b")).await.unwrap();
        store.create_entity(entity("c")).await.unwrap();
        store.create_relationship(edge("r1", "a", "b")).await.unwrap();
        store.create_relationship(edge("r2", "b", "c")).await.unwrap();
        store.create_relationship(edge("r3", "c", "a")).await.unwrap();
        store
    }

    #[tokio::test]
    async fn descendants_follow_outgoing_edges() {
        let store = chain_store().await;
        let desc = descendants(&store, "a", None).await.unwrap();
        assert_eq!(desc, vec!["b".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn ancestors_follow_incoming_edges() {
        let store = chain_store().await;
        let anc = ancestors(&store, "b", None).await.unwrap();
        assert_eq!(anc, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn max_depth_limits_traversal() {
        let store = chain_store().await;
        let desc = descendants(&store, "a", Some(1)).await.unwrap();
        assert_eq!(desc, vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn cycle_does_not_revisit_seed() {
        let store = chain_store().await;
        let desc = descendants(&store, "a", None).await.unwrap();
        assert!(!desc.contains(&"a".to_string()));
    }
}
