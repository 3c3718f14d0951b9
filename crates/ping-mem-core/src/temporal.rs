//! Temporal Store (C8): the versioning protocol layered on top of
//! [`crate::graph::GraphStore`] (C5).
//!
//! `GraphStore` already stores entities and relationships as a per-id
//! chain of physical rows; this module is the thin façade that walks that
//! chain correctly — closing the current row and appending the next
//! version as one atomic unit, serving point-in-time reads, and stripping
//! bi-temporal bookkeeping fields from the public view.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::graph::{
    Entity, EntityPatch, EntityType, GraphStore, Relationship, RelationshipPatch,
    RelationshipType,
};
use crate::property::Properties;

/// An entity as read at a point in time, with bi-temporal bookkeeping
/// fields stripped (§4.8 `getEntityAtTime`).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PointInTimeEntity {
    pub id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub properties: Properties,
}

impl From<&Entity> for PointInTimeEntity {
    fn from(e: &Entity) -> Self {
        Self {
            id: e.id.clone(),
            entity_type: e.entity_type,
            name: e.name.clone(),
            properties: e.properties.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointInTimeRelationship {
    pub id: String,
    pub rel_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    pub properties: Properties,
    pub weight: f64,
}

impl From<&Relationship> for PointInTimeRelationship {
    fn from(r: &Relationship) -> Self {
        Self {
            id: r.id.clone(),
            rel_type: r.rel_type,
            source_id: r.source_id.clone(),
            target_id: r.target_id.clone(),
            properties: r.properties.clone(),
            weight: r.weight,
        }
    }
}

/// Façade over a [`GraphStore`] enforcing the bi-temporal versioning
/// protocol. `versioning = false` degrades `update_entity`/
/// `update_relationship` to an in-place patch of the current row, with no
/// new version appended — the mode the spec calls "versioning OFF".
pub struct TemporalStore {
    graph: Arc<dyn GraphStore>,
    versioning: bool,
}

impl TemporalStore {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self {
            graph,
            versioning: true,
        }
    }

    pub fn with_versioning(graph: Arc<dyn GraphStore>, versioning: bool) -> Self {
        Self { graph, versioning }
    }

    /// Direct access to the underlying graph store, for callers (C9, C10)
    /// that need neighborhood queries the versioning façade doesn't expose.
    pub fn graph(&self) -> &Arc<dyn GraphStore> {
        &self.graph
    }

    /// Write a brand-new entity: `version = 1`, `valid_from = now`,
    /// `valid_to = None`.
    pub async fn store_entity(
        &self,
        id: &str,
        entity_type: EntityType,
        name: &str,
        properties: Properties,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Entity> {
        let now = Utc::now();
        let entity = Entity {
            id: id.to_string(),
            entity_type,
            name: name.to_string(),
            properties,
            event_time: event_time.unwrap_or(now),
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.graph.insert_entity_version(entity.clone()).await?;
        Ok(entity)
    }

    /// `versioning == true`: atomically close the current row and append
    /// the next version. `versioning == false`: patch the current row
    /// in place, no new version.
    pub async fn update_entity(
        &self,
        id: &str,
        patch: EntityPatch,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Entity> {
        if self.versioning {
            self.graph
                .update_entity_versioned(id, patch, event_time)
                .await
        } else {
            self.graph.update_entity_in_place(id, patch).await?;
            self.graph
                .get_entity(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("entity {id}")))
        }
    }

    pub async fn invalidate_entity(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        self.graph
            .invalidate_entity_current(id, now)
            .await?
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;
        Ok(())
    }

    /// Select the row where `valid_from <= as_of < (valid_to ?? +inf)`
    /// and `event_time <= as_of`, choosing the max version.
    pub async fn get_entity_at_time(
        &self,
        id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Option<PointInTimeEntity>> {
        let history = self.graph.entity_history(id).await?;
        let best = history
            .iter()
            .filter(|e| {
                e.valid_from <= as_of
                    && e.valid_to.map(|vt| as_of < vt).unwrap_or(true)
                    && e.event_time <= as_of
            })
            .max_by_key(|e| e.version);
        Ok(best.map(PointInTimeEntity::from))
    }

    /// All versions, ordered by `version` descending.
    pub async fn get_entity_history(&self, id: &str) -> Result<Vec<Entity>> {
        self.graph.entity_history(id).await
    }

    pub async fn store_relationship(
        &self,
        id: &str,
        rel_type: RelationshipType,
        source_id: &str,
        target_id: &str,
        weight: f64,
        properties: Properties,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Relationship> {
        let now = Utc::now();
        let effective_event_time = event_time.unwrap_or(now);
        let source_ok = self
            .graph
            .entity_exists_at(source_id, effective_event_time)
            .await?;
        let target_ok = self
            .graph
            .entity_exists_at(target_id, effective_event_time)
            .await?;
        if !source_ok || !target_ok {
            return Err(Error::InvalidArgument(format!(
                "relationship endpoints must exist at event_time: source={source_id} target={target_id}"
            )));
        }

        let rel = Relationship {
            id: id.to_string(),
            rel_type,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            properties,
            weight,
            event_time: effective_event_time,
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        self.graph.insert_relationship_version(rel.clone()).await?;
        Ok(rel)
    }

    pub async fn update_relationship(
        &self,
        id: &str,
        patch: RelationshipPatch,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Relationship> {
        if self.versioning {
            self.graph
                .update_relationship_versioned(id, patch, event_time)
                .await
        } else {
            self.graph.update_relationship_in_place(id, patch).await?;
            self.graph
                .get_relationship(id)
                .await?
                .ok_or_else(|| Error::NotFound(format!("relationship {id}")))
        }
    }

    pub async fn invalidate_relationship(&self, id: &str) -> Result<()> {
        let now = Utc::now();
        self.graph
            .invalidate_relationship_current(id, now)
            .await?
            .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        Ok(())
    }

    pub async fn get_relationship_at_time(
        &self,
        id: &str,
        as_of: DateTime<Utc>,
    ) -> Result<Option<PointInTimeRelationship>> {
        let history = self.graph.relationship_history(id).await?;
        let best = history
            .iter()
            .filter(|r| {
                r.valid_from <= as_of
                    && r.valid_to.map(|vt| as_of < vt).unwrap_or(true)
                    && r.event_time <= as_of
            })
            .max_by_key(|r| r.version);
        Ok(best.map(PointInTimeRelationship::from))
    }

    pub async fn get_relationship_history(&self, id: &str) -> Result<Vec<Relationship>> {
        self.graph.relationship_history(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryGraphStore;

    fn store() -> TemporalStore {
        TemporalStore::new(Arc::new(InMemoryGraphStore::new()))
    }

    #[tokio::test]
    async fn versioning_invariant_scenario_g1() {
        let ts = store();
        ts.store_entity("e1", EntityType::Concept, "X", Properties::new(), None)
            .await
            .unwrap();
        let t0 = Utc::now();

        ts.update_entity(
            "e1",
            EntityPatch {
                name: Some("Y".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        ts.update_entity(
            "e1",
            EntityPatch {
                name: Some("Z".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();

        let history = ts.get_entity_history("e1").await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].version, 3);
        assert_eq!(history[1].version, 2);
        assert_eq!(history[2].version, 1);

        let current_rows: Vec<_> = history.iter().filter(|e| e.valid_to.is_none()).collect();
        assert_eq!(current_rows.len(), 1);
        assert_eq!(current_rows[0].version, 3);
        assert_eq!(current_rows[0].name, "Z");

        let at_t0 = ts.get_entity_at_time("e1", t0).await.unwrap().unwrap();
        assert_eq!(at_t0.name, "X");
    }

    #[tokio::test]
    async fn invalidate_then_missing_at_later_time() {
        let ts = store();
        ts.store_entity("e1", EntityType::Concept, "X", Properties::new(), None)
            .await
            .unwrap();
        ts.invalidate_entity("e1").await.unwrap();
        let after = Utc::now() + chrono::Duration::seconds(1);
        assert!(ts.get_entity_at_time("e1", after).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_missing_entity_is_not_found() {
        let ts = store();
        let err = ts
            .update_entity("nope", EntityPatch::default(), None)
            .await;
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn non_versioning_mode_patches_in_place() {
        let ts = TemporalStore::with_versioning(Arc::new(InMemoryGraphStore::new()), false);
        ts.store_entity("e1", EntityType::Concept, "X", Properties::new(), None)
            .await
            .unwrap();
        ts.update_entity(
            "e1",
            EntityPatch {
                name: Some("Y".to_string()),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        let history = ts.get_entity_history("e1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].name, "Y");
    }

    #[tokio::test]
    async fn non_versioning_mode_patches_relationship_in_place() {
        let ts = TemporalStore::with_versioning(Arc::new(InMemoryGraphStore::new()), false);
        ts.store_entity("e1", EntityType::Concept, "X", Properties::new(), None)
            .await
            .unwrap();
        ts.store_entity("e2", EntityType::Concept, "Y", Properties::new(), None)
            .await
            .unwrap();
        ts.store_relationship(
            "r1",
            RelationshipType::RelatedTo,
            "e1",
            "e2",
            1.0,
            Properties::new(),
            None,
        )
        .await
        .unwrap();
        ts.update_relationship(
            "r1",
            RelationshipPatch {
                weight: Some(2.0),
                ..Default::default()
            },
            None,
        )
        .await
        .unwrap();
        let history = ts.get_relationship_history("r1").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].weight, 2.0);
        assert_eq!(history[0].version, 1);
    }
}
