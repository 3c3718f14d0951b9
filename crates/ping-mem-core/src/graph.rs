//! Bi-temporal graph store (C5): entities, relationships, CRUD, merge,
//! neighborhood queries, and the low-level versioning primitives C8
//! builds its protocol on top of.
//!
//! Entities and relationships are stored as a chain of physical rows per
//! logical id — `entities: id → Vec<Entity>`, ordered by `version` — so
//! that at most one row per id has `valid_to = None` (the current row)
//! while `history()` can still return every past version. [`GraphStore`]
//! exposes both the everyday CRUD surface and the raw `insert_version` /
//! `invalidate_current` / `history` primitives that [`crate::temporal`]
//! (C8) composes into the versioning protocol; nothing below enforces the
//! chain invariants itself; C8 does.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{Error, Result};
use crate::property::Properties;

/// Closed set of entity types (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntityType {
    Person,
    Organization,
    Concept,
    Task,
    Decision,
    Event,
    Fact,
    Error,
    CodeFile,
    CodeFunction,
    CodeClass,
}

/// Closed set of relationship types (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelationshipType {
    DependsOn,
    Implements,
    Uses,
    References,
    Causes,
    Blocks,
    RelatedTo,
    Contains,
    Follows,
    DerivedFrom,
}

/// One version of an entity.
#[derive(Debug, Clone)]
pub struct Entity {
    pub id: String,
    pub entity_type: EntityType,
    pub name: String,
    pub properties: Properties,
    pub event_time: DateTime<Utc>,
    pub ingestion_time: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One version of a relationship.
#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: String,
    pub rel_type: RelationshipType,
    pub source_id: String,
    pub target_id: String,
    pub properties: Properties,
    pub weight: f64,
    pub event_time: DateTime<Utc>,
    pub ingestion_time: DateTime<Utc>,
    pub valid_from: DateTime<Utc>,
    pub valid_to: Option<DateTime<Utc>>,
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A 1-hop `(source, type, target)` triple returned by [`GraphStore::neighborhood`].
#[derive(Debug, Clone)]
pub struct NeighborTriple {
    pub source_id: String,
    pub source_name: String,
    pub rel_type: RelationshipType,
    pub target_id: String,
    pub target_name: String,
    pub weight: f64,
}

/// Labeled property graph with bi-temporal entities and relationships.
#[async_trait]
pub trait GraphStore: Send + Sync {
    // ── Entity CRUD ──────────────────────────────────────────────────
    async fn create_entity(&self, entity: Entity) -> Result<String>;
    async fn get_entity(&self, id: &str) -> Result<Option<Entity>>;
    async fn update_entity_in_place(&self, id: &str, patch: EntityPatch) -> Result<()>;
    async fn delete_entity(&self, id: &str) -> Result<bool>;
    async fn find_entities_by_type(&self, entity_type: EntityType) -> Result<Vec<Entity>>;
    async fn batch_create_entities(&self, entities: Vec<Entity>) -> Result<Vec<String>>;

    /// Current-row entities whose `properties[key] == value` (string
    /// comparison). Used by ingestion's project-scoped cascade delete.
    async fn find_entities_by_property(&self, key: &str, value: &str) -> Result<Vec<Entity>>;

    /// Upsert keyed by `(name, entity_type)` rather than id. On a match,
    /// keeps the existing id, overwrites `properties`, and bumps
    /// `updated_at`/`event_time`/`ingestion_time` in place.
    async fn merge_entity(
        &self,
        entity_type: EntityType,
        name: &str,
        properties: Properties,
        event_time: DateTime<Utc>,
    ) -> Result<Entity>;

    // ── Relationship CRUD ────────────────────────────────────────────
    async fn create_relationship(&self, rel: Relationship) -> Result<String>;
    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>>;
    /// Relationship analogue of [`GraphStore::update_entity_in_place`].
    async fn update_relationship_in_place(&self, id: &str, patch: RelationshipPatch) -> Result<()>;
    async fn delete_relationship(&self, id: &str) -> Result<bool>;
    /// Incoming ∪ outgoing relationships touching `entity_id`.
    async fn find_relationships_by_entity(&self, entity_id: &str) -> Result<Vec<Relationship>>;

    /// 1-hop neighborhood, both directions.
    async fn neighborhood(&self, entity_id: &str) -> Result<Vec<NeighborTriple>>;

    // ── Versioning primitives consumed by C8 ────────────────────────
    async fn insert_entity_version(&self, entity: Entity) -> Result<()>;
    async fn invalidate_entity_current(
        &self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<Option<Entity>>;
    async fn entity_history(&self, id: &str) -> Result<Vec<Entity>>;

    async fn insert_relationship_version(&self, rel: Relationship) -> Result<()>;
    async fn invalidate_relationship_current(
        &self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<Option<Relationship>>;
    async fn relationship_history(&self, id: &str) -> Result<Vec<Relationship>>;

    /// Whether an entity `id` has a version valid at `at` (used to enforce
    /// the relationship endpoint-existence invariant).
    async fn entity_exists_at(&self, id: &str, at: DateTime<Utc>) -> Result<bool>;

    /// Atomically close the current entity row and append the next
    /// version, per the versioning protocol (§4.8): invalidate-then-insert
    /// happen under a single write lock so the chain is never observed
    /// half-updated. Returns `NotFound` if no current row exists.
    async fn update_entity_versioned(
        &self,
        id: &str,
        patch: EntityPatch,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Entity>;

    /// Relationship analogue of [`GraphStore::update_entity_versioned`].
    async fn update_relationship_versioned(
        &self,
        id: &str,
        patch: RelationshipPatch,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Relationship>;
}

/// Patch for [`GraphStore::update_entity_in_place`] (non-versioned mode)
/// and for [`GraphStore::update_entity_versioned`].
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub name: Option<String>,
    pub properties: Option<Properties>,
    pub event_time: Option<DateTime<Utc>>,
}

/// Patch for [`GraphStore::update_relationship_versioned`].
#[derive(Debug, Clone, Default)]
pub struct RelationshipPatch {
    pub properties: Option<Properties>,
    pub weight: Option<f64>,
}

struct Storage {
    entities: HashMap<String, Vec<Entity>>,
    relationships: HashMap<String, Vec<Relationship>>,
}

/// In-memory labeled property graph.
pub struct InMemoryGraphStore {
    inner: RwLock<Storage>,
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Storage {
                entities: HashMap::new(),
                relationships: HashMap::new(),
            }),
        }
    }
}

fn current_version<'a>(versions: &'a [Entity]) -> Option<&'a Entity> {
    versions.iter().find(|e| e.valid_to.is_none())
}

fn current_rel_version(versions: &[Relationship]) -> Option<&Relationship> {
    versions.iter().find(|r| r.valid_to.is_none())
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn create_entity(&self, entity: Entity) -> Result<String> {
        let mut storage = self.inner.write().unwrap();
        let id = entity.id.clone();
        storage.entities.entry(id.clone()).or_default().push(entity);
        Ok(id)
    }

    async fn get_entity(&self, id: &str) -> Result<Option<Entity>> {
        let storage = self.inner.read().unwrap();
        Ok(storage
            .entities
            .get(id)
            .and_then(|v| current_version(v))
            .cloned())
    }

    async fn update_entity_in_place(&self, id: &str, patch: EntityPatch) -> Result<()> {
        let mut storage = self.inner.write().unwrap();
        let versions = storage
            .entities
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;
        let now = Utc::now();
        let entry = versions
            .iter_mut()
            .find(|e| e.valid_to.is_none())
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;
        if let Some(name) = patch.name {
            entry.name = name;
        }
        if let Some(props) = patch.properties {
            entry.properties = props;
        }
        if let Some(et) = patch.event_time {
            entry.event_time = et;
        }
        entry.updated_at = now;
        Ok(())
    }

    async fn delete_entity(&self, id: &str) -> Result<bool> {
        let mut storage = self.inner.write().unwrap();
        Ok(storage.entities.remove(id).is_some())
    }

    async fn find_entities_by_type(&self, entity_type: EntityType) -> Result<Vec<Entity>> {
        let storage = self.inner.read().unwrap();
        Ok(storage
            .entities
            .values()
            .filter_map(|v| current_version(v))
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect())
    }

    async fn batch_create_entities(&self, entities: Vec<Entity>) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(entities.len());
        for e in entities {
            ids.push(self.create_entity(e).await?);
        }
        Ok(ids)
    }

    async fn find_entities_by_property(&self, key: &str, value: &str) -> Result<Vec<Entity>> {
        let storage = self.inner.read().unwrap();
        Ok(storage
            .entities
            .values()
            .filter_map(|v| current_version(v))
            .filter(|e| e.properties.get(key).and_then(|p| p.as_str()) == Some(value))
            .cloned()
            .collect())
    }

    async fn merge_entity(
        &self,
        entity_type: EntityType,
        name: &str,
        properties: Properties,
        event_time: DateTime<Utc>,
    ) -> Result<Entity> {
        let mut storage = self.inner.write().unwrap();
        let now = Utc::now();

        let existing_id = storage.entities.iter().find_map(|(id, versions)| {
            current_version(versions).and_then(|e| {
                if e.entity_type == entity_type && e.name == name {
                    Some(id.clone())
                } else {
                    None
                }
            })
        });

        if let Some(id) = existing_id {
            let versions = storage.entities.get_mut(&id).unwrap();
            let entry = versions.iter_mut().find(|e| e.valid_to.is_none()).unwrap();
            entry.properties = properties;
            entry.event_time = event_time;
            entry.ingestion_time = now;
            entry.updated_at = now;
            return Ok(entry.clone());
        }

        let id = uuid::Uuid::new_v4().to_string();
        let entity = Entity {
            id: id.clone(),
            entity_type,
            name: name.to_string(),
            properties,
            event_time,
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        storage.entities.insert(id, vec![entity.clone()]);
        Ok(entity)
    }

    async fn create_relationship(&self, rel: Relationship) -> Result<String> {
        let source_ok = self.entity_exists_at(&rel.source_id, rel.event_time).await?;
        let target_ok = self.entity_exists_at(&rel.target_id, rel.event_time).await?;
        if !source_ok || !target_ok {
            return Err(Error::InvalidArgument(format!(
                "relationship endpoints must exist at event_time: source={} target={}",
                rel.source_id, rel.target_id
            )));
        }
        let mut storage = self.inner.write().unwrap();
        let id = rel.id.clone();
        storage
            .relationships
            .entry(id.clone())
            .or_default()
            .push(rel);
        Ok(id)
    }

    async fn get_relationship(&self, id: &str) -> Result<Option<Relationship>> {
        let storage = self.inner.read().unwrap();
        Ok(storage
            .relationships
            .get(id)
            .and_then(|v| current_rel_version(v))
            .cloned())
    }

    async fn update_relationship_in_place(&self, id: &str, patch: RelationshipPatch) -> Result<()> {
        let mut storage = self.inner.write().unwrap();
        let versions = storage
            .relationships
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        let now = Utc::now();
        let entry = versions
            .iter_mut()
            .find(|r| r.valid_to.is_none())
            .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        if let Some(props) = patch.properties {
            entry.properties = props;
        }
        if let Some(weight) = patch.weight {
            entry.weight = weight;
        }
        entry.updated_at = now;
        Ok(())
    }

    async fn delete_relationship(&self, id: &str) -> Result<bool> {
        let mut storage = self.inner.write().unwrap();
        Ok(storage.relationships.remove(id).is_some())
    }

    async fn find_relationships_by_entity(&self, entity_id: &str) -> Result<Vec<Relationship>> {
        let storage = self.inner.read().unwrap();
        Ok(storage
            .relationships
            .values()
            .filter_map(|v| current_rel_version(v))
            .filter(|r| r.source_id == entity_id || r.target_id == entity_id)
            .cloned()
            .collect())
    }

    async fn neighborhood(&self, entity_id: &str) -> Result<Vec<NeighborTriple>> {
        let storage = self.inner.read().unwrap();
        let name_of = |id: &str| -> Option<String> {
            storage
                .entities
                .get(id)
                .and_then(|v| current_version(v))
                .map(|e| e.name.clone())
        };

        let mut triples = Vec::new();
        for versions in storage.relationships.values() {
            let Some(rel) = current_rel_version(versions) else {
                continue;
            };
            if rel.source_id != entity_id && rel.target_id != entity_id {
                continue;
            }
            let (Some(source_name), Some(target_name)) =
                (name_of(&rel.source_id), name_of(&rel.target_id))
            else {
                continue;
            };
            triples.push(NeighborTriple {
                source_id: rel.source_id.clone(),
                source_name,
                rel_type: rel.rel_type,
                target_id: rel.target_id.clone(),
                target_name,
                weight: rel.weight,
            });
        }
        Ok(triples)
    }

    async fn insert_entity_version(&self, entity: Entity) -> Result<()> {
        let mut storage = self.inner.write().unwrap();
        storage
            .entities
            .entry(entity.id.clone())
            .or_default()
            .push(entity);
        Ok(())
    }

    async fn invalidate_entity_current(
        &self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<Option<Entity>> {
        let mut storage = self.inner.write().unwrap();
        let Some(versions) = storage.entities.get_mut(id) else {
            return Ok(None);
        };
        if let Some(entry) = versions.iter_mut().find(|e| e.valid_to.is_none()) {
            entry.valid_to = Some(valid_to);
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn entity_history(&self, id: &str) -> Result<Vec<Entity>> {
        let storage = self.inner.read().unwrap();
        let mut versions = storage.entities.get(id).cloned().unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn insert_relationship_version(&self, rel: Relationship) -> Result<()> {
        let mut storage = self.inner.write().unwrap();
        storage
            .relationships
            .entry(rel.id.clone())
            .or_default()
            .push(rel);
        Ok(())
    }

    async fn invalidate_relationship_current(
        &self,
        id: &str,
        valid_to: DateTime<Utc>,
    ) -> Result<Option<Relationship>> {
        let mut storage = self.inner.write().unwrap();
        let Some(versions) = storage.relationships.get_mut(id) else {
            return Ok(None);
        };
        if let Some(entry) = versions.iter_mut().find(|r| r.valid_to.is_none()) {
            entry.valid_to = Some(valid_to);
            return Ok(Some(entry.clone()));
        }
        Ok(None)
    }

    async fn relationship_history(&self, id: &str) -> Result<Vec<Relationship>> {
        let storage = self.inner.read().unwrap();
        let mut versions = storage.relationships.get(id).cloned().unwrap_or_default();
        versions.sort_by(|a, b| b.version.cmp(&a.version));
        Ok(versions)
    }

    async fn entity_exists_at(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let storage = self.inner.read().unwrap();
        Ok(storage
            .entities
            .get(id)
            .map(|versions| {
                versions
                    .iter()
                    .any(|e| e.valid_from <= at && e.valid_to.map(|vt| at < vt).unwrap_or(true))
            })
            .unwrap_or(false))
    }

    async fn update_entity_versioned(
        &self,
        id: &str,
        patch: EntityPatch,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Entity> {
        let mut storage = self.inner.write().unwrap();
        let now = Utc::now();
        let versions = storage
            .entities
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;
        let current_idx = versions
            .iter()
            .position(|e| e.valid_to.is_none())
            .ok_or_else(|| Error::NotFound(format!("entity {id}")))?;

        let current = versions[current_idx].clone();
        versions[current_idx].valid_to = Some(now);

        let next = Entity {
            id: id.to_string(),
            entity_type: current.entity_type,
            name: patch.name.unwrap_or(current.name),
            properties: patch.properties.unwrap_or(current.properties),
            event_time: event_time.unwrap_or(now),
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: current.version + 1,
            created_at: current.created_at,
            updated_at: now,
        };
        versions.push(next.clone());
        Ok(next)
    }

    async fn update_relationship_versioned(
        &self,
        id: &str,
        patch: RelationshipPatch,
        event_time: Option<DateTime<Utc>>,
    ) -> Result<Relationship> {
        let mut storage = self.inner.write().unwrap();
        let now = Utc::now();
        let versions = storage
            .relationships
            .get_mut(id)
            .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;
        let current_idx = versions
            .iter()
            .position(|r| r.valid_to.is_none())
            .ok_or_else(|| Error::NotFound(format!("relationship {id}")))?;

        let current = versions[current_idx].clone();
        versions[current_idx].valid_to = Some(now);

        let next = Relationship {
            id: id.to_string(),
            rel_type: current.rel_type,
            source_id: current.source_id,
            target_id: current.target_id,
            properties: patch.properties.unwrap_or(current.properties),
            weight: patch.weight.unwrap_or(current.weight),
            event_time: event_time.unwrap_or(now),
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: current.version + 1,
            created_at: current.created_at,
            updated_at: now,
        };
        versions.push(next.clone());
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_entity(id: &str, name: &str) -> Entity {
        let now = Utc::now();
        Entity {
            id: id.to_string(),
            entity_type: EntityType::Concept,
            name: name.to_string(),
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

    #[tokio::test]
    async fn merge_creates_then_updates_in_place() {
        let store = InMemoryGraphStore::new();
        let mut props = Properties::new();
        props.insert("k".to_string(), "v1".into());
        let created = store
            .merge_entity(EntityType::Concept, "X", props, Utc::now())
            .await
            .unwrap();

        let mut props2 = Properties::new();
        props2.insert("k".to_string(), "v2".into());
        let merged = store
            .merge_entity(EntityType::Concept, "X", props2, Utc::now())
            .await
            .unwrap();

        assert_eq!(created.id, merged.id);
        assert_eq!(merged.properties.get("k").unwrap().as_str(), Some("v2"));
    }

    #[tokio::test]
    async fn relationship_requires_existing_endpoints() {
        let store = InMemoryGraphStore::new();
        let now = Utc::now();
        let rel = Relationship {
            id: "r1".to_string(),
            rel_type: RelationshipType::DependsOn,
            source_id: "missing-a".to_string(),
            target_id: "missing-b".to_string(),
            properties: Properties::new(),
            weight: 0.5,
            event_time: now,
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        let err = store.create_relationship(rel).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn relationship_created_when_endpoints_exist() {
        let store = InMemoryGraphStore::new();
        store.create_entity(make_entity("a", "A")).await.unwrap();
        store.create_entity(make_entity("b", "B")).await.unwrap();

        let now = Utc::now();
        let rel = Relationship {
            id: "r1".to_string(),
            rel_type: RelationshipType::DependsOn,
            source_id: "a".to_string(),
            target_id: "b".to_string(),
            properties: Properties::new(),
            weight: 0.8,
            event_time: now,
            ingestion_time: now,
            valid_from: now,
            valid_to: None,
            version: 1,
            created_at: now,
            updated_at: now,
        };
        store.create_relationship(rel).await.unwrap();

        let neighbors = store.neighborhood("a").await.unwrap();
        assert_eq!(neighbors.len(), 1);
        assert_eq!(neighbors[0].target_name, "B");
    }

    #[tokio::test]
    async fn delete_entity_removes_full_history() {
        let store = InMemoryGraphStore::new();
        store.create_entity(make_entity("a", "A")).await.unwrap();
        assert!(store.delete_entity("a").await.unwrap());
        assert!(store.get_entity("a").await.unwrap().is_none());
    }
}
