//! Evolution Engine (C10): turns a C8 version chain into a human-facing
//! timeline, and correlates two timelines in time.

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::temporal::{PointInTimeEntity, TemporalStore};

/// Correlation window used by both `includeRelated` attachment and
/// `compareEvolution` pairing.
const CORRELATION_WINDOW_MS: i64 = 3_600_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    Created,
    Updated,
    Deleted,
}

/// A related entity's version observed within the correlation window of a
/// change's timestamp.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RelatedEntityChange {
    pub entity_id: String,
    pub version: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct EntityChange {
    pub version: u32,
    pub change_type: ChangeType,
    pub timestamp: DateTime<Utc>,
    pub previous_state: Option<PointInTimeEntity>,
    pub current_state: Option<PointInTimeEntity>,
    pub related: Vec<RelatedEntityChange>,
}

#[derive(Debug, Clone)]
pub struct Timeline {
    pub entity_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub changes: Vec<EntityChange>,
}

#[derive(Debug, Clone)]
pub struct EvolutionOptions {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub change_types: Option<Vec<ChangeType>>,
    pub max_timeline_depth: usize,
    pub include_related: bool,
    pub max_depth: usize,
}

impl Default for EvolutionOptions {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            change_types: None,
            max_timeline_depth: 100,
            include_related: false,
            max_depth: 1,
        }
    }
}

/// Build the timeline for `id` from its C8 version chain.
pub async fn get_evolution(
    temporal: &TemporalStore,
    id: &str,
    options: &EvolutionOptions,
) -> Result<Timeline> {
    let mut history = temporal.get_entity_history(id).await?;
    if history.is_empty() {
        return Err(Error::NotFound(format!("evolution for entity {id}")));
    }
    // get_entity_history returns newest-first; walk oldest-first.
    history.sort_by(|a, b| a.version.cmp(&b.version));

    let mut changes: Vec<EntityChange> = Vec::with_capacity(history.len());
    for (i, row) in history.iter().enumerate() {
        let (change_type, previous_state, current_state) = if i == 0 {
            (ChangeType::Created, None, Some(PointInTimeEntity::from(row)))
        } else if row.valid_to.is_some() {
            (
                ChangeType::Deleted,
                Some(PointInTimeEntity::from(&history[i - 1])),
                None,
            )
        } else {
            (
                ChangeType::Updated,
                Some(PointInTimeEntity::from(&history[i - 1])),
                Some(PointInTimeEntity::from(row)),
            )
        };
        changes.push(EntityChange {
            version: row.version,
            change_type,
            timestamp: row.valid_from,
            previous_state,
            current_state,
            related: Vec::new(),
        });
    }

    if let Some(start) = options.start_time {
        changes.retain(|c| c.timestamp >= start);
    }
    if let Some(end) = options.end_time {
        changes.retain(|c| c.timestamp <= end);
    }
    if let Some(types) = &options.change_types {
        changes.retain(|c| types.contains(&c.change_type));
    }
    changes.truncate(options.max_timeline_depth);

    if options.include_related {
        let graph = temporal.graph();
        let cap = options.max_depth.saturating_mul(10);
        for change in changes.iter_mut() {
            let neighbors = graph.neighborhood(id).await?;
            let mut related = Vec::new();
            for n in neighbors {
                let neighbor_id = if n.source_id == id {
                    n.target_id.clone()
                } else {
                    n.source_id.clone()
                };
                let neighbor_history = temporal.get_entity_history(&neighbor_id).await?;
                for nv in neighbor_history {
                    let delta = (nv.valid_from - change.timestamp).num_milliseconds().abs();
                    if delta <= CORRELATION_WINDOW_MS {
                        related.push(RelatedEntityChange {
                            entity_id: neighbor_id.clone(),
                            version: nv.version,
                            timestamp: nv.valid_from,
                        });
                        if related.len() >= cap {
                            break;
                        }
                    }
                }
                if related.len() >= cap {
                    break;
                }
            }
            change.related = related;
        }
    }

    let start_time = changes.first().map(|c| c.timestamp).unwrap_or_else(Utc::now);
    let end_time = changes.last().map(|c| c.timestamp).unwrap_or_else(Utc::now);

    Ok(Timeline {
        entity_id: id.to_string(),
        start_time,
        end_time,
        changes,
    })
}

#[derive(Debug, Clone)]
pub struct CorrelatedPair {
    pub change1_version: u32,
    pub change2_version: u32,
    pub delta_ms: i64,
}

#[derive(Debug, Clone)]
pub struct EvolutionComparison {
    pub correlated_pairs: Vec<CorrelatedPair>,
    pub common_related_entities: Vec<String>,
}

/// Correlate two timelines: every change pair within the correlation
/// window, sorted by ascending delta, plus the related-entity-id
/// intersection across both.
pub fn compare_evolution(t1: &Timeline, t2: &Timeline) -> EvolutionComparison {
    let mut pairs = Vec::new();
    for c1 in &t1.changes {
        for c2 in &t2.changes {
            let delta = (c2.timestamp - c1.timestamp).num_milliseconds().abs();
            if delta <= CORRELATION_WINDOW_MS {
                pairs.push(CorrelatedPair {
                    change1_version: c1.version,
                    change2_version: c2.version,
                    delta_ms: delta,
                });
            }
        }
    }
    pairs.sort_by_key(|p| p.delta_ms);

    let related_ids_1: std::collections::HashSet<&str> = t1
        .changes
        .iter()
        .flat_map(|c| c.related.iter().map(|r| r.entity_id.as_str()))
        .collect();
    let related_ids_2: std::collections::HashSet<&str> = t2
        .changes
        .iter()
        .flat_map(|c| c.related.iter().map(|r| r.entity_id.as_str()))
        .collect();
    let mut common: Vec<String> = related_ids_1
        .intersection(&related_ids_2)
        .map(|s| s.to_string())
        .collect();
    common.sort();

    EvolutionComparison {
        correlated_pairs: pairs,
        common_related_entities: common,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EntityType, EntityPatch, InMemoryGraphStore};
    use crate::property::Properties;
    use std::sync::Arc;

    fn ts_at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[tokio::test]
    async fn evolution_walk_created_then_updated() {
        let ts = TemporalStore::new(Arc::new(InMemoryGraphStore::new()));
        ts.store_entity("e1", EntityType::Concept, "X", Properties::new(), Some(ts_at(0)))
            .await
            .unwrap();
        ts.update_entity(
            "e1",
            EntityPatch {
                name: Some("Y".to_string()),
                ..Default::default()
            },
            Some(ts_at(1000)),
        )
        .await
        .unwrap();

        let timeline = get_evolution(&ts, "e1", &EvolutionOptions::default())
            .await
            .unwrap();
        assert_eq!(timeline.changes.len(), 2);
        assert_eq!(timeline.changes[0].change_type, ChangeType::Created);
        assert!(timeline.changes[0].previous_state.is_none());
        assert_eq!(timeline.changes[1].change_type, ChangeType::Updated);
        assert_eq!(
            timeline.changes[1].current_state.as_ref().unwrap().name,
            "Y"
        );
    }

    #[tokio::test]
    async fn unknown_entity_errors() {
        let ts = TemporalStore::new(Arc::new(InMemoryGraphStore::new()));
        let err = get_evolution(&ts, "missing", &EvolutionOptions::default()).await;
        assert!(matches!(err, Err(Error::NotFound(_))));
    }

    #[test]
    fn compare_evolution_scenario_e1() {
        // Entity 1 changes at t=100 (created) and t=200 (updated).
        let t1 = Timeline {
            entity_id: "e1".to_string(),
            start_time: ts_at(100),
            end_time: ts_at(200),
            changes: vec![
                EntityChange {
                    version: 1,
                    change_type: ChangeType::Created,
                    timestamp: ts_at(100),
                    previous_state: None,
                    current_state: None,
                    related: vec![],
                },
                EntityChange {
                    version: 2,
                    change_type: ChangeType::Updated,
                    timestamp: ts_at(200),
                    previous_state: None,
                    current_state: None,
                    related: vec![],
                },
            ],
        };
        // Entity 2 changes at t=150 and t=5000.
        let t2 = Timeline {
            entity_id: "e2".to_string(),
            start_time: ts_at(150),
            end_time: ts_at(5000),
            changes: vec![
                EntityChange {
                    version: 1,
                    change_type: ChangeType::Created,
                    timestamp: ts_at(150),
                    previous_state: None,
                    current_state: None,
                    related: vec![],
                },
                EntityChange {
                    version: 2,
                    change_type: ChangeType::Updated,
                    timestamp: ts_at(5000),
                    previous_state: None,
                    current_state: None,
                    related: vec![],
                },
            ],
        };

        let comparison = compare_evolution(&t1, &t2);
        assert_eq!(comparison.correlated_pairs[0].delta_ms, 50);
        assert_eq!(comparison.correlated_pairs[0].change1_version, 1);
        assert_eq!(comparison.correlated_pairs[0].change2_version, 1);
    }
}
