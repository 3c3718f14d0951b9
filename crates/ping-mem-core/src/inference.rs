//! Rule-based relationship inference over a context passage (C7).
//!
//! Given a set of already-extracted entities and the text they came from,
//! scores every ordered pair against a table of regex rules grouped by
//! relationship type, and keeps the strongest, highest-confidence
//! relationships. Pure function of `(entities, context, rules)` — no I/O,
//! no graph access; callers write the survivors through [`crate::graph`].

use regex::Regex;

use crate::graph::{EntityType, RelationshipType};

/// One row of the inference rule table, grouped by the relationship type
/// it produces.
pub struct Rule {
    pub rel_type: RelationshipType,
    pub source_types: Vec<EntityType>,
    pub target_types: Vec<EntityType>,
    pub patterns: Vec<Regex>,
    pub weight: f64,
}

/// An entity candidate the inferencer reasons over — just enough to match
/// rule type constraints and locate the name in `context`.
#[derive(Debug, Clone)]
pub struct CandidateEntity {
    pub name: String,
    pub entity_type: EntityType,
}

/// One inferred relationship, not yet written to the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct InferredRelationship {
    pub source_name: String,
    pub target_name: String,
    pub rel_type: RelationshipType,
    pub weight: f64,
}

#[derive(Debug, Clone)]
pub struct InferenceResult {
    pub relationships: Vec<InferredRelationship>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct InferenceOptions {
    pub max_per_pair: usize,
    pub min_confidence: f64,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            max_per_pair: 3,
            min_confidence: 0.3,
        }
    }
}

/// Default rule table, at least one rule per [`RelationshipType`] variant.
pub fn default_rules() -> Vec<Rule> {
    let code_types = vec![
        EntityType::CodeClass,
        EntityType::CodeFile,
        EntityType::CodeFunction,
    ];
    let any_concrete = vec![
        EntityType::CodeClass,
        EntityType::CodeFile,
        EntityType::CodeFunction,
        EntityType::Task,
        EntityType::Decision,
        EntityType::Concept,
        EntityType::Fact,
        EntityType::Event,
        EntityType::Error,
        EntityType::Person,
        EntityType::Organization,
    ];

    vec![
        Rule {
            rel_type: RelationshipType::DependsOn,
            source_types: code_types.clone(),
            target_types: code_types.clone(),
            patterns: vec![
                Regex::new(r"(?i)depends on").unwrap(),
                Regex::new(r"(?i)requires").unwrap(),
            ],
            weight: 0.8,
        },
        Rule {
            rel_type: RelationshipType::Implements,
            source_types: code_types.clone(),
            target_types: code_types.clone(),
            patterns: vec![
                Regex::new(r"(?i)implements").unwrap(),
                Regex::new(r"(?i)conforms to").unwrap(),
            ],
            weight: 0.8,
        },
        Rule {
            rel_type: RelationshipType::Uses,
            source_types: code_types.clone(),
            target_types: code_types.clone(),
            patterns: vec![
                Regex::new(r"(?i)\buses\b").unwrap(),
                Regex::new(r"(?i)calls").unwrap(),
            ],
            weight: 0.6,
        },
        Rule {
            rel_type: RelationshipType::References,
            source_types: any_concrete.clone(),
            target_types: any_concrete.clone(),
            patterns: vec![Regex::new(r"(?i)references").unwrap(), Regex::new(r"(?i)mentions").unwrap()],
            weight: 0.5,
        },
        Rule {
            rel_type: RelationshipType::Causes,
            source_types: vec![EntityType::Error, EntityType::Event, EntityType::Decision],
            target_types: any_concrete.clone(),
            patterns: vec![Regex::new(r"(?i)causes").unwrap(), Regex::new(r"(?i)leads to").unwrap()],
            weight: 0.7,
        },
        Rule {
            rel_type: RelationshipType::Blocks,
            source_types: vec![EntityType::Task, EntityType::Error],
            target_types: vec![EntityType::Task],
            patterns: vec![Regex::new(r"(?i)blocks").unwrap(), Regex::new(r"(?i)blocked by").unwrap()],
            weight: 0.7,
        },
        Rule {
            rel_type: RelationshipType::RelatedTo,
            source_types: any_concrete.clone(),
            target_types: any_concrete.clone(),
            patterns: vec![Regex::new(r"(?i)related to").unwrap(), Regex::new(r"(?i)associated with").unwrap()],
            weight: 0.4,
        },
        Rule {
            rel_type: RelationshipType::Contains,
            source_types: vec![EntityType::CodeFile, EntityType::Organization],
            target_types: vec![EntityType::CodeClass, EntityType::CodeFunction, EntityType::Person],
            patterns: vec![Regex::new(r"(?i)contains").unwrap(), Regex::new(r"(?i)includes").unwrap()],
            weight: 0.6,
        },
        Rule {
            rel_type: RelationshipType::Follows,
            source_types: vec![EntityType::Event, EntityType::Task, EntityType::Decision],
            target_types: vec![EntityType::Event, EntityType::Task, EntityType::Decision],
            patterns: vec![Regex::new(r"(?i)follows").unwrap(), Regex::new(r"(?i)after").unwrap()],
            weight: 0.5,
        },
        Rule {
            rel_type: RelationshipType::DerivedFrom,
            source_types: any_concrete.clone(),
            target_types: any_concrete,
            patterns: vec![Regex::new(r"(?i)derived from").unwrap(), Regex::new(r"(?i)based on").unwrap()],
            weight: 0.6,
        },
    ]
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn binomial_2(n: usize) -> f64 {
    if n < 2 {
        0.0
    } else {
        (n as f64) * (n as f64 - 1.0) / 2.0
    }
}

/// Infer relationships among `entities` from `context` using `rules`.
pub fn infer_relationships(
    entities: &[CandidateEntity],
    context: &str,
    rules: &[Rule],
    opts: &InferenceOptions,
) -> InferenceResult {
    use std::collections::HashMap;

    // pair key -> rel_type -> best (weight, rule_declaration_index)
    let mut per_pair: HashMap<(usize, usize), HashMap<RelationshipType, (f64, usize)>> =
        HashMap::new();

    for (si, source) in entities.iter().enumerate() {
        for (ti, target) in entities.iter().enumerate() {
            if si == ti {
                continue;
            }
            for (rule_idx, rule) in rules.iter().enumerate() {
                if !rule.source_types.contains(&source.entity_type)
                    || !rule.target_types.contains(&target.entity_type)
                {
                    continue;
                }

                let source_present = contains_ci(context, &source.name);
                let target_present = contains_ci(context, &target.name);
                if !source_present && !target_present {
                    continue;
                }

                let matches = rule
                    .patterns
                    .iter()
                    .filter(|p| p.is_match(context))
                    .count();
                if rule.patterns.is_empty() {
                    continue;
                }
                let proximity_bonus = if source_present && target_present { 0.2 } else { 0.0 };
                let match_score =
                    (matches as f64 / rule.patterns.len() as f64 + proximity_bonus).min(1.0);
                if match_score <= 0.0 {
                    continue;
                }

                let weight = (0.6 * match_score + 0.4 * rule.weight).clamp(0.3, 1.0);

                let entry = per_pair
                    .entry((si, ti))
                    .or_default()
                    .entry(rule.rel_type)
                    .or_insert((0.0, usize::MAX));
                if weight > entry.0 || (weight == entry.0 && rule_idx < entry.1) {
                    *entry = (weight, rule_idx);
                }
            }
        }
    }

    let mut relationships = Vec::new();
    for ((si, ti), by_type) in per_pair {
        let mut per_pair_rels: Vec<(RelationshipType, f64)> =
            by_type.into_iter().map(|(t, (w, _))| (t, w)).collect();
        per_pair_rels.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        per_pair_rels.truncate(opts.max_per_pair);

        for (rel_type, weight) in per_pair_rels {
            if weight < opts.min_confidence {
                continue;
            }
            relationships.push(InferredRelationship {
                source_name: entities[si].name.clone(),
                target_name: entities[ti].name.clone(),
                rel_type,
                weight,
            });
        }
    }

    let n = entities.len();
    let quantity_score = if binomial_2(n) > 0.0 {
        (relationships.len() as f64 / (0.25 * binomial_2(n))).min(1.0)
    } else {
        0.0
    };
    let quality_score = if relationships.is_empty() {
        0.0
    } else {
        relationships.iter().map(|r| r.weight).sum::<f64>() / relationships.len() as f64
    };
    let confidence = (0.4 * quantity_score + 0.6 * quality_score).min(0.95);

    InferenceResult {
        relationships,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn depends_on_scenario_r1() {
        let entities = vec![
            CandidateEntity {
                name: "UserService".to_string(),
                entity_type: EntityType::CodeClass,
            },
            CandidateEntity {
                name: "DatabaseClient".to_string(),
                entity_type: EntityType::CodeClass,
            },
        ];
        let context = "UserService depends on DatabaseClient";
        let rules = default_rules();
        let result = infer_relationships(&entities, context, &rules, &InferenceOptions::default());

        let depends_on: Vec<_> = result
            .relationships
            .iter()
            .filter(|r| r.rel_type == RelationshipType::DependsOn)
            .collect();
        assert_eq!(depends_on.len(), 1);
        assert_eq!(depends_on[0].source_name, "UserService");
        assert_eq!(depends_on[0].target_name, "DatabaseClient");
        assert!(depends_on[0].weight >= 0.5);
    }

    #[test]
    fn no_mention_of_either_name_skips() {
        let entities = vec![
            CandidateEntity {
                name: "Foo".to_string(),
                entity_type: EntityType::CodeClass,
            },
            CandidateEntity {
                name: "Bar".to_string(),
                entity_type: EntityType::CodeClass,
            },
        ];
        let context = "completely unrelated text about cooking";
        let rules = default_rules();
        let result = infer_relationships(&entities, context, &rules, &InferenceOptions::default());
        assert!(result.relationships.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn max_per_pair_truncates() {
        let entities = vec![
            CandidateEntity {
                name: "A".to_string(),
                entity_type: EntityType::CodeClass,
            },
            CandidateEntity {
                name: "B".to_string(),
                entity_type: EntityType::CodeClass,
            },
        ];
        let context = "A depends on B, A uses B, A references B, A related to B, A derived from B";
        let rules = default_rules();
        let opts = InferenceOptions {
            max_per_pair: 2,
            min_confidence: 0.0,
        };
        let result = infer_relationships(&entities, context, &rules, &opts);
        let ab_count = result
            .relationships
            .iter()
            .filter(|r| r.source_name == "A" && r.target_name == "B")
            .count();
        assert!(ab_count <= 2);
    }

    #[test]
    fn min_confidence_filters_weak_relationships() {
        let entities = vec![
            CandidateEntity {
                name: "A".to_string(),
                entity_type: EntityType::CodeClass,
            },
            CandidateEntity {
                name: "B".to_string(),
                entity_type: EntityType::CodeClass,
            },
        ];
        let context = "A is related to B somehow";
        let rules = default_rules();
        let opts = InferenceOptions {
            max_per_pair: 3,
            min_confidence: 0.95,
        };
        let result = infer_relationships(&entities, context, &rules, &opts);
        assert!(result.relationships.is_empty());
    }
}
