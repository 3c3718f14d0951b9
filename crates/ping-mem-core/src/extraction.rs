//! Pattern-driven entity extraction from stored context (C6).
//!
//! Turns a `(key, value, category)` tuple written through the memory API
//! into zero or more candidate [`Entity`](crate::graph::Entity) drafts,
//! using a small fixed table of regexes keyed by entity type. This is
//! intentionally shallow — no NLP, no model call — mirroring the rest of
//! the crate's preference for deterministic, inspectable heuristics over
//! opaque inference.

use regex::Regex;

use crate::graph::EntityType;

/// One row of the extraction pattern table.
pub struct ExtractionPattern {
    pub entity_type: EntityType,
    pub regex: Regex,
    pub confidence: f64,
}

/// A candidate entity surfaced by [`extract_from_context`], not yet
/// written to the graph.
#[derive(Debug, Clone)]
pub struct ExtractedEntity {
    pub entity_type: EntityType,
    pub name: String,
    pub confidence: f64,
}

/// Result of a single extraction pass.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub entities: Vec<ExtractedEntity>,
    pub confidence: f64,
}

/// Context tuple handed to the extractor: the key and value under which a
/// memory was stored, plus its optional category.
pub struct ContextInput<'a> {
    pub key: &'a str,
    pub value: &'a str,
    pub category: Option<&'a str>,
}

/// Default pattern table, one or more rows per [`EntityType`] variant.
pub fn default_patterns() -> Vec<ExtractionPattern> {
    vec![
        ExtractionPattern {
            entity_type: EntityType::Person,
            regex: Regex::new(r"(?i)\b([A-Z][a-z]+ [A-Z][a-z]+)\b").unwrap(),
            confidence: 0.6,
        },
        ExtractionPattern {
            entity_type: EntityType::Organization,
            regex: Regex::new(r"\b([A-Z][A-Za-z0-9]*(?:\s(?:Inc|Corp|LLC|Ltd|GmbH))\b)").unwrap(),
            confidence: 0.7,
        },
        ExtractionPattern {
            entity_type: EntityType::Task,
            regex: Regex::new(r"(?i)\b(?:todo|task|fixme)[:\s]+([^.\n]{3,80})").unwrap(),
            confidence: 0.65,
        },
        ExtractionPattern {
            entity_type: EntityType::Decision,
            regex: Regex::new(r"(?i)\b(?:decided|decision)(?: to)?[:\s]+([^.\n]{3,80})").unwrap(),
            confidence: 0.6,
        },
        ExtractionPattern {
            entity_type: EntityType::Event,
            regex: Regex::new(r"(?i)\b(?:on|at)\s+(\d{4}-\d{2}-\d{2})\b").unwrap(),
            confidence: 0.5,
        },
        ExtractionPattern {
            entity_type: EntityType::Error,
            regex: Regex::new(r"(?i)\b(\w*Error|\w*Exception)\b").unwrap(),
            confidence: 0.75,
        },
        ExtractionPattern {
            entity_type: EntityType::CodeFile,
            regex: Regex::new(r"\b([\w/.\-]+\.(?:rs|py|ts|js|go|java|rb))\b").unwrap(),
            confidence: 0.8,
        },
        ExtractionPattern {
            entity_type: EntityType::CodeFunction,
            regex: Regex::new(r"\b(\w+)\s*\(\s*\)").unwrap(),
            confidence: 0.55,
        },
        ExtractionPattern {
            entity_type: EntityType::CodeClass,
            regex: Regex::new(r"\bclass\s+(\w+)\b").unwrap(),
            confidence: 0.7,
        },
        ExtractionPattern {
            entity_type: EntityType::Concept,
            regex: Regex::new(r"(?i)\bconcept(?:s)?\s*:\s*([^.\n]{3,60})").unwrap(),
            confidence: 0.5,
        },
        ExtractionPattern {
            entity_type: EntityType::Fact,
            regex: Regex::new(r"(?i)\bfact\s*:\s*([^.\n]{3,80})").unwrap(),
            confidence: 0.55,
        },
    ]
}

/// Run every pattern in `patterns` over `input.value` (and `input.key` for
/// code-file/code-function patterns, since identifiers often live there).
/// The overall result confidence is the mean of its entities' confidences,
/// or `0.0` if nothing matched.
pub fn extract_from_context(
    input: &ContextInput,
    patterns: &[ExtractionPattern],
) -> ExtractionResult {
    let mut entities = Vec::new();
    let haystacks = [input.value, input.key];

    for pattern in patterns {
        for haystack in haystacks {
            for caps in pattern.regex.captures_iter(haystack) {
                let Some(m) = caps.get(1).or_else(|| caps.get(0)) else {
                    continue;
                };
                let name = m.as_str().trim().to_string();
                if name.is_empty() {
                    continue;
                }
                if entities
                    .iter()
                    .any(|e: &ExtractedEntity| e.entity_type == pattern.entity_type && e.name == name)
                {
                    continue;
                }
                entities.push(ExtractedEntity {
                    entity_type: pattern.entity_type,
                    name,
                    confidence: pattern.confidence,
                });
            }
        }
    }

    // `category` nudges confidence: a memory explicitly categorized to
    // match an extracted type is corroborating evidence.
    if let Some(category) = input.category {
        for e in entities.iter_mut() {
            if category.eq_ignore_ascii_case(type_label(e.entity_type)) {
                e.confidence = (e.confidence + 0.15).min(1.0);
            }
        }
    }

    let confidence = if entities.is_empty() {
        0.0
    } else {
        entities.iter().map(|e| e.confidence).sum::<f64>() / entities.len() as f64
    };

    ExtractionResult {
        entities,
        confidence,
    }
}

fn type_label(t: EntityType) -> &'static str {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_error_type() {
        let patterns = default_patterns();
        let input = ContextInput {
            key: "bug-report",
            value: "Saw a NullPointerException while loading the config",
            category: None,
        };
        let result = extract_from_context(&input, &patterns);
        assert!(result
            .entities
            .iter()
            .any(|e| e.entity_type == EntityType::Error && e.name == "NullPointerException"));
    }

    #[test]
    fn extracts_code_file_from_key_or_value() {
        let patterns = default_patterns();
        let input = ContextInput {
            key: "src/graph.rs",
            value: "added the merge_entity fn",
            category: None,
        };
        let result = extract_from_context(&input, &patterns);
        assert!(result
            .entities
            .iter()
            .any(|e| e.entity_type == EntityType::CodeFile && e.name == "src/graph.rs"));
    }

    #[test]
    fn no_match_yields_zero_confidence() {
        let patterns = default_patterns();
        let input = ContextInput {
            key: "k",
            value: "just some plain lowercase words",
            category: None,
        };
        let result = extract_from_context(&input, &patterns);
        assert!(result.entities.is_empty());
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn matching_category_boosts_confidence() {
        let patterns = default_patterns();
        let input = ContextInput {
            key: "k",
            value: "TODO: refactor the ingestion pipeline",
            category: Some("task"),
        };
        let result = extract_from_context(&input, &patterns);
        let task = result
            .entities
            .iter()
            .find(|e| e.entity_type == EntityType::Task)
            .unwrap();
        assert!(task.confidence > 0.65);
    }

    #[test]
    fn deduplicates_repeated_matches() {
        let patterns = default_patterns();
        let input = ContextInput {
            key: "k",
            value: "TimeoutError happened, then another TimeoutError happened",
            category: None,
        };
        let result = extract_from_context(&input, &patterns);
        let count = result
            .entities
            .iter()
            .filter(|e| e.name == "TimeoutError")
            .count();
        assert_eq!(count, 1);
    }
}
