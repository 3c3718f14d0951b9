//! `context_save`'s entity-extraction -> rule-based inference path,
//! exercised through the public `PingMem` facade rather than calling
//! `ping_mem_core::inference` directly (mirrors spec scenario R1).

use ping_mem::config::Config;
use ping_mem::tools::{ContextSaveRequest, Direction, PingMem};

fn test_config() -> Config {
    toml::from_str("").unwrap()
}

// `default_patterns()`'s `CodeClass` rule only fires on a literal `class `
// prefix (see `ping_mem_core::extraction`), so both names need it spelled
// out for extraction to pick them up at all.
const NOTE: &str = "class UserService depends on class DatabaseClient";

#[tokio::test]
async fn entity_extraction_infers_depends_on_relationship() {
    let ping_mem = PingMem::new(test_config()).unwrap();

    let save = ping_mem
        .context_save(ContextSaveRequest {
            key: "note".to_string(),
            value: NOTE.to_string(),
            category: None,
            priority: None,
            channel: None,
            metadata: None,
            extract_entities: true,
        })
        .await
        .unwrap();

    let entity_ids = save.entity_ids.expect("extract_entities was requested");
    assert_eq!(entity_ids.len(), 2);

    // The inferred relationship should be visible from either endpoint.
    let mut found_depends_on = false;
    for id in &entity_ids {
        let rels = ping_mem
            .context_query_relationships(id, Some(1), None, Direction::Both)
            .await
            .unwrap();
        if rels
            .relationships
            .iter()
            .any(|r| format!("{:?}", r.rel_type) == "DependsOn")
        {
            found_depends_on = true;
        }
    }
    assert!(found_depends_on, "expected an inferred DependsOn relationship");
}

#[tokio::test]
async fn context_save_without_extraction_creates_no_entities() {
    let ping_mem = PingMem::new(test_config()).unwrap();

    let save = ping_mem
        .context_save(ContextSaveRequest {
            key: "note".to_string(),
            value: NOTE.to_string(),
            category: None,
            priority: None,
            channel: None,
            metadata: None,
            extract_entities: false,
        })
        .await
        .unwrap();

    assert!(save.entity_ids.is_none());
}

#[tokio::test]
async fn repeated_save_does_not_duplicate_inferred_relationship() {
    let ping_mem = PingMem::new(test_config()).unwrap();

    let request = || ContextSaveRequest {
        key: "note".to_string(),
        value: NOTE.to_string(),
        category: None,
        priority: None,
        channel: None,
        metadata: None,
        extract_entities: true,
    };

    let first = ping_mem.context_save(request()).await.unwrap();
    let second = ping_mem.context_save(request()).await.unwrap();

    let ids = second.entity_ids.unwrap();
    assert_eq!(first.entity_ids.unwrap().len(), ids.len());

    let rels = ping_mem
        .context_query_relationships(&ids[0], Some(1), None, Direction::Both)
        .await
        .unwrap();
    let depends_on_count = rels
        .relationships
        .iter()
        .filter(|r| format!("{:?}", r.rel_type) == "DependsOn")
        .count();
    assert_eq!(depends_on_count, 1);
}
