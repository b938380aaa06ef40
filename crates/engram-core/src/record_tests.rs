//! Tests for `record` module

use super::record::*;
use serde_json::json;

#[test]
fn test_record_new() {
    let record = MemoryRecord::new(1, "observation", vec![0.1, 0.2], "agent-a");
    assert_eq!(record.id, 1);
    assert_eq!(record.dimension(), 2);
    assert_eq!(record.agent, "agent-a");
    assert!(!record.shared);
    assert_eq!(record.importance, 0.0);
}

#[test]
fn test_with_importance_clamps() {
    let record = MemoryRecord::new(1, "x", vec![0.0], "a").with_importance(1.5);
    assert_eq!(record.importance, 1.0);

    let record = MemoryRecord::new(2, "x", vec![0.0], "a").with_importance(-0.5);
    assert_eq!(record.importance, 0.0);
}

#[test]
fn test_content_key_deterministic() {
    let a = MemoryRecord::new(1, "same content", vec![0.0], "a");
    let b = MemoryRecord::new(2, "same content", vec![1.0], "b");
    assert_eq!(a.content_key(), b.content_key());
    assert_eq!(a.content_key(), content_key("same content"));

    let c = MemoryRecord::new(3, "different content", vec![0.0], "a");
    assert_ne!(a.content_key(), c.content_key());
}

#[test]
fn test_visibility() {
    let mut record = MemoryRecord::new(1, "x", vec![0.0], "owner");
    assert!(record.visible_to("owner"));
    assert!(!record.visible_to("other"));

    record.shared = true;
    assert!(record.visible_to("other"));
}

#[test]
fn test_record_serialization() {
    let record = MemoryRecord::new(7, "fact", vec![1.0, 2.0], "agent-b")
        .with_metadata(json!({"topic": "physics"}));

    let serialized = serde_json::to_string(&record).unwrap();
    let deserialized: MemoryRecord = serde_json::from_str(&serialized).unwrap();

    assert_eq!(deserialized.id, 7);
    assert_eq!(deserialized.content, "fact");
    assert_eq!(deserialized.metadata, Some(json!({"topic": "physics"})));
}
