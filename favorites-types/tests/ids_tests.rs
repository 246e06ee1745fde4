use favorites_types::{EntityId, Error, RequestId, UserId};
use proptest::prelude::*;
use std::collections::HashSet;
use std::str::FromStr;

// ── EntityId ──────────────────────────────────────────────────────

#[test]
fn entity_id_parse_keeps_value_verbatim() {
    let id = EntityId::parse("  42 ").unwrap();
    assert_eq!(id.as_str(), "  42 ");
    assert_eq!(id, EntityId::from("  42 "));
}

#[test]
fn entity_id_parse_empty() {
    assert_eq!(EntityId::parse(""), Err(Error::EmptyId));
    assert_eq!(EntityId::parse("   "), Err(Error::EmptyId));
}

#[test]
fn entity_id_from_str() {
    let parsed: EntityId = EntityId::from_str("abc").unwrap();
    assert_eq!(parsed, EntityId::from("abc"));
}

#[test]
fn entity_id_display() {
    let id = EntityId::from("item-7");
    assert_eq!(id.to_string(), "item-7");
}

#[test]
fn entity_id_hash_and_eq() {
    let mut set = HashSet::new();
    set.insert(EntityId::from("1"));
    set.insert(EntityId::from("1"));
    assert_eq!(set.len(), 1);
}

#[test]
fn entity_id_serializes_as_plain_string() {
    let id = EntityId::from("9");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"9\"");
    let parsed: EntityId = serde_json::from_str("\"9\"").unwrap();
    assert_eq!(parsed, id);
}

#[test]
fn entity_id_into_inner() {
    assert_eq!(EntityId::from("x").into_inner(), "x".to_string());
}

// ── UserId ────────────────────────────────────────────────────────

#[test]
fn user_id_parse_and_display() {
    let id = UserId::parse("alice").unwrap();
    assert_eq!(id.to_string(), "alice");
    assert_eq!(id.as_ref(), "alice");
}

#[test]
fn user_id_parse_empty() {
    assert!(UserId::parse("").is_err());
}

#[test]
fn user_id_debug_contains_type_name() {
    let debug = format!("{:?}", UserId::from("bob"));
    assert!(debug.contains("UserId"));
}

// ── RequestId ─────────────────────────────────────────────────────

#[test]
fn request_id_new_is_unique() {
    let a = RequestId::new();
    let b = RequestId::new();
    assert_ne!(a, b);
}

#[test]
fn request_id_display_and_parse() {
    let id = RequestId::new();
    let parsed = RequestId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn request_id_parse_invalid() {
    assert!(matches!(
        RequestId::parse("not-a-uuid"),
        Err(Error::InvalidUuid(_))
    ));
}

proptest! {
    #[test]
    fn parse_accepts_any_non_blank_string(s in " {0,2}[a-zA-Z0-9_-]{1,32} {0,2}") {
        let id = EntityId::parse(&s).unwrap();
        prop_assert_eq!(id.as_str(), s.as_str());
        prop_assert_eq!(id, EntityId::from(s.as_str()));
    }
}
