use favorites_types::{Category, Error};
use std::str::FromStr;

#[test]
fn all_lists_every_category_once() {
    assert_eq!(
        Category::ALL,
        [Category::Item, Category::Housing, Category::Roommate]
    );
}

#[test]
fn wire_names() {
    assert_eq!(Category::Item.as_str(), "items");
    assert_eq!(Category::Housing.as_str(), "housing");
    assert_eq!(Category::Roommate.as_str(), "roommates");
}

#[test]
fn display_matches_wire_name() {
    for category in Category::ALL {
        assert_eq!(category.to_string(), category.as_str());
    }
}

#[test]
fn from_str_roundtrips_every_category() {
    for category in Category::ALL {
        assert_eq!(Category::from_str(category.as_str()).unwrap(), category);
    }
}

#[test]
fn from_str_rejects_unknown() {
    assert_eq!(
        Category::from_str("cars"),
        Err(Error::UnknownCategory("cars".to_string()))
    );
}

#[test]
fn from_str_is_case_sensitive() {
    assert!(Category::from_str("Items").is_err());
}

#[test]
fn serde_uses_wire_names() {
    assert_eq!(serde_json::to_string(&Category::Item).unwrap(), "\"items\"");
    assert_eq!(
        serde_json::to_string(&Category::Housing).unwrap(),
        "\"housing\""
    );
    assert_eq!(
        serde_json::to_string(&Category::Roommate).unwrap(),
        "\"roommates\""
    );
    let parsed: Category = serde_json::from_str("\"roommates\"").unwrap();
    assert_eq!(parsed, Category::Roommate);
}
