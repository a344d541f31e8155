//! Serde round-trip tests for `PersistentSortedMap`.
//!
//! Compiled only with the `serde` feature enabled.

use rstest::rstest;
use sylva::persistent::PersistentSortedMap;

#[rstest]
fn test_serialize_empty_map() {
    let map: PersistentSortedMap<String, i32> = PersistentSortedMap::new();
    let json = serde_json::to_string(&map).expect("serialization succeeds");
    assert_eq!(json, "{}");
}

#[rstest]
fn test_serialize_in_key_order() {
    let map = PersistentSortedMap::new()
        .insert("b".to_string(), 2)
        .insert("a".to_string(), 1);
    let json = serde_json::to_string(&map).expect("serialization succeeds");
    assert_eq!(json, "{\"a\":1,\"b\":2}");
}

#[rstest]
fn test_round_trip() {
    let map: PersistentSortedMap<String, i32> = (0..32)
        .map(|index| (format!("key-{index:02}"), index))
        .collect();

    let json = serde_json::to_string(&map).expect("serialization succeeds");
    let decoded: PersistentSortedMap<String, i32> =
        serde_json::from_str(&json).expect("deserialization succeeds");

    assert_eq!(decoded.len(), map.len());
    assert_eq!(decoded, map);
}

#[rstest]
fn test_deserialize_duplicate_keys_last_wins() {
    let decoded: PersistentSortedMap<String, i32> =
        serde_json::from_str("{\"a\":1,\"a\":2}").expect("deserialization succeeds");
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded.get(&"a".to_string()), Some(&2));
}
