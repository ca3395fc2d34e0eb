//! Attribute maps and the structural diff.
//!
//! An [`AttrMap`] is the JSON-safe serialization of an entity. Compound
//! sub-objects nest as maps. [`diff`] finds the keys whose values changed,
//! recursing into nested maps, and [`merge`] replays such a diff:
//!
//! ```text
//! merge(old, diff(old, new)) == new
//! ```
//!
//! holds whenever `new` has every key `old` has. Keys are never removed.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::EntityError;

/// A JSON object keyed by attribute name.
pub type AttrMap = Map<String, Value>;

/// Compute the keys of `new` whose values differ from `old`.
///
/// Nested maps are diffed recursively and included only if their own diff
/// is non-empty. Any other value is included whole when it is absent from
/// `old` or compares unequal. Keys only present in `old` are ignored.
#[must_use]
pub fn diff(old: &AttrMap, new: &AttrMap) -> AttrMap {
    let mut changed = AttrMap::new();
    for (key, value) in new {
        match (old.get(key), value) {
            (Some(Value::Object(before)), Value::Object(after)) => {
                let nested = diff(before, after);
                if !nested.is_empty() {
                    changed.insert(key.clone(), Value::Object(nested));
                }
            }
            (Some(before), after) if before == after => {}
            _ => {
                changed.insert(key.clone(), value.clone());
            }
        }
    }
    changed
}

/// Overwrite `target` with every key of `patch`, recursing where both sides
/// hold a nested map.
pub fn merge(target: &mut AttrMap, patch: &AttrMap) {
    for (key, value) in patch {
        if let (Some(Value::Object(inner)), Value::Object(nested)) = (target.get_mut(key), value) {
            merge(inner, nested);
            continue;
        }
        target.insert(key.clone(), value.clone());
    }
}

/// Read a required attribute.
///
/// # Errors
///
/// Returns [`EntityError::MissingField`] if `key` is absent, or
/// [`EntityError::InvalidField`] if it does not deserialize into `T`.
pub fn field<T: DeserializeOwned>(data: &AttrMap, key: &str) -> Result<T, EntityError> {
    let value = data.get(key).ok_or_else(|| EntityError::missing(key))?;
    serde_json::from_value(value.clone()).map_err(|e| EntityError::invalid(key, e))
}

/// Overwrite `target` if `key` is present in a partial map.
///
/// Returns whether the attribute was present.
///
/// # Errors
///
/// Returns [`EntityError::InvalidField`] if the value does not deserialize
/// into `T`. `target` is left untouched in that case.
pub fn update_field<T: DeserializeOwned>(
    data: &AttrMap,
    key: &str,
    target: &mut T,
) -> Result<bool, EntityError> {
    match data.get(key) {
        Some(value) => {
            *target = serde_json::from_value(value.clone())
                .map_err(|e| EntityError::invalid(key, e))?;
            Ok(true)
        }
        None => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn map(value: Value) -> AttrMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_unchanged_scalar_is_omitted() {
        let old = map(json!({"x": 0, "y": 0}));
        let new = map(json!({"x": 5, "y": 0}));
        assert_eq!(diff(&old, &new), map(json!({"x": 5})));
    }

    #[test]
    fn test_identical_maps_give_empty_diff() {
        let state = map(json!({"x": 1, "body": {"angle": 0.5}, "tags": [1, 2]}));
        assert!(diff(&state, &state).is_empty());
    }

    #[test]
    fn test_nested_diff_only_carries_changed_subkeys() {
        let old = map(json!({"body": {"position": [0.0, 0.0], "angle": 0.0}, "health": 100}));
        let new = map(json!({"body": {"position": [1.0, 0.0], "angle": 0.0}, "health": 100}));
        assert_eq!(diff(&old, &new), map(json!({"body": {"position": [1.0, 0.0]}})));
    }

    #[test]
    fn test_arrays_compare_whole() {
        let old = map(json!({"scale_res": [50, 50]}));
        let new = map(json!({"scale_res": [50, 60]}));
        assert_eq!(diff(&old, &new), map(json!({"scale_res": [50, 60]})));
    }

    #[test]
    fn test_new_key_and_type_change_included() {
        let old = map(json!({"weapon": null, "body": 3}));
        let new = map(json!({"weapon": "w1", "body": {"angle": 1.0}, "ammo": 2}));
        assert_eq!(
            diff(&old, &new),
            map(json!({"weapon": "w1", "body": {"angle": 1.0}, "ammo": 2}))
        );
    }

    #[test]
    fn test_removed_keys_are_ignored() {
        let old = map(json!({"x": 1, "gone": true}));
        let new = map(json!({"x": 1}));
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_merge_replays_diff() {
        let old = map(json!({
            "updater": "c1",
            "health": 100,
            "body": {"position": [0.0, 0.0], "velocity": [0.0, 0.0], "angle": 0.0},
            "weapon": null
        }));
        let new = map(json!({
            "updater": "c1",
            "health": 80,
            "body": {"position": [2.0, 0.0], "velocity": [4.0, 0.0], "angle": 0.0},
            "weapon": "w1"
        }));
        let mut replayed = old.clone();
        merge(&mut replayed, &diff(&old, &new));
        assert_eq!(replayed, new);
    }

    #[test]
    fn test_merge_replaces_non_map_with_map() {
        let mut target = map(json!({"body": null}));
        merge(&mut target, &map(json!({"body": {"angle": 1.0}})));
        assert_eq!(target, map(json!({"body": {"angle": 1.0}})));
    }

    #[test]
    fn test_field_errors() {
        let data = map(json!({"health": "lots"}));
        assert_eq!(
            field::<u32>(&data, "ammo"),
            Err(EntityError::MissingField {
                field: "ammo".into()
            })
        );
        assert!(matches!(
            field::<u32>(&data, "health"),
            Err(EntityError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_update_field() {
        let data = map(json!({"health": 40}));
        let mut health = 100u32;
        let mut ammo = 3u32;
        assert!(update_field(&data, "health", &mut health).unwrap());
        assert!(!update_field(&data, "ammo", &mut ammo).unwrap());
        assert_eq!((health, ammo), (40, 3));
    }
}
