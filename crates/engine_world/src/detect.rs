//! Change detection against per-entity checkpoints.

use engine_entity::diff;
use engine_net::UpdateOp;
use tracing::trace;

use crate::registry::Registry;

/// Serialize every entity owned by `local_id` and compare it to its
/// checkpoint.
///
/// - Empty checkpoint: the entity was never sent, so a `create` carrying the
///   full serialization and type tag is emitted.
/// - Otherwise an `update` is emitted carrying the structural diff, if it is
///   non-empty.
///
/// The checkpoint is replaced with the new serialization either way.
/// Entities owned by other processes are skipped; they only change by
/// applying inbound ops.
pub fn detect_changes(registry: &mut Registry, local_id: &str) -> Vec<UpdateOp> {
    let mut ops = Vec::new();
    for (id, slot) in registry.iter_mut() {
        let current = {
            let entity = slot.handle.borrow();
            if entity.updater() != local_id {
                continue;
            }
            entity.serialize()
        };

        if slot.checkpoint.is_empty() {
            trace!(entity_id = %id, type_tag = slot.type_tag, "first observation");
            ops.push(UpdateOp::create(id.clone(), slot.type_tag, current.clone()));
        } else {
            let changed = diff(&slot.checkpoint, &current);
            if !changed.is_empty() {
                trace!(entity_id = %id, keys = changed.len(), "entity changed");
                ops.push(UpdateOp::update(id.clone(), changed));
            }
        }
        slot.checkpoint = current;
    }
    ops
}

#[cfg(test)]
mod tests {
    use engine_entity::AttrMap;
    use engine_net::UpdateType;
    use serde_json::json;

    use super::*;
    use crate::registry::Slot;
    use crate::testing::{Player, attrs, handle, player};

    fn registry_with(id: &str, updater: &str) -> Registry {
        let mut registry = Registry::new();
        registry.insert(
            id.into(),
            Slot {
                handle: handle(player(id, updater)),
                type_tag: "player",
                checkpoint: AttrMap::new(),
            },
        );
        registry
    }

    fn set_x(registry: &Registry, id: &str, x: i64) {
        let handle = registry.get(id).unwrap();
        let mut entity = handle.borrow_mut();
        entity.downcast_mut::<Player>().unwrap().x = x;
    }

    #[test]
    fn test_first_observation_emits_create() {
        let mut registry = registry_with("p1", "c1");
        let ops = detect_changes(&mut registry, "c1");
        assert_eq!(
            ops,
            vec![UpdateOp::create(
                "p1",
                "player",
                attrs(json!({"updater": "c1", "x": 0, "y": 0, "weapon": null}))
            )]
        );
        assert!(!registry.slot("p1").unwrap().checkpoint.is_empty());
    }

    #[test]
    fn test_changed_field_only() {
        let mut registry = registry_with("p1", "c1");
        detect_changes(&mut registry, "c1");
        set_x(&registry, "p1", 5);

        let ops = detect_changes(&mut registry, "c1");
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].update_type, UpdateType::Update);
        assert_eq!(ops[0].data, Some(attrs(json!({"x": 5}))));

        let wire = serde_json::to_value(&ops[0]).unwrap();
        assert!(wire["data"].get("y").is_none());
    }

    #[test]
    fn test_no_change_no_op() {
        let mut registry = registry_with("p1", "c1");
        detect_changes(&mut registry, "c1");
        assert!(detect_changes(&mut registry, "c1").is_empty());
    }

    #[test]
    fn test_checkpoint_replaced_after_update() {
        let mut registry = registry_with("p1", "c1");
        detect_changes(&mut registry, "c1");
        set_x(&registry, "p1", 5);
        detect_changes(&mut registry, "c1");
        assert_eq!(registry.slot("p1").unwrap().checkpoint["x"], json!(5));
        assert!(detect_changes(&mut registry, "c1").is_empty());
    }

    #[test]
    fn test_foreign_entities_skipped() {
        let mut registry = registry_with("p1", "c2");
        assert!(detect_changes(&mut registry, "c1").is_empty());
        assert!(registry.slot("p1").unwrap().checkpoint.is_empty());
    }
}
