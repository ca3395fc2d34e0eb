//! Entity registry: the per-process map from id to live entity.
//!
//! Each entry also remembers the entity's wire type tag and its replication
//! checkpoint, the last serialization the remote side is known to hold.

use std::collections::HashMap;

use engine_entity::{AttrMap, EntityHandle, EntityId};

/// One registered entity.
pub struct Slot {
    /// The live entity.
    pub handle: EntityHandle,
    /// Registered type tag, sent with `create` ops.
    pub type_tag: &'static str,
    /// Last serialization sent or received. Empty means never sent.
    pub checkpoint: AttrMap,
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("type_tag", &self.type_tag)
            .field("checkpoint", &self.checkpoint)
            .finish_non_exhaustive()
    }
}

/// Registry of all entities known to one process.
#[derive(Debug, Default)]
pub struct Registry {
    slots: HashMap<EntityId, Slot>,
}

impl Registry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: HashMap::new(),
        }
    }

    /// Insert an entity, returning the slot it replaced, if any.
    pub fn insert(&mut self, id: EntityId, slot: Slot) -> Option<Slot> {
        self.slots.insert(id, slot)
    }

    /// Remove an entity.
    pub fn remove(&mut self, id: &str) -> Option<Slot> {
        self.slots.remove(id)
    }

    /// A new strong handle to the entity with this id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<EntityHandle> {
        self.slots.get(id).map(|slot| slot.handle.clone())
    }

    /// The registry's own handle, without cloning it.
    #[must_use]
    pub fn handle(&self, id: &str) -> Option<&EntityHandle> {
        self.slots.get(id).map(|slot| &slot.handle)
    }

    /// The full slot for this id.
    #[must_use]
    pub fn slot(&self, id: &str) -> Option<&Slot> {
        self.slots.get(id)
    }

    /// Mutable access to the slot for this id.
    pub fn slot_mut(&mut self, id: &str) -> Option<&mut Slot> {
        self.slots.get_mut(id)
    }

    /// Returns `true` if an entity with this id is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.slots.contains_key(id)
    }

    /// Returns the number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no entities are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&EntityId, &Slot)> {
        self.slots.iter()
    }

    /// Iterate mutably over all entries.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&EntityId, &mut Slot)> {
        self.slots.iter_mut()
    }

    /// Ids of every entity whose `updater` is `peer`.
    #[must_use]
    pub fn owned_by(&self, peer: &str) -> Vec<EntityId> {
        self.slots
            .iter()
            .filter(|(_, slot)| slot.handle.borrow().updater() == peer)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{handle, player};

    fn slot(id: &str, updater: &str) -> Slot {
        Slot {
            handle: handle(player(id, updater)),
            type_tag: "player",
            checkpoint: AttrMap::new(),
        }
    }

    #[test]
    fn test_insert_and_lookup() {
        let mut registry = Registry::new();
        assert!(registry.insert("p1".into(), slot("p1", "c1")).is_none());
        assert!(registry.contains("p1"));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("p1").unwrap().borrow().updater(), "c1");
        assert!(registry.get("p2").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut registry = Registry::new();
        registry.insert("p1".into(), slot("p1", "c1"));
        let old = registry.insert("p1".into(), slot("p1", "c2"));
        assert_eq!(old.unwrap().handle.borrow().updater(), "c1");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_remove() {
        let mut registry = Registry::new();
        registry.insert("p1".into(), slot("p1", "c1"));
        assert!(registry.remove("p1").is_some());
        assert!(registry.remove("p1").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_owned_by() {
        let mut registry = Registry::new();
        registry.insert("a".into(), slot("a", "c1"));
        registry.insert("b".into(), slot("b", "c2"));
        registry.insert("c".into(), slot("c", "c1"));
        let mut owned = registry.owned_by("c1");
        owned.sort();
        assert_eq!(owned, ["a", "c"]);
    }
}
