//! Entity type map: wire type tag to constructor.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use engine_entity::{AttrMap, EntityError, EntityHandle, EntityId, EntityKind};

use crate::events::EventBus;

/// An entity type the world can construct from the wire.
///
/// `subscribe` runs every time an entity of this type enters the registry,
/// whether created locally or received. Register the entity's own handlers
/// there with [`EventBus::subscribe_entity`] and friends; authority
/// filtering then decides on each dispatch whether they run here.
pub trait Replicated: EntityKind {
    /// Subscribe this entity's handlers.
    fn subscribe(_id: &str, _bus: &mut EventBus) {}
}

type ConstructFn = fn(EntityId, &AttrMap) -> Result<EntityHandle, EntityError>;
type SubscribeFn = fn(&str, &mut EventBus);

/// Constructor and hooks for one registered type.
#[derive(Debug, Clone, Copy)]
pub struct TypeEntry {
    /// The wire tag.
    pub tag: &'static str,
    construct: ConstructFn,
    subscribe: SubscribeFn,
}

impl TypeEntry {
    fn of<T: Replicated>() -> Self {
        Self {
            tag: T::TYPE_TAG,
            construct: construct::<T>,
            subscribe: T::subscribe,
        }
    }

    /// Build an entity of this type from a full construction map.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if the map is missing or mistypes a field.
    pub fn construct(&self, id: EntityId, data: &AttrMap) -> Result<EntityHandle, EntityError> {
        (self.construct)(id, data)
    }

    /// Subscribe the handlers of the entity `id`.
    pub fn subscribe(&self, id: &str, bus: &mut EventBus) {
        (self.subscribe)(id, bus);
    }
}

fn construct<T: Replicated>(id: EntityId, data: &AttrMap) -> Result<EntityHandle, EntityError> {
    let entity = T::deserialize(id, data)?;
    Ok(Rc::new(RefCell::new(entity)))
}

/// Registry of constructible entity types, keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct EntityTypeMap {
    entries: HashMap<&'static str, TypeEntry>,
}

impl EntityTypeMap {
    /// Create an empty type map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` under its type tag.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::DuplicateEntityType`] if the tag is taken.
    pub fn register<T: Replicated>(&mut self) -> Result<(), EntityError> {
        if self.entries.contains_key(T::TYPE_TAG) {
            return Err(EntityError::DuplicateEntityType(T::TYPE_TAG.to_string()));
        }
        self.entries.insert(T::TYPE_TAG, TypeEntry::of::<T>());
        Ok(())
    }

    /// Builder-style [`EntityTypeMap::register`].
    ///
    /// # Errors
    ///
    /// Same as [`EntityTypeMap::register`].
    pub fn with<T: Replicated>(mut self) -> Result<Self, EntityError> {
        self.register::<T>()?;
        Ok(self)
    }

    /// Look up a tag.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::UnknownEntityType`] if nothing is registered
    /// under `tag`.
    pub fn get(&self, tag: &str) -> Result<&TypeEntry, EntityError> {
        self.entries
            .get(tag)
            .ok_or_else(|| EntityError::UnknownEntityType(tag.to_string()))
    }

    /// Returns `true` if `tag` is registered.
    #[must_use]
    pub fn contains(&self, tag: &str) -> bool {
        self.entries.contains_key(tag)
    }

    /// Returns the number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{Player, Weapon, attrs};

    #[test]
    fn test_register_and_construct() {
        let types = EntityTypeMap::new().with::<Player>().unwrap();
        let entry = types.get("player").unwrap();
        let data = attrs(json!({"updater": "c1", "x": 0, "y": 0, "weapon": null}));
        let handle = entry.construct("p1".into(), &data).unwrap();
        assert_eq!(handle.borrow().id(), "p1");
        assert_eq!(entry.tag, "player");
    }

    #[test]
    fn test_duplicate_tag_rejected() {
        let mut types = EntityTypeMap::new();
        types.register::<Player>().unwrap();
        assert_eq!(
            types.register::<Player>(),
            Err(EntityError::DuplicateEntityType("player".into()))
        );
        assert_eq!(types.len(), 1);
    }

    #[test]
    fn test_unknown_tag() {
        let types = EntityTypeMap::new().with::<Weapon>().unwrap();
        assert!(types.contains("weapon"));
        assert!(matches!(
            types.get("tile"),
            Err(EntityError::UnknownEntityType(tag)) if tag == "tile"
        ));
    }
}
