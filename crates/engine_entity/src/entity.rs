//! Core [`Entity`] and [`EntityKind`] traits.
//!
//! An entity is a replicated, identity-bearing object composed of capability
//! components. Every entity carries [`Networked`]; [`Sprite`] and [`Body2D`]
//! are optional and surfaced through [`Entity::drawable`] and
//! [`Entity::physical`] so a drawing or physics layer can query for them.

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use engine_math::Body2D;

use crate::attrs::AttrMap;
use crate::components::{Networked, Sprite};
use crate::error::EntityError;
use crate::reference::EntityRef;

/// Entity identifier, unique within one registry.
pub type EntityId = String;

/// Shared, mutable handle to a live entity.
///
/// The registry holds the strong handle. [`EntityRef`] holds a weak one, so
/// killing an entity is never blocked by references to it.
pub type EntityHandle = Rc<RefCell<dyn Entity>>;

/// Allocate a fresh, globally unique entity id.
#[must_use]
pub fn new_entity_id() -> EntityId {
    uuid::Uuid::new_v4().to_string()
}

/// The replication contract for a live entity.
///
/// `serialize` and `update` must agree: applying any diff of two
/// serializations through `update` must leave the entity serializing to the
/// newer one.
///
/// # Examples
///
/// ```rust
/// use std::any::Any;
/// use engine_entity::{AttrMap, Entity, EntityError, Networked, update_field};
///
/// struct Crate {
///     net: Networked,
///     open: bool,
/// }
///
/// impl Entity for Crate {
///     fn networked(&self) -> &Networked { &self.net }
///     fn networked_mut(&mut self) -> &mut Networked { &mut self.net }
///
///     fn serialize(&self) -> AttrMap {
///         let mut map = self.net.to_map();
///         map.insert("open".into(), self.open.into());
///         map
///     }
///
///     fn update(&mut self, data: &AttrMap) -> Result<(), EntityError> {
///         self.net.apply(data)?;
///         update_field(data, "open", &mut self.open)?;
///         Ok(())
///     }
///
///     fn as_any(&self) -> &dyn Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn Any { self }
/// }
/// ```
pub trait Entity: Any + 'static {
    /// The identity and ownership component.
    fn networked(&self) -> &Networked;

    /// Mutable access to the identity and ownership component.
    fn networked_mut(&mut self) -> &mut Networked;

    /// Produce the full, JSON-safe attribute map of this entity.
    fn serialize(&self) -> AttrMap;

    /// Overwrite the attributes present in a partial map.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::InvalidField`] if a present attribute has the
    /// wrong shape.
    fn update(&mut self, data: &AttrMap) -> Result<(), EntityError>;

    /// Every attribute that links to another entity.
    ///
    /// The resolver walks these after each applied batch.
    fn references_mut(&mut self) -> Vec<&mut EntityRef> {
        Vec::new()
    }

    /// The sprite capability, if this entity is drawable.
    fn drawable(&self) -> Option<&Sprite> {
        None
    }

    /// The body capability, if this entity is physical.
    fn physical(&self) -> Option<&Body2D> {
        None
    }

    /// Upcast for typed access from event handlers.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for typed access from event handlers.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// The entity's id.
    fn id(&self) -> &str {
        &self.networked().id
    }

    /// The id of the process allowed to mutate and tick this entity.
    fn updater(&self) -> &str {
        &self.networked().updater
    }
}

impl dyn Entity {
    /// Borrow as a concrete entity type.
    #[must_use]
    pub fn downcast_ref<T: Entity>(&self) -> Option<&T> {
        self.as_any().downcast_ref()
    }

    /// Mutably borrow as a concrete entity type.
    #[must_use]
    pub fn downcast_mut<T: Entity>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut()
    }
}

/// The constructor side of an entity type.
///
/// `TYPE_TAG` travels in every `create` op and selects this constructor on
/// the receiving side.
pub trait EntityKind: Entity + Sized {
    /// The wire tag for this type, e.g. `"player"`.
    const TYPE_TAG: &'static str;

    /// Build an entity from the full map carried by a `create` op.
    ///
    /// Links to other entities must be built as unresolved [`EntityRef`]s;
    /// the target may not have arrived yet.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if a required attribute is missing or invalid.
    fn deserialize(id: EntityId, data: &AttrMap) -> Result<Self, EntityError>;
}
