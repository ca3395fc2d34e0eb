//! Links between entities that may arrive in any order.
//!
//! A reference starts out as [`EntityRef::Unresolved`], holding only the
//! target id. After each applied batch the resolver looks the id up and, if
//! the target is live, swaps in a weak link. A link whose target has since
//! been killed upgrades to `None`; callers treat that the same as a missing
//! target and never panic on it.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::entity::{Entity, EntityHandle, EntityId};

/// A placeholder or live link to another entity.
///
/// Serializes as the bare target id in both states.
#[derive(Debug, Clone)]
pub enum EntityRef {
    /// The target has not been seen yet.
    Unresolved(EntityId),
    /// Linked to a live object.
    Resolved {
        /// The target's id.
        id: EntityId,
        /// Weak link to the target.
        link: Weak<RefCell<dyn Entity>>,
    },
}

impl EntityRef {
    /// A placeholder for `id`.
    #[must_use]
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self::Unresolved(id.into())
    }

    /// Link directly to a live entity.
    #[must_use]
    pub fn to(id: impl Into<EntityId>, target: &EntityHandle) -> Self {
        Self::Resolved {
            id: id.into(),
            link: Rc::downgrade(target),
        }
    }

    /// The target id, whichever state the reference is in.
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            Self::Unresolved(id) | Self::Resolved { id, .. } => id,
        }
    }

    /// `true` once linked to a target that is still alive.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        match self {
            Self::Unresolved(_) => false,
            Self::Resolved { link, .. } => link.strong_count() > 0,
        }
    }

    /// The live target, or `None` if unresolved or gone.
    #[must_use]
    pub fn get(&self) -> Option<EntityHandle> {
        match self {
            Self::Unresolved(_) => None,
            Self::Resolved { link, .. } => link.upgrade(),
        }
    }

    /// Try to link this reference using `lookup`.
    ///
    /// Does nothing if already linked to a live target. A dead link is looked
    /// up again, so a target recreated under the same id is picked up. If the
    /// lookup misses, the reference is left exactly as it was.
    ///
    /// Returns `true` if the reference changed.
    pub fn resolve_with<F>(&mut self, lookup: F) -> bool
    where
        F: FnOnce(&str) -> Option<EntityHandle>,
    {
        if self.is_resolved() {
            return false;
        }
        let Some(target) = lookup(self.id()) else {
            return false;
        };
        let id = self.id().to_string();
        *self = Self::Resolved {
            id,
            link: Rc::downgrade(&target),
        };
        true
    }
}

impl PartialEq for EntityRef {
    /// Two references are equal if they name the same target and are in the
    /// same state.
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id() && self.is_resolved() == other.is_resolved()
    }
}

impl Serialize for EntityRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

impl<'de> Deserialize<'de> for EntityRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        EntityId::deserialize(deserializer).map(Self::Unresolved)
    }
}
