//! Update operations exchanged between peers.
//!
//! A batch is a JSON array of [`UpdateOp`] objects. Every op carries all four
//! keys on the wire, with `entity_type` and `data` set to `null` where they
//! do not apply:
//!
//! ```text
//! {"update_type": "update", "entity_id": "p1", "entity_type": null, "data": {"x": 5}}
//! ```

use std::fmt;
use std::str::FromStr;

use engine_entity::AttrMap;
use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// The kind of change an [`UpdateOp`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    /// A new entity; `data` is the full construction map.
    Create,
    /// A partial change; `data` holds only the changed keys.
    Update,
    /// The entity was killed; `data` is absent.
    Delete,
}

impl UpdateType {
    /// The wire spelling of this update type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for UpdateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateType {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(ProtocolError::InvalidUpdateType(other.to_string())),
        }
    }
}

/// One replicated change to one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateOp {
    /// What kind of change this is.
    pub update_type: UpdateType,
    /// The entity the change applies to.
    pub entity_id: String,
    /// Registered type tag; present only on `create`.
    pub entity_type: Option<String>,
    /// Full map on `create`, diff map on `update`, absent on `delete`.
    pub data: Option<AttrMap>,
}

impl UpdateOp {
    /// Build a `create` op carrying the full serialisation of an entity.
    #[must_use]
    pub fn create(
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
        data: AttrMap,
    ) -> Self {
        Self {
            update_type: UpdateType::Create,
            entity_id: entity_id.into(),
            entity_type: Some(entity_type.into()),
            data: Some(data),
        }
    }

    /// Build an `update` op carrying a diff.
    #[must_use]
    pub fn update(entity_id: impl Into<String>, data: AttrMap) -> Self {
        Self {
            update_type: UpdateType::Update,
            entity_id: entity_id.into(),
            entity_type: None,
            data: Some(data),
        }
    }

    /// Build a `delete` op.
    #[must_use]
    pub fn delete(entity_id: impl Into<String>) -> Self {
        Self {
            update_type: UpdateType::Delete,
            entity_id: entity_id.into(),
            entity_type: None,
            data: None,
        }
    }

    /// Check the structural contract of this op.
    ///
    /// Whether a `create`'s type tag is actually registered is checked by the
    /// op queue, which owns the type map.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedUpdate`] if a `create` has no type
    /// tag or data, an `update` has no data, a non-`create` carries a type
    /// tag, a `delete` carries data, or the entity id is empty.
    pub fn validate(&self) -> Result<(), ProtocolError> {
        let malformed = |reason: &str| ProtocolError::MalformedUpdate {
            entity_id: self.entity_id.clone(),
            reason: reason.to_string(),
        };

        if self.entity_id.is_empty() {
            return Err(malformed("entity id is empty"));
        }

        match self.update_type {
            UpdateType::Create => {
                if self.entity_type.is_none() {
                    return Err(malformed("create requires an entity type"));
                }
                if self.data.is_none() {
                    return Err(malformed("create requires data"));
                }
            }
            UpdateType::Update => {
                if self.entity_type.is_some() {
                    return Err(malformed("only create may carry an entity type"));
                }
                if self.data.is_none() {
                    return Err(malformed("update requires data"));
                }
            }
            UpdateType::Delete => {
                if self.entity_type.is_some() {
                    return Err(malformed("only create may carry an entity type"));
                }
                if self.data.is_some() {
                    return Err(malformed("delete must not carry data"));
                }
            }
        }
        Ok(())
    }
}
