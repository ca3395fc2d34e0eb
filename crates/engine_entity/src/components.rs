//! Capability components entities are composed from.

use serde_json::Value;

use crate::attrs::{AttrMap, field, update_field};
use crate::entity::EntityId;
use crate::error::EntityError;

/// Identity and ownership. Every entity has exactly one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Networked {
    /// Unique id within a registry. Never replicated as an attribute; it
    /// travels as the op's `entity_id`.
    pub id: EntityId,
    /// Id of the only process that may mutate or tick this entity.
    pub updater: String,
}

impl Networked {
    /// Create the component for an entity owned by `updater`.
    #[must_use]
    pub fn new(id: impl Into<EntityId>, updater: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            updater: updater.into(),
        }
    }

    /// Serialize the replicated part (`updater`).
    #[must_use]
    pub fn to_map(&self) -> AttrMap {
        let mut map = AttrMap::new();
        map.insert("updater".into(), Value::String(self.updater.clone()));
        map
    }

    /// Build from a construction map.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if `updater` is missing or not a string.
    pub fn from_map(id: EntityId, data: &AttrMap) -> Result<Self, EntityError> {
        Ok(Self {
            id,
            updater: field(data, "updater")?,
        })
    }

    /// Apply a partial map. An `updater` change hands the entity to another
    /// process.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::InvalidField`] if `updater` is not a string.
    pub fn apply(&mut self, data: &AttrMap) -> Result<(), EntityError> {
        update_field(data, "updater", &mut self.updater)?;
        Ok(())
    }
}

/// Drawable capability. The engine only replicates it; blitting is left to
/// whatever drawing layer listens for new entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sprite {
    /// Image asset path, if any.
    pub sprite_path: Option<String>,
    /// Target size in pixels, if the image should be scaled.
    pub scale_res: Option<[u32; 2]>,
    /// Whether the sprite is drawn.
    pub visible: bool,
}

impl Sprite {
    /// A visible, unscaled sprite.
    #[must_use]
    pub fn new(sprite_path: impl Into<String>) -> Self {
        Self {
            sprite_path: Some(sprite_path.into()),
            scale_res: None,
            visible: true,
        }
    }

    /// Scale the sprite to `width` x `height` pixels.
    #[must_use]
    pub fn with_scale(mut self, width: u32, height: u32) -> Self {
        self.scale_res = Some([width, height]);
        self
    }

    /// Write the sprite attributes into an entity's map.
    pub fn write_into(&self, map: &mut AttrMap) {
        map.insert(
            "sprite_path".into(),
            self.sprite_path.clone().map_or(Value::Null, Value::String),
        );
        map.insert(
            "scale_res".into(),
            self.scale_res
                .map_or(Value::Null, |[w, h]| Value::Array(vec![w.into(), h.into()])),
        );
        map.insert("visible".into(), Value::Bool(self.visible));
    }

    /// Build from a construction map.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError`] if an attribute is missing or has the wrong shape.
    pub fn from_map(data: &AttrMap) -> Result<Self, EntityError> {
        Ok(Self {
            sprite_path: field(data, "sprite_path")?,
            scale_res: field(data, "scale_res")?,
            visible: field(data, "visible")?,
        })
    }

    /// Apply a partial map.
    ///
    /// # Errors
    ///
    /// Returns [`EntityError::InvalidField`] if an attribute has the wrong shape.
    pub fn apply(&mut self, data: &AttrMap) -> Result<(), EntityError> {
        update_field(data, "sprite_path", &mut self.sprite_path)?;
        update_field(data, "scale_res", &mut self.scale_res)?;
        update_field(data, "visible", &mut self.visible)?;
        Ok(())
    }
}
