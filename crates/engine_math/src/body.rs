//! 2D physical body capability.
//!
//! [`Body2D`] holds the kinematic state of a physical entity. It replicates
//! as a nested map so that a change to one field only ships that field:
//!
//! ```text
//! "body": {"position": [12.0, 4.0], "velocity": [1.0, 0.0], "angle": 0.0}
//! ```
//!
//! Collision and the real physics step live outside the engine; only
//! [`Body2D::integrate`] is provided for simple kinematic motion.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Position, velocity and rotation of a 2D body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Body2D {
    /// World-space position.
    pub position: Vec2,
    /// Linear velocity in units per second.
    pub velocity: Vec2,
    /// Rotation in radians.
    pub angle: f32,
}

impl Body2D {
    /// A body at rest at the origin.
    pub const ZERO: Self = Self {
        position: Vec2::ZERO,
        velocity: Vec2::ZERO,
        angle: 0.0,
    };

    /// Create a body at rest at `position`.
    #[must_use]
    pub fn at(position: Vec2) -> Self {
        Self {
            position,
            ..Self::ZERO
        }
    }

    /// Set the velocity.
    #[must_use]
    pub fn with_velocity(mut self, velocity: Vec2) -> Self {
        self.velocity = velocity;
        self
    }

    /// Advance the position by `velocity * dt`.
    pub fn integrate(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    /// Serialize to the nested replication map.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("position".into(), vec2_value(self.position));
        map.insert("velocity".into(), vec2_value(self.velocity));
        map.insert("angle".into(), Value::from(self.angle));
        map
    }

    /// Build a body from a full replication map.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a field is missing or has the wrong shape.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        Self::deserialize(Value::Object(map.clone()))
    }

    /// Overwrite the fields present in a partial replication map.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if a present field has the wrong
    /// shape. Fields before the bad one have already been applied.
    pub fn apply(&mut self, partial: &Map<String, Value>) -> Result<(), serde_json::Error> {
        if let Some(value) = partial.get("position") {
            self.position = Vec2::deserialize(value)?;
        }
        if let Some(value) = partial.get("velocity") {
            self.velocity = Vec2::deserialize(value)?;
        }
        if let Some(value) = partial.get("angle") {
            self.angle = f32::deserialize(value)?;
        }
        Ok(())
    }
}

impl Default for Body2D {
    fn default() -> Self {
        Self::ZERO
    }
}

fn vec2_value(v: Vec2) -> Value {
    Value::Array(vec![Value::from(v.x), Value::from(v.y)])
}
