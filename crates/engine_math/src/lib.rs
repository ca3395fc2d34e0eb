//! # engine_math
//!
//! Math types for the entity replication engine. Re-exports [`glam`] for
//! linear algebra and defines [`Body2D`], the physical capability an entity
//! can carry.

pub mod body;

// Re-export glam types for convenience.
pub use glam::{Vec2, Vec3};

pub use body::Body2D;
