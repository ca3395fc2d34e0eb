//! # arena
//!
//! A small top-down arena on top of the replication engine.
//!
//! This crate provides:
//!
//! - [`Player`]: a drawable, physical entity that bounces around the arena.
//! - [`Weapon`]: follows its owning player and dies with it.
//! - [`DrawList`]: the set of visible drawable entities, kept current from
//!   lifecycle events the way a drawing layer would.
//! - The `arena_server` and `arena_client` binaries.

pub mod draw;
pub mod player;
pub mod weapon;

use engine_entity::EntityError;
use engine_math::Vec2;
use engine_world::EntityTypeMap;

pub use draw::DrawList;
pub use player::Player;
pub use weapon::Weapon;

/// Width and height of the arena in world units.
pub const ARENA_SIZE: Vec2 = Vec2::new(800.0, 600.0);

/// Every entity type the arena replicates.
///
/// # Errors
///
/// Returns [`EntityError::DuplicateEntityType`] if two types share a tag.
pub fn types() -> Result<EntityTypeMap, EntityError> {
    EntityTypeMap::new().with::<Player>()?.with::<Weapon>()
}

/// A spawn point inside the arena, spread out by `seed`.
#[must_use]
pub fn spawn_point(seed: usize) -> Vec2 {
    let columns = 8;
    let cell = ARENA_SIZE / Vec2::new(columns as f32, 6.0);
    let column = (seed % columns) as f32;
    let row = ((seed / columns) % 6) as f32;
    cell * Vec2::new(column + 0.5, row + 0.5)
}
