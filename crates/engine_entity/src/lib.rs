//! # engine_entity
//!
//! Defines what a replicated entity is and how its state is turned into
//! attribute maps, diffed, and applied.
//!
//! This crate provides:
//!
//! - [`Entity`] trait: the contract every replicated object must satisfy.
//! - [`EntityKind`]: the constructor side, keyed by a wire type tag.
//! - [`Networked`] and [`Sprite`]: capability components entities compose.
//! - [`EntityRef`]: a link to another entity that may not exist yet.
//! - [`AttrMap`], [`diff`] and [`merge`]: the structural diff contract.
//! - [`EntityError`]: construction and update failures.

pub mod attrs;
pub mod components;
pub mod entity;
pub mod error;
pub mod reference;

pub use attrs::{AttrMap, diff, field, merge, update_field};
pub use components::{Networked, Sprite};
pub use entity::{Entity, EntityHandle, EntityId, EntityKind, new_entity_id};
pub use error::EntityError;
pub use reference::EntityRef;

pub use engine_math::Body2D;
