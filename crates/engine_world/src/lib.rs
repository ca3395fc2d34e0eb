//! # engine_world
//!
//! The per-process half of entity replication.
//!
//! This crate provides:
//!
//! - [`World`]: the process context owning every piece below.
//! - [`Registry`]: id to live entity, with each entity's checkpoint.
//! - [`EventBus`]: typed event channels with authority filtering.
//! - [`detect_changes`]: checkpoint diffing into `create`/`update` ops.
//! - [`resolve_references`]: the post-batch reference sweep.
//! - [`OpQueue`]: validated outgoing ops.
//! - [`EntityTypeMap`]: wire type tag to constructor.
//! - [`TickConfig`]: simulation and network cadences.

pub mod detect;
pub mod error;
pub mod events;
pub mod queue;
pub mod registry;
pub mod resolve;
pub mod tick;
pub mod types;
pub mod world;

#[cfg(test)]
mod testing;

pub use detect::detect_changes;
pub use error::WorldError;
pub use events::{
    Authorize, Commands, EntityKilled, Event, EventBus, EventContext, NetworkTick, NewEntity, Tick,
    owner_only,
};
pub use queue::OpQueue;
pub use registry::{Registry, Slot};
pub use resolve::resolve_references;
pub use tick::{TickConfig, interval_for};
pub use types::{EntityTypeMap, Replicated, TypeEntry};
pub use world::{ApplyReport, World};
