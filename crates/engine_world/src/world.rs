//! The per-process world: registry, event bus, type map and outgoing queue.
//!
//! Every peer, client or server, owns exactly one [`World`]. It is the only
//! way entities enter or leave the registry, so the lifecycle rules live
//! here:
//!
//! - Insertion subscribes the entity's handlers and dispatches [`NewEntity`].
//! - [`World::kill`] queues a `delete` when the entity is owned locally and
//!   its `create` has gone out, then removes it, drops every subscription it
//!   owns, and dispatches [`EntityKilled`].
//! - [`World::apply_batch`] applies inbound ops strictly in order, then runs
//!   the reference resolver.

use std::cell::RefCell;
use std::rc::Rc;

use engine_entity::{AttrMap, EntityHandle, EntityId, merge, new_entity_id};
use engine_net::{UpdateOp, UpdateType};
use tracing::{debug, warn};

use crate::detect::detect_changes;
use crate::error::WorldError;
use crate::events::{Commands, EntityKilled, Event, EventBus, NewEntity};
use crate::queue::OpQueue;
use crate::registry::{Registry, Slot};
use crate::resolve::resolve_references;
use crate::types::{EntityTypeMap, Replicated};

/// Counts from one [`World::apply_batch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Ops applied.
    pub applied: usize,
    /// `update`/`delete` ops skipped because their target is unknown.
    pub skipped: usize,
    /// References linked by the sweep after the batch.
    pub resolved: usize,
}

/// One process's view of the shared entity graph.
#[derive(Debug)]
pub struct World {
    local_id: String,
    registry: Registry,
    bus: EventBus,
    types: EntityTypeMap,
    outgoing: OpQueue,
    commands: Commands,
}

impl World {
    /// Create an empty world for the process `local_id`.
    #[must_use]
    pub fn new(local_id: impl Into<String>, types: EntityTypeMap) -> Self {
        Self {
            local_id: local_id.into(),
            registry: Registry::new(),
            bus: EventBus::new(),
            types,
            outgoing: OpQueue::new(),
            commands: Commands::default(),
        }
    }

    /// This process's id.
    #[must_use]
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Returns a reference to the registry.
    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Returns a reference to the event bus.
    #[must_use]
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Returns a mutable reference to the event bus, for process-owned
    /// subscriptions.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Returns a reference to the registered entity types.
    #[must_use]
    pub fn types(&self) -> &EntityTypeMap {
        &self.types
    }

    /// Returns the outgoing queue.
    #[must_use]
    pub fn outgoing(&self) -> &OpQueue {
        &self.outgoing
    }

    /// A strong handle to an entity.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<EntityHandle> {
        self.registry.get(id)
    }

    /// Insert a locally built entity.
    ///
    /// Its `create` op is emitted by the next [`World::detect_changes`] if
    /// this process owns it. Returns the entity's id.
    pub fn spawn<T: Replicated>(&mut self, entity: T) -> EntityId {
        let id = entity.id().to_string();
        let handle: EntityHandle = Rc::new(RefCell::new(entity));
        self.insert(id.clone(), handle, T::TYPE_TAG, T::subscribe, AttrMap::new());
        self.flush_commands();
        id
    }

    /// Construct and insert an entity from its type tag and attributes.
    ///
    /// A fresh id is allocated if `id` is `None`. Returns the entity's id.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Entity`] if the tag is unknown or the attributes
    /// are rejected by the constructor.
    pub fn create(
        &mut self,
        type_tag: &str,
        id: Option<EntityId>,
        data: &AttrMap,
    ) -> Result<EntityId, WorldError> {
        let id = id.unwrap_or_else(new_entity_id);
        let entry = *self
            .types
            .get(type_tag)
            .map_err(|e| WorldError::entity(&id, e))?;
        let handle = entry
            .construct(id.clone(), data)
            .map_err(|e| WorldError::entity(&id, e))?;
        self.insert(
            id.clone(),
            handle,
            entry.tag,
            |id, bus| entry.subscribe(id, bus),
            AttrMap::new(),
        );
        self.flush_commands();
        Ok(id)
    }

    /// Kill an entity.
    ///
    /// Returns `false` if no entity with this id is registered.
    pub fn kill(&mut self, id: &str) -> bool {
        let Some(slot) = self.registry.slot(id) else {
            return false;
        };
        let owned = slot.handle.borrow().updater() == self.local_id;
        if owned && !slot.checkpoint.is_empty() {
            self.outgoing.push_trusted([UpdateOp::delete(id)]);
        }
        self.remove(id);
        self.flush_commands();
        true
    }

    /// Remove every entity owned by `peer` without emitting `delete` ops.
    ///
    /// Used when a peer disconnects. Returns the removed ids so the caller
    /// can relay deletes to the remaining peers.
    pub fn remove_owned_by(&mut self, peer: &str) -> Vec<EntityId> {
        let ids = self.registry.owned_by(peer);
        for id in &ids {
            self.remove(id);
        }
        self.flush_commands();
        ids
    }

    /// Dispatch an event to every authorized handler, then apply the spawns
    /// and kills the handlers queued.
    ///
    /// Returns the number of handlers that ran.
    pub fn dispatch<E: Event>(&mut self, event: &E) -> usize {
        let ran = self.emit(event);
        self.flush_commands();
        ran
    }

    /// Enqueue an op for the next flush.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::Protocol`] if the op is malformed or names an
    /// unregistered type.
    pub fn enqueue(&mut self, op: UpdateOp) -> Result<(), WorldError> {
        self.outgoing.push(op, &self.types)?;
        Ok(())
    }

    /// Diff every locally owned entity against its checkpoint and queue the
    /// resulting ops. Returns the number of ops queued.
    pub fn detect_changes(&mut self) -> usize {
        let ops = detect_changes(&mut self.registry, &self.local_id);
        let count = ops.len();
        self.outgoing.push_trusted(ops);
        count
    }

    /// Take every queued op.
    pub fn drain_outgoing(&mut self) -> Vec<UpdateOp> {
        self.outgoing.drain()
    }

    /// A `create` op for every registered entity, carrying its full
    /// serialization.
    #[must_use]
    pub fn snapshot(&self) -> Vec<UpdateOp> {
        self.registry
            .iter()
            .map(|(id, slot)| {
                UpdateOp::create(id.clone(), slot.type_tag, slot.handle.borrow().serialize())
            })
            .collect()
    }

    /// Link references whose targets are now registered.
    pub fn resolve_references(&self) -> usize {
        resolve_references(&self.registry)
    }

    /// Apply a batch received from a peer.
    ///
    /// Ops are applied strictly in order, so an entity created earlier in
    /// the batch may be updated later in it.
    ///
    /// - `create` constructs the entity through the type map. If the id is
    ///   already registered the old entity is replaced.
    /// - `update` applies the partial map. Unknown ids are skipped.
    /// - `delete` removes the entity. Unknown ids are skipped.
    ///
    /// Afterwards the resolver sweeps all entities and the checkpoints of
    /// every entity this process does not own are reset to their current
    /// serialization.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError`] on a malformed op, an unknown type tag, or data
    /// an entity rejects. Ops before the failing one stay applied.
    pub fn apply_batch(&mut self, ops: &[UpdateOp]) -> Result<ApplyReport, WorldError> {
        let mut report = ApplyReport::default();
        for op in ops {
            op.validate()?;
            let applied = match op.update_type {
                UpdateType::Create => {
                    self.apply_create(op)?;
                    true
                }
                UpdateType::Update => self.apply_update(op)?,
                UpdateType::Delete => self.apply_delete(&op.entity_id),
            };
            if applied {
                report.applied += 1;
            } else {
                report.skipped += 1;
            }
        }
        self.flush_commands();

        report.resolved = self.resolve_references();
        self.reset_foreign_checkpoints();
        debug!(
            applied = report.applied,
            skipped = report.skipped,
            resolved = report.resolved,
            "batch applied"
        );
        Ok(report)
    }

    fn apply_create(&mut self, op: &UpdateOp) -> Result<(), WorldError> {
        let id = &op.entity_id;
        let (Some(type_tag), Some(data)) = (op.entity_type.as_deref(), op.data.as_ref()) else {
            return Ok(());
        };
        let entry = *self.types.get(type_tag).map_err(|e| WorldError::entity(id, e))?;
        let handle = entry
            .construct(id.clone(), data)
            .map_err(|e| WorldError::entity(id, e))?;
        let checkpoint = handle.borrow().serialize();
        self.insert(id.clone(), handle, entry.tag, |id, bus| entry.subscribe(id, bus), checkpoint);
        Ok(())
    }

    fn apply_update(&mut self, op: &UpdateOp) -> Result<bool, WorldError> {
        let id = &op.entity_id;
        let Some(data) = op.data.as_ref() else {
            return Ok(false);
        };
        let Some(slot) = self.registry.slot_mut(id) else {
            warn!(entity_id = %id, "update for unknown entity, skipping");
            return Ok(false);
        };
        slot.handle
            .borrow_mut()
            .update(data)
            .map_err(|e| WorldError::entity(id, e))?;
        merge(&mut slot.checkpoint, data);
        Ok(true)
    }

    fn apply_delete(&mut self, id: &str) -> bool {
        if !self.registry.contains(id) {
            warn!(entity_id = %id, "delete for unknown entity, skipping");
            return false;
        }
        self.remove(id);
        true
    }

    /// Reset the checkpoint of every entity owned elsewhere to its current
    /// serialization. Locally owned checkpoints are left alone so changes
    /// made since the last detection still go out.
    fn reset_foreign_checkpoints(&mut self) {
        for (_, slot) in self.registry.iter_mut() {
            let entity = slot.handle.borrow();
            if entity.updater() != self.local_id {
                slot.checkpoint = entity.serialize();
            }
        }
    }

    fn insert<S>(
        &mut self,
        id: EntityId,
        handle: EntityHandle,
        type_tag: &'static str,
        subscribe: S,
        checkpoint: AttrMap,
    ) where
        S: FnOnce(&str, &mut EventBus),
    {
        if self.registry.contains(&id) {
            warn!(entity_id = %id, "entity already registered, replacing");
            self.remove(&id);
        }
        self.registry.insert(
            id.clone(),
            Slot {
                handle,
                type_tag,
                checkpoint,
            },
        );
        subscribe(&id, &mut self.bus);
        debug!(entity_id = %id, type_tag, "entity registered");
        self.emit(&NewEntity { id, type_tag });
    }

    fn remove(&mut self, id: &str) {
        if self.registry.remove(id).is_none() {
            return;
        }
        let dropped = self.bus.unsubscribe_entity(id);
        debug!(entity_id = %id, subscriptions = dropped, "entity removed");
        self.emit(&EntityKilled { id: id.to_string() });
    }

    fn emit<E: Event>(&mut self, event: &E) -> usize {
        self.bus
            .dispatch(event, &self.registry, &self.local_id, &mut self.commands)
    }

    fn flush_commands(&mut self) {
        while !self.commands.is_empty() {
            let pending = std::mem::take(&mut self.commands);
            for spawn in pending.spawns {
                self.insert(
                    spawn.id,
                    spawn.handle,
                    spawn.type_tag,
                    spawn.subscribe,
                    AttrMap::new(),
                );
            }
            for id in pending.kills {
                self.kill(&id);
            }
        }
    }
}
