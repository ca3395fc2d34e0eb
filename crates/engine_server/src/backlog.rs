//! Per-client outgoing queue.
//!
//! Ops waiting for one client are folded so that each entity has at most one
//! pending op. Successive updates merge into one diff, an update folds into a
//! pending create, and a create that is deleted before it was flushed never
//! goes out at all. The queue is therefore bounded by the number of entities
//! touched since the last flush, however long the client stays idle.

use std::collections::HashMap;

use engine_entity::merge;
use engine_net::{UpdateOp, UpdateType};

/// Where an entity's pending op sits in the queue.
#[derive(Debug, Clone, Copy)]
struct Pending {
    at: usize,
    /// The client may already hold an entity with this id, so a later
    /// delete has to reach it.
    known: bool,
}

/// Ops queued for one client, at most one per entity.
#[derive(Debug, Default)]
pub struct Backlog {
    ops: Vec<Option<UpdateOp>>,
    index: HashMap<String, Pending>,
}

impl Backlog {
    /// An empty backlog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ops that would be flushed right now.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Queue `op`, folding it into the entity's pending op if there is one.
    pub fn push(&mut self, op: UpdateOp) {
        let Some(pending) = self.index.get(&op.entity_id).copied() else {
            let known = op.update_type != UpdateType::Create;
            self.append(op, known);
            return;
        };
        let Some(slot) = self.ops[pending.at].as_mut() else {
            return;
        };

        match (slot.update_type, op.update_type) {
            (UpdateType::Create | UpdateType::Update, UpdateType::Update) => {
                if let (Some(target), Some(patch)) = (slot.data.as_mut(), op.data.as_ref()) {
                    merge(target, patch);
                }
            }
            // The client drops updates for entities it no longer has.
            (UpdateType::Delete, UpdateType::Update | UpdateType::Delete) => {}
            (UpdateType::Create, UpdateType::Delete) if !pending.known => {
                self.ops[pending.at] = None;
                self.index.remove(&op.entity_id);
            }
            _ => *slot = op,
        }
    }

    /// Take every queued op, in first-queued order, leaving the backlog empty.
    pub fn drain(&mut self) -> Vec<UpdateOp> {
        self.index.clear();
        std::mem::take(&mut self.ops).into_iter().flatten().collect()
    }

    fn append(&mut self, op: UpdateOp, known: bool) {
        let at = self.ops.len();
        self.index.insert(op.entity_id.clone(), Pending { at, known });
        self.ops.push(Some(op));
    }
}

impl Extend<UpdateOp> for Backlog {
    fn extend<I: IntoIterator<Item = UpdateOp>>(&mut self, ops: I) {
        for op in ops {
            self.push(op);
        }
    }
}
