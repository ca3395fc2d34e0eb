//! Outgoing op queue.

use engine_net::{ProtocolError, UpdateOp, UpdateType};

use crate::types::EntityTypeMap;

/// Ops waiting for the next network tick, in enqueue order.
#[derive(Debug, Default, Clone)]
pub struct OpQueue {
    ops: Vec<UpdateOp>,
}

impl OpQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and enqueue an op.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::MalformedUpdate`] if the op breaks the
    /// protocol contract or a `create` names an unregistered type. Nothing
    /// is enqueued in that case.
    pub fn push(&mut self, op: UpdateOp, types: &EntityTypeMap) -> Result<(), ProtocolError> {
        op.validate()?;
        if op.update_type == UpdateType::Create
            && let Some(tag) = op.entity_type.as_deref()
            && !types.contains(tag)
        {
            return Err(ProtocolError::MalformedUpdate {
                entity_id: op.entity_id,
                reason: format!("entity type {tag:?} is not registered"),
            });
        }
        self.ops.push(op);
        Ok(())
    }

    /// Enqueue ops this crate built itself.
    pub(crate) fn push_trusted(&mut self, ops: impl IntoIterator<Item = UpdateOp>) {
        self.ops.extend(ops);
    }

    /// Take every queued op, leaving the queue empty.
    pub fn drain(&mut self) -> Vec<UpdateOp> {
        std::mem::take(&mut self.ops)
    }

    /// Returns the number of queued ops.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The queued ops, oldest first.
    #[must_use]
    pub fn as_slice(&self) -> &[UpdateOp] {
        &self.ops
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{attrs, types};

    #[test]
    fn test_push_and_drain_in_order() {
        let types = types();
        let mut queue = OpQueue::new();
        queue
            .push(UpdateOp::create("p1", "player", attrs(json!({"x": 0}))), &types)
            .unwrap();
        queue.push(UpdateOp::update("p1", attrs(json!({"x": 1}))), &types).unwrap();
        queue.push(UpdateOp::delete("p1"), &types).unwrap();

        let drained = queue.drain();
        let kinds: Vec<_> = drained.iter().map(|op| op.update_type).collect();
        assert_eq!(kinds, [UpdateType::Create, UpdateType::Update, UpdateType::Delete]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_create_missing_type_rejected() {
        let mut op = UpdateOp::create("p1", "player", attrs(json!({})));
        op.entity_type = None;
        let mut queue = OpQueue::new();
        assert!(matches!(
            queue.push(op, &types()),
            Err(ProtocolError::MalformedUpdate { .. })
        ));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_unregistered_type_rejected() {
        let mut queue = OpQueue::new();
        let result = queue.push(UpdateOp::create("t1", "tile", attrs(json!({}))), &types());
        assert_eq!(
            result,
            Err(ProtocolError::MalformedUpdate {
                entity_id: "t1".into(),
                reason: "entity type \"tile\" is not registered".into(),
            })
        );
    }
}
