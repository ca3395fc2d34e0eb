//! World-level error types.

use engine_entity::EntityError;
use engine_net::ProtocolError;

/// Errors raised while enqueueing or applying update ops.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// An op violates the protocol contract.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// An entity could not be built or updated from an op's data.
    #[error("entity {entity_id}: {source}")]
    Entity {
        /// The entity the op targeted.
        entity_id: String,
        /// What went wrong.
        #[source]
        source: EntityError,
    },
}

impl WorldError {
    pub(crate) fn entity(entity_id: &str, source: EntityError) -> Self {
        Self::Entity {
            entity_id: entity_id.to_string(),
            source,
        }
    }
}
