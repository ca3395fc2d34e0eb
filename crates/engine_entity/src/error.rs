//! Entity-level error types.

/// Errors raised while constructing, updating, or registering entities.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EntityError {
    /// A required attribute was absent from a construction map.
    #[error("missing field {field:?}")]
    MissingField {
        /// The attribute name.
        field: String,
    },

    /// An attribute was present but could not be interpreted.
    #[error("invalid field {field:?}: {reason}")]
    InvalidField {
        /// The attribute name.
        field: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No constructor is registered for this type tag.
    #[error("unknown entity type {0:?}")]
    UnknownEntityType(String),

    /// A constructor is already registered for this type tag.
    #[error("entity type {0:?} is already registered")]
    DuplicateEntityType(String),
}

impl EntityError {
    pub(crate) fn missing(field: &str) -> Self {
        Self::MissingField {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl ToString) -> Self {
        Self::InvalidField {
            field: field.to_string(),
            reason: reason.to_string(),
        }
    }
}
