//! Error taxonomy for dispatch operations.
//!
//! Every fallible core operation returns one of the variants below, and the
//! API layer maps each kind to a distinct status code. A failed dispatch
//! because another dispatcher just took the vehicle (`Conflict`) must stay
//! distinguishable from "vehicle does not exist" (`NotFound`) so callers can
//! offer "pick another vehicle" versus "refresh the list".

use std::fmt;

/// The kind of record an operation failed to find.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entity {
    Incident,
    Vehicle,
    Handoff,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Incident => "incident",
            Entity::Vehicle => "vehicle",
            Entity::Handoff => "handoff",
        };
        write!(f, "{name}")
    }
}

/// Errors surfaced by the dispatch core.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// Malformed or missing input at creation time.
    #[error("invalid input: {0}")]
    Validation(String),

    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    /// The requested status change is not permitted by the state machine.
    #[error("illegal transition: {0}")]
    InvalidTransition(String),

    /// A concurrent mutation won the race and the precondition no longer
    /// holds. Callers may re-fetch and retry; the core never retries itself.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The acting staff member's role does not permit this operation.
    #[error("role '{role}' may not {action}")]
    Forbidden { role: String, action: String },
}

impl DispatchError {
    /// Convenience constructor for [`DispatchError::NotFound`].
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        DispatchError::NotFound {
            entity,
            id: id.into(),
        }
    }
}

pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_the_entity() {
        let err = DispatchError::not_found(Entity::Vehicle, "AMB-07");
        assert_eq!(err.to_string(), "vehicle not found: AMB-07");
    }
}
