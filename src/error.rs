//! Error taxonomy for the simulation core.
//!
//! Every fallible operation in the crate returns [`SimError`]. Each variant
//! maps to a stable wire name (see [`SimError::kind`]) that the gateway puts
//! into `{ "error": { "kind": ..., "message": ... } }` responses, so clients
//! can branch on the kind and retry with corrected parameters.

use thiserror::Error;

use crate::components::identity::EntityId;
use crate::resources::simclock::SimTime;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("entity '{0}' not found")]
    NotFound(EntityId),

    #[error("unknown entity kind '{0}'")]
    UnknownKind(String),

    #[error("unknown action '{0}'")]
    UnknownAction(String),

    #[error("entity '{id}' cannot move back in time (last update {last}, requested {requested})")]
    NonMonotonicTime {
        id: EntityId,
        last: SimTime,
        requested: SimTime,
    },

    #[error("entity '{0}' has no position of its own")]
    NoPosition(EntityId),

    #[error("cannot take the direction of a zero-length vector")]
    DegenerateVector,

    #[error("placing '{item}' inside '{container}' would create a containment cycle")]
    Cycle { container: EntityId, item: EntityId },

    #[error(
        "'{source_id}' and '{destination}' are {distance:.3} units apart, limit is {limit}"
    )]
    Proximity {
        source_id: EntityId,
        destination: EntityId,
        distance: f64,
        limit: f64,
    },

    #[error("'{id}' holds {available} {resource}, {requested} requested")]
    InsufficientResource {
        id: EntityId,
        resource: String,
        available: f64,
        requested: f64,
    },

    #[error("timed out after {waited_ms} ms waiting for exclusive access to {ids:?}")]
    LockTimeout { ids: Vec<EntityId>, waited_ms: u64 },

    #[error("invalid arguments for '{action}': {reason}")]
    InvalidArguments { action: String, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("dispatcher is shutting down")]
    Shutdown,
}

impl SimError {
    /// Stable name used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::NotFound(_) => "NotFoundError",
            SimError::UnknownKind(_) => "UnknownKindError",
            SimError::UnknownAction(_) => "UnknownActionError",
            SimError::NonMonotonicTime { .. } => "NonMonotonicTimeError",
            SimError::NoPosition(_) => "NoPositionError",
            SimError::DegenerateVector => "DegenerateVectorError",
            SimError::Cycle { .. } => "CycleError",
            SimError::Proximity { .. } => "ProximityError",
            SimError::InsufficientResource { .. } => "InsufficientResourceError",
            SimError::LockTimeout { .. } => "LockTimeoutError",
            SimError::InvalidArguments { .. } => "InvalidArgumentsError",
            SimError::InvalidRequest(_) => "InvalidRequestError",
            SimError::Config(_) => "ConfigError",
            SimError::Shutdown => "ShutdownError",
        }
    }

    pub(crate) fn invalid_args(action: &str, reason: impl Into<String>) -> Self {
        SimError::InvalidArguments {
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        assert_eq!(
            SimError::NotFound(EntityId::from("ship-1")).kind(),
            "NotFoundError"
        );
        assert_eq!(SimError::DegenerateVector.kind(), "DegenerateVectorError");
        assert_eq!(
            SimError::invalid_args("stow", "missing field").kind(),
            "InvalidArgumentsError"
        );
    }

    #[test]
    fn test_insufficient_message_carries_numbers() {
        let err = SimError::InsufficientResource {
            id: EntityId::from("ship-a"),
            resource: "fuel".into(),
            available: 70.0,
            requested: 80.0,
        };
        let msg = err.to_string();
        assert!(msg.contains("70"));
        assert!(msg.contains("80"));
        assert!(msg.contains("fuel"));
    }
}
