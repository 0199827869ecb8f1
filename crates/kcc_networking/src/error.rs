//! # Actor Error Types

use kcc_core::KccError;
use thiserror::Error;

use crate::actor::Role;
use crate::protocol::WireError;

/// Errors raised while driving a networked actor.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActorError {
    /// The controller rejected the call.
    #[error(transparent)]
    Kcc(#[from] KccError),

    /// A state block could not be read or written.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// The operation does not exist for the actor's role.
    #[error("{operation} is not available to a {role:?} actor")]
    WrongRole {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Role of the actor.
        role: Role,
    },
}

/// Result type for actor operations.
pub type ActorResult<T> = Result<T, ActorError>;
