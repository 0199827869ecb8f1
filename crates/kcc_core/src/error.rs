//! # Controller Error Types
//!
//! Only caller bugs and unreadable configuration end up here. Bad runtime
//! settings are clamped and missing history degrades to a fallback sample,
//! neither produces an error.

use thiserror::Error;

use crate::data::Timeline;
use crate::pipeline::StageKind;

/// Errors that can occur while driving a controller.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KccError {
    /// Nested stage execution went deeper than the configured limit.
    #[error("stage {stage:?} nested {depth} levels deep, maximum is {max}")]
    StageOverflow {
        /// Stage that was about to start.
        stage: StageKind,
        /// Nesting depth at the time of the call.
        depth: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An operation was invoked from the wrong clock.
    #[error("{operation} requires the {expected:?} timeline but was called from {actual:?}")]
    WrongTimeline {
        /// Name of the rejected operation.
        operation: &'static str,
        /// Timeline the operation belongs to.
        expected: Timeline,
        /// Timeline that was active.
        actual: Timeline,
    },

    /// The controller was spawned twice.
    #[error("controller is already spawned")]
    AlreadySpawned,

    /// An operation that needs a spawned controller was called before spawn.
    #[error("{operation} requires a spawned controller")]
    NotSpawned {
        /// Name of the rejected operation.
        operation: &'static str,
    },

    /// Settings file could not be read or parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for controller operations.
pub type KccResult<T> = Result<T, KccError>;
