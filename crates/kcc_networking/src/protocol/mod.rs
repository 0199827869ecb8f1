//! # State Block Protocol
//!
//! One actor travels as a fixed-size block of little-endian `u32` words.
//!
//! | Words | Content |
//! |-------|---------|
//! | 0..3 | Target position, fixed point at 1/1024 m |
//! | 3..6 | Full precision residual (zero when compressed) |
//! | 6, 7 | Look pitch, look yaw |
//! | 8 | Combined data: counters and movement flags |
//! | 9 | Combined settings |
//! | 10 | Collision layer mask |
//! | 11..14 | Radius, height, extent |
//! | 14 | Interaction counts (only with networked interactions) |
//! | 15.. | Interaction ids, two words each |
//!
//! The block length depends on
//! [`KccSettings::networked_interactions`](kcc_core::KccSettings), which
//! both peers must agree on.

mod codec;
mod cursor;

pub use codec::{
    decode_state, encode_state, interpolate_blocks, read_counters, read_position, read_transform, BlockCounters,
    BlockInterpolation, ObservedCounters, TransformSample,
};
pub use cursor::{WordReader, WordWriter};

use kcc_core::KccSettings;
use thiserror::Error;

/// Bytes per word.
pub const WORD_SIZE: usize = 4;

/// Fixed-point steps per meter of the position words.
pub const POSITION_ACCURACY: f32 = 1024.0;

/// Words before the interaction section.
pub const BASE_WORD_COUNT: usize = 14;

/// Words of one [`NetworkId`](kcc_core::NetworkId).
pub const NETWORK_ID_WORDS: usize = 2;

/// Largest count of a single interaction kind (8-bit field).
pub const MAX_INTERACTIONS_PER_KIND: usize = 255;

/// Errors raised by the block codec.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    /// The output buffer cannot hold the block.
    #[error("buffer too small: {required} bytes required, {available} available")]
    BufferTooSmall {
        /// Bytes the block needs.
        required: usize,
        /// Bytes the buffer has.
        available: usize,
    },

    /// A read ran past the end of the input.
    #[error("block truncated at byte offset {offset}")]
    Truncated {
        /// Offset of the failed read.
        offset: usize,
    },
}

/// Result type for codec operations.
pub type WireResult<T> = Result<T, WireError>;

/// Words used by the interaction section, zero when interactions are not
/// networked.
#[must_use]
pub fn interaction_word_count(settings: &KccSettings) -> usize {
    match settings.networked_interactions as usize {
        0 => 0,
        max => 1 + NETWORK_ID_WORDS * max,
    }
}

/// Words of a full block for `settings`.
#[must_use]
pub fn word_count(settings: &KccSettings) -> usize {
    BASE_WORD_COUNT + interaction_word_count(settings)
}

/// Bytes of a full block for `settings`.
#[must_use]
pub fn byte_count(settings: &KccSettings) -> usize {
    word_count(settings) * WORD_SIZE
}
