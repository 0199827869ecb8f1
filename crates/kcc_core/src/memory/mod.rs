//! # Scratch Memory
//!
//! Recycled scratch objects for the per-step hot path. Stage frames, overlap
//! caches and probe states are taken from a pool, used by exactly one owner
//! and reset before they go back.

mod pool;

pub use pool::{Recycle, RecyclePool};
