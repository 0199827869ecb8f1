//! # KCC Shared
//!
//! Math types used by both the motion core and the network layer.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on physics or networking code.
//! Anything that needs colliders belongs in `kcc_core`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod math;

pub use math::{
    clamp_pitch, interpolate_range, lerp, wrap_angle, wrap_yaw, Quaternion, Vec2, Vec3, Vec3d,
};
