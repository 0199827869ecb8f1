//! # KCC Networking
//!
//! Network clock layer on top of [`kcc_core`]: fixed state history,
//! rollback, render prediction and interpolation, and the state block
//! codec.
//!
//! ## Architecture Rules
//!
//! 1. **Two clocks, one thread** - fixed ticks commit state, render frames
//!    only read it or predict from it
//! 2. **Missing data degrades** - absent history yields an invalid
//!    [`RenderSample`] carrying a fallback, never an error
//! 3. **Fixed-size blocks** - one actor is one block of little-endian words
//!
//! ## Example
//!
//! ```rust,ignore
//! use kcc_networking::{KccActor, Role};
//!
//! let mut actor = KccActor::new(kcc, Role::InputAuthority);
//! actor.spawn(Vec3::ZERO, 0.0, 0.0, step)?;
//!
//! actor.begin_fixed_update(next_step);
//! actor.kcc_mut().set_input_direction(Vec3::FORWARD, Timeline::Fixed)?;
//! actor.fixed_update()?;
//! actor.end_fixed_update()?;
//! send(actor.network_block());
//!
//! actor.render_update(render_step)?;
//! let drawn = actor.transform();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod actor;
pub mod error;
pub mod history;
pub mod interpolation;
pub mod protocol;

pub use actor::{KccActor, RenderSample, Role};
pub use error::{ActorError, ActorResult};
pub use history::History;
pub use interpolation::{AntiJitter, PredictionCorrection};
pub use protocol::{decode_state, encode_state, interpolate_blocks, BlockInterpolation, WireError, WireResult};
