//! # KCC Core
//!
//! Kinematic capsule character controller: the motion engine without any
//! networking.
//!
//! ## Architecture Rules
//!
//! 1. **Kinematic only** - the actor is moved by velocities, never by forces from
//!    the physics engine
//! 2. **No allocation after warm-up** - overlap caches, probe states and stage
//!    frames come from recycle pools
//! 3. **Physics is a collaborator** - every query goes through [`PhysicsWorld`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use kcc_core::{FixedStep, KccConfig, StaticCollider, StaticWorld, Timeline, Vec3};
//!
//! let world = StaticWorld::new().with(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
//! let mut kcc = KccConfig::default().build(Arc::new(world));
//! kcc.spawn(Vec3::ZERO, 0.0, 0.0, FixedStep::default())?;
//!
//! kcc.begin_fixed_update(step);
//! kcc.set_input_direction(Vec3::FORWARD, Timeline::Fixed)?;
//! kcc.fixed_update()?;
//! kcc.end_fixed_update();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod contact;
pub mod data;
pub mod error;
pub mod integrator;
pub mod memory;
pub mod physics;
pub mod pipeline;
pub mod processors;
pub mod settings;
pub mod solver;
pub mod world;

pub use kcc_shared::{Quaternion, Vec2, Vec3};

pub use contact::{CollisionType, CollisionTypes, ContactThresholds, OverlapHit, OverlapInfo, ShapeCastInfo};
pub use data::{Collisions, Hit, Hits, Ignores, Interaction, Interactions, Modifiers, MovementState, NetworkId, Timeline};
pub use error::{KccError, KccResult};
pub use integrator::{FixedStep, HitsOverlapQuery, Kcc, KccHooks, RenderStep};
pub use memory::{Recycle, RecyclePool};
pub use physics::{
    CapsuleQuery, CapsuleShape, CastHit, CastQuery, ColliderHandle, ColliderInfo, ColliderKind, Penetration,
    PhysicsWorld, Pose, QueryTriggerInteraction,
};
pub use pipeline::{Capabilities, Processor, ProcessorId, StageFrame, StageKind};
pub use processors::{
    EnvironmentConfig, EnvironmentProcessor, GroundSnapConfig, GroundSnapProcessor, KccConfig, StepUpConfig,
    StepUpProcessor,
};
pub use settings::{AuthorityBehavior, Features, InterpolationMode, KccSettings, Shape};
pub use solver::Resolver;
pub use world::{StaticCollider, StaticWorld};
