//! # Motion Integrator
//!
//! [`Kcc`] owns one actor: its settings, the fixed and render movement
//! states, scratch pools and the registered processors.
//!
//! ## Clock Phases
//!
//! ```text
//! begin_fixed_update ─► fixed_update ─► end_fixed_update     (0..n per frame)
//!                                              │
//!                                              ▼ render = fixed
//! begin_render_update ─► render_predict | run_interpolate_stage
//! ```
//!
//! Every API write names the timeline it belongs to. Render writes are
//! discarded by the next fixed tick; fixed writes are rejected outside the
//! fixed phase.

mod depenetration;
mod ground;
mod movement;
mod stages;

pub use ground::{
    check_ground, ground_tangent, project_on_ground, project_vertical_penetration, GroundProbe,
};
pub use movement::HitsOverlapQuery;

use std::fmt;
use std::sync::Arc;

use kcc_shared::Vec3;

use crate::contact::{OverlapInfo, ShapeCastInfo};
use crate::data::{Interaction, MovementState, NetworkId, Timeline};
use crate::error::{KccError, KccResult};
use crate::memory::RecyclePool;
use crate::physics::{CapsuleShape, CastHit, ColliderHandle, ColliderInfo, PhysicsWorld};
use crate::pipeline::{CachedProcessor, Processor, ProcessorId, ProcessorRegistry, StageFrame};
use crate::settings::{KccSettings, Shape, CACHE_SIZE, MAX_NESTED_STAGES};
use crate::solver::Resolver;

/// Filter deciding whether a collider takes part in collision resolution.
pub type ResolveCollisionHook = Box<dyn Fn(&ColliderInfo) -> bool + Send + Sync>;

/// Collision enter, stay or exit callback.
pub type CollisionHook = Box<dyn FnMut(&Interaction) + Send>;

/// Optional handlers fixed at construction.
#[derive(Default)]
pub struct KccHooks {
    /// Colliders for which this returns `false` are skipped by every query.
    pub resolve_collision: Option<ResolveCollisionHook>,
    /// A networked object started colliding with the actor.
    pub on_collision_enter: Option<CollisionHook>,
    /// A networked object is still colliding after a move. Fires once per
    /// tracked collision at the end of every move.
    pub on_collision_stay: Option<CollisionHook>,
    /// A networked object stopped colliding with the actor.
    pub on_collision_exit: Option<CollisionHook>,
}

impl KccHooks {
    /// No handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the collision filter.
    #[must_use]
    pub fn with_resolve_collision(
        mut self,
        hook: impl Fn(&ColliderInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.resolve_collision = Some(Box::new(hook));
        self
    }

    /// Sets the collision enter callback.
    #[must_use]
    pub fn with_collision_enter(mut self, hook: impl FnMut(&Interaction) + Send + 'static) -> Self {
        self.on_collision_enter = Some(Box::new(hook));
        self
    }

    /// Sets the collision stay callback.
    #[must_use]
    pub fn with_collision_stay(mut self, hook: impl FnMut(&Interaction) + Send + 'static) -> Self {
        self.on_collision_stay = Some(Box::new(hook));
        self
    }

    /// Sets the collision exit callback.
    #[must_use]
    pub fn with_collision_exit(mut self, hook: impl FnMut(&Interaction) + Send + 'static) -> Self {
        self.on_collision_exit = Some(Box::new(hook));
        self
    }

    fn resolves(&self, collider: &ColliderInfo) -> bool {
        self.resolve_collision.as_ref().map_or(true, |hook| hook(collider))
    }
}

impl fmt::Debug for KccHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KccHooks")
            .field("resolve_collision", &self.resolve_collision.is_some())
            .field("on_collision_enter", &self.on_collision_enter.is_some())
            .field("on_collision_stay", &self.on_collision_stay.is_some())
            .field("on_collision_exit", &self.on_collision_exit.is_some())
            .finish()
    }
}

/// Clock values of one fixed tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FixedStep {
    /// Host frame the tick runs in.
    pub frame: u32,
    /// Simulation tick.
    pub tick: i32,
    /// Simulation time at the end of the tick.
    pub time: f32,
    /// Tick length.
    pub delta_time: f32,
}

/// Clock values of one render frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RenderStep {
    /// Host frame.
    pub frame: u32,
    /// Tick the frame belongs to.
    pub tick: i32,
    /// Interpolation alpha between the last two ticks.
    pub alpha: f32,
    /// Render time.
    pub time: f32,
    /// Time since the previous render frame.
    pub delta_time: f32,
}

// ============================================================================
// CONTROLLER
// ============================================================================

/// Kinematic capsule controller of one actor.
pub struct Kcc {
    settings: KccSettings,
    default_settings: KccSettings,
    world: Arc<dyn PhysicsWorld>,
    hooks: KccHooks,

    timeline: Timeline,
    is_spawned: bool,
    has_collider: bool,
    /// Fixed and render state, indexed by [`Timeline::index`].
    states: [MovementState; 2],

    resolver: Resolver,
    /// Overlap of the current move step, radius-wide extent.
    step_overlap: OverlapInfo,
    /// Overlap backing the tracked hits.
    track_overlap: OverlapInfo,

    overlap_pool: RecyclePool<OverlapInfo>,
    cast_pool: RecyclePool<ShapeCastInfo>,
    state_pool: RecyclePool<MovementState>,
    frame_pool: RecyclePool<StageFrame>,

    processors: ProcessorRegistry,
    cached_processors: Vec<CachedProcessor>,
    stages: Vec<StageFrame>,

    collider_buffer: Vec<ColliderInfo>,
    cast_buffer: Vec<CastHit>,
    interaction_buffer: Vec<Interaction>,
}

impl Kcc {
    /// Creates an unspawned controller.
    #[must_use]
    pub fn new(world: Arc<dyn PhysicsWorld>, settings: KccSettings) -> Self {
        Self::with_hooks(world, settings, KccHooks::default())
    }

    /// Creates an unspawned controller with handlers.
    #[must_use]
    pub fn with_hooks(world: Arc<dyn PhysicsWorld>, settings: KccSettings, hooks: KccHooks) -> Self {
        Self {
            default_settings: settings.clone(),
            settings,
            world,
            hooks,
            timeline: Timeline::Fixed,
            is_spawned: false,
            has_collider: false,
            states: [MovementState::new(), MovementState::new()],
            resolver: Resolver::new(),
            step_overlap: OverlapInfo::new(),
            track_overlap: OverlapInfo::new(),
            overlap_pool: RecyclePool::new(8),
            cast_pool: RecyclePool::new(8),
            state_pool: RecyclePool::new(4),
            frame_pool: RecyclePool::new(MAX_NESTED_STAGES),
            processors: ProcessorRegistry::new(),
            cached_processors: Vec::with_capacity(CACHE_SIZE),
            stages: Vec::with_capacity(MAX_NESTED_STAGES),
            collider_buffer: Vec::with_capacity(CACHE_SIZE),
            cast_buffer: Vec::with_capacity(CACHE_SIZE),
            interaction_buffer: Vec::with_capacity(CACHE_SIZE),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Current clock phase.
    #[inline]
    #[must_use]
    pub const fn timeline(&self) -> Timeline {
        self.timeline
    }

    /// The controller was spawned.
    #[inline]
    #[must_use]
    pub const fn is_spawned(&self) -> bool {
        self.is_spawned
    }

    /// The actor has a collider (active and shape is not `None`).
    #[inline]
    #[must_use]
    pub const fn has_collider(&self) -> bool {
        self.has_collider
    }

    /// State of the current clock phase.
    #[inline]
    #[must_use]
    pub fn data(&self) -> &MovementState {
        &self.states[self.timeline.index()]
    }

    /// Mutable state of the current clock phase.
    #[inline]
    pub fn data_mut(&mut self) -> &mut MovementState {
        &mut self.states[self.timeline.index()]
    }

    /// State of `timeline`.
    #[inline]
    #[must_use]
    pub fn state(&self, timeline: Timeline) -> &MovementState {
        &self.states[timeline.index()]
    }

    /// Fixed timeline state.
    #[inline]
    #[must_use]
    pub fn fixed_data(&self) -> &MovementState {
        self.state(Timeline::Fixed)
    }

    /// Mutable fixed timeline state, for restoring and decoding snapshots.
    #[inline]
    pub fn fixed_data_mut(&mut self) -> &mut MovementState {
        &mut self.states[Timeline::Fixed.index()]
    }

    /// Render timeline state.
    #[inline]
    #[must_use]
    pub fn render_data(&self) -> &MovementState {
        self.state(Timeline::Render)
    }

    /// Mutable render timeline state.
    #[inline]
    pub fn render_data_mut(&mut self) -> &mut MovementState {
        &mut self.states[Timeline::Render.index()]
    }

    /// Fixed state for reading next to the mutable render state.
    #[inline]
    pub fn fixed_and_render_mut(&mut self) -> (&MovementState, &mut MovementState) {
        let [fixed, render] = &mut self.states;
        (fixed, render)
    }

    /// Current settings.
    #[inline]
    #[must_use]
    pub const fn settings(&self) -> &KccSettings {
        &self.settings
    }

    /// Physics collaborator.
    #[inline]
    #[must_use]
    pub fn world(&self) -> &dyn PhysicsWorld {
        self.world.as_ref()
    }

    /// Capsule built from the current settings.
    #[inline]
    #[must_use]
    pub const fn capsule(&self) -> CapsuleShape {
        CapsuleShape::new(self.settings.radius, self.settings.height)
    }

    /// Overlap of the last move step. Processors of `AfterMoveStep` read
    /// the classified contacts from here.
    #[inline]
    #[must_use]
    pub const fn step_overlap(&self) -> &OverlapInfo {
        &self.step_overlap
    }

    /// Overlap backing the tracked hits.
    #[inline]
    #[must_use]
    pub const fn tracked_overlap(&self) -> &OverlapInfo {
        &self.track_overlap
    }

    /// Stage currently executing, innermost first.
    pub fn stage_frame_mut(&mut self) -> Option<&mut StageFrame> {
        self.stages.last_mut()
    }

    /// Nesting depth of stage execution.
    #[inline]
    #[must_use]
    pub fn stage_depth(&self) -> usize {
        self.stages.len()
    }

    // ========================================================================
    // SCRATCH POOLS
    // ========================================================================

    /// Takes a cleared overlap cache from the pool.
    pub fn acquire_overlap(&mut self) -> OverlapInfo {
        self.overlap_pool.acquire()
    }

    /// Returns an overlap cache to the pool.
    pub fn release_overlap(&mut self, info: OverlapInfo) {
        self.overlap_pool.release(info);
    }

    /// Takes a cleared shape cast cache from the pool.
    pub fn acquire_cast(&mut self) -> ShapeCastInfo {
        self.cast_pool.acquire()
    }

    /// Returns a shape cast cache to the pool.
    pub fn release_cast(&mut self, info: ShapeCastInfo) {
        self.cast_pool.release(info);
    }

    /// Takes a probe state holding a copy of the current state.
    pub fn acquire_state_copy(&mut self) -> MovementState {
        let mut state = self.state_pool.acquire();
        state.copy_from(&self.states[self.timeline.index()]);
        state
    }

    /// Returns a probe state to the pool.
    pub fn release_state(&mut self, state: MovementState) {
        self.state_pool.release(state);
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Places the actor in the world and captures the default settings.
    ///
    /// The fixed state is initialized from `position`, the look angles and
    /// `step`; the render state is a copy of it.
    ///
    /// # Errors
    ///
    /// Returns [`KccError::AlreadySpawned`] if called twice without a
    /// [`Kcc::despawn`] in between.
    pub fn spawn(&mut self, position: Vec3, look_pitch: f32, look_yaw: f32, step: FixedStep) -> KccResult<()> {
        if self.is_spawned {
            tracing::error!("spawn called on a spawned controller");
            return Err(KccError::AlreadySpawned);
        }

        self.default_settings.clone_from(&self.settings);
        self.set_defaults(false);
        self.is_spawned = true;
        self.timeline = Timeline::Fixed;

        let fixed = &mut self.states[Timeline::Fixed.index()];
        fixed.clear();
        fixed.frame = step.frame;
        fixed.tick = step.tick;
        fixed.time = step.time;
        fixed.delta_time = step.delta_time;
        fixed.update_delta_time = step.delta_time;
        fixed.base_position = position;
        fixed.desired_position = position;
        fixed.target_position = position;
        fixed.set_look_rotation(look_pitch, look_yaw);

        self.publish_fixed_to_render();
        self.refresh_collider();

        tracing::info!(
            "spawned at ({:.3}, {:.3}, {:.3}) tick {}",
            position.x,
            position.y,
            position.z,
            step.tick
        );
        Ok(())
    }

    /// Removes the actor: exits every collision, drops every processor and
    /// restores the settings captured at spawn.
    pub fn despawn(&mut self) {
        if !self.is_spawned {
            return;
        }

        self.force_remove_all_collisions_of(Timeline::Fixed);
        self.states[Timeline::Fixed.index()].modifiers.clear();
        self.processors.clear();
        self.set_defaults(true);

        tracing::info!("despawned");
    }

    /// Restores the settings captured at spawn.
    pub fn reset_settings(&mut self) {
        self.settings.clone_from(&self.default_settings);
        self.refresh_collider();
        tracing::info!("settings reset to spawn defaults");
    }

    fn set_defaults(&mut self, cleanup: bool) {
        for state in &mut self.states {
            state.clear();
        }
        self.step_overlap.reset();
        self.track_overlap.reset();
        self.resolver.reset();
        self.cached_processors.clear();
        for frame in self.stages.drain(..) {
            self.frame_pool.release(frame);
        }
        self.collider_buffer.clear();
        self.cast_buffer.clear();
        self.interaction_buffer.clear();

        if cleanup {
            self.is_spawned = false;
            self.timeline = Timeline::Fixed;
            self.has_collider = false;
            self.settings.clone_from(&self.default_settings);
        }
    }

    /// Clamps the capsule and decides whether the actor has a collider.
    pub fn refresh_collider(&mut self) {
        let is_active = self.data().is_active;
        self.has_collider = self.settings.refresh_collider(is_active);
    }

    // ========================================================================
    // CLOCK PHASES
    // ========================================================================

    /// Enters the fixed phase and stamps the fixed state with `step`.
    pub fn begin_fixed_update(&mut self, step: FixedStep) {
        self.timeline = Timeline::Fixed;

        let fixed = &mut self.states[Timeline::Fixed.index()];
        fixed.frame = step.frame;
        fixed.tick = step.tick;
        fixed.alpha = 0.0;
        fixed.time = step.time;
        fixed.delta_time = step.delta_time;
        fixed.update_delta_time = step.delta_time;
    }

    /// Runs one predicted fixed move.
    ///
    /// # Errors
    ///
    /// Fails if the controller is not spawned, if called outside the fixed
    /// phase, or if a processor fails.
    pub fn fixed_update(&mut self) -> KccResult<()> {
        self.require_spawned("fixed_update")?;
        self.require_timeline(Timeline::Fixed, "fixed_update")?;

        self.refresh_collider();
        self.move_predicted()
    }

    /// Copies the fixed state into the render state and leaves the fixed
    /// phase.
    pub fn end_fixed_update(&mut self) {
        self.publish_fixed_to_render();
        self.timeline = Timeline::Render;
    }

    /// Overwrites the render state with the fixed state.
    pub fn publish_fixed_to_render(&mut self) {
        let [fixed, render] = &mut self.states;
        render.copy_from(fixed);
    }

    /// Stamps the render state with `step`.
    ///
    /// # Errors
    ///
    /// Fails if called during the fixed phase.
    pub fn begin_render_update(&mut self, step: RenderStep) -> KccResult<()> {
        self.require_timeline(Timeline::Render, "begin_render_update")?;

        let render = &mut self.states[Timeline::Render.index()];
        render.frame = step.frame;
        render.tick = step.tick;
        render.alpha = step.alpha;
        render.time = step.time;
        render.delta_time = step.delta_time;
        render.update_delta_time = step.delta_time;
        Ok(())
    }

    /// Runs one predicted render move from the current render state.
    ///
    /// # Errors
    ///
    /// Fails if the controller is not spawned, if called during the fixed
    /// phase, or if a processor fails.
    pub fn render_predict(&mut self) -> KccResult<()> {
        self.require_spawned("render_predict")?;
        self.require_timeline(Timeline::Render, "render_predict")?;
        self.move_predicted()
    }

    /// Runs `Interpolate` processors on the render state.
    ///
    /// # Errors
    ///
    /// Fails if called during the fixed phase or if a processor fails.
    pub fn run_interpolate_stage(&mut self) -> KccResult<()> {
        self.require_timeline(Timeline::Render, "run_interpolate_stage")?;
        self.refresh_collider();
        if !self.data().is_active {
            return Ok(());
        }
        self.cache_processors();
        self.execute_stage(crate::pipeline::StageKind::Interpolate)
    }

    fn require_spawned(&self, operation: &'static str) -> KccResult<()> {
        if self.is_spawned {
            Ok(())
        } else {
            tracing::error!("{} called before spawn", operation);
            Err(KccError::NotSpawned { operation })
        }
    }

    fn require_timeline(&self, expected: Timeline, operation: &'static str) -> KccResult<()> {
        if self.timeline == expected {
            return Ok(());
        }
        tracing::error!(
            "{} requires the {:?} timeline, called from {:?}",
            operation,
            expected,
            self.timeline
        );
        Err(KccError::WrongTimeline {
            operation,
            expected,
            actual: self.timeline,
        })
    }

    // ========================================================================
    // STATE WRITES
    // ========================================================================

    /// Applies `write` to the render state, and to the fixed state when
    /// `timeline` is fixed.
    fn write(
        &mut self,
        timeline: Timeline,
        operation: &'static str,
        mut write: impl FnMut(&mut MovementState),
    ) -> KccResult<()> {
        if timeline == Timeline::Fixed {
            self.require_timeline(Timeline::Fixed, operation)?;
        }

        write(&mut self.states[Timeline::Render.index()]);
        if timeline == Timeline::Fixed {
            write(&mut self.states[Timeline::Fixed.index()]);
        }
        Ok(())
    }

    /// Enables or disables simulation of the actor.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_active(&mut self, is_active: bool, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_active", |data| data.is_active = is_active)?;
        self.has_collider = self.settings.refresh_collider(is_active);
        Ok(())
    }

    /// Sets the movement input; longer vectors are clamped to unit length.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_input_direction(&mut self, direction: Vec3, timeline: Timeline) -> KccResult<()> {
        let direction = direction.clamp_to_normalized();
        self.write(timeline, "set_input_direction", |data| data.input_direction = direction)
    }

    /// Adds to the look rotation.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_look_rotation(&mut self, pitch_delta: f32, yaw_delta: f32, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_look_rotation", |data| {
            data.add_look_rotation(pitch_delta, yaw_delta);
        })
    }

    /// Sets the look rotation.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_look_rotation(&mut self, pitch: f32, yaw: f32, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_look_rotation", |data| data.set_look_rotation(pitch, yaw))
    }

    /// Adds a jump impulse, applied by the environment processor.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn jump(&mut self, impulse: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "jump", |data| data.jump_impulse += impulse)
    }

    /// Adds external velocity for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_external_velocity(&mut self, velocity: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_external_velocity", |data| data.external_velocity += velocity)
    }

    /// Replaces external velocity for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_external_velocity(&mut self, velocity: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_external_velocity", |data| data.external_velocity = velocity)
    }

    /// Adds external acceleration for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_external_acceleration(&mut self, acceleration: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_external_acceleration", |data| {
            data.external_acceleration += acceleration;
        })
    }

    /// Replaces external acceleration for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_external_acceleration(&mut self, acceleration: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_external_acceleration", |data| {
            data.external_acceleration = acceleration;
        })
    }

    /// Adds an external impulse for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_external_impulse(&mut self, impulse: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_external_impulse", |data| data.external_impulse += impulse)
    }

    /// Replaces the external impulse for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_external_impulse(&mut self, impulse: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_external_impulse", |data| data.external_impulse = impulse)
    }

    /// Adds an external force for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_external_force(&mut self, force: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_external_force", |data| data.external_force += force)
    }

    /// Replaces the external force for the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_external_force(&mut self, force: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_external_force", |data| data.external_force = force)
    }

    /// Adds a raw position offset, consumed by the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_external_delta(&mut self, delta: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_external_delta", |data| data.external_delta += delta)
    }

    /// Replaces the raw position offset consumed by the next move.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_external_delta(&mut self, delta: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_external_delta", |data| data.external_delta = delta)
    }

    /// Overwrites the dynamic velocity.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_dynamic_velocity(&mut self, velocity: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_dynamic_velocity", |data| data.dynamic_velocity = velocity)
    }

    /// Overwrites the kinematic velocity.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_kinematic_velocity(&mut self, velocity: Vec3, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_kinematic_velocity", |data| data.kinematic_velocity = velocity)
    }

    /// Moves the actor.
    ///
    /// A teleport flags the state, clears stepping and snapping and, when
    /// issued from a processor, ends the pending CCD substeps.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn set_position(&mut self, position: Vec3, teleport: bool, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "set_position", |data| {
            data.base_position = position;
            data.desired_position = position;
            data.target_position = position;
            if teleport {
                data.has_teleported = true;
                data.is_stepping_up = false;
                data.is_snapping_to_ground = false;
            }
        })
    }

    /// Registers a networked object that modifies movement. Processors it
    /// provides take part in moves while it is registered.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_modifier(&mut self, id: NetworkId, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_modifier", |data| {
            data.modifiers.add(id, None);
        })
    }

    /// Unregisters a movement modifier.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn remove_modifier(&mut self, id: NetworkId, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "remove_modifier", |data| {
            data.modifiers.remove(id);
        })
    }

    /// Excludes a networked object, or one of its colliders, from every
    /// physics query.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn add_ignore(&mut self, id: NetworkId, collider: Option<ColliderHandle>, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "add_ignore", |data| {
            data.ignores.add(id, collider);
        })
    }

    /// Stops ignoring a networked object.
    ///
    /// # Errors
    ///
    /// Fails for [`Timeline::Fixed`] outside the fixed phase.
    pub fn remove_ignore(&mut self, id: NetworkId, timeline: Timeline) -> KccResult<()> {
        self.write(timeline, "remove_ignore", |data| {
            data.ignores.remove(id);
        })
    }

    // ========================================================================
    // SETTINGS
    // ========================================================================

    /// Changes the shape and optionally the capsule size. Non-positive
    /// sizes keep the current value.
    pub fn set_shape(&mut self, shape: Shape, radius: f32, height: f32) {
        self.settings.shape = shape;
        if radius > 0.0 {
            self.settings.radius = radius;
        }
        if height > 0.0 {
            self.settings.height = height;
        }
        self.refresh_collider();
    }

    /// Makes the actor collider a trigger.
    pub fn set_trigger(&mut self, is_trigger: bool) {
        self.settings.is_trigger = is_trigger;
        self.refresh_collider();
    }

    /// Changes the capsule radius; non-positive values are ignored.
    pub fn set_radius(&mut self, radius: f32) {
        if radius <= 0.0 {
            return;
        }
        self.settings.radius = radius;
        self.refresh_collider();
    }

    /// Changes the capsule height; non-positive values are ignored.
    pub fn set_height(&mut self, height: f32) {
        if height <= 0.0 {
            return;
        }
        self.settings.height = height;
        self.refresh_collider();
    }

    /// Moves the actor collider to `layer` (0..=31).
    pub fn set_collider_layer(&mut self, layer: u32) {
        self.settings.collider_layer = layer & 0b1_1111;
        self.refresh_collider();
    }

    /// Changes the layers the actor collides with.
    pub fn set_collision_layer_mask(&mut self, layer_mask: u32) {
        self.settings.collision_layer_mask = layer_mask;
    }

    /// Applies arbitrary settings changes and re-clamps the collider.
    pub fn update_settings(&mut self, update: impl FnOnce(&mut KccSettings)) {
        update(&mut self.settings);
        self.refresh_collider();
    }

    // ========================================================================
    // PROCESSORS
    // ========================================================================

    /// Registers a processor that takes part in every move.
    pub fn add_processor<P: Processor>(&mut self, processor: P) -> ProcessorId {
        self.processors.add(processor)
    }

    /// Registers a processor provided by a networked object. It takes part
    /// in moves while the object is a modifier or a collision.
    pub fn add_provided_processor<P: Processor>(&mut self, processor: P, provider: NetworkId) -> ProcessorId {
        self.processors.add_provided(processor, provider)
    }

    /// Unregisters a processor.
    pub fn remove_processor(&mut self, id: ProcessorId) -> bool {
        let removed = self.processors.contains(id);
        drop(self.processors.remove(id));
        removed
    }

    /// Unregisters every processor provided by `provider`.
    pub fn remove_provided_processors(&mut self, provider: NetworkId) -> usize {
        self.processors.remove_provided(provider)
    }

    /// Number of registered processors.
    #[must_use]
    pub fn processor_count(&self) -> usize {
        self.processors.len()
    }

    /// Processors selected for the current move, highest priority first.
    #[must_use]
    pub fn cached_processors(&self) -> &[CachedProcessor] {
        &self.cached_processors
    }
}

impl fmt::Debug for Kcc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Kcc")
            .field("timeline", &self.timeline)
            .field("is_spawned", &self.is_spawned)
            .field("has_collider", &self.has_collider)
            .field("settings", &self.settings)
            .field("processors", &self.processors)
            .field("stage_depth", &self.stages.len())
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{StaticCollider, StaticWorld};

    fn spawned() -> Kcc {
        let world = StaticWorld::new().with(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
        let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
        kcc.spawn(Vec3::new(1.0, 0.0, 2.0), 10.0, 20.0, FixedStep {
            frame: 1,
            tick: 5,
            time: 5.0 / 60.0,
            delta_time: 1.0 / 60.0,
        })
        .unwrap();
        kcc
    }

    #[test]
    fn test_spawn_initializes_both_timelines() {
        let kcc = spawned();
        assert!(kcc.is_spawned());
        assert!(kcc.has_collider());
        assert_eq!(kcc.fixed_data().tick, 5);
        assert_eq!(kcc.fixed_data().target_position, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(kcc.fixed_data().look_yaw, 20.0);
        assert_eq!(kcc.render_data(), kcc.fixed_data());
    }

    #[test]
    fn test_spawn_twice_is_rejected() {
        let mut kcc = spawned();
        let result = kcc.spawn(Vec3::ZERO, 0.0, 0.0, FixedStep::default());
        assert_eq!(result, Err(KccError::AlreadySpawned));
    }

    #[test]
    fn test_fixed_write_outside_fixed_phase_fails() {
        let mut kcc = spawned();
        kcc.end_fixed_update();

        let result = kcc.jump(Vec3::UP, Timeline::Fixed);
        assert!(matches!(
            result,
            Err(KccError::WrongTimeline { operation: "jump", expected: Timeline::Fixed, actual: Timeline::Render })
        ));
        assert!(kcc.render_data().jump_impulse.is_zero());

        kcc.jump(Vec3::UP, Timeline::Render).unwrap();
        assert_eq!(kcc.render_data().jump_impulse, Vec3::UP);
        assert!(kcc.fixed_data().jump_impulse.is_zero());
    }

    #[test]
    fn test_fixed_write_mirrors_into_render() {
        let mut kcc = spawned();
        kcc.set_input_direction(Vec3::new(3.0, 0.0, 4.0), Timeline::Fixed).unwrap();

        let expected = Vec3::new(0.6, 0.0, 0.8);
        assert!((kcc.fixed_data().input_direction - expected).length() < 1e-6);
        assert_eq!(kcc.render_data().input_direction, kcc.fixed_data().input_direction);
    }

    #[test]
    fn test_teleport_clears_stepping_and_snapping() {
        let mut kcc = spawned();
        kcc.fixed_data_mut().is_stepping_up = true;
        kcc.fixed_data_mut().is_snapping_to_ground = true;

        kcc.set_position(Vec3::new(0.0, 3.0, 0.0), true, Timeline::Fixed).unwrap();

        let data = kcc.fixed_data();
        assert!(data.has_teleported);
        assert!(!data.is_stepping_up);
        assert!(!data.is_snapping_to_ground);
        assert_eq!(data.base_position, Vec3::new(0.0, 3.0, 0.0));
        assert_eq!(data.desired_position, data.target_position);
    }

    #[test]
    fn test_render_operations_rejected_in_fixed_phase() {
        let mut kcc = spawned();
        assert!(matches!(kcc.render_predict(), Err(KccError::WrongTimeline { .. })));
        assert!(kcc.begin_render_update(RenderStep::default()).is_err());

        kcc.end_fixed_update();
        assert!(matches!(kcc.fixed_update(), Err(KccError::WrongTimeline { .. })));
    }

    #[test]
    fn test_update_before_spawn_fails() {
        let mut kcc = Kcc::new(Arc::new(StaticWorld::new()), KccSettings::default());
        assert_eq!(kcc.fixed_update(), Err(KccError::NotSpawned { operation: "fixed_update" }));
    }

    #[test]
    fn test_settings_mutators_clamp() {
        let mut kcc = spawned();
        kcc.set_radius(-1.0);
        assert_eq!(kcc.settings().radius, 0.35);

        kcc.set_radius(1.2);
        assert_eq!(kcc.settings().radius, 1.2);
        assert_eq!(kcc.settings().height, 2.4);

        kcc.set_shape(Shape::None, 0.0, 0.0);
        assert!(!kcc.has_collider());

        kcc.set_collider_layer(40);
        assert_eq!(kcc.settings().collider_layer, 8);

        kcc.reset_settings();
        assert_eq!(kcc.settings(), &KccSettings::default());
        assert!(kcc.has_collider());
    }

    #[test]
    fn test_set_active_toggles_collider() {
        let mut kcc = spawned();
        kcc.set_active(false, Timeline::Fixed).unwrap();
        assert!(!kcc.has_collider());
        assert!(!kcc.fixed_data().is_active);
        assert!(!kcc.render_data().is_active);

        kcc.set_active(true, Timeline::Fixed).unwrap();
        assert!(kcc.has_collider());
    }

    #[test]
    fn test_despawn_restores_defaults() {
        let mut kcc = spawned();
        kcc.set_radius(0.8);
        kcc.add_modifier(NetworkId::object(3), Timeline::Fixed).unwrap();

        kcc.despawn();

        assert!(!kcc.is_spawned());
        assert_eq!(kcc.settings().radius, 0.35);
        assert!(kcc.fixed_data().modifiers.is_empty());
        assert_eq!(kcc.fixed_data(), &MovementState::new());
    }
}
