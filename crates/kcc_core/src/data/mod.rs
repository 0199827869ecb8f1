//! # Movement State
//!
//! One snapshot of an actor on one timeline. Every actor owns exactly two
//! live instances (fixed and render) plus a history ring of fixed ones.
//!
//! The integrator is the only writer during a move; everything else goes
//! through the actor API, which decides which timeline a write lands on.

mod collections;

pub use collections::{
    Collisions, Hit, Hits, Ignores, Interaction, Interactions, Modifiers, NetworkId,
};

use kcc_shared::{clamp_pitch, wrap_yaw, Quaternion, Vec2, Vec3};

use crate::memory::Recycle;
use crate::settings::{
    DEFAULT_MAX_GROUND_ANGLE, DEFAULT_MAX_HANG_ANGLE, DEFAULT_MAX_WALL_ANGLE,
};

/// Clock a state or an operation belongs to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Timeline {
    /// Deterministic fixed-step simulation, replayable.
    #[default]
    Fixed,
    /// Variable-step presentation.
    Render,
}

impl Timeline {
    /// Slot of the timeline's live state.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Fixed => 0,
            Self::Render => 1,
        }
    }
}

/// Full movement state of one actor on one timeline.
#[derive(Clone, Debug, PartialEq)]
pub struct MovementState {
    /// Render or fixed frame the state was produced in.
    pub frame: u32,
    /// Simulation tick.
    pub tick: i32,
    /// Render interpolation alpha.
    pub alpha: f32,
    /// Simulation time in seconds.
    pub time: f32,
    /// Time covered by the current step.
    pub delta_time: f32,
    /// Time since the previous update on this timeline.
    pub update_delta_time: f32,

    /// Position at the start of the current step.
    pub base_position: Vec3,
    /// Position the step wanted to reach.
    pub desired_position: Vec3,
    /// Position after collision resolution.
    pub target_position: Vec3,

    /// Look pitch in degrees, `[-90, 90]`.
    pub look_pitch: f32,
    /// Look yaw in degrees, `[-180, 180]`.
    pub look_yaw: f32,

    /// Requested movement direction, magnitude at most one.
    pub input_direction: Vec3,
    /// One-shot jump impulse.
    pub jump_impulse: Vec3,
    /// Gravity acceleration.
    pub gravity: Vec3,

    /// Steepest walkable slope in degrees.
    pub max_ground_angle: f32,
    /// Wall tolerance from vertical in degrees.
    pub max_wall_angle: f32,
    /// Overhang tolerance in degrees.
    pub max_hang_angle: f32,

    /// External velocity, consumed each step.
    pub external_velocity: Vec3,
    /// External acceleration, consumed each step.
    pub external_acceleration: Vec3,
    /// External impulse, consumed each step.
    pub external_impulse: Vec3,
    /// External force, consumed each step.
    pub external_force: Vec3,
    /// Raw position offset applied once.
    pub external_delta: Vec3,

    /// Speed of input driven movement.
    pub kinematic_speed: f32,
    /// Ground tangent used for input driven movement.
    pub kinematic_tangent: Vec3,
    /// Input driven movement direction.
    pub kinematic_direction: Vec3,
    /// Input driven velocity.
    pub kinematic_velocity: Vec3,
    /// Physics driven velocity (gravity, jumps, impulses).
    pub dynamic_velocity: Vec3,

    /// Magnitude of `real_velocity`.
    pub real_speed: f32,
    /// Velocity actually achieved by the last move.
    pub real_velocity: Vec3,

    /// The actor was teleported during the last move.
    pub has_teleported: bool,
    /// Depenetration passes per step.
    pub max_penetration_steps: u32,
    /// Frames since the jump impulse was applied, zero when not jumping.
    pub jump_frames: u32,
    /// The actor is simulated.
    pub is_active: bool,

    /// Standing on walkable ground.
    pub is_grounded: bool,
    /// Grounded before the current step.
    pub was_grounded: bool,
    /// Lifted over an obstacle in the current step.
    pub is_stepping_up: bool,
    /// Stepping up before the current step.
    pub was_stepping_up: bool,
    /// Pulled down to the ground in the current step.
    pub is_snapping_to_ground: bool,
    /// Snapping before the current step.
    pub was_snapping_to_ground: bool,

    /// Ground surface normal.
    pub ground_normal: Vec3,
    /// Direction along the ground that rises the least.
    pub ground_tangent: Vec3,
    /// Contact point with the ground.
    pub ground_position: Vec3,
    /// Gap between the capsule and the ground.
    pub ground_distance: f32,
    /// Ground slope in degrees.
    pub ground_angle: f32,

    /// Networked objects the actor collides with.
    pub collisions: Collisions,
    /// Networked objects modifying movement.
    pub modifiers: Modifiers,
    /// Networked objects ignored by physics queries.
    pub ignores: Ignores,
    /// Colliders within radius + extent.
    pub hits: Hits,
}

impl MovementState {
    /// Creates a state with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frame: 0,
            tick: 0,
            alpha: 0.0,
            time: 0.0,
            delta_time: 0.0,
            update_delta_time: 0.0,
            base_position: Vec3::ZERO,
            desired_position: Vec3::ZERO,
            target_position: Vec3::ZERO,
            look_pitch: 0.0,
            look_yaw: 0.0,
            input_direction: Vec3::ZERO,
            jump_impulse: Vec3::ZERO,
            gravity: Vec3::ZERO,
            max_ground_angle: DEFAULT_MAX_GROUND_ANGLE,
            max_wall_angle: DEFAULT_MAX_WALL_ANGLE,
            max_hang_angle: DEFAULT_MAX_HANG_ANGLE,
            external_velocity: Vec3::ZERO,
            external_acceleration: Vec3::ZERO,
            external_impulse: Vec3::ZERO,
            external_force: Vec3::ZERO,
            external_delta: Vec3::ZERO,
            kinematic_speed: 0.0,
            kinematic_tangent: Vec3::ZERO,
            kinematic_direction: Vec3::ZERO,
            kinematic_velocity: Vec3::ZERO,
            dynamic_velocity: Vec3::ZERO,
            real_speed: 0.0,
            real_velocity: Vec3::ZERO,
            has_teleported: false,
            max_penetration_steps: 8,
            jump_frames: 0,
            is_active: true,
            is_grounded: false,
            was_grounded: false,
            is_stepping_up: false,
            was_stepping_up: false,
            is_snapping_to_ground: false,
            was_snapping_to_ground: false,
            ground_normal: Vec3::ZERO,
            ground_tangent: Vec3::ZERO,
            ground_position: Vec3::ZERO,
            ground_distance: 0.0,
            ground_angle: 0.0,
            collisions: Interactions::new(),
            modifiers: Interactions::new(),
            ignores: Interactions::new(),
            hits: Hits::new(),
        }
    }

    // ========================================================================
    // DERIVED
    // ========================================================================

    /// Combined kinematic and dynamic velocity.
    #[inline]
    #[must_use]
    pub fn desired_velocity(&self) -> Vec3 {
        self.kinematic_velocity + self.dynamic_velocity
    }

    /// The jump impulse was applied in this frame.
    #[inline]
    #[must_use]
    pub const fn has_jumped(&self) -> bool {
        self.jump_frames == 1
    }

    /// Pitch (x) and yaw (y) in degrees.
    #[inline]
    #[must_use]
    pub const fn look_rotation(&self) -> Vec2 {
        Vec2::new(self.look_pitch, self.look_yaw)
    }

    /// Full look orientation.
    #[must_use]
    pub fn look_quaternion(&self) -> Quaternion {
        Quaternion::from_pitch_yaw(self.look_pitch, self.look_yaw)
    }

    /// Look direction including pitch.
    #[must_use]
    pub fn look_direction(&self) -> Vec3 {
        self.look_quaternion().rotate(Vec3::FORWARD)
    }

    /// Yaw-only body orientation.
    #[must_use]
    pub fn transform_rotation(&self) -> Quaternion {
        Quaternion::from_yaw(self.look_yaw)
    }

    /// Horizontal forward direction of the body.
    #[must_use]
    pub fn transform_direction(&self) -> Vec3 {
        self.transform_rotation().rotate(Vec3::FORWARD)
    }

    // ========================================================================
    // LOOK ROTATION
    // ========================================================================

    /// Adds to the look rotation, pitch clamped to `[-90, 90]`.
    pub fn add_look_rotation(&mut self, pitch_delta: f32, yaw_delta: f32) {
        self.add_look_rotation_limited(pitch_delta, yaw_delta, -90.0, 90.0);
    }

    /// Adds to the look rotation, pitch clamped to `[min_pitch, max_pitch]`.
    pub fn add_look_rotation_limited(
        &mut self,
        pitch_delta: f32,
        yaw_delta: f32,
        min_pitch: f32,
        max_pitch: f32,
    ) {
        let pitch = self.look_pitch + pitch_delta;
        let yaw = self.look_yaw + yaw_delta;
        self.set_look_rotation_limited(pitch, yaw, min_pitch, max_pitch);
    }

    /// Sets the look rotation, pitch clamped to `[-90, 90]`.
    pub fn set_look_rotation(&mut self, pitch: f32, yaw: f32) {
        self.look_pitch = clamp_pitch(pitch);
        self.look_yaw = wrap_yaw(yaw);
    }

    /// Sets the look rotation, pitch clamped to `[min_pitch, max_pitch]`.
    pub fn set_look_rotation_limited(&mut self, pitch: f32, yaw: f32, min_pitch: f32, max_pitch: f32) {
        let min_pitch = clamp_pitch(min_pitch);
        let max_pitch = clamp_pitch(max_pitch).max(min_pitch);
        self.look_pitch = pitch.clamp(min_pitch, max_pitch);
        self.look_yaw = wrap_yaw(yaw);
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Resets one-shot inputs and per-move flags.
    pub fn clear_transient_properties(&mut self) {
        self.jump_impulse = Vec3::ZERO;
        self.external_velocity = Vec3::ZERO;
        self.external_acceleration = Vec3::ZERO;
        self.external_impulse = Vec3::ZERO;
        self.external_force = Vec3::ZERO;
        self.external_delta = Vec3::ZERO;
        self.has_teleported = false;
        self.is_stepping_up = false;
        self.was_stepping_up = false;
        self.is_snapping_to_ground = false;
        self.was_snapping_to_ground = false;
        self.jump_frames = 0;
    }

    /// Resets everything to defaults, keeping collection capacity.
    pub fn clear(&mut self) {
        let mut collisions = std::mem::take(&mut self.collisions);
        let mut modifiers = std::mem::take(&mut self.modifiers);
        let mut ignores = std::mem::take(&mut self.ignores);
        let mut hits = std::mem::take(&mut self.hits);

        collisions.clear();
        modifiers.clear();
        ignores.clear();
        hits.clear();

        *self = Self {
            collisions,
            modifiers,
            ignores,
            hits,
            ..Self::new()
        };
    }

    /// Copies every field from `other`, reusing collection storage.
    pub fn copy_from(&mut self, other: &Self) {
        self.frame = other.frame;
        self.tick = other.tick;
        self.alpha = other.alpha;
        self.time = other.time;
        self.delta_time = other.delta_time;
        self.update_delta_time = other.update_delta_time;
        self.base_position = other.base_position;
        self.desired_position = other.desired_position;
        self.target_position = other.target_position;
        self.look_pitch = other.look_pitch;
        self.look_yaw = other.look_yaw;
        self.input_direction = other.input_direction;
        self.jump_impulse = other.jump_impulse;
        self.gravity = other.gravity;
        self.max_ground_angle = other.max_ground_angle;
        self.max_wall_angle = other.max_wall_angle;
        self.max_hang_angle = other.max_hang_angle;
        self.external_velocity = other.external_velocity;
        self.external_acceleration = other.external_acceleration;
        self.external_impulse = other.external_impulse;
        self.external_force = other.external_force;
        self.external_delta = other.external_delta;
        self.kinematic_speed = other.kinematic_speed;
        self.kinematic_tangent = other.kinematic_tangent;
        self.kinematic_direction = other.kinematic_direction;
        self.kinematic_velocity = other.kinematic_velocity;
        self.dynamic_velocity = other.dynamic_velocity;
        self.real_speed = other.real_speed;
        self.real_velocity = other.real_velocity;
        self.has_teleported = other.has_teleported;
        self.max_penetration_steps = other.max_penetration_steps;
        self.jump_frames = other.jump_frames;
        self.is_active = other.is_active;
        self.is_grounded = other.is_grounded;
        self.was_grounded = other.was_grounded;
        self.is_stepping_up = other.is_stepping_up;
        self.was_stepping_up = other.was_stepping_up;
        self.is_snapping_to_ground = other.is_snapping_to_ground;
        self.was_snapping_to_ground = other.was_snapping_to_ground;
        self.ground_normal = other.ground_normal;
        self.ground_tangent = other.ground_tangent;
        self.ground_position = other.ground_position;
        self.ground_distance = other.ground_distance;
        self.ground_angle = other.ground_angle;
        self.collisions.copy_from(&other.collisions);
        self.modifiers.copy_from(&other.modifiers);
        self.ignores.copy_from(&other.ignores);
        self.hits.copy_from(&other.hits);
    }
}

impl Default for MovementState {
    fn default() -> Self {
        Self::new()
    }
}

impl Recycle for MovementState {
    fn recycle(&mut self) {
        self.clear();
    }
}
