//! # Networked Actor
//!
//! Drives a [`Kcc`] from a network clock: fixed ticks are committed to the
//! history and encoded into the state block, render frames either predict
//! or interpolate, and authoritative corrections roll the fixed state back.
//!
//! ```text
//! fixed tick:   begin_fixed_update ─► fixed_update ─► end_fixed_update
//!                                          │                 │
//!                                   history[tick]       state block
//!
//! render frame: render_update ─┬─► predict      (integrator, sub-tick delta)
//!                              └─► interpolate  (history[tick-1] → history[tick])
//! ```
//!
//! | Role | Fixed tick | Render frame |
//! |------|------------|--------------|
//! | `InputAuthority` | predicted | `input_authority_behavior` |
//! | `StateAuthority` | simulated | `state_authority_behavior` |
//! | `Proxy` | not simulated | received blocks interpolated |

use kcc_core::{
    AuthorityBehavior, Features, FixedStep, InterpolationMode, Kcc, KccSettings, MovementState, Pose, Quaternion,
    RenderStep, Timeline, Vec2, Vec3,
};
use kcc_shared::{interpolate_range, lerp};

use crate::error::{ActorError, ActorResult};
use crate::history::History;
use crate::interpolation::{apply_tolerance, AntiJitter, ErrorProbe, PredictionCorrection};
use crate::protocol::{
    byte_count, decode_state, encode_state, interpolate_blocks, read_counters, read_transform, BlockInterpolation,
    ObservedCounters,
};

/// Render alphas below this are treated as zero.
const MIN_ALPHA: f32 = 0.000_001;

/// Authority of the local peer over an actor.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    /// Local input drives the actor. Wins over state authority when the
    /// peer holds both.
    InputAuthority,
    /// The peer owns the authoritative state.
    StateAuthority,
    /// Remote actor, only observed through received blocks.
    Proxy,
}

/// Value sampled for rendering.
///
/// `is_valid` is false when the value is a fallback because the needed
/// snapshots are missing or were not simulated yet.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderSample<T> {
    /// Sampled or fallback value.
    pub value: T,
    /// The value was resolved from the requested snapshots.
    pub is_valid: bool,
}

impl<T> RenderSample<T> {
    const fn valid(value: T) -> Self {
        Self { value, is_valid: true }
    }

    const fn fallback(value: T) -> Self {
        Self { value, is_valid: false }
    }
}

/// Snapshot pair a render sample is blended from.
#[derive(Clone, Copy)]
enum Snapshots<'a> {
    Pair {
        from: &'a MovementState,
        to: &'a MovementState,
        alpha: f32,
    },
    Unavailable,
}

// ============================================================================
// ACTOR
// ============================================================================

/// Controller with history, rollback and render smoothing.
pub struct KccActor {
    kcc: Kcc,
    role: Role,
    history: History,
    block: Vec<u8>,
    /// Scratch copy the codec decodes settings into.
    decoded_settings: KccSettings,
    observed: ObservedCounters,
    anti_jitter: AntiJitter,
    correction: PredictionCorrection,
    transform: Pose,
    is_in_rollback: bool,

    last_predicted_fixed_tick: i32,
    last_predicted_render_frame: u32,
    last_predicted_look_rotation_frame: u32,
    last_render_time: f32,
    last_render_position: Vec3,
    last_interpolation_teleport_tick: i32,
    last_interpolation_jump_tick: i32,
}

impl KccActor {
    /// Wraps an unspawned controller.
    #[must_use]
    pub fn new(kcc: Kcc, role: Role) -> Self {
        let decoded_settings = kcc.settings().clone();
        let block = vec![0; byte_count(kcc.settings())];
        Self {
            kcc,
            role,
            history: History::new(),
            block,
            decoded_settings,
            observed: ObservedCounters::new(),
            anti_jitter: AntiJitter::default(),
            correction: PredictionCorrection::new(),
            transform: Pose::at(Vec3::ZERO),
            is_in_rollback: false,
            last_predicted_fixed_tick: -1,
            last_predicted_render_frame: 0,
            last_predicted_look_rotation_frame: 0,
            last_render_time: 0.0,
            last_render_position: Vec3::ZERO,
            last_interpolation_teleport_tick: -1,
            last_interpolation_jump_tick: -1,
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Wrapped controller.
    #[inline]
    #[must_use]
    pub const fn kcc(&self) -> &Kcc {
        &self.kcc
    }

    /// Mutable wrapped controller, for input and settings writes.
    #[inline]
    pub fn kcc_mut(&mut self) -> &mut Kcc {
        &mut self.kcc
    }

    /// Authority of the local peer.
    #[inline]
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Changes the authority of the local peer.
    pub fn set_role(&mut self, role: Role) {
        if role != self.role {
            tracing::info!("role changed from {:?} to {:?}", self.role, role);
            self.role = role;
        }
    }

    /// Committed fixed states.
    #[inline]
    #[must_use]
    pub const fn history(&self) -> &History {
        &self.history
    }

    /// State block of the last committed tick.
    #[inline]
    #[must_use]
    pub fn network_block(&self) -> &[u8] {
        &self.block
    }

    /// A correction was applied and ticks are being replayed.
    #[inline]
    #[must_use]
    pub const fn is_in_rollback(&self) -> bool {
        self.is_in_rollback
    }

    /// Pose of the actor's visual transform.
    #[inline]
    #[must_use]
    pub const fn transform(&self) -> Pose {
        self.transform
    }

    /// Offset currently hiding a prediction correction.
    #[inline]
    #[must_use]
    pub const fn prediction_error(&self) -> Vec3 {
        self.correction.error()
    }

    /// Render frames re-run the integrator instead of interpolating.
    #[must_use]
    pub fn is_predicting_in_render_update(&self) -> bool {
        let settings = self.kcc.settings();
        match self.role {
            Role::InputAuthority => settings.input_authority_behavior == AuthorityBehavior::PredictFixedPredictRender,
            Role::StateAuthority => settings.state_authority_behavior == AuthorityBehavior::PredictFixedPredictRender,
            Role::Proxy => false,
        }
    }

    /// Render frames blend committed states.
    #[must_use]
    pub fn is_interpolating_in_render_update(&self) -> bool {
        !self.is_predicting_in_render_update()
    }

    /// Look rotation is simulated locally in the current clock phase.
    #[must_use]
    pub fn is_predicting_look_rotation(&self) -> bool {
        self.predicts_look_rotation(self.kcc.timeline() == Timeline::Fixed)
    }

    fn predicts_look_rotation(&self, in_fixed: bool) -> bool {
        let settings = self.kcc.settings();
        match self.role {
            Role::InputAuthority => {
                settings.input_authority_behavior == AuthorityBehavior::PredictFixedPredictRender
                    || settings.force_predicted_look_rotation
                    || in_fixed
            }
            Role::StateAuthority => {
                settings.state_authority_behavior == AuthorityBehavior::PredictFixedPredictRender || in_fixed
            }
            Role::Proxy => false,
        }
    }

    fn anti_jitter_tolerance(&self) -> Option<Vec2> {
        let settings = self.kcc.settings();
        (settings.features.has(Features::ANTI_JITTER) && !settings.anti_jitter_distance.is_zero())
            .then_some(settings.anti_jitter_distance)
    }

    fn require_simulated(&self, operation: &'static str) -> ActorResult<()> {
        if self.role == Role::Proxy {
            tracing::error!("{} called on a proxy", operation);
            return Err(ActorError::WrongRole {
                operation,
                role: self.role,
            });
        }
        Ok(())
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Spawns the controller and anchors every render filter at `position`.
    ///
    /// # Errors
    ///
    /// Fails if the controller is already spawned or the first block cannot
    /// be written.
    pub fn spawn(&mut self, position: Vec3, look_pitch: f32, look_yaw: f32, step: FixedStep) -> ActorResult<()> {
        self.kcc.spawn(position, look_pitch, look_yaw, step)?;

        self.history.clear();
        self.history.publish(self.kcc.fixed_data());
        self.correction.reset();
        self.observed.reset();
        self.is_in_rollback = false;

        self.last_predicted_fixed_tick = step.tick;
        self.last_predicted_render_frame = step.frame;
        self.last_predicted_look_rotation_frame = step.frame;
        self.last_interpolation_teleport_tick = step.tick;
        self.last_interpolation_jump_tick = step.tick;

        let render = self.kcc.render_data();
        self.last_render_position = render.target_position;
        self.last_render_time = render.time;
        self.anti_jitter.reset(render.target_position);
        self.synchronize_transform(Timeline::Fixed, false);

        if self.role != Role::Proxy {
            self.write_block()?;
        }
        Ok(())
    }

    /// Despawns the controller and forgets every committed tick.
    pub fn despawn(&mut self) {
        self.kcc.despawn();
        self.history.clear();
        self.correction.reset();
        self.observed.reset();
        self.block.fill(0);
        self.is_in_rollback = false;
    }

    // ========================================================================
    // FIXED TICK
    // ========================================================================

    /// Enters the fixed phase for `step`.
    pub fn begin_fixed_update(&mut self, step: FixedStep) {
        self.kcc.begin_fixed_update(step);
    }

    /// Simulates the tick and commits it to the history.
    ///
    /// # Errors
    ///
    /// Fails on a proxy, outside the fixed phase, or if a processor fails.
    pub fn fixed_update(&mut self) -> ActorResult<()> {
        self.require_simulated("fixed_update")?;
        self.kcc.fixed_update()?;

        let fixed = self.kcc.fixed_data();
        self.history.publish(fixed);
        self.last_predicted_fixed_tick = fixed.tick;
        self.synchronize_transform(Timeline::Fixed, false);
        Ok(())
    }

    /// Publishes the tick to the render state and, unless the actor is a
    /// proxy, encodes it into the state block.
    ///
    /// # Errors
    ///
    /// Fails if the block cannot be written.
    pub fn end_fixed_update(&mut self) -> ActorResult<()> {
        self.kcc.end_fixed_update();
        self.history.publish(self.kcc.fixed_data());
        if self.role != Role::Proxy {
            self.write_block()?;
        }
        Ok(())
    }

    fn write_block(&mut self) -> ActorResult<()> {
        let size = byte_count(self.kcc.settings());
        self.block.resize(size, 0);
        encode_state(self.kcc.fixed_data(), self.kcc.settings(), &mut self.block)?;
        Ok(())
    }

    fn apply_decoded_settings(&mut self) {
        let decoded = &self.decoded_settings;
        self.kcc.update_settings(|settings| settings.clone_from(decoded));
    }

    // ========================================================================
    // ROLLBACK
    // ========================================================================

    /// Resets the fixed state to the authoritative `server_block` of `tick`.
    ///
    /// The committed state of `tick` is the base the block is decoded onto.
    /// Without it the correction is dropped and `false` is returned. Replay
    /// the following ticks with the regular fixed tick calls, then call
    /// [`finish_rollback`](Self::finish_rollback).
    ///
    /// # Errors
    ///
    /// Fails on a proxy or if `server_block` is truncated.
    pub fn rollback(&mut self, tick: i32, frame: u32, server_block: &[u8]) -> ActorResult<bool> {
        self.require_simulated("rollback")?;
        self.is_in_rollback = true;

        let Some(committed) = self.history.get(tick) else {
            tracing::warn!("no history for tick {}, correction dropped", tick);
            return Ok(false);
        };
        let (was_grounded_at_tick, had_ground_before_tick) = (committed.is_grounded, committed.was_grounded);

        let fixed = self.kcc.fixed_data_mut();
        fixed.copy_from(committed);
        fixed.frame = frame;

        self.decoded_settings.clone_from(self.kcc.settings());
        decode_state(server_block, self.kcc.fixed_data_mut(), &mut self.decoded_settings)?;
        self.apply_decoded_settings();

        let fixed = self.kcc.fixed_data_mut();
        if fixed.is_grounded {
            fixed.is_grounded = was_grounded_at_tick;
            fixed.was_grounded = had_ground_before_tick;
        }

        self.block.clear();
        self.block.extend_from_slice(server_block);
        self.history.publish(self.kcc.fixed_data());
        self.last_predicted_fixed_tick = tick;
        self.kcc.refresh_collider();
        self.synchronize_transform(Timeline::Fixed, false);

        tracing::debug!("rolled back to tick {}", tick);
        Ok(true)
    }

    /// Ends the replay started by [`rollback`](Self::rollback).
    pub fn finish_rollback(&mut self) {
        self.is_in_rollback = false;
    }

    // ========================================================================
    // RENDER FRAME
    // ========================================================================

    /// Renders a simulated actor.
    ///
    /// `step.tick` is the latest simulated tick and `step.time` its end time
    /// plus `alpha` ticks. Interpolating actors are rendered one tick behind.
    /// Call after the frame's fixed ticks.
    ///
    /// # Errors
    ///
    /// Fails on a proxy, before the first completed tick, or if a processor
    /// fails.
    pub fn render_update(&mut self, step: RenderStep) -> ActorResult<()> {
        self.require_simulated("render_update")?;

        let predicting = self.is_predicting_in_render_update();
        let fixed = self.kcc.fixed_data();
        let fixed_frame = fixed.frame;
        let tick_delta_time = fixed.delta_time;
        let mut previous_time = self.kcc.render_data().time;

        let mut stamp = step;
        if !predicting {
            stamp.tick -= 1;
            stamp.time -= tick_delta_time;
            if step.frame == fixed_frame {
                previous_time -= tick_delta_time;
            }
        }
        stamp.delta_time = stamp.time - previous_time;
        self.kcc.begin_render_update(stamp)?;

        self.update_prediction_error(step.delta_time);

        if predicting {
            self.kcc.render_predict()?;
            self.last_predicted_render_frame = step.frame;
            self.last_predicted_look_rotation_frame = step.frame;
        } else {
            self.move_interpolated()?;
            if self.predicts_look_rotation(false) {
                self.last_predicted_look_rotation_frame = step.frame;
            }
        }

        self.synchronize_transform(Timeline::Render, true);
        self.remember_render();
        Ok(())
    }

    /// Renders a proxy from the two received blocks around the render time.
    ///
    /// # Errors
    ///
    /// Fails on a simulated actor, if a block is truncated, or if a processor
    /// fails.
    pub fn proxy_render_update(
        &mut self,
        step: RenderStep,
        from: &[u8],
        to: &[u8],
        interpolation: &BlockInterpolation,
    ) -> ActorResult<()> {
        if self.role != Role::Proxy {
            tracing::error!("proxy_render_update called on a {:?} actor", self.role);
            return Err(ActorError::WrongRole {
                operation: "proxy_render_update",
                role: self.role,
            });
        }

        let interpolation = BlockInterpolation {
            alpha: interpolation.alpha.clamp(0.0, 1.0),
            ..*interpolation
        };
        let delta_time = interpolation.delta_time;
        #[allow(clippy::cast_precision_loss)]
        let (from_tick, to_tick) = (interpolation.from_tick as f32, interpolation.to_tick as f32);
        let render_tick = lerp(from_tick, to_tick, interpolation.alpha);

        self.kcc.begin_fixed_update(FixedStep {
            frame: step.frame,
            tick: interpolation.to_tick,
            time: to_tick * delta_time,
            delta_time,
        });
        self.kcc.fixed_data_mut().alpha = 1.0;

        self.decoded_settings.clone_from(self.kcc.settings());
        let mode = self.kcc.settings().proxy_interpolation_mode;
        match mode {
            InterpolationMode::Transform => self.interpolate_transform(from, to, &interpolation)?,
            InterpolationMode::Full => decode_state(to, self.kcc.fixed_data_mut(), &mut self.decoded_settings)?,
        }
        self.kcc.end_fixed_update();

        #[allow(clippy::cast_possible_truncation)]
        let tick = render_tick.round() as i32;
        self.kcc.begin_render_update(RenderStep {
            frame: step.frame,
            tick,
            alpha: interpolation.alpha,
            time: render_tick * delta_time,
            delta_time: step.delta_time,
        })?;

        if mode == InterpolationMode::Full {
            interpolate_blocks(
                from,
                to,
                &interpolation,
                &mut self.observed,
                self.kcc.render_data_mut(),
                &mut self.decoded_settings,
            )?;
            self.apply_decoded_settings();
            self.kcc.run_interpolate_stage()?;
        }

        self.synchronize_transform(Timeline::Render, false);
        self.remember_render();
        Ok(())
    }

    /// Blends position and look rotation straight from the blocks into the
    /// fixed state.
    fn interpolate_transform(&mut self, from: &[u8], to: &[u8], interpolation: &BlockInterpolation) -> ActorResult<()> {
        let from_sample = read_transform(from)?;
        let to_sample = read_transform(to)?;
        let teleported = read_counters(from)?.teleport != read_counters(to)?.teleport;
        let alpha = interpolation.alpha;

        let fixed = self.kcc.fixed_data_mut();
        fixed.real_velocity = Vec3::ZERO;
        fixed.real_speed = 0.0;

        if teleported {
            fixed.base_position = to_sample.position;
            fixed.desired_position = to_sample.position;
            fixed.target_position = to_sample.position;
            fixed.look_pitch = to_sample.look_pitch;
            fixed.look_yaw = to_sample.look_yaw;
            return Ok(());
        }

        fixed.base_position = from_sample.position;
        fixed.desired_position = to_sample.position;
        fixed.target_position = from_sample.position.lerp(to_sample.position, alpha);
        fixed.look_pitch = lerp(from_sample.look_pitch, to_sample.look_pitch, alpha);
        fixed.look_yaw = interpolate_range(from_sample.look_yaw, to_sample.look_yaw, -180.0, 180.0, alpha);

        let ticks = interpolation.to_tick - interpolation.from_tick;
        if ticks > 0 {
            #[allow(clippy::cast_precision_loss)]
            let elapsed = interpolation.delta_time * ticks as f32;
            fixed.real_velocity = (to_sample.position - from_sample.position) / elapsed;
            fixed.real_speed = fixed.real_velocity.length();
        }
        Ok(())
    }

    fn update_prediction_error(&mut self, frame_delta_time: f32) {
        let settings = self.kcc.settings();
        let speed = settings.prediction_correction_speed;
        let enabled = settings.features.has(Features::PREDICTION_CORRECTION);
        let render = self.kcc.render_data();

        let measured = if enabled && render.frame == self.kcc.fixed_data().frame {
            let probe = ErrorProbe {
                render_tick: render.tick,
                last_render_time: self.last_render_time,
                last_render_position: self.last_render_position,
            };
            self.correction.measure(&self.history, &probe, speed, frame_delta_time)
        } else {
            None
        };
        let offset = match measured {
            Some(offset) => offset,
            None => self.correction.decay(speed, frame_delta_time),
        };

        if !offset.is_zero() {
            let render = self.kcc.render_data_mut();
            render.base_position += offset;
            render.desired_position += offset;
            render.target_position += offset;
        }
    }

    /// Blends the last two committed ticks into the render state.
    fn move_interpolated(&mut self) -> ActorResult<()> {
        if !self.kcc.render_data().is_active {
            return Ok(());
        }

        let error = self.correction.error();
        let predicting_look = self.predicts_look_rotation(false);
        let (fixed, render) = self.kcc.fixed_and_render_mut();
        let fixed_tick = fixed.tick;

        match self.history.get(fixed_tick - 1).filter(|_| !fixed.has_teleported) {
            Some(previous) => {
                let alpha = render.alpha;
                render.base_position = previous.target_position + error;
                render.desired_position = fixed.target_position + error;
                render.target_position = previous.target_position.lerp(fixed.target_position, alpha) + error;
                render.real_velocity = previous.real_velocity.lerp(fixed.real_velocity, alpha);
                render.real_speed = lerp(previous.real_speed, fixed.real_speed, alpha);
                if !predicting_look {
                    render.look_pitch = lerp(previous.look_pitch, fixed.look_pitch, alpha);
                    render.look_yaw = interpolate_range(previous.look_yaw, fixed.look_yaw, -180.0, 180.0, alpha);
                }
            }
            None => {
                render.base_position = fixed.base_position;
                render.desired_position = fixed.desired_position;
                render.target_position = fixed.target_position;
                render.look_pitch = fixed.look_pitch;
                render.look_yaw = fixed.look_yaw;
            }
        }

        render.has_teleported = self
            .history
            .any_since(self.last_interpolation_teleport_tick, fixed_tick, |state| state.has_teleported);
        let jumped = self
            .history
            .any_since(self.last_interpolation_jump_tick, fixed_tick, MovementState::has_jumped);
        render.jump_frames = u32::from(jumped);
        self.last_interpolation_teleport_tick = fixed_tick;
        self.last_interpolation_jump_tick = fixed_tick;

        self.kcc.run_interpolate_stage()?;
        Ok(())
    }

    fn synchronize_transform(&mut self, timeline: Timeline, anti_jitter: bool) {
        let tolerance = self.anti_jitter_tolerance();
        let data = self.kcc.state(timeline);
        let target = data.target_position;
        let rotation = data.transform_rotation();

        let position = match tolerance {
            Some(tolerance) if anti_jitter => self.anti_jitter.apply(target, tolerance),
            _ => target,
        };
        self.transform = Pose::new(position, rotation);
    }

    fn remember_render(&mut self) {
        let render = self.kcc.render_data();
        self.last_render_position = render.target_position;
        self.last_render_time = render.time;
    }

    // ========================================================================
    // RENDER SAMPLING
    // ========================================================================

    fn history_pair(&self, from_tick: i32, alpha: f32) -> Snapshots<'_> {
        match (self.history.get(from_tick), self.history.get(from_tick + 1)) {
            (Some(from), Some(to)) => Snapshots::Pair { from, to, alpha },
            _ => Snapshots::Unavailable,
        }
    }

    /// Maps a frame alpha onto the fixed → render prediction segment.
    fn predicted_render_alpha(&self, alpha: f32) -> f32 {
        let render_alpha = self.kcc.render_data().alpha;
        if alpha > render_alpha {
            1.0
        } else if render_alpha > MIN_ALPHA {
            (alpha / render_alpha).clamp(0.0, 1.0)
        } else {
            alpha
        }
    }

    fn predicted_render_pair(&self, alpha: f32, last_predicted_frame: u32) -> Snapshots<'_> {
        let frame = self.kcc.render_data().frame;
        if last_predicted_frame < frame {
            tracing::error!("render sample requested for frame {} before it was predicted", frame);
            return Snapshots::Unavailable;
        }
        Snapshots::Pair {
            from: self.kcc.fixed_data(),
            to: self.kcc.render_data(),
            alpha: self.predicted_render_alpha(alpha),
        }
    }

    fn position_snapshots(&self, alpha: f32) -> Snapshots<'_> {
        if self.role == Role::Proxy {
            let render = self.kcc.render_data();
            return Snapshots::Pair {
                from: render,
                to: render,
                alpha: 1.0,
            };
        }

        let fixed_tick = self.kcc.fixed_data().tick;
        match (self.kcc.timeline(), self.kcc.settings().input_authority_behavior) {
            (Timeline::Fixed, AuthorityBehavior::PredictFixedPredictRender) => {
                if self.last_predicted_fixed_tick < fixed_tick {
                    tracing::error!("render sample requested for tick {} before it was simulated", fixed_tick);
                    return Snapshots::Unavailable;
                }
                self.history_pair(fixed_tick - 1, alpha)
            }
            (Timeline::Fixed, AuthorityBehavior::PredictFixedInterpolateRender) => self.history_pair(fixed_tick - 2, alpha),
            (Timeline::Render, AuthorityBehavior::PredictFixedPredictRender) => {
                self.predicted_render_pair(alpha, self.last_predicted_render_frame)
            }
            (Timeline::Render, AuthorityBehavior::PredictFixedInterpolateRender) => {
                self.history_pair(fixed_tick - 1, alpha)
            }
        }
    }

    /// Look snapshots when the look rotation is predicted on top of an
    /// interpolated position.
    fn forced_look_snapshots(&self, alpha: f32) -> Snapshots<'_> {
        match self.kcc.timeline() {
            Timeline::Fixed => self.history_pair(self.kcc.fixed_data().tick - 1, alpha),
            Timeline::Render => self.predicted_render_pair(alpha, self.last_predicted_look_rotation_frame),
        }
    }

    fn blend_position(&self, from: &MovementState, to: &MovementState, alpha: f32) -> Vec3 {
        if to.has_teleported {
            return to.target_position;
        }
        let position = from.target_position.lerp(to.target_position, alpha);
        match self.anti_jitter_tolerance() {
            Some(tolerance) => apply_tolerance(from.target_position, position, tolerance),
            None => position,
        }
    }

    /// Position to draw at `alpha` between the snapshots of the current
    /// clock phase.
    #[must_use]
    pub fn resolve_render_position(&self, alpha: f32) -> RenderSample<Vec3> {
        match self.position_snapshots(alpha.clamp(0.0, 1.0)) {
            Snapshots::Pair { from, to, alpha } => RenderSample::valid(self.blend_position(from, to, alpha)),
            Snapshots::Unavailable => RenderSample::fallback(self.kcc.data().target_position),
        }
    }

    /// Look rotation to draw at `alpha`.
    #[must_use]
    pub fn resolve_render_look_rotation(&self, alpha: f32) -> RenderSample<Quaternion> {
        let alpha = alpha.clamp(0.0, 1.0);
        let settings = self.kcc.settings();
        let positions = self.position_snapshots(alpha);
        let rotations = if self.role != Role::Proxy
            && settings.force_predicted_look_rotation
            && settings.input_authority_behavior == AuthorityBehavior::PredictFixedInterpolateRender
        {
            self.forced_look_snapshots(alpha)
        } else {
            positions
        };

        match (positions, rotations) {
            (Snapshots::Pair { to: position_to, .. }, Snapshots::Pair { from, to, alpha }) => {
                RenderSample::valid(if position_to.has_teleported {
                    to.look_quaternion()
                } else {
                    from.look_quaternion().slerp(to.look_quaternion(), alpha)
                })
            }
            _ => RenderSample::fallback(self.kcc.data().look_quaternion()),
        }
    }

    /// Position and look rotation to draw at `alpha`, valid only if both are.
    #[must_use]
    pub fn resolve_render_position_and_look_rotation(&self, alpha: f32) -> RenderSample<(Vec3, Quaternion)> {
        let position = self.resolve_render_position(alpha);
        let rotation = self.resolve_render_look_rotation(alpha);
        RenderSample {
            value: (position.value, rotation.value),
            is_valid: position.is_valid && rotation.is_valid,
        }
    }
}

impl std::fmt::Debug for KccActor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KccActor")
            .field("role", &self.role)
            .field("timeline", &self.kcc.timeline())
            .field("is_in_rollback", &self.is_in_rollback)
            .field("last_predicted_fixed_tick", &self.last_predicted_fixed_tick)
            .finish_non_exhaustive()
    }
}
