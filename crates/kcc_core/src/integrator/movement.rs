//! # Predicted Move
//!
//! One move consumes `desired_velocity * delta_time + external_delta`. With
//! CCD enabled the displacement is split into substeps of at most
//! `radius * ccd_radius_multiplier`; each substep overlaps, depenetrates,
//! refreshes hits and runs `AfterMoveStep`.
//!
//! ```text
//! BeginMove ─► PrepareData ─► ┌─ overlap ─► depenetrate ─► hits ─► AfterMoveStep ─┐ ─► EndMove
//!                             └────────────── next substep ◄──────────────────────┘
//! ```

use kcc_shared::Vec3;

use super::depenetration::Depenetration;
use super::Kcc;
use crate::contact::{OverlapInfo, ShapeCastInfo};
use crate::data::{Hit, Ignores, Interaction, MovementState, Timeline};
use crate::error::KccResult;
use crate::physics::{CapsuleQuery, CapsuleShape, CastQuery, ColliderInfo, PhysicsWorld, QueryTriggerInteraction};
use crate::pipeline::StageKind;
use crate::settings::{Features, EXTRAPOLATION_DELTA_TIME_THRESHOLD};

use super::KccHooks;

/// How tracked hits are refreshed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum HitsOverlapQuery {
    /// Reuse the step overlap if it was taken at the current position with
    /// the tracking extent, otherwise query again.
    #[default]
    Default,
    /// Copy the step overlap unconditionally.
    Reuse,
    /// Always query again.
    New,
}

/// Collider filter shared by every query.
fn resolves(hooks: &KccHooks, ignores: &Ignores, collider: &ColliderInfo) -> bool {
    if collider.network_id.is_valid() && ignores.contains(collider.network_id) {
        return false;
    }
    if ignores.contains_collider(collider.handle) {
        return false;
    }
    hooks.resolves(collider)
}

fn query_overlap(
    world: &dyn PhysicsWorld,
    hooks: &KccHooks,
    ignores: &Ignores,
    buffer: &mut Vec<ColliderInfo>,
    info: &mut OverlapInfo,
    query: &CapsuleQuery,
) -> bool {
    info.reset();
    info.position = query.position;
    info.radius = query.shape.radius;
    info.height = query.shape.height;
    info.extent = query.extent;
    info.layer_mask = query.layer_mask;
    info.triggers = query.triggers;

    buffer.clear();
    world.overlap_capsule(query, buffer);

    for collider in buffer.iter() {
        if resolves(hooks, ignores, collider) && !info.add_hit(*collider) {
            break;
        }
    }

    info.collider_hit_count() > 0
}

impl Kcc {
    // ========================================================================
    // PHYSICS QUERIES
    // ========================================================================

    /// Capsule overlap filtered by ignores and the collision hook.
    ///
    /// Returns `true` if any solid collider was found.
    #[allow(clippy::too_many_arguments)]
    pub fn capsule_overlap(
        &mut self,
        info: &mut OverlapInfo,
        position: Vec3,
        radius: f32,
        height: f32,
        extent: f32,
        layer_mask: u32,
        triggers: QueryTriggerInteraction,
    ) -> bool {
        let query = CapsuleQuery {
            position,
            shape: CapsuleShape::new(radius, height),
            extent,
            layer_mask,
            triggers,
        };
        query_overlap(
            self.world.as_ref(),
            &self.hooks,
            &self.states[self.timeline.index()].ignores,
            &mut self.collider_buffer,
            info,
            &query,
        )
    }

    /// Sphere sweep filtered by ignores and the collision hook, sorted by
    /// distance.
    ///
    /// Returns `true` if any solid collider was hit.
    #[allow(clippy::too_many_arguments)]
    pub fn sphere_cast(
        &mut self,
        info: &mut ShapeCastInfo,
        center: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        layer_mask: u32,
        triggers: QueryTriggerInteraction,
    ) -> bool {
        let query = CastQuery::sphere(center, radius, direction, max_distance, layer_mask, triggers);

        info.reset();
        info.position = query.position;
        info.radius = radius;
        info.height = query.shape.height;
        info.direction = query.direction;
        info.max_distance = max_distance;
        info.layer_mask = layer_mask;
        info.triggers = triggers;

        self.cast_buffer.clear();
        self.world.shape_cast(&query, &mut self.cast_buffer);

        let ignores = &self.states[self.timeline.index()].ignores;
        for hit in &self.cast_buffer {
            if resolves(&self.hooks, ignores, &hit.collider) && !info.add_hit(*hit) {
                break;
            }
        }
        info.sort();

        info.collider_hit_count() > 0
    }

    /// Depenetrates `data` against `info` with the actor capsule.
    ///
    /// `data` is usually a probe state from [`Kcc::acquire_state_copy`].
    pub fn resolve_penetration(
        &mut self,
        data: &mut MovementState,
        info: &mut OverlapInfo,
        max_steps: u32,
        probe_grounding: bool,
        resolve_triggers: bool,
    ) {
        let depenetration = Depenetration {
            world: self.world.as_ref(),
            capsule: CapsuleShape::new(self.settings.radius, self.settings.height),
            extent: self.settings.extent,
            suppress_convex_mesh_colliders: self.settings.suppress_convex_mesh_colliders,
        };
        depenetration.resolve(data, info, &mut self.resolver, max_steps, probe_grounding, resolve_triggers);
    }

    // ========================================================================
    // MOVE
    // ========================================================================

    /// Advances the state of the current timeline by its delta time.
    pub(crate) fn move_predicted(&mut self) -> KccResult<()> {
        let index = self.timeline.index();

        let (base_time, was_grounded, was_stepping_up, was_snapping_to_ground) = {
            let data = &mut self.states[index];
            let position = data.target_position;
            data.base_position = position;
            data.desired_position = position;
            (data.time, data.is_grounded, data.is_stepping_up, data.is_snapping_to_ground)
        };

        if !self.states[index].is_active {
            self.states[index].clear_transient_properties();
            self.force_remove_all_collisions_of(self.timeline);
            self.force_remove_all_hits();
            return Ok(());
        }

        self.cache_processors();
        self.set_base_properties();

        self.execute_stage(StageKind::BeginMove)?;

        if !self.states[index].is_active {
            self.states[index].clear_transient_properties();
            self.force_remove_all_collisions_of(self.timeline);
            self.force_remove_all_hits();
            return self.execute_stage(StageKind::EndMove);
        }

        let base_delta_time = self.states[index].delta_time;
        let base_position = self.states[index].base_position;

        if base_delta_time < EXTRAPOLATION_DELTA_TIME_THRESHOLD {
            let data = &mut self.states[index];
            let mut velocity = data.desired_velocity();
            if data.real_velocity.length_squared() <= velocity.length_squared() {
                velocity = data.real_velocity;
            }

            let desired = base_position + velocity * base_delta_time;
            data.base_position = base_position;
            data.desired_position = desired;
            data.target_position = desired;

            self.execute_stage(StageKind::EndMove)?;
            self.invoke_collision_stay();
            return Ok(());
        }

        self.execute_stage(StageKind::PrepareData)?;
        self.force_remove_all_hits();

        let mut pending_delta_time = base_delta_time.clamp(0.0, 1.0);
        let (desired_position, mut pending_delta_position) = {
            let data = &mut self.states[index];
            let pending = data.desired_velocity() * pending_delta_time + data.external_delta;
            let desired = data.base_position + pending;
            data.desired_position = desired;
            data.target_position = data.base_position;
            data.external_delta = Vec3::ZERO;
            (desired, pending)
        };

        let use_ccd = self.settings.features.has(Features::CCD);
        let radius_multiplier = self.settings.clamped_ccd_radius_multiplier();
        let max_delta_magnitude = self.settings.radius * (radius_multiplier + 0.1);
        let optimal_delta_magnitude = self.settings.radius * radius_multiplier;

        let mut non_teleported_position = self.states[index].target_position;
        let mut has_finished = false;
        let mut substeps = 0_u32;

        while !has_finished && !self.states[index].has_teleported {
            substeps += 1;

            let mut consume_delta_time = pending_delta_time;
            let mut consume_delta_position = pending_delta_position;

            if use_ccd {
                let magnitude = consume_delta_position.length();
                if magnitude > max_delta_magnitude {
                    let ratio = optimal_delta_magnitude / magnitude;
                    consume_delta_time *= ratio;
                    consume_delta_position *= ratio;
                } else {
                    has_finished = true;
                }
            } else {
                has_finished = true;
            }

            pending_delta_time -= consume_delta_time;
            pending_delta_position -= consume_delta_position;
            if pending_delta_time <= 0.0 {
                pending_delta_time = 0.0;
            }

            {
                let data = &mut self.states[index];
                data.base_position = data.target_position;
                data.time = base_time - pending_delta_time;
                data.delta_time = consume_delta_time;
                data.desired_position = data.base_position + consume_delta_position;
                data.target_position = data.desired_position;
                data.was_grounded = data.is_grounded;
                data.was_stepping_up = data.is_stepping_up;
                data.was_snapping_to_ground = data.is_snapping_to_ground;
            }

            self.process_move_step()?;

            if !self.states[index].has_teleported {
                non_teleported_position = self.states[index].target_position;
            }

            self.update_collisions();

            if self.states[index].has_teleported {
                self.update_hits(HitsOverlapQuery::New);
                self.update_collisions();
            }

            let data = &mut self.states[index];
            if has_finished && !data.external_delta.is_zero() {
                pending_delta_position += data.external_delta;
                data.external_delta = Vec3::ZERO;
                has_finished = false;
            }
        }

        tracing::debug!("move on {:?} took {} substeps", self.timeline, substeps);

        let target_position = {
            let data = &mut self.states[index];
            data.time = base_time;
            data.delta_time = base_delta_time;
            data.base_position = base_position;
            data.desired_position = desired_position;
            data.was_grounded = was_grounded;
            data.was_stepping_up = was_stepping_up;
            data.was_snapping_to_ground = was_snapping_to_ground;
            data.real_velocity = (non_teleported_position - base_position) / base_delta_time;
            data.real_speed = data.real_velocity.length();
            data.target_position
        };

        self.execute_stage(StageKind::EndMove)?;

        if self.states[index].target_position != target_position {
            self.update_hits(HitsOverlapQuery::New);
            self.update_collisions();
        }

        self.invoke_collision_stay();
        Ok(())
    }

    fn invoke_collision_stay(&mut self) {
        if let Some(hook) = self.hooks.on_collision_stay.as_mut() {
            for collision in self.states[self.timeline.index()].collisions.iter() {
                hook(collision);
            }
        }
    }

    fn set_base_properties(&mut self) {
        let fixed_frame = self.states[Timeline::Fixed.index()].frame;
        let max_penetration_steps = self.settings.max_penetration_steps;

        let data = &mut self.states[self.timeline.index()];
        data.has_teleported = false;
        data.max_penetration_steps = max_penetration_steps;
        if data.frame == fixed_frame {
            data.jump_frames = 0;
        }
    }

    fn process_move_step(&mut self) -> KccResult<()> {
        let index = self.timeline.index();

        let has_jumped = {
            let data = &mut self.states[index];
            data.is_grounded = false;
            data.is_stepping_up = false;
            data.is_snapping_to_ground = false;
            data.ground_normal = Vec3::ZERO;
            data.ground_tangent = Vec3::ZERO;
            data.ground_position = Vec3::ZERO;
            data.ground_distance = 0.0;
            data.ground_angle = 0.0;
            data.jump_frames > 0
        };

        self.force_remove_all_hits();

        if self.settings.collision_layer_mask != 0 && self.has_collider {
            let (extent, hits_query) = if self.settings.force_single_overlap_query {
                (self.settings.extent, HitsOverlapQuery::Reuse)
            } else {
                (self.settings.radius, HitsOverlapQuery::Default)
            };

            let query = CapsuleQuery {
                position: self.states[index].target_position,
                shape: CapsuleShape::new(self.settings.radius, self.settings.height),
                extent,
                layer_mask: self.settings.collision_layer_mask,
                triggers: QueryTriggerInteraction::Collide,
            };
            query_overlap(
                self.world.as_ref(),
                &self.hooks,
                &self.states[index].ignores,
                &mut self.collider_buffer,
                &mut self.step_overlap,
                &query,
            );

            let depenetration = Depenetration {
                world: self.world.as_ref(),
                capsule: query.shape,
                extent: self.settings.extent,
                suppress_convex_mesh_colliders: self.settings.suppress_convex_mesh_colliders,
            };
            let data = &mut self.states[index];
            let max_steps = data.max_penetration_steps;
            depenetration.resolve(data, &mut self.step_overlap, &mut self.resolver, max_steps, !has_jumped, true);

            self.update_hits(hits_query);
        } else {
            self.step_overlap.reset();
        }

        if has_jumped {
            self.states[index].is_grounded = false;
        }

        self.execute_stage(StageKind::AfterMoveStep)
    }

    // ========================================================================
    // HITS & COLLISIONS
    // ========================================================================

    /// Rebuilds the tracked hits of the current state.
    pub fn update_hits(&mut self, query: HitsOverlapQuery) {
        let index = self.timeline.index();
        let target = self.states[index].target_position;

        let reuse = match query {
            HitsOverlapQuery::Reuse => true,
            HitsOverlapQuery::New => false,
            HitsOverlapQuery::Default => {
                self.step_overlap.position == target && self.step_overlap.extent == self.settings.extent
            }
        };

        if reuse {
            self.track_overlap.copy_from(&self.step_overlap);
        } else if self.has_collider {
            let query = CapsuleQuery {
                position: target,
                shape: CapsuleShape::new(self.settings.radius, self.settings.height),
                extent: self.settings.extent,
                layer_mask: self.settings.collision_layer_mask,
                triggers: QueryTriggerInteraction::Collide,
            };
            query_overlap(
                self.world.as_ref(),
                &self.hooks,
                &self.states[index].ignores,
                &mut self.collider_buffer,
                &mut self.track_overlap,
                &query,
            );

            for hit in self.track_overlap.all_hits_mut() {
                if let Some(step_hit) = self.step_overlap.find(hit.collider.handle) {
                    hit.is_within_extent = step_hit.is_within_extent;
                    hit.has_penetration = step_hit.has_penetration;
                    hit.max_penetration = step_hit.max_penetration;
                    hit.up_direction_dot = step_hit.up_direction_dot;
                    hit.collision_type = step_hit.collision_type;
                }
            }
        } else {
            self.track_overlap.reset();
        }

        let data = &mut self.states[index];
        data.hits.clear();
        for hit in self.track_overlap.all_hits() {
            data.hits.add(Hit::from(hit));
        }
    }

    /// Turns tracked solid hits with a valid network id into collisions
    /// and removes collisions that are no longer hit.
    pub fn update_collisions(&mut self) {
        let data = &mut self.states[self.timeline.index()];

        self.interaction_buffer.clear();
        for collision in data.collisions.iter() {
            let still_hit = self
                .track_overlap
                .collider_hits()
                .any(|hit| hit.collider.network_id == collision.id);
            if !still_hit {
                self.interaction_buffer.push(*collision);
            }
        }
        for exited in &self.interaction_buffer {
            data.collisions.remove(exited.id);
            if let Some(hook) = self.hooks.on_collision_exit.as_mut() {
                hook(exited);
            }
        }

        self.interaction_buffer.clear();
        for hit in self.track_overlap.collider_hits() {
            let id = hit.collider.network_id;
            if !id.is_valid() || data.ignores.contains(id) || data.collisions.contains(id) {
                continue;
            }
            data.collisions.add(id, Some(hit.collider.handle));
            self.interaction_buffer.push(Interaction {
                id,
                collider: Some(hit.collider.handle),
            });
        }
        for entered in &self.interaction_buffer {
            if let Some(hook) = self.hooks.on_collision_enter.as_mut() {
                hook(entered);
            }
        }
    }

    /// Drops every tracked hit of the current state.
    pub fn force_remove_all_hits(&mut self) {
        self.states[self.timeline.index()].hits.clear();
        self.track_overlap.reset();
    }

    /// Exits every collision of the current state.
    pub fn force_remove_all_collisions(&mut self) {
        self.force_remove_all_collisions_of(self.timeline);
    }

    pub(crate) fn force_remove_all_collisions_of(&mut self, timeline: Timeline) {
        let data = &mut self.states[timeline.index()];
        if let Some(hook) = self.hooks.on_collision_exit.as_mut() {
            for collision in data.collisions.iter() {
                hook(collision);
            }
        }
        data.collisions.clear();
    }
}
