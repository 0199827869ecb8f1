//! # Depenetration
//!
//! Moves the actor out of every solid collider reported by an overlap and
//! records per-hit penetration, classification and ground state.
//!
//! A single contact is resolved directly. Several contacts go through the
//! [`Resolver`] in up to `max_steps` passes; early passes apply a fraction
//! of the correction and the last pass uses a tighter error budget.

use kcc_shared::Vec3;

use super::ground::{check_ground, ground_tangent, project_vertical_penetration};
use crate::contact::{CollisionType, ContactThresholds, OverlapHit, OverlapInfo};
use crate::data::MovementState;
use crate::physics::{CapsuleShape, PhysicsWorld};
use crate::solver::Resolver;

/// Penetrations shorter than this are never redirected.
const MIN_PROJECTED_DISTANCE: f32 = 0.000_001;

/// Smallest movement per depenetration pass.
const MIN_STEP_DISTANCE: f32 = 0.001;

/// Everything depenetration needs besides the state it writes.
pub(crate) struct Depenetration<'a> {
    pub world: &'a dyn PhysicsWorld,
    pub capsule: CapsuleShape,
    pub extent: f32,
    pub suppress_convex_mesh_colliders: bool,
}

impl Depenetration<'_> {
    /// Resolves penetration of `data.target_position` against `overlap`.
    pub fn resolve(
        &self,
        data: &mut MovementState,
        overlap: &mut OverlapInfo,
        resolver: &mut Resolver,
        max_steps: u32,
        probe_grounding: bool,
        resolve_triggers: bool,
    ) {
        if self.suppress_convex_mesh_colliders {
            overlap.toggle_convex_mesh_colliders(self.world, false);
        }

        let thresholds =
            ContactThresholds::from_angles(data.max_ground_angle, data.max_wall_angle, data.max_hang_angle);

        match overlap.collider_hit_count() {
            0 => {}
            1 => self.depenetrate_single(data, overlap, &thresholds, probe_grounding),
            _ => self.depenetrate_multiple(data, overlap, resolver, &thresholds, probe_grounding, max_steps),
        }

        if data.is_grounded {
            data.ground_tangent = ground_tangent(data);
        }

        if resolve_triggers {
            for hit in overlap.trigger_hits_mut() {
                self.cache_pose(hit);
                let penetration = self.world.compute_penetration(
                    &self.capsule,
                    data.target_position,
                    hit.collider.handle,
                    hit.cached_pose,
                );

                hit.is_within_extent = penetration.is_some();
                hit.has_penetration = penetration.is_some();
                hit.max_penetration = penetration.map_or(0.0, |p| p.distance.max(0.0));
                hit.collision_type = if penetration.is_some() {
                    CollisionType::Trigger
                } else {
                    CollisionType::None
                };
            }
        }

        if self.suppress_convex_mesh_colliders {
            overlap.toggle_convex_mesh_colliders(self.world, true);
        }
    }

    fn cache_pose(&self, hit: &mut OverlapHit) {
        if let Some(pose) = self.world.collider_pose(hit.collider.handle) {
            hit.cached_pose = pose;
        }
    }

    /// Slope contact the actor walks into: push horizontally only so the
    /// slope cannot be climbed.
    fn redirect_on_slope(
        data: &MovementState,
        thresholds: &ContactThresholds,
        movement_xz: Vec3,
        direction: Vec3,
        distance: f32,
    ) -> (Vec3, f32) {
        let up_dot = direction.y;
        if up_dot > 0.0
            && up_dot < thresholds.min_ground_dot
            && distance >= MIN_PROJECTED_DISTANCE
            && data.dynamic_velocity.y <= 0.0
            && movement_xz.dot(direction.only_xz()) < 0.0
        {
            return project_vertical_penetration(direction, distance);
        }
        (direction, distance)
    }

    // ========================================================================
    // SINGLE CONTACT
    // ========================================================================

    fn depenetrate_single(
        &self,
        data: &mut MovementState,
        overlap: &mut OverlapInfo,
        thresholds: &ContactThresholds,
        probe_grounding: bool,
    ) {
        let Some(hit) = overlap.collider_hits_mut().next() else {
            return;
        };

        hit.reset_contact();
        self.cache_pose(hit);

        let penetration = self.world.compute_penetration(
            &self.capsule,
            data.target_position,
            hit.collider.handle,
            hit.cached_pose,
        );

        if let Some(penetration) = penetration {
            let up_dot = penetration.direction.dot(Vec3::UP);

            hit.has_penetration = true;
            hit.is_within_extent = true;
            hit.max_penetration = penetration.distance;
            hit.up_direction_dot = up_dot;
            hit.collision_type = thresholds.classify(up_dot);

            if hit.collision_type == CollisionType::Ground {
                data.is_grounded = true;
                data.ground_normal = penetration.direction;
                data.ground_distance = 0.0;
                data.ground_angle = penetration.direction.angle(Vec3::UP);
            }

            let movement_xz = (data.target_position - data.base_position).only_xz();
            let (direction, distance) = Self::redirect_on_slope(
                data,
                thresholds,
                movement_xz,
                penetration.direction,
                penetration.distance,
            );

            data.target_position += direction * distance;
        }

        if data.is_grounded {
            data.ground_position = data.target_position + (Vec3::UP - data.ground_normal) * self.capsule.radius;
            data.ground_angle = data.ground_normal.angle(Vec3::UP);
        }

        if !data.is_grounded && probe_grounding {
            let probe = check_ground(
                self.world,
                &self.capsule,
                data.target_position,
                hit.collider.handle,
                hit.cached_pose,
                self.extent,
                thresholds.min_ground_dot,
            );

            if probe.is_grounded {
                data.is_grounded = true;
                data.ground_normal = probe.normal;
                data.ground_position = probe.position;
                data.ground_distance = probe.distance;
                data.ground_angle = probe.normal.angle(Vec3::UP);

                hit.is_within_extent = true;
                hit.collision_type = CollisionType::Ground;
            } else if probe.is_within_extent {
                hit.is_within_extent = true;
                if hit.collision_type == CollisionType::None {
                    hit.collision_type = CollisionType::Slope;
                }
            }
        }
    }

    // ========================================================================
    // MULTIPLE CONTACTS
    // ========================================================================

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    fn depenetrate_multiple(
        &self,
        data: &mut MovementState,
        overlap: &mut OverlapInfo,
        resolver: &mut Resolver,
        thresholds: &ContactThresholds,
        probe_grounding: bool,
        max_steps: u32,
    ) {
        let mut max_steps = max_steps.max(1);
        let mut max_ground_dot = 0.0_f32;
        let mut max_ground_normal = Vec3::ZERO;
        let mut average_ground_normal = Vec3::ZERO;

        let position_delta = data.target_position - data.base_position;
        let position_delta_xz = position_delta.only_xz();

        for hit in overlap.collider_hits_mut() {
            hit.reset_contact();
            hit.up_direction_dot = f32::MIN;
            self.cache_pose(hit);
        }

        if max_steps > 1 {
            let target_distance = position_delta.length();
            if target_distance < max_steps as f32 * MIN_STEP_DISTANCE {
                max_steps = ((target_distance / MIN_STEP_DISTANCE) as u32).max(1);
            }
        }

        let mut remaining_steps = max_steps;
        while remaining_steps > 0 {
            remaining_steps -= 1;
            resolver.reset();

            for hit in overlap.collider_hits_mut() {
                let Some(penetration) = self.world.compute_penetration(
                    &self.capsule,
                    data.target_position,
                    hit.collider.handle,
                    hit.cached_pose,
                ) else {
                    continue;
                };

                hit.has_penetration = true;
                hit.is_within_extent = true;
                hit.max_penetration = hit.max_penetration.max(penetration.distance);

                let up_dot = penetration.direction.dot(Vec3::UP);
                if up_dot > hit.up_direction_dot {
                    hit.up_direction_dot = up_dot;
                    hit.collision_type = thresholds.classify(up_dot);

                    if hit.collision_type == CollisionType::Ground {
                        data.is_grounded = true;

                        if up_dot >= max_ground_dot {
                            max_ground_dot = up_dot;
                            max_ground_normal = penetration.direction;
                        }

                        average_ground_normal += penetration.direction * up_dot;
                    }
                }

                let (direction, distance) = Self::redirect_on_slope(
                    data,
                    thresholds,
                    position_delta_xz,
                    penetration.direction,
                    penetration.distance,
                );

                resolver.add_correction(direction, distance);
            }

            if resolver.count() == 0 {
                break;
            }

            let (iterations, max_error) = if remaining_steps == 0 {
                (12, 0.0001)
            } else {
                (8, 0.001)
            };

            let correction = resolver
                .compute_best(iterations, max_error)
                .clamp_magnitude(self.capsule.radius);
            let multiplier = (1.0 - remaining_steps as f32 * 0.25).max(0.25);

            data.target_position += correction * multiplier;
        }

        for hit in overlap.collider_hits_mut() {
            if hit.up_direction_dot == f32::MIN {
                hit.up_direction_dot = 0.0;
            }
        }

        if data.is_grounded {
            data.ground_normal = max_ground_normal;

            let average_ground_normal = average_ground_normal.normalize();
            if average_ground_normal.dot(Vec3::UP) >= max_ground_dot {
                data.ground_normal = average_ground_normal;
            }

            data.ground_position = data.target_position + (Vec3::UP - data.ground_normal) * self.capsule.radius;
            data.ground_distance = 0.0;
            data.ground_angle = data.ground_normal.angle(Vec3::UP);
        }

        if !data.is_grounded && probe_grounding {
            let mut closest_normal = Vec3::UP;
            let mut closest_position = Vec3::ZERO;
            let mut closest_distance = 1000.0_f32;

            for hit in overlap.collider_hits_mut() {
                let probe = check_ground(
                    self.world,
                    &self.capsule,
                    data.target_position,
                    hit.collider.handle,
                    hit.cached_pose,
                    self.extent,
                    thresholds.min_ground_dot,
                );

                if probe.is_grounded {
                    data.is_grounded = true;

                    if probe.distance < closest_distance {
                        closest_normal = probe.normal;
                        closest_position = probe.position;
                        closest_distance = probe.distance;
                    }

                    hit.is_within_extent = true;
                    hit.collision_type = CollisionType::Ground;
                } else if probe.is_within_extent {
                    hit.is_within_extent = true;
                    if hit.collision_type == CollisionType::None {
                        hit.collision_type = CollisionType::Slope;
                    }
                }
            }

            if data.is_grounded {
                data.ground_normal = closest_normal;
                data.ground_position = closest_position;
                data.ground_distance = closest_distance;
                data.ground_angle = closest_normal.angle(Vec3::UP);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{CapsuleQuery, QueryTriggerInteraction};
    use crate::world::{StaticCollider, StaticWorld};

    const CAPSULE: CapsuleShape = CapsuleShape::new(0.5, 2.0);

    fn overlap(world: &StaticWorld, position: Vec3) -> OverlapInfo {
        let mut colliders = Vec::new();
        world.overlap_capsule(
            &CapsuleQuery {
                position,
                shape: CAPSULE,
                extent: 0.05,
                layer_mask: u32::MAX,
                triggers: QueryTriggerInteraction::Collide,
            },
            &mut colliders,
        );

        let mut info = OverlapInfo::new();
        for collider in colliders {
            info.add_hit(collider);
        }
        info
    }

    fn solve(world: &StaticWorld, data: &mut MovementState, info: &mut OverlapInfo) {
        let depenetration = Depenetration {
            world,
            capsule: CAPSULE,
            extent: 0.05,
            suppress_convex_mesh_colliders: false,
        };
        depenetration.resolve(data, info, &mut Resolver::new(), 8, true, true);
    }

    #[test]
    fn test_floor_contact_grounds_the_actor() {
        let world = StaticWorld::new().with(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
        let mut data = MovementState::new();
        data.target_position = Vec3::new(0.0, -0.1, 0.0);
        data.base_position = Vec3::new(0.0, 0.0, 0.0);

        let mut info = overlap(&world, data.target_position);
        solve(&world, &mut data, &mut info);

        assert!(data.target_position.y.abs() < 1e-5);
        assert!(data.is_grounded);
        assert_eq!(data.ground_normal, Vec3::UP);
        assert!(data.ground_position.distance(data.target_position) < 1e-5);
        assert_eq!(data.ground_tangent, data.transform_direction());

        let hit = &info.all_hits()[0];
        assert_eq!(hit.collision_type, CollisionType::Ground);
        assert!((hit.max_penetration - 0.1).abs() < 1e-5);
    }

    #[test]
    fn test_corner_is_resolved_along_the_bisector() {
        let world = StaticWorld::new()
            .with(StaticCollider::cuboid(Vec3::new(1.4, 5.0, 0.0), Vec3::new(1.0, 10.0, 10.0)))
            .with(StaticCollider::cuboid(Vec3::new(0.0, 5.0, 1.4), Vec3::new(10.0, 10.0, 1.0)));

        let mut data = MovementState::new();
        data.base_position = Vec3::new(0.0, 5.0, 0.0);
        data.target_position = data.base_position;

        let mut info = overlap(&world, data.target_position);
        assert_eq!(info.collider_hit_count(), 2);
        solve(&world, &mut data, &mut info);

        assert!(data.target_position.distance(Vec3::new(-0.1, 5.0, -0.1)) < 1e-3);
        assert!(!data.is_grounded);
        for hit in info.collider_hits() {
            assert!(hit.has_penetration);
            assert_eq!(hit.collision_type, CollisionType::Wall);
        }

        // Nothing left to resolve.
        let resolved = data.target_position;
        solve(&world, &mut data, &mut info);
        assert!(data.target_position.distance(resolved) < 1e-3);
    }

    #[test]
    fn test_triggers_are_classified_but_never_block() {
        let world = StaticWorld::new()
            .with(StaticCollider::sphere(Vec3::new(0.0, 1.0, 0.0), 0.5).trigger());

        let mut data = MovementState::new();
        data.target_position = Vec3::new(0.3, 0.0, 0.0);
        data.base_position = data.target_position;

        let mut info = overlap(&world, data.target_position);
        solve(&world, &mut data, &mut info);

        assert_eq!(data.target_position, Vec3::new(0.3, 0.0, 0.0));
        let hit = &info.all_hits()[0];
        assert_eq!(hit.collision_type, CollisionType::Trigger);
        assert!(hit.has_penetration);
    }
}
