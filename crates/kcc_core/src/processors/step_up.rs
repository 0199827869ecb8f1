//! # Step-Up
//!
//! Lifts the actor over obstacles that block horizontal movement.
//!
//! ```text
//!        check ──► forward ──► cast down
//!          ○          ○           ○
//!          │          │           ↓
//!   ───────┘     ┌────────────────────
//!     actor ►│   │  step
//! ───────────┴───┘
//! ```
//!
//! The lifted capsule is probed above the blocked target and once more
//! `step_depth` further; both must be free. A downward sphere cast from the
//! forward probe finds the step height. The target is raised by the
//! horizontal distance the solver took away, clamped to that height.

use kcc_shared::Vec3;
use serde::{Deserialize, Serialize};

use crate::contact::{CollisionType, CollisionTypes, ContactThresholds, OverlapInfo, ShapeCastInfo};
use crate::error::KccResult;
use crate::integrator::Kcc;
use crate::physics::QueryTriggerInteraction;
use crate::pipeline::{Capabilities, Processor, StageKind};

/// Step-up tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepUpConfig {
    /// Maximum obstacle height.
    pub step_height: f32,
    /// Free space required beyond the obstacle edge.
    pub step_depth: f32,
    /// Multiplier of the lift per unapplied horizontal meter.
    pub step_speed: f32,
    /// Horizontal progress ratio below which the actor counts as blocked.
    pub min_push_back: f32,
    /// Radius of the ground cast relative to the capsule radius.
    pub ground_check_radius_scale: f32,
    /// Zero dynamic velocity when stepping ends.
    pub clear_dynamic_velocity_on_end: bool,
    /// Only step onto walkable surfaces.
    pub require_ground_target: bool,
    /// Refresh tracked hits after a step.
    pub force_update_hits: bool,
}

impl Default for StepUpConfig {
    fn default() -> Self {
        Self {
            step_height: 0.5,
            step_depth: 0.2,
            step_speed: 1.0,
            min_push_back: 0.5,
            ground_check_radius_scale: 0.5,
            clear_dynamic_velocity_on_end: true,
            require_ground_target: false,
            force_update_hits: false,
        }
    }
}

/// Steps over low obstacles after every move step.
#[derive(Clone, Debug, Default)]
pub struct StepUpProcessor {
    config: StepUpConfig,
}

impl StepUpProcessor {
    /// Runs before ground snapping.
    pub const PRIORITY: f32 = -1000.0;

    /// Creates the processor.
    #[must_use]
    pub const fn new(config: StepUpConfig) -> Self {
        Self { config }
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &StepUpConfig {
        &self.config
    }

    fn try_step_up(&self, kcc: &mut Kcc, overlap: &mut OverlapInfo, cast: &mut ShapeCastInfo) -> bool {
        let config = &self.config;
        if config.step_height <= 0.0 || config.step_depth <= 0.0 || config.step_speed <= 0.0 {
            return false;
        }

        let data = kcc.data();
        if data.jump_frames > 0 || data.has_teleported {
            return false;
        }

        let base = data.base_position;
        let desired = data.desired_position;
        let mut target = data.target_position;
        let was_stepping = data.is_stepping_up || data.was_stepping_up;
        let thresholds = ContactThresholds::from_angles(data.max_ground_angle, data.max_wall_angle, data.max_hang_angle);

        let desired_delta = desired - base;
        let desired_xz_distance = desired_delta.only_xz().length();
        if desired_xz_distance < 0.001 {
            return false;
        }

        let target_xz_distance = (target - base).only_xz().length();
        let is_blocked = kcc.step_overlap().has_collisions_within_extent(CollisionTypes::BLOCKING)
            || target_xz_distance / desired_xz_distance < config.min_push_back;
        if !is_blocked {
            return false;
        }

        let desired_direction = desired_delta.normalize();
        if desired_direction.is_zero() || desired_direction.y.abs() >= 0.9 {
            return false;
        }

        let correction = target - desired;
        let correction_distance = correction.length();
        let correction_direction = if correction_distance > 0.001 {
            correction / correction_distance
        } else {
            -desired_direction
        };
        if desired_direction.dot(correction_direction) >= 0.0 {
            return false;
        }

        let desired_xz = desired_direction.only_xz().normalize();
        let correction_xz = (-correction_direction).only_xz().normalize();
        if desired_xz.dot(correction_xz) < 0.1 {
            return false;
        }
        let combined = (desired_xz + correction_xz).normalize();

        // Slide the target back onto the movement line at the blocking plane.
        let on_slope = kcc
            .step_overlap()
            .has_collisions_within_extent(CollisionTypes::only(CollisionType::Slope));
        if !on_slope {
            let origin = base - desired_delta * 2.0;
            let denominator = desired_direction.dot(correction_direction);
            if denominator.abs() > 1e-6 {
                let distance = (target - origin).dot(correction_direction) / denominator;
                if distance.is_finite() && distance >= 0.0 {
                    target = origin + desired_direction * distance;
                }
            }
        }

        let settings = kcc.settings();
        let radius = settings.radius;
        let height = settings.height;
        let extent = settings.extent;
        let layer_mask = settings.collision_layer_mask;

        let mut check_radius = radius - extent;
        let mut check_position = target + Vec3::UP * config.step_height;
        if kcc.capsule_overlap(overlap, check_position, check_radius, height, 0.0, layer_mask, QueryTriggerInteraction::Ignore) {
            return false;
        }

        check_position += combined * config.step_depth;
        if kcc.capsule_overlap(overlap, check_position, check_radius, height, 0.0, layer_mask, QueryTriggerInteraction::Ignore) {
            return false;
        }

        if config.ground_check_radius_scale < 1.0 {
            check_radius = radius * config.ground_check_radius_scale.max(0.01);
            check_position += combined * (radius - extent - check_radius);
        }

        kcc.sphere_cast(
            cast,
            check_position + Vec3::UP * radius,
            check_radius,
            Vec3::DOWN,
            config.step_height + radius,
            layer_mask,
            QueryTriggerInteraction::Ignore,
        );

        let highest = cast
            .collider_hits()
            .filter(|hit| hit.point.y > target.y)
            .max_by(|a, b| a.point.y.total_cmp(&b.point.y));

        let max_step = match highest {
            Some(hit) => {
                if config.require_ground_target && !was_stepping && !thresholds.is_walkable(hit.normal.y) {
                    return false;
                }
                (hit.point.y - target.y).clamp(0.0, config.step_height)
            }
            None => config.step_height,
        };

        let unapplied = (desired - base).length() - (target - base).length();
        let remaining = (unapplied * config.step_speed).clamp(0.0, max_step)
            * desired_direction.dot(-correction_direction).clamp(0.0, 1.0);

        let data = kcc.data_mut();
        data.target_position = target + Vec3::UP * remaining;
        data.is_grounded = true;
        data.ground_normal = Vec3::UP;
        data.ground_distance = extent;
        data.ground_position = data.target_position;
        data.ground_angle = 0.0;
        data.ground_tangent = data.transform_direction();
        true
    }
}

impl Processor for StepUpProcessor {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::AfterMoveStep)
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        Self::PRIORITY
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        let mut overlap = kcc.acquire_overlap();
        let mut cast = kcc.acquire_cast();
        let stepped = self.try_step_up(kcc, &mut overlap, &mut cast);
        kcc.release_overlap(overlap);
        kcc.release_cast(cast);

        let data = kcc.data_mut();
        data.is_stepping_up = stepped;
        if data.was_stepping_up && !stepped && self.config.clear_dynamic_velocity_on_end {
            data.dynamic_velocity = Vec3::ZERO;
        }

        if stepped && self.config.force_update_hits {
            if let Some(frame) = kcc.stage_frame_mut() {
                frame.request_update_hits();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::Timeline;
    use crate::integrator::FixedStep;
    use crate::settings::KccSettings;
    use crate::world::{StaticCollider, StaticWorld};

    const DT: f32 = 1.0 / 60.0;

    fn walk_into(obstacle: StaticCollider, ticks: i32) -> (Kcc, bool) {
        let world = StaticWorld::new()
            .with(StaticCollider::plane(Vec3::ZERO, Vec3::UP))
            .with(obstacle);
        let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
        kcc.spawn(Vec3::new(0.0, 0.0, 0.0), 0.0, 90.0, FixedStep::default()).unwrap();
        kcc.add_processor(StepUpProcessor::default());

        let mut stepped = false;
        for tick in 1..=ticks {
            #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
            let (frame, time) = (tick as u32, tick as f32 * DT);
            kcc.begin_fixed_update(FixedStep {
                frame,
                tick,
                time,
                delta_time: DT,
            });
            kcc.set_kinematic_velocity(Vec3::new(3.0, 0.0, 0.0), Timeline::Fixed).unwrap();
            kcc.fixed_update().unwrap();
            kcc.end_fixed_update();
            stepped |= kcc.fixed_data().is_stepping_up;
        }
        (kcc, stepped)
    }

    #[test]
    fn test_low_ledge_is_climbed() {
        let ledge = StaticCollider::cuboid(Vec3::new(1.0, 0.15, 0.0), Vec3::new(0.5, 0.15, 2.0));
        let (kcc, stepped) = walk_into(ledge, 40);

        let data = kcc.fixed_data();
        assert!(stepped);
        assert!(data.target_position.y > 0.25);
        assert!(data.target_position.x > 0.5);
    }

    #[test]
    fn test_tall_wall_blocks() {
        let wall = StaticCollider::cuboid(Vec3::new(1.0, 1.5, 0.0), Vec3::new(0.5, 1.5, 2.0));
        let (kcc, stepped) = walk_into(wall, 20);

        let data = kcc.fixed_data();
        assert!(!stepped);
        assert!(data.target_position.y.abs() < 1e-3);
        assert!(data.target_position.x < 0.16);
    }

    #[test]
    fn test_unblocked_movement_does_not_step() {
        let far = StaticCollider::sphere(Vec3::new(50.0, 0.0, 0.0), 0.5);
        let (kcc, stepped) = walk_into(far, 5);

        assert!(!stepped);
        assert!((kcc.fixed_data().target_position.x - 5.0 * 3.0 * DT).abs() < 1e-4);
    }

    #[test]
    fn test_disabled_by_zero_height() {
        let processor = StepUpProcessor::new(StepUpConfig {
            step_height: 0.0,
            ..StepUpConfig::default()
        });
        let world = StaticWorld::new();
        let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
        kcc.spawn(Vec3::ZERO, 0.0, 0.0, FixedStep::default()).unwrap();

        let mut overlap = kcc.acquire_overlap();
        let mut cast = kcc.acquire_cast();
        assert!(!processor.try_step_up(&mut kcc, &mut overlap, &mut cast));
    }
}
