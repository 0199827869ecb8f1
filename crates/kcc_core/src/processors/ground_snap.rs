//! Keeps a walking actor attached to the ground on descending slopes and
//! small drops.

use kcc_shared::Vec3;
use serde::{Deserialize, Serialize};

use crate::contact::OverlapInfo;
use crate::data::MovementState;
use crate::error::KccResult;
use crate::integrator::Kcc;
use crate::physics::QueryTriggerInteraction;
use crate::pipeline::{Capabilities, Processor, StageKind};

/// Ground snap tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundSnapConfig {
    /// Maximum distance searched below the actor.
    pub snap_distance: f32,
    /// Maximum snap speed in m/s, halved on the first snapping frame.
    pub snap_speed: f32,
    /// Refresh tracked hits after snapping.
    pub force_update_hits: bool,
}

impl Default for GroundSnapConfig {
    fn default() -> Self {
        Self {
            snap_distance: 0.25,
            snap_speed: 4.0,
            force_update_hits: false,
        }
    }
}

/// Pulls the actor down to the ground after it was lost without a jump.
#[derive(Clone, Debug, Default)]
pub struct GroundSnapProcessor {
    config: GroundSnapConfig,
}

impl GroundSnapProcessor {
    /// Last processor of `AfterMoveStep`.
    pub const PRIORITY: f32 = -2000.0;

    /// Creates the processor.
    #[must_use]
    pub const fn new(config: GroundSnapConfig) -> Self {
        Self { config }
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &GroundSnapConfig {
        &self.config
    }

    fn should_snap(&self, data: &MovementState) -> bool {
        self.config.snap_distance > 0.0
            && !data.is_grounded
            && data.was_grounded
            && data.jump_frames == 0
            && !data.is_stepping_up
            && !data.was_stepping_up
            && data.dynamic_velocity.y <= 0.0
    }

    /// Returns `true` if the actor was snapped.
    fn try_snap(&self, kcc: &mut Kcc, overlap: &mut OverlapInfo, probe: &mut MovementState) -> bool {
        let config = &self.config;
        let settings = kcc.settings();
        let radius = settings.radius;
        let height = settings.height;
        let layer_mask = settings.collision_layer_mask;

        let max_step_delta = radius * 0.25;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let steps = ((config.snap_distance / max_step_delta).ceil() as u32).max(1);
        #[allow(clippy::cast_precision_loss)]
        let step_delta = config.snap_distance / steps as f32;

        let target = kcc.data().target_position;
        if !kcc.capsule_overlap(
            overlap,
            target - Vec3::UP * config.snap_distance,
            radius * 1.5,
            height + config.snap_distance,
            0.0,
            layer_mask,
            QueryTriggerInteraction::Ignore,
        ) {
            return false;
        }

        for _ in 0..steps {
            probe.target_position.y -= step_delta;
            kcc.resolve_penetration(probe, overlap, 1, false, false);
            if probe.is_grounded {
                break;
            }
        }
        if !probe.is_grounded {
            return false;
        }

        let data = kcc.data_mut();
        let mut max_snap = config.snap_speed * data.update_delta_time;
        if !data.was_snapping_to_ground {
            max_snap *= 0.5;
        }

        let offset = probe.target_position - data.target_position;
        let distance = offset.length();
        if distance > max_snap {
            data.target_position += offset * (max_snap / distance);
        } else {
            data.target_position = probe.target_position;
        }

        data.is_grounded = true;
        data.ground_normal = probe.ground_normal;
        data.ground_tangent = probe.ground_tangent;
        data.ground_position = probe.ground_position;
        data.ground_angle = probe.ground_angle;
        data.ground_distance = ((data.target_position - probe.target_position).length() - radius).max(0.0);
        data.is_snapping_to_ground = true;
        true
    }
}

impl Processor for GroundSnapProcessor {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::AfterMoveStep)
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        Self::PRIORITY
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        if !self.should_snap(kcc.data()) {
            return Ok(());
        }

        let mut overlap = kcc.acquire_overlap();
        let mut probe = kcc.acquire_state_copy();
        let snapped = self.try_snap(kcc, &mut overlap, &mut probe);
        kcc.release_overlap(overlap);
        kcc.release_state(probe);

        if snapped && self.config.force_update_hits {
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

    fn step(tick: i32) -> FixedStep {
        #[allow(clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let (frame, time) = (tick as u32, tick as f32 * DT);
        FixedStep {
            frame,
            tick,
            time,
            delta_time: DT,
        }
    }

    /// Floor at y = 0 for x < 1 and at y = -0.1 beyond.
    fn ledge_world() -> StaticWorld {
        StaticWorld::new()
            .with(StaticCollider::cuboid(Vec3::new(-4.0, -1.0, 0.0), Vec3::new(5.0, 1.0, 5.0)))
            .with(StaticCollider::cuboid(Vec3::new(6.0, -1.1, 0.0), Vec3::new(5.0, 1.0, 5.0)))
    }

    fn walk(kcc: &mut Kcc, ticks: std::ops::RangeInclusive<i32>, velocity: Vec3) -> bool {
        let mut snapped = false;
        for tick in ticks {
            kcc.begin_fixed_update(step(tick));
            kcc.set_kinematic_velocity(velocity, Timeline::Fixed).unwrap();
            kcc.fixed_update().unwrap();
            kcc.end_fixed_update();
            snapped |= kcc.fixed_data().is_snapping_to_ground;
        }
        snapped
    }

    #[test]
    fn test_small_drop_is_followed() {
        let mut kcc = Kcc::new(Arc::new(ledge_world()), KccSettings::default());
        kcc.spawn(Vec3::new(0.5, 0.0, 0.0), 0.0, 90.0, step(0)).unwrap();
        kcc.add_processor(GroundSnapProcessor::default());

        let snapped = walk(&mut kcc, 1..=40, Vec3::new(2.0, 0.0, 0.0));

        let data = kcc.fixed_data();
        assert!(snapped);
        assert!(data.target_position.x > 1.5);
        let extent = kcc.settings().extent;
        assert!(data.target_position.y > -0.1 - 1e-3);
        assert!(data.target_position.y < -0.1 + extent + 1e-3);
        assert!(data.is_grounded);
    }

    #[test]
    fn test_rising_actor_is_not_snapped() {
        let world = StaticWorld::new().with(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
        let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
        kcc.spawn(Vec3::ZERO, 0.0, 0.0, step(0)).unwrap();
        kcc.add_processor(GroundSnapProcessor::default());

        walk(&mut kcc, 1..=1, Vec3::ZERO);
        assert!(kcc.fixed_data().is_grounded);

        kcc.begin_fixed_update(step(2));
        kcc.set_dynamic_velocity(Vec3::new(0.0, 3.0, 0.0), Timeline::Fixed).unwrap();
        kcc.fixed_update().unwrap();

        let data = kcc.fixed_data();
        assert!(!data.is_snapping_to_ground);
        assert!(!data.is_grounded);
        assert!((data.target_position.y - 3.0 * DT).abs() < 1e-5);
    }

    #[test]
    fn test_snap_speed_limits_first_frame() {
        let processor = GroundSnapProcessor::default();
        let world = StaticWorld::new().with(StaticCollider::plane(Vec3::new(0.0, -0.2, 0.0), Vec3::UP));
        let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
        kcc.spawn(Vec3::ZERO, 0.0, 0.0, step(0)).unwrap();
        kcc.fixed_data_mut().was_grounded = true;

        let mut overlap = kcc.acquire_overlap();
        let mut probe = kcc.acquire_state_copy();
        assert!(processor.should_snap(kcc.data()));
        assert!(processor.try_snap(&mut kcc, &mut overlap, &mut probe));

        let data = kcc.fixed_data();
        let expected = -4.0 * DT * 0.5;
        assert!((data.target_position.y - expected).abs() < 1e-5);
        assert!(data.is_snapping_to_ground);
        assert!((probe.target_position.y + 0.2).abs() < 1e-3);
    }
}
