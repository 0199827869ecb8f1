//! Gravity, external forces, jump and input mapping.

use kcc_shared::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::KccResult;
use crate::integrator::{ground_tangent, project_on_ground, Kcc};
use crate::pipeline::{Capabilities, Processor, StageKind};

/// Environment tuning.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Speed reached with full input, in m/s.
    pub kinematic_speed: f32,
    /// Gravity acceleration.
    pub gravity: Vec3,
    /// Horizontal dynamic velocity decay per second while grounded.
    pub ground_friction: f32,
    /// Horizontal dynamic velocity decay per second in the air.
    pub air_friction: f32,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            kinematic_speed: 6.0,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            ground_friction: 25.0,
            air_friction: 2.0,
        }
    }
}

/// Prepares velocities for the move.
///
/// Dynamic velocity integrates gravity, external acceleration, force and
/// impulses; kinematic velocity follows the input along the ground. One-shot
/// inputs are cleared once consumed.
#[derive(Clone, Debug, Default)]
pub struct EnvironmentProcessor {
    config: EnvironmentConfig,
}

impl EnvironmentProcessor {
    /// Runs at the start of `PrepareData`.
    pub const PRIORITY: f32 = 1000.0;

    /// Creates the processor.
    #[must_use]
    pub const fn new(config: EnvironmentConfig) -> Self {
        Self { config }
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &EnvironmentConfig {
        &self.config
    }
}

impl Processor for EnvironmentProcessor {
    fn capabilities(&self) -> Capabilities {
        Capabilities::only(StageKind::PrepareData)
    }

    fn priority(&self, _kcc: &Kcc) -> f32 {
        Self::PRIORITY
    }

    fn execute(&mut self, _stage: StageKind, kcc: &mut Kcc) -> KccResult<()> {
        let config = &self.config;
        let data = kcc.data_mut();
        let delta_time = data.delta_time;

        data.gravity = config.gravity;
        data.kinematic_speed = config.kinematic_speed;

        let mut dynamic = data.dynamic_velocity;
        if data.is_grounded && dynamic.y < 0.0 {
            dynamic.y = 0.0;
        }
        dynamic += data.gravity * delta_time;
        dynamic += (data.external_acceleration + data.external_force) * delta_time;
        dynamic += data.external_impulse;

        if !data.jump_impulse.is_zero() {
            if dynamic.y < 0.0 {
                dynamic.y = 0.0;
            }
            dynamic += data.jump_impulse;
            data.jump_frames = 1;
        }

        let friction = if data.is_grounded && data.jump_frames == 0 {
            config.ground_friction
        } else {
            config.air_friction
        };
        let decay = (1.0 - friction * delta_time).max(0.0);
        dynamic.x *= decay;
        dynamic.z *= decay;
        data.dynamic_velocity = dynamic;

        let input = data.input_direction;
        data.kinematic_direction = input;
        data.kinematic_tangent = if input.only_xz().is_zero() {
            ground_tangent(data)
        } else if data.is_grounded {
            project_on_ground(data.ground_normal, input).map_or_else(|| input.normalize(), Vec3::normalize)
        } else {
            input.only_xz().normalize()
        };
        data.kinematic_velocity =
            data.kinematic_tangent * (input.length() * data.kinematic_speed) + data.external_velocity;

        data.jump_impulse = Vec3::ZERO;
        data.external_velocity = Vec3::ZERO;
        data.external_acceleration = Vec3::ZERO;
        data.external_impulse = Vec3::ZERO;
        data.external_force = Vec3::ZERO;
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

    fn spawned(world: StaticWorld, position: Vec3) -> Kcc {
        let mut kcc = Kcc::new(Arc::new(world), KccSettings::default());
        kcc.spawn(position, 0.0, 0.0, step(0)).unwrap();
        kcc.add_processor(EnvironmentProcessor::default());
        kcc
    }

    #[test]
    fn test_gravity_accelerates_falling_actor() {
        let mut kcc = spawned(StaticWorld::new(), Vec3::new(0.0, 10.0, 0.0));
        kcc.begin_fixed_update(step(1));
        kcc.fixed_update().unwrap();

        let data = kcc.fixed_data();
        assert!((data.dynamic_velocity.y + 9.81 * DT).abs() < 1e-5);
        assert!((data.target_position.y - (10.0 - 9.81 * DT * DT)).abs() < 1e-5);
        assert_eq!(data.gravity, Vec3::new(0.0, -9.81, 0.0));
    }

    #[test]
    fn test_input_moves_along_ground() {
        let world = StaticWorld::new().with(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
        let mut kcc = spawned(world, Vec3::ZERO);

        for tick in 1..=3 {
            kcc.begin_fixed_update(step(tick));
            kcc.set_input_direction(Vec3::new(1.0, 0.0, 0.0), Timeline::Fixed).unwrap();
            kcc.fixed_update().unwrap();
            kcc.end_fixed_update();
        }

        let data = kcc.fixed_data();
        assert!(data.is_grounded);
        assert!((data.kinematic_velocity.x - 6.0).abs() < 1e-4);
        assert!(data.target_position.y.abs() < 1e-3);
        assert!((data.target_position.x - 3.0 * 6.0 * DT).abs() < 1e-3);
    }

    #[test]
    fn test_jump_lifts_off_and_clears_impulse() {
        let world = StaticWorld::new().with(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
        let mut kcc = spawned(world, Vec3::ZERO);

        kcc.begin_fixed_update(step(1));
        kcc.fixed_update().unwrap();
        kcc.end_fixed_update();
        assert!(kcc.fixed_data().is_grounded);

        kcc.begin_fixed_update(step(2));
        kcc.jump(Vec3::new(0.0, 5.0, 0.0), Timeline::Fixed).unwrap();
        kcc.fixed_update().unwrap();

        let data = kcc.fixed_data();
        assert!(data.has_jumped());
        assert!(!data.is_grounded);
        assert!(data.target_position.y > 0.0);
        assert!(data.jump_impulse.is_zero());
        assert!((data.dynamic_velocity.y - 5.0).abs() < 1e-4);
    }

    #[test]
    fn test_external_inputs_are_consumed_once() {
        let mut kcc = spawned(StaticWorld::new(), Vec3::ZERO);
        kcc.begin_fixed_update(step(1));
        kcc.add_external_impulse(Vec3::new(2.0, 0.0, 0.0), Timeline::Fixed).unwrap();
        kcc.add_external_velocity(Vec3::new(0.0, 0.0, 1.0), Timeline::Fixed).unwrap();
        kcc.fixed_update().unwrap();

        let data = kcc.fixed_data();
        assert!(data.external_impulse.is_zero());
        assert!(data.external_velocity.is_zero());
        assert!((data.kinematic_velocity.z - 1.0).abs() < 1e-6);
        let decay = 1.0 - 2.0 * DT;
        assert!((data.dynamic_velocity.x - 2.0 * decay).abs() < 1e-5);
    }
}
