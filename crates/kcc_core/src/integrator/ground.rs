//! # Ground Helpers
//!
//! Geometry used by depenetration to decide where the actor stands.

use kcc_shared::Vec3;

use crate::data::MovementState;
use crate::physics::{CapsuleShape, ColliderHandle, PhysicsWorld, Pose};

/// Result of a ground probe against one collider.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct GroundProbe {
    /// The collider is walkable below the capsule.
    pub is_grounded: bool,
    /// The collider touched the capsule lowered by extent.
    pub is_within_extent: bool,
    /// Contact point on the ground.
    pub position: Vec3,
    /// Ground normal.
    pub normal: Vec3,
    /// Gap between capsule and ground.
    pub distance: f32,
}

/// Redirects a slope penetration horizontally.
///
/// The new distance satisfies the original constraint exactly:
/// `dot(new_direction * new_distance, direction) == distance`. Returns the
/// input unchanged for a vertical direction.
#[must_use]
pub fn project_vertical_penetration(direction: Vec3, distance: f32) -> (Vec3, f32) {
    let horizontal = direction.only_xz();
    let horizontal_length = horizontal.length();
    if horizontal_length < 0.000_001 {
        return (direction, distance);
    }
    (horizontal / horizontal_length, distance / horizontal_length)
}

/// Projects `vector` vertically onto the plane with `normal`.
///
/// Only the Y component changes. `None` for normals that do not point up or
/// for a vector without horizontal part.
#[must_use]
pub fn project_on_ground(normal: Vec3, vector: Vec3) -> Option<Vec3> {
    if normal.y <= 0.0 || (vector.x == 0.0 && vector.z == 0.0) {
        return None;
    }
    let y = -(normal.x * vector.x + normal.z * vector.z) / normal.y;
    Some(Vec3::new(vector.x, y, vector.z))
}

/// Direction along the ground that rises the least.
///
/// Falls back to the desired velocity and then to the body forward
/// direction when the ground is flat.
#[must_use]
pub fn ground_tangent(data: &MovementState) -> Vec3 {
    let normal = data.ground_normal;
    if let Some(tangent) = project_on_ground(normal, normal.only_xz()) {
        return tangent.normalize();
    }
    if let Some(tangent) = project_on_ground(normal, data.desired_velocity().only_xz()) {
        return tangent.normalize();
    }
    data.transform_direction()
}

/// Probes one collider with the capsule lowered by `extent`.
#[must_use]
#[allow(clippy::too_many_arguments)]
pub fn check_ground(
    world: &dyn PhysicsWorld,
    capsule: &CapsuleShape,
    position: Vec3,
    collider: ColliderHandle,
    pose: Pose,
    extent: f32,
    min_ground_dot: f32,
) -> GroundProbe {
    let lowered = position - Vec3::UP * extent;
    let Some(penetration) = world.compute_penetration(capsule, lowered, collider, pose) else {
        return GroundProbe::default();
    };

    let mut probe = GroundProbe {
        is_within_extent: true,
        ..GroundProbe::default()
    };

    let up_dot = penetration.direction.y;
    if up_dot >= min_ground_dot {
        let normal = penetration.direction;
        let distance = (extent * up_dot - penetration.distance).max(0.0);

        probe.is_grounded = true;
        probe.normal = normal;
        probe.distance = distance;
        probe.position = position + (Vec3::UP - normal) * capsule.radius - normal * distance;
    }

    probe
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::{StaticCollider, StaticWorld};

    #[test]
    fn test_project_vertical_penetration_keeps_constraint() {
        let direction = Vec3::new(0.0, 0.6, -0.8);
        let (projected, distance) = project_vertical_penetration(direction, 0.1);

        assert!((projected - Vec3::new(0.0, 0.0, -1.0)).length() < 1e-6);
        assert!(((projected * distance).dot(direction) - 0.1).abs() < 1e-6);
        assert_eq!(project_vertical_penetration(Vec3::UP, 0.2), (Vec3::UP, 0.2));
    }

    #[test]
    fn test_project_on_ground() {
        let normal = Vec3::new(0.0, 1.0, 1.0).normalize();
        let projected = project_on_ground(normal, Vec3::FORWARD).unwrap();
        assert!((projected.y + 1.0).abs() < 1e-6);
        assert!(projected.dot(normal).abs() < 1e-6);

        assert!(project_on_ground(Vec3::DOWN, Vec3::FORWARD).is_none());
        assert!(project_on_ground(Vec3::UP, Vec3::UP).is_none());
    }

    #[test]
    fn test_ground_tangent_fallbacks() {
        let mut data = MovementState::new();
        data.ground_normal = Vec3::new(1.0, 1.0, 0.0).normalize();
        let tangent = ground_tangent(&data);
        assert!((tangent - Vec3::new(1.0, -1.0, 0.0).normalize()).length() < 1e-5);

        data.ground_normal = Vec3::UP;
        data.kinematic_velocity = Vec3::new(0.0, 0.0, 3.0);
        assert!((ground_tangent(&data) - Vec3::FORWARD).length() < 1e-6);

        data.kinematic_velocity = Vec3::ZERO;
        data.set_look_rotation(0.0, 90.0);
        assert!((ground_tangent(&data) - Vec3::X).length() < 1e-5);
    }

    #[test]
    fn test_check_ground_reports_gap() {
        let mut world = StaticWorld::new();
        let floor = world.add(StaticCollider::plane(Vec3::ZERO, Vec3::UP));
        let capsule = CapsuleShape::new(0.5, 2.0);
        let pose = world.collider_pose(floor).unwrap();

        let probe = check_ground(&world, &capsule, Vec3::new(0.0, 0.02, 0.0), floor, pose, 0.05, 0.5);
        assert!(probe.is_grounded);
        assert!(probe.is_within_extent);
        assert!((probe.distance - 0.02).abs() < 1e-5);
        assert!(probe.position.y.abs() < 1e-5);

        let probe = check_ground(&world, &capsule, Vec3::new(0.0, 0.2, 0.0), floor, pose, 0.05, 0.5);
        assert!(!probe.is_grounded);
        assert!(!probe.is_within_extent);
    }
}
