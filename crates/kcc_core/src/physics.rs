//! # Physics Collaborator
//!
//! The controller never owns geometry. Everything it knows about the world
//! comes through [`PhysicsWorld`]: capsule overlaps, pairwise penetration
//! vectors and sorted shape casts.
//!
//! The actor capsule is always upright. Its `position` is the bottom of the
//! capsule; the bottom sphere center sits at `position + up * radius`.

use kcc_shared::{Quaternion, Vec3};

use crate::data::NetworkId;

// ============================================================================
// HANDLES & DESCRIPTORS
// ============================================================================

/// Opaque reference to a collider owned by the physics world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColliderHandle(pub u32);

/// Collider geometry type, as far as the controller cares.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ColliderKind {
    /// Sphere collider.
    #[default]
    Sphere,
    /// Capsule collider.
    Capsule,
    /// Oriented box collider.
    Box,
    /// Infinite plane.
    Plane,
    /// Triangle mesh.
    Mesh {
        /// The mesh is concave but can be switched to its convex hull.
        convertible: bool,
    },
}

impl ColliderKind {
    /// Concave mesh that can be toggled to convex mode during queries.
    #[inline]
    #[must_use]
    pub const fn is_convertible_mesh(self) -> bool {
        matches!(self, Self::Mesh { convertible: true })
    }
}

/// Whether queries report trigger colliders.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum QueryTriggerInteraction {
    /// Triggers are reported.
    #[default]
    Collide,
    /// Triggers are skipped.
    Ignore,
}

/// World transform of a collider.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Pose {
    /// World position.
    pub position: Vec3,
    /// World rotation.
    pub rotation: Quaternion,
}

impl Pose {
    /// Creates a pose.
    #[must_use]
    pub const fn new(position: Vec3, rotation: Quaternion) -> Self {
        Self { position, rotation }
    }

    /// Unrotated pose at `position`.
    #[must_use]
    pub const fn at(position: Vec3) -> Self {
        Self::new(position, Quaternion::IDENTITY)
    }
}

/// Collider reported by an overlap or a cast.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ColliderInfo {
    /// Collider reference.
    pub handle: ColliderHandle,
    /// Geometry type.
    pub kind: ColliderKind,
    /// Reports overlaps only, never blocks.
    pub is_trigger: bool,
    /// Physics layer, 0..=31.
    pub layer: u32,
    /// Networked owner of the collider, invalid when not networked.
    pub network_id: NetworkId,
}

// ============================================================================
// QUERIES
// ============================================================================

/// Upright capsule dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleShape {
    /// Radius of both caps.
    pub radius: f32,
    /// Total height including both caps.
    pub height: f32,
}

impl CapsuleShape {
    /// Creates a capsule shape.
    #[must_use]
    pub const fn new(radius: f32, height: f32) -> Self {
        Self { radius, height }
    }

    /// Centers of the bottom and top cap spheres for a capsule at `position`.
    #[inline]
    #[must_use]
    pub fn segment(&self, position: Vec3) -> (Vec3, Vec3) {
        let bottom = position + Vec3::UP * self.radius;
        let top = position + Vec3::UP * (self.height - self.radius).max(self.radius);
        (bottom, top)
    }
}

/// Capsule overlap request.
///
/// The extent inflates the radius around the unchanged cap segment, so the
/// inflated capsule also reaches `extent` below `position`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CapsuleQuery {
    /// Bottom of the capsule.
    pub position: Vec3,
    /// Capsule shape.
    pub shape: CapsuleShape,
    /// Radius inflation.
    pub extent: f32,
    /// Layers to test against.
    pub layer_mask: u32,
    /// Trigger reporting.
    pub triggers: QueryTriggerInteraction,
}

impl CapsuleQuery {
    /// Radius actually tested.
    #[inline]
    #[must_use]
    pub fn inflated_radius(&self) -> f32 {
        self.shape.radius + self.extent
    }
}

/// Swept capsule request. A sphere cast is a capsule with `height = 2 * radius`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CastQuery {
    /// Bottom of the capsule at the start of the sweep.
    pub position: Vec3,
    /// Capsule shape.
    pub shape: CapsuleShape,
    /// Unit sweep direction.
    pub direction: Vec3,
    /// Sweep length.
    pub max_distance: f32,
    /// Layers to test against.
    pub layer_mask: u32,
    /// Trigger reporting.
    pub triggers: QueryTriggerInteraction,
}

impl CastQuery {
    /// Sphere sweep starting at `center`.
    #[must_use]
    pub fn sphere(
        center: Vec3,
        radius: f32,
        direction: Vec3,
        max_distance: f32,
        layer_mask: u32,
        triggers: QueryTriggerInteraction,
    ) -> Self {
        Self {
            position: center - Vec3::UP * radius,
            shape: CapsuleShape::new(radius, radius * 2.0),
            direction: direction.normalize(),
            max_distance,
            layer_mask,
            triggers,
        }
    }
}

/// Minimal translation that separates two shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    /// Unit direction to move the capsule.
    pub direction: Vec3,
    /// Distance to move along `direction`.
    pub distance: f32,
}

/// One shape cast hit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CastHit {
    /// Collider that was hit.
    pub collider: ColliderInfo,
    /// Contact point on the collider surface.
    pub point: Vec3,
    /// Surface normal at the contact, pointing toward the caster.
    pub normal: Vec3,
    /// Sweep distance at impact, zero for initial overlaps.
    pub distance: f32,
}

// ============================================================================
// WORLD CONTRACT
// ============================================================================

/// Physics queries consumed by the controller.
///
/// Implementations append to the output vectors and never clear them.
pub trait PhysicsWorld: Send + Sync {
    /// Colliders overlapping an upright capsule.
    fn overlap_capsule(&self, query: &CapsuleQuery, out: &mut Vec<ColliderInfo>);

    /// Penetration of an upright capsule at `position` into one collider
    /// placed at `pose`. `None` when they do not overlap.
    fn compute_penetration(
        &self,
        capsule: &CapsuleShape,
        position: Vec3,
        collider: ColliderHandle,
        pose: Pose,
    ) -> Option<Penetration>;

    /// Colliders hit by a swept capsule, any order.
    fn shape_cast(&self, query: &CastQuery, out: &mut Vec<CastHit>);

    /// Current world transform of a collider.
    fn collider_pose(&self, collider: ColliderHandle) -> Option<Pose>;

    /// Switches a convertible mesh between convex and concave mode.
    fn set_convex(&self, _collider: ColliderHandle, _convex: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capsule_segment() {
        let shape = CapsuleShape::new(0.5, 2.0);
        let (bottom, top) = shape.segment(Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(bottom, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(top, Vec3::new(1.0, 1.5, 0.0));

        let sphere = CapsuleShape::new(0.5, 1.0);
        let (bottom, top) = sphere.segment(Vec3::ZERO);
        assert_eq!(bottom, top);
    }

    #[test]
    fn test_sphere_cast_query() {
        let query = CastQuery::sphere(
            Vec3::new(0.0, 2.0, 0.0),
            0.25,
            Vec3::new(0.0, -3.0, 0.0),
            1.0,
            1,
            QueryTriggerInteraction::Ignore,
        );
        assert_eq!(query.direction, Vec3::DOWN);
        let (bottom, top) = query.shape.segment(query.position);
        assert_eq!(bottom, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(top, bottom);
    }

    #[test]
    fn test_convertible_mesh() {
        assert!(ColliderKind::Mesh { convertible: true }.is_convertible_mesh());
        assert!(!ColliderKind::Mesh { convertible: false }.is_convertible_mesh());
        assert!(!ColliderKind::Box.is_convertible_mesh());
    }
}
