//! # Static World
//!
//! Analytic reference implementation of [`PhysicsWorld`] built from spheres,
//! oriented boxes and planes. Used by tests and benchmarks; a game plugs in
//! its own physics engine instead.
//!
//! All queries reduce to one primitive: the signed distance from a point to
//! a collider. Every supported shape is convex, so the distance along a
//! capsule segment is a convex function of the segment parameter and a
//! ternary search finds its minimum.

use kcc_shared::{Quaternion, Vec3};

use crate::data::NetworkId;
use crate::physics::{
    CapsuleQuery, CapsuleShape, CastHit, CastQuery, ColliderHandle, ColliderInfo, ColliderKind,
    Penetration, PhysicsWorld, Pose, QueryTriggerInteraction,
};

/// Iterations of the segment ternary search.
const SEGMENT_SEARCH_ITERATIONS: usize = 48;

/// Conservative advancement iterations per collider.
const CAST_ITERATIONS: usize = 64;

/// Gap at which a sweep counts as touching.
const CAST_SKIN: f32 = 1e-4;

// ============================================================================
// COLLIDERS
// ============================================================================

/// Collider geometry in local space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Primitive {
    /// Sphere centered on the pose.
    Sphere {
        /// Radius.
        radius: f32,
    },
    /// Box centered on the pose.
    Cuboid {
        /// Half size along each local axis.
        half_extents: Vec3,
    },
    /// Solid half-space below a plane through the pose.
    Plane {
        /// Local plane normal, pointing out of the solid side.
        normal: Vec3,
    },
}

/// One collider of a [`StaticWorld`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StaticCollider {
    /// Geometry.
    pub primitive: Primitive,
    /// World transform.
    pub pose: Pose,
    /// Physics layer, 0..=31.
    pub layer: u32,
    /// Reports overlaps only.
    pub is_trigger: bool,
    /// Networked owner.
    pub network_id: NetworkId,
}

impl StaticCollider {
    fn new(primitive: Primitive, pose: Pose) -> Self {
        Self {
            primitive,
            pose,
            layer: 0,
            is_trigger: false,
            network_id: NetworkId::INVALID,
        }
    }

    /// Sphere at `center`.
    #[must_use]
    pub fn sphere(center: Vec3, radius: f32) -> Self {
        Self::new(Primitive::Sphere { radius }, Pose::at(center))
    }

    /// Axis aligned box at `center`.
    #[must_use]
    pub fn cuboid(center: Vec3, half_extents: Vec3) -> Self {
        Self::new(Primitive::Cuboid { half_extents }, Pose::at(center))
    }

    /// Ground plane through `point`, solid on the side opposite to `normal`.
    #[must_use]
    pub fn plane(point: Vec3, normal: Vec3) -> Self {
        Self::new(
            Primitive::Plane {
                normal: normal.normalize(),
            },
            Pose::at(point),
        )
    }

    /// Copy with a rotation applied to the pose.
    #[must_use]
    pub fn rotated(mut self, rotation: Quaternion) -> Self {
        self.pose.rotation = rotation.normalize();
        self
    }

    /// Copy on another physics layer.
    #[must_use]
    pub const fn on_layer(mut self, layer: u32) -> Self {
        self.layer = layer & 31;
        self
    }

    /// Copy turned into a trigger.
    #[must_use]
    pub const fn trigger(mut self) -> Self {
        self.is_trigger = true;
        self
    }

    /// Copy owned by a networked object.
    #[must_use]
    pub const fn networked(mut self, network_id: NetworkId) -> Self {
        self.network_id = network_id;
        self
    }

    /// Geometry type reported to the controller.
    #[must_use]
    pub const fn kind(&self) -> ColliderKind {
        match self.primitive {
            Primitive::Sphere { .. } => ColliderKind::Sphere,
            Primitive::Cuboid { .. } => ColliderKind::Box,
            Primitive::Plane { .. } => ColliderKind::Plane,
        }
    }

    fn info(&self, handle: ColliderHandle) -> ColliderInfo {
        ColliderInfo {
            handle,
            kind: self.kind(),
            is_trigger: self.is_trigger,
            layer: self.layer,
            network_id: self.network_id,
        }
    }

    fn passes(&self, layer_mask: u32, triggers: QueryTriggerInteraction) -> bool {
        if layer_mask & (1 << self.layer) == 0 {
            return false;
        }
        !(self.is_trigger && triggers == QueryTriggerInteraction::Ignore)
    }
}

// ============================================================================
// DISTANCE
// ============================================================================

/// Signed distance from a point to a collider and the outward normal there.
fn point_distance(primitive: Primitive, pose: Pose, point: Vec3) -> (f32, Vec3) {
    match primitive {
        Primitive::Sphere { radius } => {
            let offset = point - pose.position;
            let length = offset.length();
            let normal = if length > 1e-6 {
                offset / length
            } else {
                Vec3::UP
            };
            (length - radius, normal)
        }
        Primitive::Plane { normal } => {
            let normal = pose.rotation.rotate(normal);
            ((point - pose.position).dot(normal), normal)
        }
        Primitive::Cuboid { half_extents } => {
            let local = pose.rotation.inverse().rotate(point - pose.position);
            let (distance, local_normal) = box_distance(local, half_extents);
            (distance, pose.rotation.rotate(local_normal))
        }
    }
}

fn box_distance(local: Vec3, half: Vec3) -> (f32, Vec3) {
    let q = Vec3::new(
        local.x.abs() - half.x,
        local.y.abs() - half.y,
        local.z.abs() - half.z,
    );
    let outside = q.max(Vec3::ZERO).length();

    if outside > 0.0 {
        let clamped = local.max(-half).min(half);
        return (outside, (local - clamped).normalize());
    }

    // Inside: the nearest face is the axis with the largest q.
    let (depth, normal) = if q.x >= q.y && q.x >= q.z {
        (q.x, Vec3::new(local.x.signum(), 0.0, 0.0))
    } else if q.y >= q.z {
        (q.y, Vec3::new(0.0, local.y.signum(), 0.0))
    } else {
        (q.z, Vec3::new(0.0, 0.0, local.z.signum()))
    };
    (depth, normal)
}

/// Closest approach between a segment and a collider.
struct SegmentContact {
    point: Vec3,
    distance: f32,
    normal: Vec3,
}

fn segment_distance(primitive: Primitive, pose: Pose, a: Vec3, b: Vec3) -> SegmentContact {
    let t = match primitive {
        Primitive::Sphere { .. } => {
            let ab = b - a;
            let length_squared = ab.length_squared();
            if length_squared > 1e-12 {
                ((pose.position - a).dot(ab) / length_squared).clamp(0.0, 1.0)
            } else {
                0.0
            }
        }
        Primitive::Plane { .. } => {
            let (distance_a, _) = point_distance(primitive, pose, a);
            let (distance_b, _) = point_distance(primitive, pose, b);
            if distance_b < distance_a {
                1.0
            } else {
                0.0
            }
        }
        Primitive::Cuboid { .. } => {
            let (mut lo, mut hi) = (0.0_f32, 1.0_f32);
            if a != b {
                for _ in 0..SEGMENT_SEARCH_ITERATIONS {
                    let m1 = lo + (hi - lo) / 3.0;
                    let m2 = hi - (hi - lo) / 3.0;
                    let (d1, _) = point_distance(primitive, pose, a.lerp(b, m1));
                    let (d2, _) = point_distance(primitive, pose, a.lerp(b, m2));
                    if d1 <= d2 {
                        hi = m2;
                    } else {
                        lo = m1;
                    }
                }
            }
            (lo + hi) * 0.5
        }
    };

    let point = a.lerp(b, t);
    let (distance, normal) = point_distance(primitive, pose, point);
    SegmentContact {
        point,
        distance,
        normal,
    }
}

/// Separation along the box axes for a segment that touches or crosses the box.
fn box_separation(half: Vec3, pose: Pose, a: Vec3, b: Vec3, radius: f32) -> Penetration {
    let inverse = pose.rotation.inverse();
    let a = inverse.rotate(a - pose.position).to_array();
    let b = inverse.rotate(b - pose.position).to_array();
    let half = half.to_array();

    let mut best = Penetration {
        direction: Vec3::UP,
        distance: f32::MAX,
    };

    for axis in 0..3 {
        let lo = a[axis].min(b[axis]);
        let hi = a[axis].max(b[axis]);
        let mut unit = [0.0; 3];

        let positive = half[axis] + radius - lo;
        if positive < best.distance {
            unit[axis] = 1.0;
            best = Penetration {
                direction: Vec3::from_array(unit),
                distance: positive,
            };
        }

        let negative = hi + half[axis] + radius;
        if negative < best.distance {
            unit[axis] = -1.0;
            best = Penetration {
                direction: Vec3::from_array(unit),
                distance: negative,
            };
        }
    }

    best.direction = pose.rotation.rotate(best.direction);
    best
}

// ============================================================================
// WORLD
// ============================================================================

/// Immutable collection of analytic colliders.
#[derive(Clone, Debug, Default)]
pub struct StaticWorld {
    colliders: Vec<StaticCollider>,
}

impl StaticWorld {
    /// Creates an empty world.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            colliders: Vec::new(),
        }
    }

    /// Adds a collider and returns its handle.
    #[allow(clippy::cast_possible_truncation)]
    pub fn add(&mut self, collider: StaticCollider) -> ColliderHandle {
        self.colliders.push(collider);
        ColliderHandle((self.colliders.len() - 1) as u32)
    }

    /// Builder form of [`StaticWorld::add`].
    #[must_use]
    pub fn with(mut self, collider: StaticCollider) -> Self {
        self.colliders.push(collider);
        self
    }

    /// Collider by handle.
    #[must_use]
    pub fn get(&self, handle: ColliderHandle) -> Option<&StaticCollider> {
        self.colliders.get(handle.0 as usize)
    }

    /// Number of colliders.
    #[must_use]
    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    /// No colliders.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn iter(&self) -> impl Iterator<Item = (ColliderHandle, &StaticCollider)> {
        self.colliders
            .iter()
            .enumerate()
            .map(|(index, collider)| (ColliderHandle(index as u32), collider))
    }
}

impl PhysicsWorld for StaticWorld {
    fn overlap_capsule(&self, query: &CapsuleQuery, out: &mut Vec<ColliderInfo>) {
        let (a, b) = query.shape.segment(query.position);

        for (handle, collider) in self.iter() {
            if !collider.passes(query.layer_mask, query.triggers) {
                continue;
            }
            let contact = segment_distance(collider.primitive, collider.pose, a, b);
            if contact.distance <= query.inflated_radius() {
                out.push(collider.info(handle));
            }
        }
    }

    fn compute_penetration(
        &self,
        capsule: &CapsuleShape,
        position: Vec3,
        collider: ColliderHandle,
        pose: Pose,
    ) -> Option<Penetration> {
        let primitive = self.get(collider)?.primitive;
        let (a, b) = capsule.segment(position);
        let contact = segment_distance(primitive, pose, a, b);

        if contact.distance >= capsule.radius {
            return None;
        }

        if let Primitive::Cuboid { half_extents } = primitive {
            if contact.distance <= 0.0 {
                return Some(box_separation(half_extents, pose, a, b, capsule.radius));
            }
        }

        Some(Penetration {
            direction: contact.normal,
            distance: capsule.radius - contact.distance,
        })
    }

    fn shape_cast(&self, query: &CastQuery, out: &mut Vec<CastHit>) {
        let (a, b) = query.shape.segment(query.position);
        let radius = query.shape.radius;
        let direction = query.direction.normalize();
        if direction.is_zero() {
            return;
        }

        for (handle, collider) in self.iter() {
            if !collider.passes(query.layer_mask, query.triggers) {
                continue;
            }

            let mut traveled = 0.0_f32;
            for _ in 0..CAST_ITERATIONS {
                let offset = direction * traveled;
                let contact =
                    segment_distance(collider.primitive, collider.pose, a + offset, b + offset);
                let gap = contact.distance - radius;

                if gap <= CAST_SKIN {
                    out.push(CastHit {
                        collider: collider.info(handle),
                        point: contact.point - contact.normal * contact.distance,
                        normal: contact.normal,
                        distance: traveled,
                    });
                    break;
                }

                traveled += gap;
                if traveled > query.max_distance {
                    break;
                }
            }
        }
    }

    fn collider_pose(&self, collider: ColliderHandle) -> Option<Pose> {
        self.get(collider).map(|c| c.pose)
    }
}
