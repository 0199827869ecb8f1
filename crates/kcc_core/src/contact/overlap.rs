//! Overlap query results.

use kcc_shared::Vec3;

use super::{CollisionType, CollisionTypes};
use crate::memory::Recycle;
use crate::physics::{
    ColliderHandle, ColliderInfo, ColliderKind, PhysicsWorld, Pose, QueryTriggerInteraction,
};
use crate::settings::CACHE_SIZE;

/// One collider overlapping the inflated capsule.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OverlapHit {
    /// Collider reported by physics.
    pub collider: ColliderInfo,
    /// Collider transform captured when depenetration started.
    pub cached_pose: Pose,
    /// Lies within radius + extent (penetrating or close to the ground).
    pub is_within_extent: bool,
    /// Penetrated the capsule at some depenetration pass.
    pub has_penetration: bool,
    /// Deepest penetration seen.
    pub max_penetration: f32,
    /// Highest up component of the penetration direction seen.
    pub up_direction_dot: f32,
    /// Contact classification.
    pub collision_type: CollisionType,
}

impl OverlapHit {
    fn new(collider: ColliderInfo) -> Self {
        Self {
            collider,
            ..Self::default()
        }
    }

    /// Clears depenetration results, keeping the collider.
    pub fn reset_contact(&mut self) {
        self.is_within_extent = false;
        self.has_penetration = false;
        self.max_penetration = 0.0;
        self.up_direction_dot = 0.0;
        self.collision_type = CollisionType::None;
    }
}

/// Result cache of one capsule overlap query.
///
/// Solid colliders and triggers share one list; the accessors split them.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlapInfo {
    /// Query position (bottom of the capsule).
    pub position: Vec3,
    /// Query radius without extent.
    pub radius: f32,
    /// Query height.
    pub height: f32,
    /// Query radius inflation.
    pub extent: f32,
    /// Query layer mask.
    pub layer_mask: u32,
    /// Query trigger interaction.
    pub triggers: QueryTriggerInteraction,
    hits: Vec<OverlapHit>,
}

impl OverlapInfo {
    /// Creates an empty info.
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 0.0,
            height: 0.0,
            extent: 0.0,
            layer_mask: 0,
            triggers: QueryTriggerInteraction::Collide,
            hits: Vec::with_capacity(CACHE_SIZE),
        }
    }

    /// Appends a raw overlap. Returns `false` once the cache is full.
    pub fn add_hit(&mut self, collider: ColliderInfo) -> bool {
        if self.hits.len() >= CACHE_SIZE {
            return false;
        }
        self.hits.push(OverlapHit::new(collider));
        true
    }

    /// Every hit, solid and trigger, in query order.
    #[must_use]
    pub fn all_hits(&self) -> &[OverlapHit] {
        &self.hits
    }

    /// Mutable access to every hit.
    pub fn all_hits_mut(&mut self) -> &mut [OverlapHit] {
        &mut self.hits
    }

    /// Solid colliders.
    pub fn collider_hits(&self) -> impl Iterator<Item = &OverlapHit> {
        self.hits.iter().filter(|h| !h.collider.is_trigger)
    }

    /// Mutable solid colliders.
    pub fn collider_hits_mut(&mut self) -> impl Iterator<Item = &mut OverlapHit> {
        self.hits.iter_mut().filter(|h| !h.collider.is_trigger)
    }

    /// Triggers.
    pub fn trigger_hits(&self) -> impl Iterator<Item = &OverlapHit> {
        self.hits.iter().filter(|h| h.collider.is_trigger)
    }

    /// Mutable triggers.
    pub fn trigger_hits_mut(&mut self) -> impl Iterator<Item = &mut OverlapHit> {
        self.hits.iter_mut().filter(|h| h.collider.is_trigger)
    }

    /// Number of hits.
    #[inline]
    #[must_use]
    pub fn all_hit_count(&self) -> usize {
        self.hits.len()
    }

    /// Number of solid colliders.
    #[must_use]
    pub fn collider_hit_count(&self) -> usize {
        self.collider_hits().count()
    }

    /// Number of triggers.
    #[must_use]
    pub fn trigger_hit_count(&self) -> usize {
        self.trigger_hits().count()
    }

    /// Hit for `collider`.
    #[must_use]
    pub fn find(&self, collider: ColliderHandle) -> Option<&OverlapHit> {
        self.hits.iter().find(|h| h.collider.handle == collider)
    }

    /// `collider` was reported.
    #[must_use]
    pub fn has_collider(&self, collider: ColliderHandle) -> bool {
        self.find(collider).is_some()
    }

    /// `collider` was reported and lies within extent.
    #[must_use]
    pub fn has_collider_within_extent(&self, collider: ColliderHandle) -> bool {
        self.find(collider).is_some_and(|h| h.is_within_extent)
    }

    /// A collider of `kind` was reported.
    #[must_use]
    pub fn has_collider_kind(&self, kind: ColliderKind) -> bool {
        self.hits.iter().any(|h| h.collider.kind == kind)
    }

    /// Every hit lies within extent.
    #[must_use]
    pub fn all_hits_within_extent(&self) -> bool {
        self.hits.iter().all(|h| h.is_within_extent)
    }

    /// A solid collider within extent has one of `types`.
    #[must_use]
    pub fn has_collisions_within_extent(&self, types: CollisionTypes) -> bool {
        self.collider_hits()
            .any(|h| h.is_within_extent && types.contains(h.collision_type))
    }

    /// Switches convertible mesh colliders between convex and concave mode.
    pub fn toggle_convex_mesh_colliders(&self, world: &dyn PhysicsWorld, convex: bool) {
        for hit in self.collider_hits() {
            if hit.collider.kind.is_convertible_mesh() {
                world.set_convex(hit.collider.handle, convex);
            }
        }
    }

    /// Clears query parameters and hits.
    pub fn reset(&mut self) {
        self.position = Vec3::ZERO;
        self.radius = 0.0;
        self.height = 0.0;
        self.extent = 0.0;
        self.layer_mask = 0;
        self.triggers = QueryTriggerInteraction::Collide;
        self.hits.clear();
    }

    /// Replaces the contents with a copy of `other`.
    pub fn copy_from(&mut self, other: &Self) {
        self.position = other.position;
        self.radius = other.radius;
        self.height = other.height;
        self.extent = other.extent;
        self.layer_mask = other.layer_mask;
        self.triggers = other.triggers;
        self.hits.clone_from(&other.hits);
    }
}

impl Default for OverlapInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Recycle for OverlapInfo {
    fn recycle(&mut self) {
        self.reset();
    }
}
