//! Shape cast results.

use kcc_shared::Vec3;

use crate::memory::Recycle;
use crate::physics::{CastHit, ColliderHandle, QueryTriggerInteraction};
use crate::settings::CACHE_SIZE;

/// One shape cast hit.
pub type ShapeCastHit = CastHit;

/// Result cache of one shape cast, sorted by distance.
#[derive(Clone, Debug, PartialEq)]
pub struct ShapeCastInfo {
    /// Cast origin (bottom of the swept capsule).
    pub position: Vec3,
    /// Cast radius without extent.
    pub radius: f32,
    /// Cast height.
    pub height: f32,
    /// Radius inflation.
    pub extent: f32,
    /// Unit sweep direction.
    pub direction: Vec3,
    /// Sweep length.
    pub max_distance: f32,
    /// Layer mask.
    pub layer_mask: u32,
    /// Trigger interaction.
    pub triggers: QueryTriggerInteraction,
    hits: Vec<ShapeCastHit>,
}

impl ShapeCastInfo {
    /// Creates an empty info.
    #[must_use]
    pub fn new() -> Self {
        Self {
            position: Vec3::ZERO,
            radius: 0.0,
            height: 0.0,
            extent: 0.0,
            direction: Vec3::ZERO,
            max_distance: 0.0,
            layer_mask: 0,
            triggers: QueryTriggerInteraction::Collide,
            hits: Vec::with_capacity(CACHE_SIZE),
        }
    }

    /// Appends a hit. Returns `false` once the cache is full.
    pub fn add_hit(&mut self, hit: ShapeCastHit) -> bool {
        if self.hits.len() >= CACHE_SIZE {
            return false;
        }
        self.hits.push(hit);
        true
    }

    /// Stable sort by cast distance.
    pub fn sort(&mut self) {
        self.hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    }

    /// Every hit, nearest first after [`ShapeCastInfo::sort`].
    #[must_use]
    pub fn all_hits(&self) -> &[ShapeCastHit] {
        &self.hits
    }

    /// Solid colliders.
    pub fn collider_hits(&self) -> impl Iterator<Item = &ShapeCastHit> {
        self.hits.iter().filter(|h| !h.collider.is_trigger)
    }

    /// Triggers.
    pub fn trigger_hits(&self) -> impl Iterator<Item = &ShapeCastHit> {
        self.hits.iter().filter(|h| h.collider.is_trigger)
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

    /// `collider` was hit.
    #[must_use]
    pub fn has_collider(&self, collider: ColliderHandle) -> bool {
        self.hits.iter().any(|h| h.collider.handle == collider)
    }

    /// Clears query parameters and hits.
    pub fn reset(&mut self) {
        self.position = Vec3::ZERO;
        self.radius = 0.0;
        self.height = 0.0;
        self.extent = 0.0;
        self.direction = Vec3::ZERO;
        self.max_distance = 0.0;
        self.layer_mask = 0;
        self.triggers = QueryTriggerInteraction::Collide;
        self.hits.clear();
    }
}

impl Default for ShapeCastInfo {
    fn default() -> Self {
        Self::new()
    }
}

impl Recycle for ShapeCastInfo {
    fn recycle(&mut self) {
        self.reset();
    }
}
