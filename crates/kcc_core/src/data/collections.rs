//! # Interaction Collections
//!
//! Collisions, modifiers and ignores reference networked objects so they
//! survive a wire round trip. Hits reference colliders and are rebuilt from
//! physics every step.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::contact::{CollisionType, OverlapHit};
use crate::physics::ColliderHandle;

// ============================================================================
// NETWORK ID
// ============================================================================

/// Compact 8-byte reference to a networked object.
#[repr(C)]
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
pub struct NetworkId {
    /// Object identifier.
    pub value0: u32,
    /// Type tag, zero marks an invalid id.
    pub value1: u32,
}

impl NetworkId {
    /// The invalid id.
    pub const INVALID: Self = Self::new(0, 0);

    /// Creates an id from raw words.
    #[must_use]
    pub const fn new(value0: u32, value1: u32) -> Self {
        Self { value0, value1 }
    }

    /// Id of a spawned object.
    #[must_use]
    pub const fn object(raw: u32) -> Self {
        Self::new(raw, 1)
    }

    /// Id of an object resolved by prefab type.
    #[must_use]
    pub const fn prefab(type_id: u32, type_tag: u32) -> Self {
        Self::new(type_id, 2 | (type_tag << 2))
    }

    /// The id refers to something.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.value1 != 0
    }
}

// ============================================================================
// INTERACTIONS
// ============================================================================

/// One tracked interaction with a networked object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Interaction {
    /// Networked object.
    pub id: NetworkId,
    /// Collider that produced the interaction, if known locally.
    pub collider: Option<ColliderHandle>,
}

/// Ordered list of interactions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Interactions {
    all: Vec<Interaction>,
}

/// Networked objects the actor currently collides with.
pub type Collisions = Interactions;
/// Networked objects modifying the actor's movement.
pub type Modifiers = Interactions;
/// Networked objects whose colliders are skipped by physics queries.
pub type Ignores = Interactions;

impl Interactions {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { all: Vec::new() }
    }

    /// Appends an interaction unless the same id and collider are present.
    pub fn add(&mut self, id: NetworkId, collider: Option<ColliderHandle>) -> bool {
        let interaction = Interaction { id, collider };
        if self.all.contains(&interaction) {
            return false;
        }
        self.all.push(interaction);
        true
    }

    /// Removes the first interaction with `id`.
    pub fn remove(&mut self, id: NetworkId) -> Option<Interaction> {
        let index = self.all.iter().position(|i| i.id == id)?;
        Some(self.all.remove(index))
    }

    /// Removes every interaction produced by `collider`.
    pub fn remove_collider(&mut self, collider: ColliderHandle) -> bool {
        let count = self.all.len();
        self.all.retain(|i| i.collider != Some(collider));
        self.all.len() != count
    }

    /// An interaction with `id` exists.
    #[must_use]
    pub fn contains(&self, id: NetworkId) -> bool {
        self.all.iter().any(|i| i.id == id)
    }

    /// An interaction produced by `collider` exists.
    #[must_use]
    pub fn contains_collider(&self, collider: ColliderHandle) -> bool {
        self.all.iter().any(|i| i.collider == Some(collider))
    }

    /// Removes everything, keeping capacity.
    pub fn clear(&mut self) {
        self.all.clear();
    }

    /// Replaces the contents with a copy of `other`.
    pub fn copy_from(&mut self, other: &Self) {
        self.all.clone_from(&other.all);
    }

    /// Number of interactions.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// No interactions.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Interactions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Interaction> {
        self.all.iter()
    }

    /// Interactions as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[Interaction] {
        &self.all
    }
}

// ============================================================================
// HITS
// ============================================================================

/// Collider within radius + extent after the last step.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Hit {
    /// Collider reference.
    pub collider: ColliderHandle,
    /// Networked owner.
    pub network_id: NetworkId,
    /// The collider is a trigger.
    pub is_trigger: bool,
    /// Classification, `None` for non-penetrating hits.
    pub collision_type: CollisionType,
}

impl From<&OverlapHit> for Hit {
    fn from(hit: &OverlapHit) -> Self {
        Self {
            collider: hit.collider.handle,
            network_id: hit.collider.network_id,
            is_trigger: hit.collider.is_trigger,
            collision_type: hit.collision_type,
        }
    }
}

/// Every collider and trigger the actor touches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Hits {
    all: Vec<Hit>,
}

impl Hits {
    /// Creates an empty list.
    #[must_use]
    pub const fn new() -> Self {
        Self { all: Vec::new() }
    }

    /// Appends a hit.
    pub fn add(&mut self, hit: Hit) {
        self.all.push(hit);
    }

    /// Hit for `collider`.
    #[must_use]
    pub fn find(&self, collider: ColliderHandle) -> Option<&Hit> {
        self.all.iter().find(|h| h.collider == collider)
    }

    /// A hit for `collider` exists.
    #[must_use]
    pub fn has_collider(&self, collider: ColliderHandle) -> bool {
        self.find(collider).is_some()
    }

    /// Removes everything, keeping capacity.
    pub fn clear(&mut self) {
        self.all.clear();
    }

    /// Replaces the contents with a copy of `other`.
    pub fn copy_from(&mut self, other: &Self) {
        self.all.clone_from(&other.all);
    }

    /// Number of hits.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// No hits.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }

    /// Hits in query order.
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.all.iter()
    }
}
