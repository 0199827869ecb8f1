//! # Contact Classification
//!
//! Raw physics results are wrapped into reusable hit records
//! ([`OverlapInfo`], [`ShapeCastInfo`]) and every solid contact is
//! classified by the up component of its penetration direction.
//!
//! ```text
//!   up dot   1.0 ─┬─ Ground   (walkable)
//!                 │  Slope    (too steep to stand on)
//!   -min_wall ────┤  Wall     (near vertical)
//!   min_wall  ────┤  Hang     (slight overhang)
//!   min_hang  ────┤  Top      (ceiling)
//!            -1.0 ┘
//! ```

mod cast;
mod overlap;

pub use cast::{ShapeCastHit, ShapeCastInfo};
pub use overlap::{OverlapHit, OverlapInfo};

/// Classification of one contact.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CollisionType {
    /// No penetration, or not classified yet.
    #[default]
    None = 0,
    /// Walkable surface.
    Ground = 1 << 0,
    /// Surface too steep to stand on.
    Slope = 1 << 1,
    /// Near vertical surface.
    Wall = 1 << 2,
    /// Slight overhang.
    Hang = 1 << 3,
    /// Ceiling.
    Top = 1 << 4,
    /// Penetrating trigger.
    Trigger = 1 << 5,
}

/// Set of [`CollisionType`] values.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CollisionTypes(u8);

impl CollisionTypes {
    /// Empty set.
    pub const NONE: Self = Self(0);
    /// Slope, wall and hang: surfaces that block horizontal movement.
    pub const BLOCKING: Self = Self(
        CollisionType::Slope as u8 | CollisionType::Wall as u8 | CollisionType::Hang as u8,
    );

    /// Set with a single type.
    #[must_use]
    pub const fn only(collision_type: CollisionType) -> Self {
        Self(collision_type as u8)
    }

    /// `collision_type` is in the set.
    #[inline]
    #[must_use]
    pub const fn contains(self, collision_type: CollisionType) -> bool {
        self.0 & collision_type as u8 != 0
    }
}

impl std::ops::BitOr<CollisionType> for CollisionTypes {
    type Output = Self;
    fn bitor(self, rhs: CollisionType) -> Self {
        Self(self.0 | rhs as u8)
    }
}

/// Up-dot thresholds derived from the configured angles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ContactThresholds {
    /// `cos(max_ground_angle)`: at or above is ground.
    pub min_ground_dot: f32,
    /// `-cos(90 - max_wall_angle)`: lower bound of walls.
    pub min_wall_dot: f32,
    /// `-cos(90 - max_hang_angle)`: lower bound of hangs.
    pub min_hang_dot: f32,
}

impl ContactThresholds {
    /// Derives thresholds from angles in degrees, each clamped to `[0, 90]`.
    #[must_use]
    pub fn from_angles(max_ground_angle: f32, max_wall_angle: f32, max_hang_angle: f32) -> Self {
        Self {
            min_ground_dot: max_ground_angle.clamp(0.0, 90.0).to_radians().cos(),
            min_wall_dot: -(90.0 - max_wall_angle).clamp(0.0, 90.0).to_radians().cos(),
            min_hang_dot: -(90.0 - max_hang_angle).clamp(0.0, 90.0).to_radians().cos(),
        }
    }

    /// Classifies a solid contact by the up component of its penetration
    /// direction.
    #[must_use]
    pub fn classify(&self, up_dot: f32) -> CollisionType {
        if up_dot >= self.min_ground_dot {
            CollisionType::Ground
        } else if up_dot > -self.min_wall_dot {
            CollisionType::Slope
        } else if up_dot >= self.min_wall_dot {
            CollisionType::Wall
        } else if up_dot >= self.min_hang_dot {
            CollisionType::Hang
        } else {
            CollisionType::Top
        }
    }

    /// The direction is steep enough to stand on.
    #[inline]
    #[must_use]
    pub fn is_walkable(&self, up_dot: f32) -> bool {
        up_dot >= self.min_ground_dot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kcc_shared::Vec3;

    fn up_dot_at(angle_from_up: f32) -> f32 {
        angle_from_up.to_radians().cos()
    }

    #[test]
    fn test_classification_bands() {
        let thresholds = ContactThresholds::from_angles(60.0, 5.0, 30.0);

        assert_eq!(thresholds.classify(1.0), CollisionType::Ground);
        assert_eq!(thresholds.classify(up_dot_at(59.0)), CollisionType::Ground);
        assert_eq!(thresholds.classify(up_dot_at(61.0)), CollisionType::Slope);
        assert_eq!(thresholds.classify(up_dot_at(84.0)), CollisionType::Slope);
        assert_eq!(thresholds.classify(up_dot_at(90.0)), CollisionType::Wall);
        assert_eq!(thresholds.classify(up_dot_at(94.0)), CollisionType::Wall);
        assert_eq!(thresholds.classify(up_dot_at(100.0)), CollisionType::Hang);
        assert_eq!(thresholds.classify(up_dot_at(130.0)), CollisionType::Top);
        assert_eq!(thresholds.classify(-1.0), CollisionType::Top);
    }

    #[test]
    fn test_walkable() {
        let thresholds = ContactThresholds::from_angles(45.0, 5.0, 30.0);
        assert!(thresholds.is_walkable(Vec3::UP.dot(Vec3::new(0.0, 1.0, 0.5).normalize())));
        assert!(!thresholds.is_walkable(Vec3::UP.dot(Vec3::new(0.0, 1.0, 1.5).normalize())));
    }

    #[test]
    fn test_collision_type_sets() {
        let set = CollisionTypes::BLOCKING;
        assert!(set.contains(CollisionType::Wall));
        assert!(!set.contains(CollisionType::Ground));
        assert!(!set.contains(CollisionType::None));

        let set = CollisionTypes::only(CollisionType::Ground) | CollisionType::Top;
        assert!(set.contains(CollisionType::Top));
        assert!(!CollisionTypes::NONE.contains(CollisionType::Top));
    }
}
