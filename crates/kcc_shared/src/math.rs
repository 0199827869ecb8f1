//! Mathematical types shared between the motion core and the network layer.
//!
//! World space is Y-up. Angles exposed to callers are in degrees.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Magnitude below which an `f32` vector is treated as having no direction.
const NORMALIZE_EPSILON: f32 = 1e-5;

/// Magnitude below which an `f64` vector is treated as having no direction.
const NORMALIZE_EPSILON_F64: f64 = 1e-12;

// ============================================================================
// VEC3
// ============================================================================

/// 3D Vector - position, velocity, direction
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
}

impl Vec3 {
    /// Creates a new Vec3
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Unit X vector
    pub const X: Self = Self::new(1.0, 0.0, 0.0);

    /// Unit Y vector, the world up axis
    pub const UP: Self = Self::new(0.0, 1.0, 0.0);

    /// Negative Y vector
    pub const DOWN: Self = Self::new(0.0, -1.0, 0.0);

    /// Unit Z vector, the forward axis at zero yaw
    pub const FORWARD: Self = Self::new(0.0, 0.0, 1.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    /// Creates from array
    #[must_use]
    pub const fn from_array(arr: [f32; 3]) -> Self {
        Self::new(arr[0], arr[1], arr[2])
    }

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length squared (avoids sqrt)
    #[must_use]
    pub fn length_squared(self) -> f32 {
        self.dot(self)
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Distance to another point
    #[must_use]
    pub fn distance(self, other: Self) -> f32 {
        (self - other).length()
    }

    /// Distance squared (avoids sqrt)
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        (self - other).length_squared()
    }

    /// Unit vector in the same direction, or zero for near-zero input.
    #[must_use]
    pub fn normalize(self) -> Self {
        let length = self.length();
        if length > NORMALIZE_EPSILON {
            self / length
        } else {
            Self::ZERO
        }
    }

    /// Horizontal part of the vector (Y zeroed).
    #[must_use]
    pub const fn only_xz(self) -> Self {
        Self::new(self.x, 0.0, self.z)
    }

    /// Copy with the Y component replaced.
    #[must_use]
    pub const fn with_y(self, y: f32) -> Self {
        Self::new(self.x, y, self.z)
    }

    /// Linear interpolation, `alpha` clamped to `[0, 1]`.
    ///
    /// Endpoints are returned exactly for `alpha` 0 and 1.
    #[must_use]
    pub fn lerp(self, other: Self, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return self;
        }
        if alpha >= 1.0 {
            return other;
        }
        self + (other - self) * alpha
    }

    /// Shortens the vector to `max_length` if it is longer.
    #[must_use]
    pub fn clamp_magnitude(self, max_length: f32) -> Self {
        let length_squared = self.length_squared();
        if length_squared > max_length * max_length {
            self * (max_length / length_squared.sqrt())
        } else {
            self
        }
    }

    /// Normalizes only when longer than one (input directions).
    #[must_use]
    pub fn clamp_to_normalized(self) -> Self {
        if self.length_squared() > 1.0 {
            self.normalize()
        } else {
            self
        }
    }

    /// Exactly zero in every component.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// Every component within `tolerance` of zero.
    #[must_use]
    pub fn is_almost_zero(self, tolerance: f32) -> bool {
        self.x.abs() < tolerance && self.y.abs() < tolerance && self.z.abs() < tolerance
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }

    /// Unsigned angle between two vectors in degrees.
    #[must_use]
    pub fn angle(self, other: Self) -> f32 {
        let denominator = (self.length_squared() * other.length_squared()).sqrt();
        if denominator < 1e-15 {
            return 0.0;
        }
        (self.dot(other) / denominator).clamp(-1.0, 1.0).acos().to_degrees()
    }

    /// All components finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

impl std::ops::Add for Vec3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::SubAssign for Vec3 {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl std::ops::Mul<f32> for Vec3 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

impl std::ops::MulAssign<f32> for Vec3 {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

impl std::ops::Div<f32> for Vec3 {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs, self.z / rhs)
    }
}

impl std::ops::Neg for Vec3 {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

// ============================================================================
// VEC3D (double precision, solver internals)
// ============================================================================

/// Double precision 3D vector.
///
/// Used where single precision drifts, e.g. nested cross products.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3d {
    /// X component
    pub x: f64,
    /// Y component
    pub y: f64,
    /// Z component
    pub z: f64,
}

impl Vec3d {
    /// Creates a new Vec3d
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    /// Dot product
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product
    #[must_use]
    pub fn cross(self, other: Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Length
    #[must_use]
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector, or zero when the length is at most `1e-12`.
    #[must_use]
    pub fn normalize(self) -> Self {
        let length = self.length();
        if length > NORMALIZE_EPSILON_F64 {
            self * (1.0 / length)
        } else {
            Self::ZERO
        }
    }

    /// Component-wise minimum.
    #[must_use]
    pub fn min(self, other: Self) -> Self {
        Self::new(self.x.min(other.x), self.y.min(other.y), self.z.min(other.z))
    }

    /// Component-wise maximum.
    #[must_use]
    pub fn max(self, other: Self) -> Self {
        Self::new(self.x.max(other.x), self.y.max(other.y), self.z.max(other.z))
    }
}

impl From<Vec3> for Vec3d {
    fn from(value: Vec3) -> Self {
        Self::new(f64::from(value.x), f64::from(value.y), f64::from(value.z))
    }
}

impl From<Vec3d> for Vec3 {
    #[allow(clippy::cast_possible_truncation)]
    fn from(value: Vec3d) -> Self {
        Self::new(value.x as f32, value.y as f32, value.z as f32)
    }
}

impl std::ops::Add for Vec3d {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl std::ops::Sub for Vec3d {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl std::ops::Mul<f64> for Vec3d {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        Self::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

// ============================================================================
// VEC2
// ============================================================================

/// 2D Vector - look rotation (pitch, yaw), per-axis tolerances
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vec2 {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
}

impl Vec2 {
    /// Creates a new Vec2
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Zero vector
    pub const ZERO: Self = Self::new(0.0, 0.0);

    /// Converts to array
    #[must_use]
    pub const fn to_array(self) -> [f32; 2] {
        [self.x, self.y]
    }

    /// Exactly zero in both components.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

// ============================================================================
// QUATERNION
// ============================================================================

/// Quaternion for rotations
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Quaternion {
    /// X component
    pub x: f32,
    /// Y component
    pub y: f32,
    /// Z component
    pub z: f32,
    /// W component
    pub w: f32,
}

impl Quaternion {
    /// Creates a new quaternion
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    /// Identity rotation
    pub const IDENTITY: Self = Self::new(0.0, 0.0, 0.0, 1.0);

    /// Rotation around a unit axis by `degrees`.
    #[must_use]
    pub fn from_axis_angle(axis: Vec3, degrees: f32) -> Self {
        let half = degrees.to_radians() * 0.5;
        let (sin, cos) = half.sin_cos();
        let axis = axis.normalize();
        Self::new(axis.x * sin, axis.y * sin, axis.z * sin, cos)
    }

    /// Pitch around X then yaw around Y (roll is always zero here).
    #[must_use]
    pub fn from_pitch_yaw(pitch: f32, yaw: f32) -> Self {
        Self::from_axis_angle(Vec3::UP, yaw) * Self::from_axis_angle(Vec3::X, pitch)
    }

    /// Yaw-only rotation around Y.
    #[must_use]
    pub fn from_yaw(yaw: f32) -> Self {
        Self::from_axis_angle(Vec3::UP, yaw)
    }

    /// Dot product of the four components.
    #[must_use]
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Unit quaternion, or identity for degenerate input.
    #[must_use]
    pub fn normalize(self) -> Self {
        let length = self.dot(self).sqrt();
        if length <= NORMALIZE_EPSILON {
            return Self::IDENTITY;
        }
        Self::new(self.x / length, self.y / length, self.z / length, self.w / length)
    }

    /// Inverse of a unit quaternion.
    #[must_use]
    pub const fn inverse(self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Rotates a vector.
    #[must_use]
    pub fn rotate(self, v: Vec3) -> Vec3 {
        let q = Vec3::new(self.x, self.y, self.z);
        let t = q.cross(v) * 2.0;
        v + t * self.w + q.cross(t)
    }

    /// Shortest-arc spherical interpolation, `alpha` clamped to `[0, 1]`.
    #[must_use]
    pub fn slerp(self, other: Self, alpha: f32) -> Self {
        let alpha = alpha.clamp(0.0, 1.0);
        if alpha <= 0.0 {
            return self;
        }
        if alpha >= 1.0 {
            return other;
        }

        let mut cos_theta = self.dot(other);
        let mut end = other;
        if cos_theta < 0.0 {
            cos_theta = -cos_theta;
            end = Self::new(-other.x, -other.y, -other.z, -other.w);
        }

        let (from_weight, to_weight) = if cos_theta > 0.9995 {
            (1.0 - alpha, alpha)
        } else {
            let theta = cos_theta.acos();
            let sin_theta = theta.sin();
            (
                ((1.0 - alpha) * theta).sin() / sin_theta,
                (alpha * theta).sin() / sin_theta,
            )
        };

        Self::new(
            self.x * from_weight + end.x * to_weight,
            self.y * from_weight + end.y * to_weight,
            self.z * from_weight + end.z * to_weight,
            self.w * from_weight + end.w * to_weight,
        )
        .normalize()
    }

    /// Angle between two rotations in degrees.
    #[must_use]
    pub fn angle(self, other: Self) -> f32 {
        let dot = self.dot(other).abs().min(1.0);
        (dot.acos() * 2.0).to_degrees()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl std::ops::Mul for Quaternion {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        Self::new(
            self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        )
    }
}

// ============================================================================
// ANGLES
// ============================================================================

/// Wraps an angle in degrees into `[-180, 180]`.
#[must_use]
pub fn wrap_angle(degrees: f32) -> f32 {
    if (-180.0..=180.0).contains(&degrees) {
        return degrees;
    }
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped < -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

/// Clamps a look pitch to `[-90, 90]`.
#[must_use]
pub fn clamp_pitch(pitch: f32) -> f32 {
    pitch.clamp(-90.0, 90.0)
}

/// Wraps a look yaw to `[-180, 180]`.
#[must_use]
pub fn wrap_yaw(yaw: f32) -> f32 {
    wrap_angle(yaw)
}

/// Interpolates inside a wrapping range along the shorter way around.
///
/// `interpolate_range(170, -170, -180, 180, 0.5)` passes through 180, not 0.
#[must_use]
pub fn interpolate_range(from: f32, to: f32, min: f32, max: f32, alpha: f32) -> f32 {
    let range = max - min;
    let mut delta = to - from;

    if delta > range * 0.5 {
        delta -= range;
    } else if delta < -range * 0.5 {
        delta += range;
    }

    let mut value = from + delta * alpha.clamp(0.0, 1.0);
    if value < min {
        value += range;
    } else if value > max {
        value -= range;
    }
    value
}

/// Linear interpolation of scalars with exact endpoints.
#[must_use]
pub fn lerp(from: f32, to: f32, alpha: f32) -> f32 {
    let alpha = alpha.clamp(0.0, 1.0);
    if alpha >= 1.0 {
        return to;
    }
    from + (to - from) * alpha
}
