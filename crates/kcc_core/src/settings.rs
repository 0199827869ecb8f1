//! # Controller Settings
//!
//! Actor configuration that can be changed at runtime. A copy is captured
//! at spawn and restored on despawn or reset.
//!
//! Values that would break the capsule (non-positive radius, height shorter
//! than the two caps) are clamped by [`KccSettings::refresh_collider`], never
//! rejected.

use std::path::Path;

use kcc_shared::Vec2;
use serde::{Deserialize, Serialize};

use crate::error::{KccError, KccResult};

/// Maximum depth of nested stage execution.
pub const MAX_NESTED_STAGES: usize = 32;

/// Number of fixed ticks kept in the history ring.
pub const HISTORY_SIZE: usize = 60;

/// Capacity of overlap caches, cast caches and processor lists.
pub const CACHE_SIZE: usize = 64;

/// Steps shorter than this are extrapolated instead of simulated.
pub const EXTRAPOLATION_DELTA_TIME_THRESHOLD: f32 = 0.00005;

/// Default maximum walkable slope in degrees.
pub const DEFAULT_MAX_GROUND_ANGLE: f32 = 60.0;

/// Default wall tolerance from vertical in degrees.
pub const DEFAULT_MAX_WALL_ANGLE: f32 = 5.0;

/// Default overhang tolerance in degrees.
pub const DEFAULT_MAX_HANG_ANGLE: f32 = 30.0;

/// Smallest radius the collider accepts.
pub const MIN_RADIUS: f32 = 0.01;

// ============================================================================
// ENUMS
// ============================================================================

/// Physics shape of the actor.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// No collider, physics queries are skipped.
    None = 0,
    /// Capsule collider with full processing.
    #[default]
    Capsule = 1,
}

impl Shape {
    /// Decodes the 2-bit wire value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Capsule,
            _ => Self::None,
        }
    }
}

/// How an actor is updated in fixed and render time.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorityBehavior {
    /// Full prediction in fixed time, interpolation of the last two fixed
    /// states in render time.
    #[default]
    PredictFixedInterpolateRender = 0,
    /// Full prediction in both fixed and render time.
    PredictFixedPredictRender = 1,
}

impl AuthorityBehavior {
    /// Decodes the 2-bit wire value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::PredictFixedPredictRender,
            _ => Self::PredictFixedInterpolateRender,
        }
    }
}

/// Interpolation of remote proxies.
#[repr(u8)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationMode {
    /// Every networked property is interpolated and `Interpolate`
    /// processors run.
    #[default]
    Full = 0,
    /// Only position and look rotation are interpolated.
    Transform = 1,
}

impl InterpolationMode {
    /// Decodes the 2-bit wire value.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        match bits {
            1 => Self::Transform,
            _ => Self::Full,
        }
    }
}

// ============================================================================
// FEATURES
// ============================================================================

/// Set of optional controller features.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Features(u8);

impl Features {
    /// No optional features.
    pub const NONE: Self = Self(0);
    /// Continuous collision detection substeps.
    pub const CCD: Self = Self(1 << 0);
    /// Render position tolerance filtering.
    pub const ANTI_JITTER: Self = Self(1 << 1);
    /// Smoothing of render prediction errors.
    pub const PREDICTION_CORRECTION: Self = Self(1 << 2);
    /// Every feature.
    pub const ALL: Self = Self(Self::CCD.0 | Self::ANTI_JITTER.0 | Self::PREDICTION_CORRECTION.0);

    /// Creates a feature set from raw bits, dropping unknown bits.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self((bits & Self::ALL.0 as u32) as u8)
    }

    /// Raw bits.
    #[must_use]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Every feature in `other` is enabled.
    #[inline]
    #[must_use]
    pub const fn has(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Copy with `other` enabled or disabled.
    #[must_use]
    pub const fn with(self, other: Self, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | other.0)
        } else {
            Self(self.0 & !other.0)
        }
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::ops::BitOr for Features {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Runtime configuration of one actor.
///
/// Networked fields travel in every state block, local fields never leave
/// the machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KccSettings {
    /// Physics shape (networked).
    pub shape: Shape,
    /// Collider only reports overlaps (networked).
    pub is_trigger: bool,
    /// Capsule radius (networked).
    pub radius: f32,
    /// Capsule height including both caps (networked).
    pub height: f32,
    /// Extra radius for ground detection and hit tracking (networked).
    pub extent: f32,
    /// Layer of the actor collider, 0..=31 (networked).
    pub collider_layer: u32,
    /// Layers the actor collides with (networked).
    pub collision_layer_mask: u32,
    /// Enabled features (networked).
    pub features: Features,
    /// Update behavior when the local peer has input authority (networked).
    pub input_authority_behavior: AuthorityBehavior,
    /// Update behavior when the local peer has state authority (networked).
    pub state_authority_behavior: AuthorityBehavior,
    /// Interpolation of remote proxies (networked).
    pub proxy_interpolation_mode: InterpolationMode,
    /// Predict look rotation in render for the input authority (networked).
    pub force_predicted_look_rotation: bool,
    /// Input authority may request teleports (networked).
    pub allow_client_teleports: bool,
    /// Depenetration passes per move step, 1..=16.
    pub max_penetration_steps: u32,
    /// Largest CCD substep as a fraction of the radius, 0.1..=0.9.
    pub ccd_radius_multiplier: f32,
    /// Render position tolerance: x horizontal, y vertical.
    pub anti_jitter_distance: Vec2,
    /// Decay speed of render prediction errors.
    pub prediction_correction_speed: f32,
    /// Maximum interactions carried in a state block.
    pub networked_interactions: u32,
    /// Drop the full precision position residual from state blocks.
    pub compress_network_position: bool,
    /// One overlap query per move step, hits tracked before depenetration.
    pub force_single_overlap_query: bool,
    /// Switch convertible mesh colliders to concave mode during queries.
    pub suppress_convex_mesh_colliders: bool,
}

impl KccSettings {
    /// Creates settings with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            shape: Shape::Capsule,
            is_trigger: false,
            radius: 0.35,
            height: 1.8,
            extent: 0.035,
            collider_layer: 0,
            collision_layer_mask: 1,
            features: Features::ALL,
            input_authority_behavior: AuthorityBehavior::PredictFixedInterpolateRender,
            state_authority_behavior: AuthorityBehavior::PredictFixedInterpolateRender,
            proxy_interpolation_mode: InterpolationMode::Full,
            force_predicted_look_rotation: false,
            allow_client_teleports: false,
            max_penetration_steps: 8,
            ccd_radius_multiplier: 0.75,
            anti_jitter_distance: Vec2::new(0.025, 0.01),
            prediction_correction_speed: 30.0,
            networked_interactions: 8,
            compress_network_position: false,
            force_single_overlap_query: false,
            suppress_convex_mesh_colliders: false,
        }
    }

    /// Parses settings from TOML. Missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`KccError::InvalidConfig`] if the text is not valid TOML or a
    /// key has the wrong type.
    pub fn from_toml_str(text: &str) -> KccResult<Self> {
        let mut settings: Self =
            toml::from_str(text).map_err(|e| KccError::InvalidConfig(e.to_string()))?;
        settings.sanitize();
        Ok(settings)
    }

    /// Loads settings from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`KccError::InvalidConfig`] if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> KccResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| KccError::InvalidConfig(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Clamps the capsule to a valid shape.
    ///
    /// Returns `true` if the collider should exist, i.e. the actor is
    /// active and the shape is not [`Shape::None`].
    pub fn refresh_collider(&mut self, is_active: bool) -> bool {
        if !is_active || self.shape == Shape::None {
            return false;
        }

        let radius = self.radius.max(MIN_RADIUS);
        let height = self.height.max(radius * 2.0);
        let extent = self.extent.max(0.0);

        if radius != self.radius || height != self.height || extent != self.extent {
            tracing::warn!(
                "clamped capsule: radius {} -> {}, height {} -> {}, extent {} -> {}",
                self.radius,
                radius,
                self.height,
                height,
                self.extent,
                extent
            );
        }

        self.radius = radius;
        self.height = height;
        self.extent = extent;
        true
    }

    /// CCD radius multiplier clamped to its valid range.
    #[inline]
    #[must_use]
    pub fn clamped_ccd_radius_multiplier(&self) -> f32 {
        self.ccd_radius_multiplier.clamp(0.1, 0.9)
    }

    /// Applies every clamp a loaded file needs.
    pub(crate) fn sanitize(&mut self) {
        self.max_penetration_steps = self.max_penetration_steps.clamp(1, 16);
        self.collider_layer &= 0b1_1111;
        if self.shape != Shape::None {
            self.refresh_collider(true);
        }
    }
}

impl Default for KccSettings {
    fn default() -> Self {
        Self::new()
    }
}
