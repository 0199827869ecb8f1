//! # Depenetration Solver
//!
//! Combines N penetration vectors into one correction.
//!
//! Each contact is treated as the constraint `dot(result, direction) >=
//! distance`. Summing the vectors over-corrects as soon as two contacts
//! share a component; the solver instead looks for the shortest vector that
//! satisfies every constraint.
//!
//! ## Paths
//!
//! | Contacts | Geometry | Method |
//! |----------|----------|--------|
//! | 0 | - | zero |
//! | 1 | - | the contact itself |
//! | 2 | opposing (`dot < 0`) | exact binary solve in `f64` |
//! | 3 | floor + two opposing walls | floor min/max binary walls |
//! | any | otherwise | iterative error descent |
//!
//! The iterative path always terminates after `max_iterations` and returns
//! its best estimate; non-convergence is not an error.

use kcc_shared::{Vec3, Vec3d};

use crate::settings::CACHE_SIZE;

/// Absolute up dot above which a correction counts as a floor.
const FLOOR_THRESHOLD: f32 = 0.9995;

/// Absolute up dot below which a correction counts as a wall.
const WALL_THRESHOLD: f32 = 0.025;

/// Absolute dot above which two directions are treated as parallel.
const PARALLEL_THRESHOLD: f64 = 0.999_999;

/// One penetration constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Correction {
    /// `direction * distance`.
    pub amount: Vec3,
    /// Unit push direction.
    pub direction: Vec3,
    /// Push distance.
    pub distance: f32,
    /// Signed residual of the current estimate (gradient descent scratch).
    error: f32,
}

/// Multi-contact depenetration solver.
///
/// # Example
///
/// ```rust,ignore
/// let mut resolver = Resolver::new();
/// resolver.add_correction(Vec3::X, 0.1);
/// resolver.add_correction(Vec3::FORWARD, 0.1);
///
/// // 0.1 * sqrt(2) along the diagonal, not 0.2
/// let correction = resolver.compute_best(8, 0.001);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Resolver {
    corrections: Vec<Correction>,
}

impl Resolver {
    /// Creates an empty resolver.
    #[must_use]
    pub fn new() -> Self {
        Self {
            corrections: Vec::with_capacity(CACHE_SIZE),
        }
    }

    /// Removes all corrections. Call before adding a new set.
    #[inline]
    pub fn reset(&mut self) {
        self.corrections.clear();
    }

    /// Adds one constraint.
    #[inline]
    pub fn add_correction(&mut self, direction: Vec3, distance: f32) {
        self.corrections.push(Correction {
            amount: direction * distance,
            direction,
            distance,
            error: 0.0,
        });
    }

    /// Number of constraints.
    #[inline]
    #[must_use]
    pub fn count(&self) -> usize {
        self.corrections.len()
    }

    /// Constraint at `index`.
    #[must_use]
    pub fn correction(&self, index: usize) -> Option<&Correction> {
        self.corrections.get(index)
    }

    // ========================================================================
    // BEST
    // ========================================================================

    /// Picks the exact fast path when the geometry allows it and falls back
    /// to error descent otherwise.
    #[must_use]
    pub fn compute_best(&self, max_iterations: u32, max_error: f32) -> Vec3 {
        match self.corrections.as_slice() {
            [] => Vec3::ZERO,
            [single] => single.amount,
            [c0, c1] if c0.direction.dot(c1.direction) < 0.0 => binary(c0, c1),
            [c0, c1, c2] => match floor_and_walls(c0, c1, c2) {
                Some((floor, wall_a, wall_b)) => min_max(&[floor.amount, binary(wall_a, wall_b)]),
                None => self.compute_error_descent(max_iterations, max_error),
            },
            _ => self.compute_error_descent(max_iterations, max_error),
        }
    }

    // ========================================================================
    // ALTERNATIVES
    // ========================================================================

    /// Sum of the component-wise minimum and maximum of all corrections.
    #[must_use]
    pub fn compute_min_max(&self) -> Vec3 {
        match self.corrections.as_slice() {
            [] => Vec3::ZERO,
            [single] => single.amount,
            all => {
                let (min, max) = all.iter().fold((Vec3::ZERO, Vec3::ZERO), |(min, max), c| {
                    (min.min(c.amount), max.max(c.amount))
                });
                min + max
            }
        }
    }

    /// Plain sum of all corrections.
    #[must_use]
    pub fn compute_sum(&self) -> Vec3 {
        self.corrections
            .iter()
            .fold(Vec3::ZERO, |sum, c| sum + c.amount)
    }

    /// Average of all corrections.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn compute_average(&self) -> Vec3 {
        match self.corrections.len() {
            0 => Vec3::ZERO,
            1 => self.corrections[0].amount,
            count => self.compute_sum() / count as f32,
        }
    }

    /// Exact solution for at most two corrections, `None` for more.
    #[must_use]
    pub fn compute_binary(&self) -> Option<Vec3> {
        match self.corrections.as_slice() {
            [] => Some(Vec3::ZERO),
            [single] => Some(single.amount),
            [c0, c1] => Some(binary(c0, c1)),
            _ => None,
        }
    }

    /// Pushes along every violated constraint by its residual until the
    /// total residual drops below `max_error`.
    #[must_use]
    pub fn compute_error_descent(&self, max_iterations: u32, max_error: f32) -> Vec3 {
        match self.corrections.as_slice() {
            [] => return Vec3::ZERO,
            [single] => return single.amount,
            _ => {}
        }

        let mut target = Vec3::ZERO;

        for _ in 0..max_iterations {
            let mut accumulated_error = 0.0;

            for correction in &self.corrections {
                let error = correction.distance - target.dot(correction.direction);
                if error > 0.0 {
                    accumulated_error += error;
                    target += correction.direction * error;
                }
            }

            if accumulated_error < max_error {
                break;
            }
        }

        target
    }

    /// Gradient descent on the sum of signed residuals.
    ///
    /// Slower than [`Resolver::compute_error_descent`] and weak on parallel
    /// corrections of different depth; kept as an independent reference.
    #[must_use]
    pub fn compute_gradient_descent(&mut self, max_iterations: u32, max_error: f32) -> Vec3 {
        match self.corrections.as_slice() {
            [] => return Vec3::ZERO,
            [single] => return single.amount,
            _ => {}
        }

        let mut target = Vec3::ZERO;

        for _ in 0..max_iterations {
            let mut error = Vec3::ZERO;

            for correction in &mut self.corrections {
                correction.error = correction.direction.dot(target) - correction.distance;
                error += correction.direction * correction.error;
            }

            // Local minimum.
            if error.is_almost_zero(max_error) {
                break;
            }

            let error = error.normalize();
            let mut error_correction = 0.0;
            let mut error_correction_size = 0.0;

            for correction in &self.corrections {
                let error_dot = correction.direction.dot(error);
                error_correction += correction.error * error_dot;
                error_correction_size += error_dot.abs();
            }

            if error_correction_size < 0.000_001 {
                break;
            }

            error_correction /= error_correction_size;
            if error_correction.abs() < max_error {
                break;
            }

            target -= error * error_correction;
        }

        target
    }
}

// ============================================================================
// CLOSED FORMS
// ============================================================================

/// Component-wise min + max, both seeded with zero.
fn min_max(amounts: &[Vec3]) -> Vec3 {
    let (min, max) = amounts
        .iter()
        .fold((Vec3::ZERO, Vec3::ZERO), |(min, max), &a| (min.min(a), max.max(a)));
    min + max
}

/// Exact intersection of two constraint planes.
///
/// The result starts at `c0.amount` and moves inside the plane of `c0`
/// along the direction perpendicular to `d0` toward `d1` until the second
/// constraint is met. Nested cross products run in `f64`.
fn binary(c0: &Correction, c1: &Correction) -> Vec3 {
    let d0 = Vec3d::from(c0.direction);
    let d1 = Vec3d::from(c1.direction);

    let dot = d0.dot(d1);
    if dot.abs() > PARALLEL_THRESHOLD {
        return min_max(&[c0.amount, c1.amount]);
    }

    let delta_direction = d0.cross(d1).cross(d0).normalize();
    let delta_distance = (f64::from(c1.distance) - f64::from(c0.distance) * dot)
        / (1.0 - dot * dot).sqrt();

    Vec3::from(Vec3d::from(c0.amount) + delta_direction * delta_distance)
}

/// Splits three corrections into (floor, wall, wall) when one points
/// straight up or down and the other two are opposing horizontal walls.
fn floor_and_walls<'a>(
    c0: &'a Correction,
    c1: &'a Correction,
    c2: &'a Correction,
) -> Option<(&'a Correction, &'a Correction, &'a Correction)> {
    let up = |c: &Correction| c.direction.dot(Vec3::UP).abs();
    let is_wall_pair = |a: &Correction, b: &Correction| {
        up(a) < WALL_THRESHOLD && up(b) < WALL_THRESHOLD && a.direction.dot(b.direction) < 0.0
    };

    // Only the first floor candidate is considered.
    if up(c0) > FLOOR_THRESHOLD {
        is_wall_pair(c1, c2).then_some((c0, c1, c2))
    } else if up(c1) > FLOOR_THRESHOLD {
        is_wall_pair(c0, c2).then_some((c1, c0, c2))
    } else if up(c2) > FLOOR_THRESHOLD {
        is_wall_pair(c0, c1).then_some((c2, c0, c1))
    } else {
        None
    }
}
