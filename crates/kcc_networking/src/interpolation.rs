//! # Render Smoothing
//!
//! Two filters sit between the simulated position and what is drawn:
//!
//! - **Anti-jitter**: motion below a per-axis tolerance is frozen, only the
//!   excess propagates. Vertical and horizontal distances are filtered
//!   separately so a walking actor does not bob on uneven ground.
//! - **Prediction correction**: when a new fixed tick changes where render
//!   prediction should have been, the difference is kept as an offset that
//!   decays to zero instead of snapping.
//!
//! ```text
//! rendered ──────┐  error = rendered - expected
//!                ▼
//! expected ──────●──► offset *= 1 - speed * dt ──► 0
//! ```

use kcc_shared::{Vec2, Vec3};

use crate::history::History;

/// Distances below this are treated as no motion.
const MIN_DISTANCE: f32 = 0.000_001;

/// Errors at or beyond this squared distance are dropped, not smoothed.
const MAX_ERROR_SQUARED: f32 = 1.0;

/// Ticks searched backwards for the pair surrounding the last render time.
const MAX_ERROR_SEARCH: usize = 5;

/// Moves from `anchor` toward `target` by the part of the offset that
/// exceeds `tolerance` (x horizontal, y vertical).
#[must_use]
pub fn apply_tolerance(anchor: Vec3, target: Vec3, tolerance: Vec2) -> Vec3 {
    let delta = target - anchor;
    let mut result = anchor;

    let distance_y = delta.y.abs();
    if distance_y > MIN_DISTANCE && distance_y > tolerance.y {
        result.y += delta.y * ((distance_y - tolerance.y) / distance_y).clamp(0.0, 1.0);
    }

    let delta_xz = delta.only_xz();
    let distance_xz = delta_xz.length();
    if distance_xz > MIN_DISTANCE && distance_xz > tolerance.x {
        result += delta_xz * ((distance_xz - tolerance.x) / distance_xz).clamp(0.0, 1.0);
    }

    result
}

// ============================================================================
// ANTI-JITTER
// ============================================================================

/// Stateful anti-jitter filter for the drawn position.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AntiJitter {
    last: Vec3,
}

impl AntiJitter {
    /// Creates a filter anchored at `position`.
    #[must_use]
    pub const fn new(position: Vec3) -> Self {
        Self { last: position }
    }

    /// Last filtered position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.last
    }

    /// Re-anchors the filter without filtering.
    pub fn reset(&mut self, position: Vec3) {
        self.last = position;
    }

    /// Filters `target`. Jumps of a meter or more pass through unchanged.
    pub fn apply(&mut self, target: Vec3, tolerance: Vec2) -> Vec3 {
        let filtered = if (target - self.last).length_squared() < 1.0 {
            apply_tolerance(self.last, target, tolerance)
        } else {
            target
        };
        self.last = filtered;
        filtered
    }
}

// ============================================================================
// PREDICTION CORRECTION
// ============================================================================

/// Inputs of one prediction error measurement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ErrorProbe {
    /// Tick of the render state.
    pub render_tick: i32,
    /// Render time of the previous frame.
    pub last_render_time: f32,
    /// Position drawn in the previous frame.
    pub last_render_position: Vec3,
}

/// Outcome of looking up where the previous frame should have been.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Expectation {
    /// Position interpolated from the surrounding ticks.
    Position(Vec3),
    /// The surrounding ticks span a teleport or have no duration.
    Discontinuity,
    /// History does not cover the last render time.
    Unavailable,
}

/// Where the previous frame should have been, interpolated from history.
#[must_use]
pub fn expected_render_position(history: &History, probe: &ErrorProbe) -> Expectation {
    let Some(mut current) = history.get(probe.render_tick) else {
        return Expectation::Unavailable;
    };
    if probe.last_render_time > current.time {
        return Expectation::Unavailable;
    }

    for _ in 0..MAX_ERROR_SEARCH {
        let Some(previous) = history.get(current.tick - 1) else {
            return Expectation::Unavailable;
        };
        if probe.last_render_time >= previous.time {
            if current.has_teleported || previous.has_teleported {
                return Expectation::Discontinuity;
            }
            let duration = current.time - previous.time;
            if duration <= MIN_DISTANCE {
                return Expectation::Discontinuity;
            }
            let alpha = (probe.last_render_time - previous.time) / duration;
            return Expectation::Position(previous.target_position.lerp(current.target_position, alpha));
        }
        current = previous;
    }
    Expectation::Unavailable
}

/// Decaying render offset that hides prediction corrections.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PredictionCorrection {
    error: Vec3,
}

impl PredictionCorrection {
    /// No error.
    #[must_use]
    pub const fn new() -> Self {
        Self { error: Vec3::ZERO }
    }

    /// Offset currently applied to render positions.
    #[inline]
    #[must_use]
    pub const fn error(&self) -> Vec3 {
        self.error
    }

    /// Drops the error.
    pub fn reset(&mut self) {
        self.error = Vec3::ZERO;
    }

    fn decayed(error: Vec3, speed: f32, frame_delta_time: f32) -> Vec3 {
        error.lerp(Vec3::ZERO, speed * frame_delta_time)
    }

    /// Measures a new error on the first render after a fixed tick.
    ///
    /// Returns the offset to add to the freshly published render positions,
    /// or `None` when history cannot tell and the caller should
    /// [`decay`](Self::decay) instead.
    pub fn measure(
        &mut self,
        history: &History,
        probe: &ErrorProbe,
        speed: f32,
        frame_delta_time: f32,
    ) -> Option<Vec3> {
        match expected_render_position(history, probe) {
            Expectation::Unavailable => None,
            Expectation::Discontinuity => {
                self.reset();
                Some(Vec3::ZERO)
            }
            Expectation::Position(expected) => {
                let error = probe.last_render_position - expected;
                if error.length_squared() >= MAX_ERROR_SQUARED {
                    tracing::debug!("prediction error of {:.3} m dropped", error.length());
                    self.reset();
                    return Some(Vec3::ZERO);
                }
                self.error = Self::decayed(error, speed, frame_delta_time);
                Some(self.error)
            }
        }
    }

    /// Decays the current error. Returns the change to add to positions
    /// that already carry the old error.
    pub fn decay(&mut self, speed: f32, frame_delta_time: f32) -> Vec3 {
        if self.error.is_almost_zero(MIN_DISTANCE) {
            let previous = self.error;
            self.reset();
            return -previous;
        }
        let previous = self.error;
        self.error = Self::decayed(previous, speed, frame_delta_time);
        self.error - previous
    }
}
