//! [`PositionSmoother`] – deadzone + two-speed stepper.
//!
//! Turns a raw face report into a small correction of the target position.
//! Per axis, the raw coordinate (mapped into target space) is classified
//! against the axis midpoint:
//!
//! | Band | Condition (`d = m - mid`) | Correction |
//! |---|---|---|
//! | [`Band::Deadzone`] | `-allow < d < allow` | none |
//! | [`Band::Fine`] | `-(fine + allow) < d < fine + allow` | `fine_gain` |
//! | [`Band::Course`] | otherwise | `course_gain` |
//!
//! A face left of / above the midpoint increases the target on that axis, a
//! face right of / below decreases it.  Comparisons are strict: a coordinate
//! exactly on a band edge belongs to the outer band.  The result is clamped
//! into `[0, max]`.
//!
//! This is a quantised bang-bang stepper, not a continuous controller.

use facetrack_types::{Bounds, FaceTrackError, RawFacePosition, TargetPosition};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::control_state::ControlState;

// ────────────────────────────────────────────────────────────────────────────
// Configuration
// ────────────────────────────────────────────────────────────────────────────

/// Tuning of the stepper.  Ranges and gains are in target-space units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmootherConfig {
    /// Deadzone half-width on the X axis.
    pub allow_range_x: f64,
    /// Deadzone half-width on the Y axis.
    pub allow_range_y: f64,
    /// Width of the near-range band beyond the X deadzone.
    pub fine_range_x: f64,
    /// Width of the near-range band beyond the Y deadzone.
    pub fine_range_y: f64,
    /// Step applied inside the near-range band.
    pub fine_gain: f64,
    /// Step applied outside the near-range band.
    pub course_gain: f64,
    /// Mirror the raw X coordinate (`x = 1 - x`) before use.
    pub mirror_x: bool,
}

impl Default for SmootherConfig {
    fn default() -> Self {
        Self {
            allow_range_x: 0.1,
            allow_range_y: 0.1,
            fine_range_x: 0.15,
            fine_range_y: 0.15,
            fine_gain: 0.01,
            course_gain: 0.03,
            mirror_x: false,
        }
    }
}

impl SmootherConfig {
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] if any range or gain is negative or
    /// not finite.
    pub fn validate(&self) -> Result<(), FaceTrackError> {
        let fields = [
            ("allow_range_x", self.allow_range_x),
            ("allow_range_y", self.allow_range_y),
            ("fine_range_x", self.fine_range_x),
            ("fine_range_y", self.fine_range_y),
            ("fine_gain", self.fine_gain),
            ("course_gain", self.course_gain),
        ];
        for (name, v) in fields {
            if !v.is_finite() || v < 0.0 {
                return Err(FaceTrackError::Config(format!(
                    "smoother.{name} must be a non-negative number, got {v}"
                )));
            }
        }
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Band classification
// ────────────────────────────────────────────────────────────────────────────

/// Which correction band a coordinate falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Band {
    Deadzone,
    Fine,
    Course,
}

/// Classify `m` against `mid` with deadzone half-width `allow` and near-range
/// width `fine`.
pub fn classify(m: f64, mid: f64, allow: f64, fine: f64) -> Band {
    if mid - allow < m && m < mid + allow {
        Band::Deadzone
    } else if mid - (fine + allow) < m && m < mid + (fine + allow) {
        Band::Fine
    } else {
        Band::Course
    }
}

// ────────────────────────────────────────────────────────────────────────────
// PositionSmoother
// ────────────────────────────────────────────────────────────────────────────

/// Applies [`SmootherConfig`] to raw reports within fixed [`Bounds`].
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    config: SmootherConfig,
    bounds: Bounds,
}

impl PositionSmoother {
    pub fn new(config: SmootherConfig, bounds: Bounds) -> Self {
        Self { config, bounds }
    }

    pub fn config(&self) -> &SmootherConfig {
        &self.config
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Map a raw `[0, 1]²` report into target space, mirroring X if
    /// configured.
    pub fn map_raw(&self, raw: RawFacePosition) -> (f64, f64) {
        let x = if self.config.mirror_x { 1.0 - raw.x } else { raw.x };
        (x * self.bounds.max_x, raw.y * self.bounds.max_y)
    }

    /// Compute the next target from `current` and one raw report.
    pub fn step(&self, raw: RawFacePosition, current: TargetPosition) -> TargetPosition {
        let (mx, my) = self.map_raw(raw);
        let x = self.step_axis(
            "x",
            mx,
            current.x,
            self.bounds.max_x,
            self.config.allow_range_x,
            self.config.fine_range_x,
        );
        let y = self.step_axis(
            "y",
            my,
            current.y,
            self.bounds.max_y,
            self.config.allow_range_y,
            self.config.fine_range_y,
        );
        TargetPosition::new(x, y)
    }

    /// Apply one raw report to the shared target and return the new value.
    pub fn apply(&self, state: &ControlState, raw: RawFacePosition) -> TargetPosition {
        state.update_target(|current| self.step(raw, current))
    }

    fn step_axis(&self, axis: &str, m: f64, current: f64, max: f64, allow: f64, fine: f64) -> f64 {
        let mid = max / 2.0;
        let band = classify(m, mid, allow, fine);
        let gain = match band {
            Band::Deadzone => {
                debug!(axis, m, "face inside deadzone; axis unchanged");
                return current;
            }
            Band::Fine => self.config.fine_gain,
            Band::Course => self.config.course_gain,
        };
        let direction = if m < mid {
            1.0
        } else if m > mid {
            -1.0
        } else {
            // Only reachable with a zero-width deadzone.
            return current;
        };
        let next = (current + direction * gain).clamp(0.0, max);
        debug!(axis, m, ?band, from = current, to = next, "smoother step");
        next
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng, rngs::StdRng};

    fn default_smoother() -> PositionSmoother {
        PositionSmoother::new(SmootherConfig::default(), Bounds::NORMALIZED)
    }

    /// A 256×256 space with power-of-two band edges so boundary checks are
    /// exact in binary floating point.
    fn pixel_smoother() -> PositionSmoother {
        PositionSmoother::new(
            SmootherConfig {
                allow_range_x: 32.0,
                allow_range_y: 32.0,
                fine_range_x: 32.0,
                fine_range_y: 32.0,
                fine_gain: 1.0,
                course_gain: 4.0,
                mirror_x: false,
            },
            Bounds::new(256.0, 256.0).unwrap(),
        )
    }

    fn raw(x: f64, y: f64) -> RawFacePosition {
        RawFacePosition::new(x, y).unwrap()
    }

    #[test]
    fn deadzone_leaves_target_unchanged() {
        let s = default_smoother();
        let current = TargetPosition::new(0.3, 0.7);
        for i in 0..=20 {
            for j in 0..=20 {
                // Sweep strictly inside (0.4, 0.6).
                let x = 0.405 + 0.19 * f64::from(i) / 20.0;
                let y = 0.405 + 0.19 * f64::from(j) / 20.0;
                assert_eq!(s.step(raw(x, y), current), current, "raw=({x},{y})");
            }
        }
    }

    #[test]
    fn near_range_steps_by_fine_gain() {
        let s = pixel_smoother();
        let current = TargetPosition::new(128.0, 128.0);

        // Left of / above center: (64, 96] increases by the fine gain.
        for m in 65..=96 {
            let r = f64::from(m) / 256.0;
            assert_eq!(s.step(raw(r, r), current), TargetPosition::new(129.0, 129.0), "m={m}");
        }
        // Right of / below center: [160, 192) decreases by the fine gain.
        for m in 160..192 {
            let r = f64::from(m) / 256.0;
            assert_eq!(s.step(raw(r, r), current), TargetPosition::new(127.0, 127.0), "m={m}");
        }

        let d = default_smoother();
        let gain = d.config().fine_gain;
        let next = d.step(raw(0.3, 0.7), TargetPosition::new(0.5, 0.5));
        assert_eq!(next, TargetPosition::new(0.5 + gain, 0.5 - gain));
    }

    #[test]
    fn far_off_center_steps_by_course_gain() {
        let s = pixel_smoother();
        let current = TargetPosition::new(128.0, 128.0);

        for m in 0..=64 {
            let r = f64::from(m) / 256.0;
            assert_eq!(s.step(raw(r, r), current), TargetPosition::new(132.0, 132.0), "m={m}");
        }
        for m in 192..=256 {
            let r = f64::from(m) / 256.0;
            assert_eq!(s.step(raw(r, r), current), TargetPosition::new(124.0, 124.0), "m={m}");
        }

        let d = default_smoother();
        let gain = d.config().course_gain;
        let next = d.step(raw(0.05, 0.95), TargetPosition::new(0.5, 0.5));
        assert_eq!(next, TargetPosition::new(0.5 + gain, 0.5 - gain));
    }

    #[test]
    fn axes_are_independent() {
        let s = default_smoother();
        let current = TargetPosition::new(0.5, 0.5);
        // X in deadzone, Y far below.
        let next = s.step(raw(0.5, 1.0), current);
        assert_eq!(next.x, current.x);
        assert_eq!(next.y, current.y - s.config().course_gain);
    }

    #[test]
    fn band_edges_belong_to_outer_band() {
        let s = pixel_smoother();
        let current = TargetPosition::new(128.0, 128.0);

        // Exactly on the deadzone edge (m = 96 and m = 160): fine step.
        assert_eq!(
            s.step(raw(96.0 / 256.0, 160.0 / 256.0), current),
            TargetPosition::new(129.0, 127.0)
        );
        // Just inside the deadzone edge: unchanged.
        assert_eq!(s.step(raw(97.0 / 256.0, 159.0 / 256.0), current), current);
        // Exactly on the near-range edge (m = 64 and m = 192): course step.
        assert_eq!(
            s.step(raw(64.0 / 256.0, 192.0 / 256.0), current),
            TargetPosition::new(132.0, 124.0)
        );
        // Just inside the near-range edge: fine step.
        assert_eq!(
            s.step(raw(65.0 / 256.0, 191.0 / 256.0), current),
            TargetPosition::new(129.0, 127.0)
        );
    }

    #[test]
    fn classify_is_strict() {
        assert_eq!(classify(0.0, 0.0, 0.0, 0.0), Band::Course);
        assert_eq!(classify(10.0, 8.0, 2.0, 1.0), Band::Fine);
        assert_eq!(classify(11.0, 8.0, 2.0, 1.0), Band::Course);
        assert_eq!(classify(9.5, 8.0, 2.0, 1.0), Band::Deadzone);
    }

    #[test]
    fn mirror_x_flips_direction() {
        let mirrored = PositionSmoother::new(
            SmootherConfig {
                mirror_x: true,
                ..SmootherConfig::default()
            },
            Bounds::NORMALIZED,
        );
        let current = TargetPosition::new(0.5, 0.5);
        let gain = mirrored.config().course_gain;

        // Face far left becomes far right after mirroring: decrease X.
        let next = mirrored.step(raw(0.0, 0.5), current);
        assert_eq!(next.x, current.x - gain);
        assert_eq!(next.y, current.y);
    }

    #[test]
    fn raw_is_scaled_into_target_space() {
        let s = pixel_smoother();
        assert_eq!(s.map_raw(raw(0.25, 1.0)), (64.0, 256.0));
    }

    #[test]
    fn target_saturates_at_bounds() {
        let s = default_smoother();
        let mut current = TargetPosition::new(0.98, 0.02);
        for _ in 0..10 {
            // Face far left and far down: X increases, Y decreases.
            current = s.step(raw(0.0, 1.0), current);
        }
        assert_eq!(current, TargetPosition::new(1.0, 0.0));
    }

    #[test]
    fn target_always_within_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        for bounds in [Bounds::NORMALIZED, Bounds::new(640.0, 480.0).unwrap()] {
            let config = SmootherConfig {
                fine_gain: bounds.max_x * 0.05,
                course_gain: bounds.max_x * 0.4,
                ..SmootherConfig::default()
            };
            let s = PositionSmoother::new(config, bounds);
            let mut current = bounds.center();
            for _ in 0..10_000 {
                let r = raw(rng.gen_range(0.0..=1.0), rng.gen_range(0.0..=1.0));
                current = s.step(r, current);
                assert!(bounds.contains(current), "{current:?} escaped {bounds:?}");
            }
        }
    }

    #[test]
    fn apply_updates_shared_state() {
        let s = default_smoother();
        let state = ControlState::new(Bounds::NORMALIZED);
        let next = s.apply(&state, raw(0.0, 0.5));
        assert_eq!(next, TargetPosition::new(0.5 + 0.03, 0.5));
        assert_eq!(state.target(), next);
    }

    #[test]
    fn validate_rejects_negative_values() {
        assert!(SmootherConfig::default().validate().is_ok());
        let bad = SmootherConfig {
            course_gain: -1.0,
            ..SmootherConfig::default()
        };
        assert!(matches!(bad.validate(), Err(FaceTrackError::Config(_))));
    }
}
