//! [`RuntimeConfig`] – timing and tuning for every controller task.

use std::time::Duration;

use facetrack_hal::DEFAULT_SPEED;
use facetrack_kernel::SmootherConfig;
use facetrack_types::{Bounds, FaceTrackError};

/// Configuration bundle for [`Controller`][crate::controller::Controller].
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Target coordinate space.
    pub bounds: Bounds,
    /// Deadzone / gain tuning of the position smoother.
    pub smoother: SmootherConfig,
    /// Speed argument sent with every tracking move.
    pub move_speed: i32,
    /// Period of the tracking loop.  May be very small, never zero.
    pub tracking_interval: Duration,
    /// Period of the nod loop.
    pub nod_interval: Duration,
    /// Window after which an unchanged target is recentered.
    pub idle_recenter_interval: Duration,
    /// Period of the vision poller (when a vision source is attached).
    pub vision_poll_interval: Duration,
    /// Pause after a sequencer step flips the flags, before acting on them.
    pub settle_delay: Duration,
    /// Pause between two triggers of the same preset.
    pub preset_repeat_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            bounds: Bounds::NORMALIZED,
            smoother: SmootherConfig::default(),
            move_speed: DEFAULT_SPEED,
            tracking_interval: Duration::from_millis(100),
            nod_interval: Duration::from_secs(3),
            idle_recenter_interval: Duration::from_secs(60),
            vision_poll_interval: Duration::from_millis(100),
            settle_delay: Duration::from_micros(500),
            preset_repeat_interval: Duration::from_millis(100),
        }
    }
}

impl RuntimeConfig {
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] when a periodic interval is zero or
    /// the smoother tuning is invalid.  `settle_delay` may be zero.
    pub fn validate(&self) -> Result<(), FaceTrackError> {
        let intervals = [
            ("tracking_interval", self.tracking_interval),
            ("nod_interval", self.nod_interval),
            ("idle_recenter_interval", self.idle_recenter_interval),
            ("vision_poll_interval", self.vision_poll_interval),
            ("preset_repeat_interval", self.preset_repeat_interval),
        ];
        for (name, d) in intervals {
            if d.is_zero() {
                return Err(FaceTrackError::Config(format!("{name} must be non-zero")));
            }
        }
        self.smoother.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = RuntimeConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tracking_interval, Duration::from_millis(100));
        assert_eq!(cfg.settle_delay, Duration::from_micros(500));
        assert_eq!(cfg.move_speed, -1);
    }

    #[test]
    fn near_zero_tracking_interval_is_allowed() {
        let cfg = RuntimeConfig {
            tracking_interval: Duration::from_micros(50),
            settle_delay: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_interval_is_rejected() {
        let cfg = RuntimeConfig {
            nod_interval: Duration::ZERO,
            ..RuntimeConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(FaceTrackError::Config(m)) if m.contains("nod_interval")));
    }
}
