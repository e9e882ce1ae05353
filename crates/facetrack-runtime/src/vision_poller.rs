//! [`VisionPoller`] – pulls face positions from the vision source.
//!
//! While tracking is enabled, each tick queries the vision source and feeds
//! the answer through the [`PositionSmoother`].  A failed query counts as a
//! centered face, which sits in the deadzone and leaves the target alone.
//! Queries run inline, so at most one is in flight at a time.

use std::sync::Arc;
use std::time::Duration;

use facetrack_hal::VisionSource;
use facetrack_kernel::{ControlState, PositionSmoother};
use facetrack_types::TargetPosition;
use tracing::debug;

use crate::periodic::{Shutdown, next_tick, ticker};

pub struct VisionPoller {
    state: Arc<ControlState>,
    vision: Arc<dyn VisionSource>,
    smoother: PositionSmoother,
    interval: Duration,
}

impl VisionPoller {
    pub fn new(
        state: Arc<ControlState>,
        vision: Arc<dyn VisionSource>,
        smoother: PositionSmoother,
        interval: Duration,
    ) -> Self {
        Self {
            state,
            vision,
            smoother,
            interval,
        }
    }

    /// Query once and update the target.  Returns the new target, or `None`
    /// when tracking is disabled and no query was made.
    pub async fn tick(&self) -> Option<TargetPosition> {
        if !self.state.tracking_enabled() {
            return None;
        }
        let raw = self.vision.face_position_or_center().await;
        let target = self.smoother.apply(&self.state, raw);
        debug!(?raw, ?target, "vision sample applied");
        Some(target)
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = ticker(self.interval);
        while next_tick(&mut ticker, &mut shutdown).await {
            self.tick().await;
        }
        debug!("vision poller stopped");
    }
}
