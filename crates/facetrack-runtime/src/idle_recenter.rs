//! [`IdleRecenter`] – returns the head to center once the face is lost.
//!
//! Every interval the task compares the target with the value it saw on the
//! previous tick.  If nothing moved and nodding stayed off for the whole
//! window, the target is reset to the center of the bounds; otherwise the
//! current value is remembered for the next comparison.

use std::sync::Arc;
use std::time::Duration;

use facetrack_kernel::ControlState;
use facetrack_types::TargetPosition;
use tracing::{debug, info};

use crate::periodic::{Shutdown, next_tick, ticker};

pub struct IdleRecenter {
    state: Arc<ControlState>,
    interval: Duration,
    last_seen: TargetPosition,
}

impl IdleRecenter {
    /// The first window starts now, against the target as it is now.
    pub fn new(state: Arc<ControlState>, interval: Duration) -> Self {
        let last_seen = state.target();
        state.take_nod_activity();
        Self {
            state,
            interval,
            last_seen,
        }
    }

    /// Run one comparison.  Returns `true` if the target was recentered.
    pub fn tick(&mut self) -> bool {
        let nodding = self.state.take_nod_activity();
        let last_seen = self.last_seen;
        let center = self.state.bounds().center();
        let mut recentered = false;

        // Compare and reset under one lock so a concurrent smoother update
        // cannot slip in between.
        let current = self.state.update_target(|current| {
            if current == last_seen && !nodding {
                recentered = true;
                center
            } else {
                current
            }
        });

        if recentered {
            info!(from = ?last_seen, to = ?center, "target idle; recentering");
        } else {
            debug!(position = ?current, nodding, "target active; remembering");
            self.last_seen = current;
        }
        recentered
    }

    pub async fn run(mut self, mut shutdown: Shutdown) {
        let mut ticker = ticker(self.interval);
        while next_tick(&mut ticker, &mut shutdown).await {
            self.tick();
        }
        debug!("idle recenter task stopped");
    }
}
