//! [`NodLoop`] – periodic `nod` gesture while the nod flag is set.
//!
//! Independent of tracking: it reads only the nod flag and never touches
//! the target or the tracking flag.

use std::sync::Arc;
use std::time::Duration;

use facetrack_hal::Actuator;
use facetrack_kernel::ControlState;
use facetrack_types::NOD_PRESET;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::periodic::{Shutdown, next_tick, ticker};

pub struct NodLoop {
    state: Arc<ControlState>,
    actuator: Arc<dyn Actuator>,
    interval: Duration,
}

impl NodLoop {
    pub fn new(state: Arc<ControlState>, actuator: Arc<dyn Actuator>, interval: Duration) -> Self {
        Self {
            state,
            actuator,
            interval,
        }
    }

    /// Fire one detached `nod` preset if nodding is enabled.
    pub fn tick(&self) -> Option<JoinHandle<()>> {
        if !self.state.nod_enabled() {
            return None;
        }
        let actuator = Arc::clone(&self.actuator);
        Some(tokio::spawn(async move {
            match actuator.trigger_preset(NOD_PRESET).await {
                Ok(()) => debug!("nod sent"),
                Err(e) => warn!(error = %e, "nod failed"),
            }
        }))
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = ticker(self.interval);
        while next_tick(&mut ticker, &mut shutdown).await {
            self.tick();
        }
        debug!("nod loop stopped");
    }
}
