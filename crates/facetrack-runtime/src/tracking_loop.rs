//! [`TrackingLoop`] – streams the target position to the motor.
//!
//! While tracking is enabled, every tick fires one detached `move_to` with
//! the current target.  The command runs on its own task so a slow motor
//! server never delays the next tick; failures are logged and dropped.

use std::sync::Arc;
use std::time::Duration;

use facetrack_hal::Actuator;
use facetrack_kernel::ControlState;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::periodic::{Shutdown, next_tick, ticker};

pub struct TrackingLoop {
    state: Arc<ControlState>,
    actuator: Arc<dyn Actuator>,
    interval: Duration,
    speed: i32,
}

impl TrackingLoop {
    pub fn new(
        state: Arc<ControlState>,
        actuator: Arc<dyn Actuator>,
        interval: Duration,
        speed: i32,
    ) -> Self {
        Self {
            state,
            actuator,
            interval,
            speed,
        }
    }

    /// Fire one move if tracking is enabled.  Returns the handle of the
    /// detached command, mainly for tests.
    pub fn tick(&self) -> Option<JoinHandle<()>> {
        if !self.state.tracking_enabled() {
            return None;
        }
        let target = self.state.target();
        let actuator = Arc::clone(&self.actuator);
        let speed = self.speed;
        Some(tokio::spawn(async move {
            match actuator.move_to(target, speed).await {
                Ok(()) => debug!(?target, "tracking move sent"),
                Err(e) => warn!(error = %e, ?target, "tracking move failed"),
            }
        }))
    }

    pub async fn run(self, mut shutdown: Shutdown) {
        let mut ticker = ticker(self.interval);
        while next_tick(&mut ticker, &mut shutdown).await {
            self.tick();
        }
        debug!("tracking loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facetrack_hal::RecordingActuator;
    use facetrack_types::{Bounds, TargetPosition};

    fn setup() -> (Arc<ControlState>, Arc<RecordingActuator>) {
        (
            Arc::new(ControlState::new(Bounds::NORMALIZED)),
            Arc::new(RecordingActuator::new()),
        )
    }

    #[tokio::test]
    async fn tick_does_nothing_while_disabled() {
        let (state, act) = setup();
        let tracking = TrackingLoop::new(state, act.clone(), Duration::from_millis(100), -1);
        assert!(tracking.tick().is_none());
        assert!(act.calls().is_empty());
    }

    #[tokio::test]
    async fn tick_sends_current_target() {
        let (state, act) = setup();
        state.set_tracking_enabled(true);
        state.set_target(TargetPosition::new(0.3, 0.6));
        let tracking = TrackingLoop::new(state, act.clone(), Duration::from_millis(100), -1);

        tracking.tick().unwrap().await.unwrap();
        assert_eq!(act.moves(), vec![TargetPosition::new(0.3, 0.6)]);
    }

    #[tokio::test]
    async fn failures_do_not_disable_tracking() {
        let (state, act) = setup();
        state.set_tracking_enabled(true);
        act.set_failing(true);
        let tracking =
            TrackingLoop::new(Arc::clone(&state), act.clone(), Duration::from_millis(100), -1);

        tracking.tick().unwrap().await.unwrap();
        tracking.tick().unwrap().await.unwrap();
        assert!(state.tracking_enabled());
        assert_eq!(act.moves().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_actuator_does_not_delay_ticks() {
        let (state, _) = setup();
        state.set_tracking_enabled(true);
        let act = Arc::new(RecordingActuator::new().with_latency(Duration::from_secs(10)));
        let (tx, rx) = tokio::sync::watch::channel(false);
        let handle = tokio::spawn(
            TrackingLoop::new(state, act.clone(), Duration::from_millis(100), -1).run(rx),
        );

        tokio::time::sleep(Duration::from_millis(1050)).await;
        // Ten ticks were issued even though none of them has completed yet.
        assert_eq!(act.calls().len(), 10);

        tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
