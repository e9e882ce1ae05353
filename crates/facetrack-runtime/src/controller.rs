//! [`Controller`] – owns the shared state and supervises the periodic tasks.
//!
//! [`Controller::start`] builds the [`ControlState`], spawns the idle
//! recenter, tracking, nod and (optional) vision polling tasks, and hands out
//! cloneable [`ControllerHandle`]s for the HTTP layer.
//! [`Controller::shutdown`] aborts in-flight sequences, signals every task to
//! stop and waits for them.

use std::sync::Arc;

use facetrack_hal::{Actuator, VisionSource};
use facetrack_kernel::{ControlState, PositionSmoother};
use facetrack_types::{ControlFlags, FaceTrackError, PoseSequence, RawFacePosition, TargetPosition};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::RuntimeConfig;
use crate::idle_recenter::IdleRecenter;
use crate::nod_loop::NodLoop;
use crate::sequencer::{PoseSequencer, SequenceRun, SequencerTiming};
use crate::tracking_loop::TrackingLoop;
use crate::vision_poller::VisionPoller;

/// The pieces of a running controller that request handlers need.
#[derive(Clone)]
pub struct ControllerHandle {
    state: Arc<ControlState>,
    smoother: PositionSmoother,
    sequencer: PoseSequencer,
}

impl ControllerHandle {
    pub fn state(&self) -> &Arc<ControlState> {
        &self.state
    }

    pub fn smoother(&self) -> &PositionSmoother {
        &self.smoother
    }

    pub fn sequencer(&self) -> &PoseSequencer {
        &self.sequencer
    }

    /// Feed one raw face report through the smoother and return the updated
    /// target.
    pub fn report_face(&self, raw: RawFacePosition) -> TargetPosition {
        self.smoother.apply(&self.state, raw)
    }

    pub fn dispatch(&self, sequence: PoseSequence) -> SequenceRun {
        self.sequencer.dispatch(sequence)
    }

    pub fn flags(&self) -> ControlFlags {
        self.state.flags()
    }

    pub fn target(&self) -> TargetPosition {
        self.state.target()
    }
}

pub struct Controller {
    handle: ControllerHandle,
    shutdown: watch::Sender<bool>,
    tasks: Vec<(&'static str, JoinHandle<()>)>,
}

impl Controller {
    /// Validate `config` and spawn the periodic tasks on the current tokio
    /// runtime.  The vision poller only runs when `vision` is given.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] if `config` fails validation.
    pub fn start(
        config: RuntimeConfig,
        actuator: Arc<dyn Actuator>,
        vision: Option<Arc<dyn VisionSource>>,
    ) -> Result<Self, FaceTrackError> {
        config.validate()?;

        let state = Arc::new(ControlState::new(config.bounds));
        let smoother = PositionSmoother::new(config.smoother, config.bounds);
        let sequencer = PoseSequencer::new(
            Arc::clone(&state),
            Arc::clone(&actuator),
            SequencerTiming {
                settle_delay: config.settle_delay,
                preset_repeat_interval: config.preset_repeat_interval,
            },
        );
        let (shutdown, rx) = watch::channel(false);

        let mut tasks = vec![
            (
                "idle_recenter",
                tokio::spawn(
                    IdleRecenter::new(Arc::clone(&state), config.idle_recenter_interval)
                        .run(rx.clone()),
                ),
            ),
            (
                "tracking",
                tokio::spawn(
                    TrackingLoop::new(
                        Arc::clone(&state),
                        Arc::clone(&actuator),
                        config.tracking_interval,
                        config.move_speed,
                    )
                    .run(rx.clone()),
                ),
            ),
            (
                "nod",
                tokio::spawn(
                    NodLoop::new(Arc::clone(&state), Arc::clone(&actuator), config.nod_interval)
                        .run(rx.clone()),
                ),
            ),
        ];
        if let Some(vision) = vision {
            tasks.push((
                "vision",
                tokio::spawn(
                    VisionPoller::new(
                        Arc::clone(&state),
                        vision,
                        smoother.clone(),
                        config.vision_poll_interval,
                    )
                    .run(rx),
                ),
            ));
        }

        info!(
            tasks = tasks.len(),
            tracking_us = config.tracking_interval.as_micros() as u64,
            nod_ms = config.nod_interval.as_millis() as u64,
            idle_recenter_s = config.idle_recenter_interval.as_secs(),
            "controller started"
        );

        Ok(Self {
            handle: ControllerHandle {
                state,
                smoother,
                sequencer,
            },
            shutdown,
            tasks,
        })
    }

    pub fn handle(&self) -> ControllerHandle {
        self.handle.clone()
    }

    /// Abort running sequences, stop every periodic task and wait for them.
    pub async fn shutdown(self) {
        self.handle.sequencer.abort_all();
        self.shutdown.send_replace(true);
        for (name, task) in self.tasks {
            if let Err(e) = task.await {
                warn!(task = name, error = %e, "controller task ended abnormally");
            }
        }
        info!("controller stopped");
    }
}
