//! [`PoseSequencer`] – executes timed pose sequences.
//!
//! A sequence is a list of [`PoseInstruction`]s executed strictly in order.
//! Each step first writes the shared flags (`nod_enabled` from the
//! instruction, `tracking_enabled` iff the pose is `"track"`), waits a short
//! settle delay, and then either:
//!
//! * **tracking** – simply sleeps for the step's duration while the tracking
//!   loop streams moves, or
//! * **preset** – spawns a repeating sender that triggers the preset every
//!   `preset_repeat_interval`, sleeps for the step's duration, sends the
//!   sender a one-shot stop and joins it before moving on.
//!
//! Runs are fire-and-forget: [`PoseSequencer::dispatch`] returns a
//! [`SequenceRun`] immediately.  Runs are not serialised against each
//! other; whichever step wrote the flags last wins.  The flags keep the
//! values of the final step after a run completes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use facetrack_hal::Actuator;
use facetrack_kernel::ControlState;
use facetrack_types::{PoseInstruction, PoseSequence};
use tokio::sync::{oneshot, watch};
use tokio::task::{AbortHandle, JoinError, JoinHandle};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

/// Where a run currently is.  `step` is the zero-based instruction index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPhase {
    /// Dispatched, first step not yet started.
    Idle,
    /// Flags written, waiting out the settle delay.
    Waiting { step: usize },
    /// Holding a `track` step.
    Tracking { step: usize },
    /// Re-triggering a preset until the step's duration elapses.
    PresetLooping { step: usize },
    /// Every step has run.
    Done,
}

/// Timing knobs of the sequencer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequencerTiming {
    pub settle_delay: Duration,
    pub preset_repeat_interval: Duration,
}

impl Default for SequencerTiming {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_micros(500),
            preset_repeat_interval: Duration::from_millis(100),
        }
    }
}

/// In-flight runs; the handle is `None` until the task has been spawned.
type Registry = Arc<Mutex<HashMap<Uuid, Option<AbortHandle>>>>;

/// Dispatches [`PoseSequence`]s onto background tasks.
///
/// Cheap to clone; clones share the state, the actuator and the registry of
/// in-flight runs.
#[derive(Clone)]
pub struct PoseSequencer {
    state: Arc<ControlState>,
    actuator: Arc<dyn Actuator>,
    timing: SequencerTiming,
    active: Registry,
}

impl PoseSequencer {
    pub fn new(
        state: Arc<ControlState>,
        actuator: Arc<dyn Actuator>,
        timing: SequencerTiming,
    ) -> Self {
        Self {
            state,
            actuator,
            timing,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start executing `sequence` in the background and return at once.
    pub fn dispatch(&self, sequence: PoseSequence) -> SequenceRun {
        let id = Uuid::new_v4();
        let (phase_tx, phase_rx) = watch::channel(SequencerPhase::Idle);
        let span = info_span!("sequence", run_id = %id, steps = sequence.len());
        let this = self.clone();

        // Reserve the slot first; a run that finishes before the handle is
        // filled in removes the slot and is not re-registered.
        lock(&self.active).insert(id, None);
        let registration = Registration {
            active: Arc::clone(&self.active),
            id,
        };
        let handle = tokio::spawn(
            async move {
                let _registration = registration;
                this.execute(sequence, &phase_tx).await;
            }
            .instrument(span),
        );
        if let Some(slot) = lock(&self.active).get_mut(&id) {
            *slot = Some(handle.abort_handle());
        }

        SequenceRun {
            id,
            phase: phase_rx,
            handle,
        }
    }

    /// Number of runs that have been dispatched and not yet finished or
    /// aborted.
    pub fn active_runs(&self) -> usize {
        lock(&self.active).len()
    }

    /// Abort every in-flight run.  Their preset senders stop as well; the
    /// flags keep whatever value they had.
    pub fn abort_all(&self) {
        let runs: Vec<(Uuid, Option<AbortHandle>)> = lock(&self.active).drain().collect();
        for (id, handle) in runs {
            debug!(run_id = %id, "aborting sequence");
            if let Some(handle) = handle {
                handle.abort();
            }
        }
    }

    async fn execute(&self, sequence: PoseSequence, phase: &watch::Sender<SequencerPhase>) {
        info!("sequence started");
        for (step, instruction) in sequence.instructions().iter().enumerate() {
            self.run_step(step, instruction, phase).await;
        }
        phase.send_replace(SequencerPhase::Done);
        info!("sequence finished");
    }

    async fn run_step(
        &self,
        step: usize,
        instruction: &PoseInstruction,
        phase: &watch::Sender<SequencerPhase>,
    ) {
        let tracking = instruction.is_tracking();
        phase.send_replace(SequencerPhase::Waiting { step });
        self.state.set_nod_enabled(instruction.nod_flag);
        self.state.set_tracking_enabled(tracking);
        info!(
            step,
            pose = %instruction.pose,
            do_time = instruction.do_time,
            nod = instruction.nod_flag,
            "step started"
        );

        tokio::time::sleep(self.timing.settle_delay).await;
        let duration = instruction.duration();

        if tracking {
            phase.send_replace(SequencerPhase::Tracking { step });
            tokio::time::sleep(duration).await;
            return;
        }

        phase.send_replace(SequencerPhase::PresetLooping { step });
        let (stop_tx, stop_rx) = oneshot::channel();
        let sender = tokio::spawn(
            repeat_preset(
                Arc::clone(&self.actuator),
                instruction.pose.clone(),
                self.timing.preset_repeat_interval,
                stop_rx,
            )
            .in_current_span(),
        );

        tokio::time::sleep(duration).await;
        let _ = stop_tx.send(());
        match sender.await {
            Ok(sent) => debug!(step, sent, "preset sender stopped"),
            Err(e) => warn!(step, error = %e, "preset sender did not stop cleanly"),
        }
    }
}

/// Removes a run from the registry when its task completes or is aborted.
struct Registration {
    active: Registry,
    id: Uuid,
}

impl Drop for Registration {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.id);
    }
}

/// Trigger `name` every `interval` until `stop` fires or its sender is
/// dropped.  The stop is honoured while a trigger is in flight too, so a
/// hung actuator call never delays it.  Returns the number of triggers that
/// completed.
async fn repeat_preset(
    actuator: Arc<dyn Actuator>,
    name: String,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
) -> usize {
    let mut sent = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            result = actuator.trigger_preset(&name) => {
                sent += 1;
                if let Err(e) = result {
                    warn!(preset = %name, error = %e, "preset trigger failed");
                }
            }
        }
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    sent
}

/// Handle to one dispatched sequence.  Dropping it detaches the run.
pub struct SequenceRun {
    id: Uuid,
    phase: watch::Receiver<SequencerPhase>,
    handle: JoinHandle<()>,
}

impl SequenceRun {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The phase the run is in right now.
    pub fn phase(&self) -> SequencerPhase {
        *self.phase.borrow()
    }

    /// A receiver that observes every phase change.
    pub fn subscribe(&self) -> watch::Receiver<SequencerPhase> {
        self.phase.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Wait for the run to complete.
    ///
    /// # Errors
    ///
    /// Returns the [`JoinError`] if the run was aborted or panicked.
    pub async fn wait(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking_loop::TrackingLoop;
    use facetrack_hal::{ActuatorCommand, RecordingActuator};
    use facetrack_types::Bounds;
    use tokio::time::{Instant, sleep};

    fn setup() -> (Arc<ControlState>, Arc<RecordingActuator>, PoseSequencer) {
        let state = Arc::new(ControlState::new(Bounds::NORMALIZED));
        let act = Arc::new(RecordingActuator::new());
        let seq = PoseSequencer::new(
            Arc::clone(&state),
            act.clone(),
            SequencerTiming::default(),
        );
        (state, act, seq)
    }

    fn sequence(steps: &[(&str, f64, bool)]) -> PoseSequence {
        PoseSequence::new(
            steps
                .iter()
                .map(|(pose, secs, nod)| PoseInstruction::new(*pose, *secs, *nod))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn preset_then_track_scenario() {
        let (state, act, seq) = setup();
        let (stop_tx, stop_rx) = watch::channel(false);
        let tracking = tokio::spawn(
            TrackingLoop::new(
                Arc::clone(&state),
                act.clone(),
                Duration::from_millis(100),
                -1,
            )
            .run(stop_rx),
        );

        let start = Instant::now();
        let run = seq.dispatch(sequence(&[("A", 1.0, false), ("track", 2.0, true)]));

        sleep(Duration::from_millis(500)).await;
        assert!(!state.tracking_enabled());
        assert!(!state.nod_enabled());
        assert_eq!(run.phase(), SequencerPhase::PresetLooping { step: 0 });

        sleep(Duration::from_millis(1000)).await;
        assert!(state.tracking_enabled());
        assert!(state.nod_enabled());
        assert_eq!(run.phase(), SequencerPhase::Tracking { step: 1 });

        let phase = run.subscribe();
        run.wait().await.unwrap();
        assert_eq!(*phase.borrow(), SequencerPhase::Done);
        // No implicit reset at the end of a run.
        assert!(state.tracking_enabled());
        assert!(state.nod_enabled());

        stop_tx.send(true).unwrap();
        tracking.await.unwrap();

        let presets = act.preset_times("A");
        assert!((9..=11).contains(&presets.len()), "got {}", presets.len());
        // The settle delay comes first; the timer rounds it up to a millisecond.
        let first = presets[0] - start;
        assert!(first >= SequencerTiming::default().settle_delay, "first preset at {first:?}");
        assert!(first <= Duration::from_millis(1), "first preset at {first:?}");
        for pair in presets.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(100));
        }
        let last_preset = *presets.last().unwrap();
        assert!(last_preset - start <= Duration::from_millis(1_001));

        let moves: Vec<Instant> = act
            .calls()
            .into_iter()
            .filter(|c| matches!(c.command, ActuatorCommand::Move { .. }))
            .map(|c| c.at)
            .collect();
        assert!(moves.len() > 15, "got {} moves", moves.len());
        assert!(moves.iter().all(|at| *at > last_preset));
    }

    #[tokio::test(start_paused = true)]
    async fn dispatch_returns_before_any_step_runs() {
        let (state, act, seq) = setup();
        let run = seq.dispatch(sequence(&[("wave", 1.0, true)]));
        assert_eq!(run.phase(), SequencerPhase::Idle);
        assert!(!state.nod_enabled());
        assert!(act.calls().is_empty());
        run.wait().await.unwrap();
        assert!(state.nod_enabled());
        assert!(!state.tracking_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_sequence_finishes_without_touching_flags() {
        let (state, act, seq) = setup();
        state.set_tracking_enabled(true);
        let run = seq.dispatch(PoseSequence::default());
        let phase = run.subscribe();
        run.wait().await.unwrap();
        assert_eq!(*phase.borrow(), SequencerPhase::Done);
        assert!(state.tracking_enabled());
        assert!(act.calls().is_empty());
        assert_eq!(seq.active_runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_preset_keeps_repeating() {
        let (_, act, seq) = setup();
        act.set_failing(true);
        seq.dispatch(sequence(&[("A", 0.35, false)]))
            .wait()
            .await
            .unwrap();
        // Triggers at 1, 101, 201 and 301 ms; stopped at 351 ms.
        assert_eq!(act.preset_count("A"), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_duration_step_completes() {
        let (state, act, seq) = setup();
        seq.dispatch(sequence(&[("A", 0.0, true), ("track", 0.0, false)]))
            .wait()
            .await
            .unwrap();
        assert!(act.preset_count("A") <= 1);
        assert!(state.tracking_enabled());
        assert!(!state.nod_enabled());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_not_delayed_by_a_hung_actuator() {
        let state = Arc::new(ControlState::new(Bounds::NORMALIZED));
        let act = Arc::new(RecordingActuator::new().with_latency(Duration::from_secs(10)));
        let seq = PoseSequencer::new(state, act.clone(), SequencerTiming::default());

        let start = Instant::now();
        seq.dispatch(sequence(&[("A", 1.0, false)]))
            .wait()
            .await
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(act.preset_count("A"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn last_writer_wins_across_runs() {
        let (state, _, seq) = setup();
        let first = seq.dispatch(sequence(&[("track", 5.0, true)]));
        sleep(Duration::from_secs(1)).await;
        assert!(state.tracking_enabled());

        let second = seq.dispatch(sequence(&[("B", 1.0, false)]));
        sleep(Duration::from_millis(500)).await;
        assert!(!state.tracking_enabled());
        assert!(!state.nod_enabled());
        assert_eq!(seq.active_runs(), 2);

        second.wait().await.unwrap();
        assert!(!first.is_finished());
        assert!(!state.tracking_enabled());
        first.wait().await.unwrap();
        assert_eq!(seq.active_runs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn abort_all_stops_preset_senders() {
        let (_, act, seq) = setup();
        let run = seq.dispatch(sequence(&[("A", 10.0, false)]));
        sleep(Duration::from_millis(250)).await;
        assert_eq!(act.preset_count("A"), 3);

        seq.abort_all();
        assert_eq!(seq.active_runs(), 0);
        assert!(run.wait().await.unwrap_err().is_cancelled());

        sleep(Duration::from_secs(1)).await;
        assert_eq!(act.preset_count("A"), 3);
    }
}
