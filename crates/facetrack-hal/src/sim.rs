//! In-process simulated collaborators for tests and `--dry-run` operation.
//!
//! [`RecordingActuator`] acknowledges (or rejects) every command and keeps a
//! timestamped history; [`ScriptedVision`] replays a queue of vision results.
//! Together they let the whole controller run headless without a motor or a
//! camera.
//!
//! # Example
//!
//! ```rust
//! use facetrack_hal::actuator::Actuator;
//! use facetrack_hal::sim::RecordingActuator;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let act = RecordingActuator::new();
//! act.trigger_preset("nod").await.unwrap();
//! assert_eq!(act.preset_count("nod"), 1);
//! # }
//! ```

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use facetrack_types::{FaceTrackError, RawFacePosition, TargetPosition};
use tokio::time::Instant;
use tracing::info;

use crate::actuator::Actuator;
use crate::vision::VisionSource;

// ────────────────────────────────────────────────────────────────────────────
// Recording actuator
// ────────────────────────────────────────────────────────────────────────────

/// A single command observed by a [`RecordingActuator`].
#[derive(Debug, Clone, PartialEq)]
pub enum ActuatorCommand {
    Move { target: TargetPosition, speed: i32 },
    Preset(String),
}

/// A command together with the (tokio) instant at which it was issued.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub at: Instant,
    pub command: ActuatorCommand,
}

/// A simulated actuator that records every command it receives.
///
/// By default every command succeeds immediately.  Use
/// [`set_failing`][Self::set_failing] to make commands fail and
/// [`with_latency`][Self::with_latency] to make each call take time.
#[derive(Default)]
pub struct RecordingActuator {
    history: Mutex<VecDeque<RecordedCall>>,
    history_limit: Option<usize>,
    failing: Mutex<bool>,
    latency: Duration,
    log_commands: bool,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only the most recent `limit` calls.  Used for long-running
    /// dry-run sessions.
    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Commands are recorded when issued, then take `latency` to complete.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Emit an `info!` line for every command.
    pub fn with_logging(mut self) -> Self {
        self.log_commands = true;
        self
    }

    /// Make subsequent commands fail (`true`) or succeed (`false`).
    /// Failed commands are still recorded.
    pub fn set_failing(&self, failing: bool) {
        *lock(&self.failing) = failing;
    }

    /// Snapshot of the recorded history, oldest first.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.history).iter().cloned().collect()
    }

    /// All recorded move targets, oldest first.
    pub fn moves(&self) -> Vec<TargetPosition> {
        lock(&self.history)
            .iter()
            .filter_map(|c| match c.command {
                ActuatorCommand::Move { target, .. } => Some(target),
                ActuatorCommand::Preset(_) => None,
            })
            .collect()
    }

    /// Instants at which preset `name` was triggered.
    pub fn preset_times(&self, name: &str) -> Vec<Instant> {
        lock(&self.history)
            .iter()
            .filter(|c| matches!(&c.command, ActuatorCommand::Preset(n) if n == name))
            .map(|c| c.at)
            .collect()
    }

    pub fn preset_count(&self, name: &str) -> usize {
        self.preset_times(name).len()
    }

    async fn record(&self, command: ActuatorCommand) -> Result<(), FaceTrackError> {
        if self.log_commands {
            info!(?command, "simulated actuator command");
        }
        let label = match &command {
            ActuatorCommand::Move { .. } => "move".to_string(),
            ActuatorCommand::Preset(name) => format!("preset/{name}"),
        };
        {
            let mut history = lock(&self.history);
            history.push_back(RecordedCall {
                at: Instant::now(),
                command,
            });
            if let Some(limit) = self.history_limit {
                while history.len() > limit {
                    history.pop_front();
                }
            }
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if *lock(&self.failing) {
            return Err(FaceTrackError::Actuator {
                command: label,
                details: "simulated failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Actuator for RecordingActuator {
    async fn move_to(&self, target: TargetPosition, speed: i32) -> Result<(), FaceTrackError> {
        self.record(ActuatorCommand::Move { target, speed }).await
    }

    async fn trigger_preset(&self, name: &str) -> Result<(), FaceTrackError> {
        self.record(ActuatorCommand::Preset(name.to_string())).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted vision
// ────────────────────────────────────────────────────────────────────────────

/// A simulated vision source that replays queued results, then repeats a
/// fallback result forever.
pub struct ScriptedVision {
    script: Mutex<VecDeque<Result<RawFacePosition, FaceTrackError>>>,
    fallback: Result<RawFacePosition, FaceTrackError>,
    queries: Mutex<usize>,
}

impl ScriptedVision {
    /// A source that always reports a face at the image center.
    pub fn centered() -> Self {
        Self::always(Ok(RawFacePosition::CENTER))
    }

    /// A source that answers every query with `result`.
    pub fn always(result: Result<RawFacePosition, FaceTrackError>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: result,
            queries: Mutex::new(0),
        }
    }

    /// Queue a result to be returned before the fallback.
    pub fn push(&self, result: Result<RawFacePosition, FaceTrackError>) {
        lock(&self.script).push_back(result);
    }

    /// Number of queries answered so far.
    pub fn query_count(&self) -> usize {
        *lock(&self.queries)
    }
}

#[async_trait]
impl VisionSource for ScriptedVision {
    async fn face_position(&self) -> Result<RawFacePosition, FaceTrackError> {
        *lock(&self.queries) += 1;
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_actuator_records_in_order() {
        let act = RecordingActuator::new();
        act.move_to(TargetPosition::new(0.1, 0.2), -1).await.unwrap();
        act.trigger_preset("wave").await.unwrap();

        let calls = act.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[0].command,
            ActuatorCommand::Move {
                target: TargetPosition::new(0.1, 0.2),
                speed: -1
            }
        );
        assert_eq!(calls[1].command, ActuatorCommand::Preset("wave".into()));
        assert_eq!(act.moves(), vec![TargetPosition::new(0.1, 0.2)]);
        assert_eq!(act.preset_count("wave"), 1);
        assert_eq!(act.preset_count("nod"), 0);
    }

    #[tokio::test]
    async fn failing_actuator_still_records() {
        let act = RecordingActuator::new();
        act.set_failing(true);
        assert!(act.trigger_preset("nod").await.is_err());
        assert_eq!(act.preset_count("nod"), 1);

        act.set_failing(false);
        assert!(act.trigger_preset("nod").await.is_ok());
    }

    #[tokio::test]
    async fn history_limit_drops_oldest() {
        let act = RecordingActuator::new().with_history_limit(2);
        for name in ["a", "b", "c"] {
            act.trigger_preset(name).await.unwrap();
        }
        assert_eq!(act.preset_count("a"), 0);
        assert_eq!(act.calls().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn latency_delays_completion() {
        let act = RecordingActuator::new().with_latency(Duration::from_secs(5));
        let start = Instant::now();
        act.trigger_preset("slow").await.unwrap();
        assert!(start.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn scripted_vision_replays_then_falls_back() {
        let vision = ScriptedVision::centered();
        vision.push(Ok(RawFacePosition { x: 0.1, y: 0.9 }));
        vision.push(Err(FaceTrackError::Vision("camera unplugged".into())));

        assert_eq!(
            vision.face_position().await.unwrap(),
            RawFacePosition { x: 0.1, y: 0.9 }
        );
        assert_eq!(vision.face_position_or_center().await, RawFacePosition::CENTER);
        assert_eq!(vision.face_position().await.unwrap(), RawFacePosition::CENTER);
        assert_eq!(vision.query_count(), 3);
    }
}
