//! `facetrack-runtime` – the controller's concurrent tasks.
//!
//! # Modules
//!
//! - [`controller`] – [`Controller`][controller::Controller]: builds the
//!   shared [`ControlState`][facetrack_kernel::ControlState], spawns every
//!   periodic task and hands out
//!   [`ControllerHandle`][controller::ControllerHandle]s to the HTTP layer.
//! - [`tracking_loop`] – streams the target to the motor while tracking.
//! - [`nod_loop`] – triggers the `nod` preset while the nod flag is set.
//! - [`idle_recenter`] – recenters a target that stopped moving.
//! - [`vision_poller`] – pulls face positions from a
//!   [`VisionSource`][facetrack_hal::VisionSource] while tracking.
//! - [`sequencer`] – [`PoseSequencer`][sequencer::PoseSequencer]: runs timed
//!   pose sequences, fire-and-forget.
//! - [`config`] – [`RuntimeConfig`][config::RuntimeConfig]: intervals and
//!   tuning.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console and
//!   optional OTLP tracing setup.
//!
//! Every periodic task stops when the controller's shutdown channel flips;
//! none of them terminates because of an actuator or vision failure.

pub mod config;
pub mod controller;
pub mod idle_recenter;
pub mod nod_loop;
pub mod periodic;
pub mod sequencer;
pub mod telemetry;
pub mod tracking_loop;
pub mod vision_poller;

pub use config::RuntimeConfig;
pub use controller::{Controller, ControllerHandle};
pub use periodic::Shutdown;
pub use sequencer::{PoseSequencer, SequenceRun, SequencerPhase, SequencerTiming};
pub use telemetry::{TelemetrySettings, TracerProviderGuard, init_tracing};
