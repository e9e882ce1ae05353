//! `facetrack-hal` – the controller's outside world.
//!
//! # Modules
//!
//! - [`actuator`] – [`Actuator`][actuator::Actuator]: the motor server
//!   collaborator (absolute moves and named presets).
//! - [`http_actuator`] – [`HttpActuator`][http_actuator::HttpActuator]: the
//!   `reqwest` driver for the motor server's `/takubo/*` endpoints.
//! - [`vision`] – [`VisionSource`][vision::VisionSource] and
//!   [`HttpVisionSource`][vision::HttpVisionSource]: where the face is, with a
//!   centered fallback on failure.
//! - [`sim`] – recording / scripted doubles for headless runs and tests.

pub mod actuator;
pub mod http_actuator;
pub mod sim;
pub mod vision;

pub use actuator::{Actuator, DEFAULT_SPEED};
pub use http_actuator::HttpActuator;
pub use sim::{ActuatorCommand, RecordedCall, RecordingActuator, ScriptedVision};
pub use vision::{HttpVisionSource, VisionSource};
