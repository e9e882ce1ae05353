//! Generic `Actuator` trait for the pan/tilt head motor server.
//!
//! The controller only ever talks to the trait, so the HTTP driver in
//! [`http_actuator`][crate::http_actuator] and the simulated driver in
//! [`sim`][crate::sim] are interchangeable.

use async_trait::async_trait;
use facetrack_types::{FaceTrackError, TargetPosition};

/// Speed argument meaning "let the motor server pick its default speed".
pub const DEFAULT_SPEED: i32 = -1;

/// The motor actuator collaborator.
///
/// Both commands are request/response: `Ok(())` means the motor server
/// acknowledged the command.
#[async_trait]
pub trait Actuator: Send + Sync {
    /// Move the head to an absolute position.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Actuator`] when the command could not be
    /// delivered or was not acknowledged.
    async fn move_to(&self, target: TargetPosition, speed: i32) -> Result<(), FaceTrackError>;

    /// Trigger a pre-programmed gesture by name (e.g. `"nod"`).
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Actuator`] when the command could not be
    /// delivered or was not acknowledged.
    async fn trigger_preset(&self, name: &str) -> Result<(), FaceTrackError>;
}
