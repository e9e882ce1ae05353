//! [`HttpActuator`] – client for the head motor server.
//!
//! The motor server exposes two `GET` endpoints:
//!
//! | Command | Path |
//! |---|---|
//! | move | `/takubo/pose/{x}/{y}/{speed}` |
//! | preset | `/takubo/preset/{name}` |
//!
//! A command succeeded only when the server answers `200 OK` with the literal
//! body `OK`.  Every other outcome is an [`FaceTrackError::Actuator`].

use std::time::Duration;

use async_trait::async_trait;
use facetrack_types::{FaceTrackError, TargetPosition};
use tracing::debug;

use crate::actuator::Actuator;

/// Literal response body the motor server sends on success.
const ACK_BODY: &str = "OK";

/// Async HTTP driver for the motor server.
///
/// Construct once and share behind an `Arc`; the inner `reqwest::Client`
/// pools connections across the tracking, nod, and sequencer tasks.
pub struct HttpActuator {
    base_url: String,
    client: reqwest::Client,
}

impl HttpActuator {
    /// Create a driver for the motor server at `base_url`
    /// (e.g. `"http://localhost:8001"`).
    ///
    /// `request_timeout` bounds every individual command.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, FaceTrackError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FaceTrackError::Config(format!("failed to build actuator client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn pose_path(target: TargetPosition, speed: i32) -> String {
        format!("/takubo/pose/{}/{}/{}", target.x, target.y, speed)
    }

    fn preset_path(name: &str) -> String {
        format!("/takubo/preset/{}", urlencoding::encode(name))
    }

    async fn send(&self, path: &str) -> Result<(), FaceTrackError> {
        let url = format!("{}{}", self.base_url, path);
        let fail = |details: String| FaceTrackError::Actuator {
            command: path.to_string(),
            details,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| fail(e.to_string()))?;

        if status != reqwest::StatusCode::OK || body != ACK_BODY {
            return Err(fail(format!("status {status}, body {body:?}")));
        }
        debug!(%url, "actuator acknowledged");
        Ok(())
    }
}

#[async_trait]
impl Actuator for HttpActuator {
    async fn move_to(&self, target: TargetPosition, speed: i32) -> Result<(), FaceTrackError> {
        self.send(&Self::pose_path(target, speed)).await
    }

    async fn trigger_preset(&self, name: &str) -> Result<(), FaceTrackError> {
        self.send(&Self::preset_path(name)).await
    }
}
