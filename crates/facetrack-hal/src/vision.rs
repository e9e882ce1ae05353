//! Vision source: where the detected face currently is.
//!
//! [`HttpVisionSource`] polls a face-detection server at `GET {url}/face/`,
//! which answers with `{"x": f64, "y": f64}` normalised to `[0, 1]²`.

use std::time::Duration;

use async_trait::async_trait;
use facetrack_types::{FaceTrackError, RawFacePosition};
use serde::Deserialize;
use tracing::warn;

/// A face-position producer.
#[async_trait]
pub trait VisionSource: Send + Sync {
    /// Query the current face position.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Vision`] on transport or parse failure and
    /// [`FaceTrackError::InvalidPosition`] when the reported coordinates are
    /// outside `[0, 1]`.
    async fn face_position(&self) -> Result<RawFacePosition, FaceTrackError>;

    /// Like [`face_position`][Self::face_position], but any failure is logged
    /// and replaced by [`RawFacePosition::CENTER`].
    async fn face_position_or_center(&self) -> RawFacePosition {
        match self.face_position().await {
            Ok(pos) => pos,
            Err(e) => {
                warn!(error = %e, "vision query failed; falling back to center");
                RawFacePosition::CENTER
            }
        }
    }
}

#[derive(Deserialize)]
struct FacePayload {
    x: f64,
    y: f64,
}

/// HTTP client for the face-detection server.
pub struct HttpVisionSource {
    base_url: String,
    client: reqwest::Client,
}

impl HttpVisionSource {
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, request_timeout: Duration) -> Result<Self, FaceTrackError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| FaceTrackError::Config(format!("failed to build vision client: {e}")))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl VisionSource for HttpVisionSource {
    async fn face_position(&self) -> Result<RawFacePosition, FaceTrackError> {
        let url = format!("{}/face/", self.base_url);
        let payload: FacePayload = self
            .client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| FaceTrackError::Vision(e.to_string()))?
            .json()
            .await
            .map_err(|e| FaceTrackError::Vision(format!("bad face payload: {e}")))?;
        RawFacePosition::new(payload.x, payload.y)
    }
}
