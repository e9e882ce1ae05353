//! `facetrack-types` – shared data model and the workspace error type.
//!
//! Plain data only: positions, bounds, control flags, pose instructions and
//! [`FaceTrackError`].  No I/O and no async.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pose name reserved for "follow the face" instead of a motor preset.
pub const TRACK_POSE: &str = "track";

/// Preset fired periodically by the nod loop.
pub const NOD_PRESET: &str = "nod";

/// A face position as reported by the vision source, normalised to `[0, 1]²`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawFacePosition {
    pub x: f64,
    pub y: f64,
}

impl RawFacePosition {
    /// Image center; used whenever the vision source cannot be read.
    pub const CENTER: RawFacePosition = RawFacePosition { x: 0.5, y: 0.5 };

    /// Validate and build a raw position.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::InvalidPosition`] if either coordinate is
    /// non-finite or outside `[0, 1]`.
    pub fn new(x: f64, y: f64) -> Result<Self, FaceTrackError> {
        for (axis, v) in [("x", x), ("y", y)] {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(FaceTrackError::InvalidPosition(format!(
                    "{axis}={v} is outside [0, 1]"
                )));
            }
        }
        Ok(Self { x, y })
    }
}

/// Where the head should aim, in controller coordinates bounded by [`Bounds`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetPosition {
    pub x: f64,
    pub y: f64,
}

impl TargetPosition {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Upper limits of the target coordinate space; the lower limit is always 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    /// The normalised space `[0, 1]²` understood by the motor server.
    pub const NORMALIZED: Bounds = Bounds {
        max_x: 1.0,
        max_y: 1.0,
    };

    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] unless both limits are finite and
    /// strictly positive.
    pub fn new(max_x: f64, max_y: f64) -> Result<Self, FaceTrackError> {
        if !(max_x.is_finite() && max_x > 0.0 && max_y.is_finite() && max_y > 0.0) {
            return Err(FaceTrackError::Config(format!(
                "bounds must be positive, got max_x={max_x}, max_y={max_y}"
            )));
        }
        Ok(Self { max_x, max_y })
    }

    pub fn center(&self) -> TargetPosition {
        TargetPosition::new(self.max_x / 2.0, self.max_y / 2.0)
    }

    pub fn clamp(&self, p: TargetPosition) -> TargetPosition {
        TargetPosition::new(p.x.clamp(0.0, self.max_x), p.y.clamp(0.0, self.max_y))
    }

    pub fn contains(&self, p: TargetPosition) -> bool {
        (0.0..=self.max_x).contains(&p.x) && (0.0..=self.max_y).contains(&p.y)
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::NORMALIZED
    }
}

/// Point-in-time copy of the two shared control flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlags {
    pub tracking_enabled: bool,
    pub nod_enabled: bool,
}

/// One timed step of a pose sequence.
///
/// `pose == "track"` enables face tracking for `do_time` seconds; any other
/// name is a motor preset that is re-triggered for `do_time` seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseInstruction {
    pub pose: String,
    pub do_time: f64,
    #[serde(default)]
    pub nod_flag: bool,
}

impl PoseInstruction {
    pub fn new(pose: impl Into<String>, do_time: f64, nod_flag: bool) -> Self {
        Self {
            pose: pose.into(),
            do_time,
            nod_flag,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.pose == TRACK_POSE
    }

    /// `do_time` as a [`Duration`]; fractional seconds are kept.  Values too
    /// large for a `Duration` saturate to [`Duration::MAX`].
    pub fn duration(&self) -> Duration {
        if self.do_time <= 0.0 || self.do_time.is_nan() {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.do_time).unwrap_or(Duration::MAX)
    }

    fn validate(&self, index: usize) -> Result<(), FaceTrackError> {
        if self.pose.is_empty() {
            return Err(FaceTrackError::InvalidSequence(format!(
                "instruction {index}: pose name is empty"
            )));
        }
        if !self.do_time.is_finite() || self.do_time < 0.0 {
            return Err(FaceTrackError::InvalidSequence(format!(
                "instruction {index}: do_time must be a non-negative number of seconds, got {}",
                self.do_time
            )));
        }
        Ok(())
    }
}

/// An ordered list of pose instructions received in a single request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoseSequence(pub Vec<PoseInstruction>);

impl PoseSequence {
    /// Build a sequence, validating every instruction.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::InvalidSequence`] for an empty pose name or a
    /// negative / non-finite `do_time`.
    pub fn new(instructions: Vec<PoseInstruction>) -> Result<Self, FaceTrackError> {
        for (i, instruction) in instructions.iter().enumerate() {
            instruction.validate(i)?;
        }
        Ok(Self(instructions))
    }

    /// Parse a request body.  Anything other than a JSON array of instruction
    /// objects is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::InvalidSequence`] when the body does not parse
    /// or an instruction fails validation.
    pub fn from_json(body: &[u8]) -> Result<Self, FaceTrackError> {
        let instructions: Vec<PoseInstruction> = serde_json::from_slice(body)
            .map_err(|e| FaceTrackError::InvalidSequence(e.to_string()))?;
        Self::new(instructions)
    }

    pub fn instructions(&self) -> &[PoseInstruction] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Workspace-wide error type.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaceTrackError {
    #[error("Invalid pose sequence: {0}")]
    InvalidSequence(String),

    #[error("Invalid face position: {0}")]
    InvalidPosition(String),

    #[error("Actuator command {command} failed: {details}")]
    Actuator { command: String, details: String },

    #[error("Vision source error: {0}")]
    Vision(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Server error: {0}")]
    Server(String),
}
