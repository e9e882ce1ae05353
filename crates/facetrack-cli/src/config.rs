//! Configuration file – reads/writes `~/.facetrack/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use facetrack_hal::DEFAULT_SPEED;
use facetrack_kernel::SmootherConfig;
use facetrack_runtime::RuntimeConfig;
use facetrack_types::{Bounds, FaceTrackError};

/// Complete controller configuration.  Every field has a default, so an
/// empty or partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// HTTP port of the inbound interface.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Use the simulated actuator and vision source instead of HTTP.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub actuator: ActuatorSection,

    #[serde(default)]
    pub vision: VisionSection,

    #[serde(default)]
    pub bounds: BoundsSection,

    #[serde(default)]
    pub smoother: SmootherConfig,

    #[serde(default)]
    pub timing: TimingSection,
}

/// `[actuator]` – the motor server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActuatorSection {
    #[serde(default = "default_motor_url")]
    pub motor_url: String,
    /// Speed argument of every move; `-1` lets the motor server choose.
    #[serde(default = "default_move_speed")]
    pub move_speed: i32,
    #[serde(default = "default_actuator_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// `[vision]` – the face detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisionSection {
    #[serde(default = "default_vision_url")]
    pub vision_url: String,
    /// Poll the detector while tracking.  Off by default: positions then
    /// arrive only through `GET /face`.
    #[serde(default)]
    pub poll_enabled: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_vision_timeout_ms")]
    pub request_timeout_ms: u64,
}

/// `[bounds]` – upper limits of the target space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundsSection {
    #[serde(default = "default_max")]
    pub max_x: f64,
    #[serde(default = "default_max")]
    pub max_y: f64,
}

/// `[timing]` – periods of the controller tasks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingSection {
    /// Microseconds, so sub-millisecond tracking periods can be expressed.
    #[serde(default = "default_tracking_interval_us")]
    pub tracking_interval_us: u64,
    #[serde(default = "default_nod_interval_ms")]
    pub nod_interval_ms: u64,
    #[serde(default = "default_idle_recenter_interval_ms")]
    pub idle_recenter_interval_ms: u64,
    #[serde(default = "default_settle_delay_us")]
    pub settle_delay_us: u64,
    #[serde(default = "default_preset_repeat_interval_ms")]
    pub preset_repeat_interval_ms: u64,
}

fn default_listen_port() -> u16 {
    facetrack_cockpit::DEFAULT_PORT
}
fn default_motor_url() -> String {
    "http://localhost:8001".to_string()
}
fn default_move_speed() -> i32 {
    DEFAULT_SPEED
}
fn default_actuator_timeout_ms() -> u64 {
    2000
}
fn default_vision_url() -> String {
    "http://localhost:8002".to_string()
}
fn default_poll_interval_ms() -> u64 {
    100
}
fn default_vision_timeout_ms() -> u64 {
    1000
}
fn default_max() -> f64 {
    1.0
}
fn default_tracking_interval_us() -> u64 {
    100_000
}
fn default_nod_interval_ms() -> u64 {
    3000
}
fn default_idle_recenter_interval_ms() -> u64 {
    60_000
}
fn default_settle_delay_us() -> u64 {
    500
}
fn default_preset_repeat_interval_ms() -> u64 {
    100
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            dry_run: false,
            actuator: ActuatorSection::default(),
            vision: VisionSection::default(),
            bounds: BoundsSection::default(),
            smoother: SmootherConfig::default(),
            timing: TimingSection::default(),
        }
    }
}

impl Default for ActuatorSection {
    fn default() -> Self {
        Self {
            motor_url: default_motor_url(),
            move_speed: default_move_speed(),
            request_timeout_ms: default_actuator_timeout_ms(),
        }
    }
}

impl Default for VisionSection {
    fn default() -> Self {
        Self {
            vision_url: default_vision_url(),
            poll_enabled: false,
            poll_interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_vision_timeout_ms(),
        }
    }
}

impl Default for BoundsSection {
    fn default() -> Self {
        Self {
            max_x: default_max(),
            max_y: default_max(),
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            tracking_interval_us: default_tracking_interval_us(),
            nod_interval_ms: default_nod_interval_ms(),
            idle_recenter_interval_ms: default_idle_recenter_interval_ms(),
            settle_delay_us: default_settle_delay_us(),
            preset_repeat_interval_ms: default_preset_repeat_interval_ms(),
        }
    }
}

impl ActuatorSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl VisionSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Config {
    /// Reject values the controller cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] naming the first offending field.
    pub fn validate(&self) -> Result<(), FaceTrackError> {
        for (name, url) in [
            ("actuator.motor_url", &self.actuator.motor_url),
            ("vision.vision_url", &self.vision.vision_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(FaceTrackError::Config(format!(
                    "{name} must be an http(s) URL, got {url:?}"
                )));
            }
        }
        for (name, ms) in [
            ("actuator.request_timeout_ms", self.actuator.request_timeout_ms),
            ("vision.request_timeout_ms", self.vision.request_timeout_ms),
        ] {
            if ms == 0 {
                return Err(FaceTrackError::Config(format!("{name} must be non-zero")));
            }
        }
        self.runtime_config()?.validate()
    }

    /// Convert into the controller's runtime settings.
    ///
    /// # Errors
    ///
    /// Returns [`FaceTrackError::Config`] for invalid bounds.
    pub fn runtime_config(&self) -> Result<RuntimeConfig, FaceTrackError> {
        let t = &self.timing;
        Ok(RuntimeConfig {
            bounds: Bounds::new(self.bounds.max_x, self.bounds.max_y)?,
            smoother: self.smoother,
            move_speed: self.actuator.move_speed,
            tracking_interval: Duration::from_micros(t.tracking_interval_us),
            nod_interval: Duration::from_millis(t.nod_interval_ms),
            idle_recenter_interval: Duration::from_millis(t.idle_recenter_interval_ms),
            vision_poll_interval: Duration::from_millis(self.vision.poll_interval_ms),
            settle_delay: Duration::from_micros(t.settle_delay_us),
            preset_repeat_interval: Duration::from_millis(t.preset_repeat_interval_ms),
        })
    }
}

/// Return the path to `~/.facetrack/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".facetrack").join("config.toml")
}

/// Load `path` (defaults when it does not exist) and apply `FACETRACK_*`
/// environment overrides.
///
/// # Errors
///
/// Returns [`FaceTrackError::Config`] if the file exists but cannot be read
/// or parsed.
pub fn load(path: &Path) -> Result<Config, FaceTrackError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Load the file alone.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, FaceTrackError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path).map_err(|e| {
        FaceTrackError::Config(format!("failed to read {}: {e}", path.display()))
    })?;
    let cfg = toml::from_str(&raw).map_err(|e| {
        FaceTrackError::Config(format!("failed to parse {}: {e}", path.display()))
    })?;
    Ok(Some(cfg))
}

/// Apply `FACETRACK_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FACETRACK_MOTOR_URL` | `actuator.motor_url` |
/// | `FACETRACK_VISION_URL` | `vision.vision_url` |
/// | `FACETRACK_PORT` | `listen_port` (ignored unless a valid port) |
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut Config, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("FACETRACK_MOTOR_URL") {
        cfg.actuator.motor_url = v;
    }
    if let Some(v) = lookup("FACETRACK_VISION_URL") {
        cfg.vision.vision_url = v;
    }
    if let Some(v) = lookup("FACETRACK_PORT")
        && let Ok(port) = v.trim().parse::<u16>()
    {
        cfg.listen_port = port;
    }
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
///
/// # Errors
///
/// Returns [`FaceTrackError::Config`] on any I/O or serialisation failure.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), FaceTrackError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            FaceTrackError::Config(format!("failed to create {}: {e}", parent.display()))
        })?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700)).map_err(|e| {
                FaceTrackError::Config(format!("failed to restrict {}: {e}", parent.display()))
            })?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| FaceTrackError::Config(format!("failed to serialise config: {e}")))?;
    fs::write(path, raw).map_err(|e| {
        FaceTrackError::Config(format!("failed to write {}: {e}", path.display()))
    })
}
