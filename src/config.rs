// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Read from `$XDG_CONFIG_HOME/robot-brain/config.toml`. Every field is
//! optional; anything left out falls back to the hardware defaults in
//! [`crate::constants`].

use crate::backends::camera::{CameraBackendType, CameraFormat};
use crate::constants;
use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Directory name under the user's config dir
const CONFIG_DIR_NAME: &str = "robot-brain";

/// Config file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Camera settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Backend selection (auto, mipi, v4l2)
    pub backend: CameraBackendType,
    /// Sensor index
    pub index: i32,
    /// Capture width
    pub width: u32,
    /// Capture height
    pub height: u32,
    /// Capture frame rate
    pub fps: u32,
    /// Stop the display manager and kill stale camera processes before opening
    pub cleanup_conflicts: bool,
    /// Prefix the cleanup commands with `sudo`
    pub use_sudo: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            backend: CameraBackendType::default(),
            index: constants::camera::CAMERA_INDEX,
            width: constants::camera::WIDTH,
            height: constants::camera::HEIGHT,
            fps: constants::camera::FPS,
            cleanup_conflicts: true,
            use_sudo: true,
        }
    }
}

impl CameraConfig {
    /// Capture format requested from the backend
    pub fn format(&self) -> CameraFormat {
        CameraFormat::new(self.width, self.height, self.fps)
    }
}

/// Sound card settings for `tinyplay` / `tinycap`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub card: u32,
    pub device_rec: u32,
    pub device_play: u32,
    pub channels: u32,
    pub rate: u32,
    pub bits: u32,
    pub fragments: u32,
    pub fragment_size: u32,
    /// Prefix every tool invocation with `sudo`
    pub use_sudo: bool,
    /// Kill processes holding `/dev/snd/*` before each use
    pub cleanup_conflicts: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            card: constants::audio::CARD,
            device_rec: constants::audio::DEVICE_REC,
            device_play: constants::audio::DEVICE_PLAY,
            channels: constants::audio::CHANNELS,
            rate: constants::audio::RATE,
            bits: constants::audio::BITS,
            fragments: constants::audio::FRAGMENTS,
            fragment_size: constants::audio::FRAGMENT_SIZE,
            use_sudo: true,
            cleanup_conflicts: true,
        }
    }
}

/// Gesture thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    pub pinch_threshold: f32,
    pub finger_extend_threshold: f32,
    pub palm_min_extended: usize,
    pub min_detection_confidence: f32,
    pub min_tracking_confidence: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_threshold: constants::gesture::PINCH_THRESHOLD,
            finger_extend_threshold: constants::gesture::FINGER_EXTEND_THRESHOLD,
            palm_min_extended: constants::gesture::PALM_MIN_EXTENDED,
            min_detection_confidence: constants::gesture::MIN_DETECTION_CONFIDENCE,
            min_tracking_confidence: constants::gesture::MIN_TRACKING_CONFIDENCE,
        }
    }
}

/// Control loop settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrainConfig {
    /// Seconds between two triggers of the same gesture
    pub cooldown_secs: f64,
    /// Frames between two FPS log lines
    pub fps_log_interval: u64,
    /// Played on pinch
    pub beep_file: PathBuf,
    /// Played when the beep fails
    pub welcome_file: PathBuf,
    /// Written on open palm
    pub recording_file: PathBuf,
    /// Palm recording length in seconds
    pub record_secs: u32,
    /// ONNX hand landmark model
    pub model_path: PathBuf,
}

impl Default for BrainConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: constants::timing::GESTURE_COOLDOWN.as_secs_f64(),
            fps_log_interval: constants::timing::FRAME_LOG_INTERVAL,
            beep_file: PathBuf::from(constants::files::BEEP_FILE),
            welcome_file: PathBuf::from(constants::files::WELCOME_FILE),
            recording_file: PathBuf::from(constants::files::USER_RECORDING),
            record_secs: constants::timing::PALM_RECORD_SECS,
            model_path: PathBuf::from(constants::files::LANDMARK_MODEL),
        }
    }
}

impl BrainConfig {
    /// Cooldown as a `Duration`
    ///
    /// Negative or NaN values clamp to zero, values too large for a
    /// `Duration` saturate.
    pub fn cooldown(&self) -> Duration {
        if self.cooldown_secs.is_nan() || self.cooldown_secs <= 0.0 {
            return Duration::ZERO;
        }
        Duration::try_from_secs_f64(self.cooldown_secs).unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub audio: AudioConfig,
    pub gesture: GestureConfig,
    pub brain: BrainConfig,
}

impl Config {
    /// Default location of the config file, if the platform has a config dir
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse a TOML document
    pub fn from_toml(content: &str) -> AppResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Serialize to TOML, used by `robot-brain config`
    pub fn to_toml(&self) -> AppResult<String> {
        toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))
    }
}
