// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the robot brain

use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera-related errors
    Camera(CameraError),
    /// Audio tool errors
    Audio(AudioError),
    /// Landmark detector errors
    Detector(DetectorError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera-specific errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// Backend name not recognised
    UnknownBackend(String),
    /// Neither MIPI nor V4L2 could be opened
    NoBackendAvailable,
    /// A specific backend failed to open
    OpenFailed {
        backend: &'static str,
        reason: String,
    },
    /// Frame requested from a handle that was never opened or already closed
    NotInitialized,
    /// Buffer does not match the declared frame layout
    InvalidFrame(String),
    /// Pixel format the converters do not handle
    UnsupportedFormat(String),
}

/// Audio tool errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    /// The tool could not be started at all
    SpawnFailed { program: String, reason: String },
    /// `tinyplay` exited with a non-zero status
    PlaybackFailed(String),
    /// `tinycap` exited with a non-zero status
    RecordingFailed(String),
}

/// Landmark detector errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    /// Model file missing on disk
    ModelNotFound(String),
    /// Model could not be loaded by the runtime
    LoadFailed(String),
    /// Inference call failed
    InferenceFailed(String),
    /// Output tensor had an unexpected layout
    UnexpectedOutput(String),
    /// Crate was built without an inference runtime
    Unavailable,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Audio(e) => write!(f, "Audio error: {}", e),
            AppError::Detector(e) => write!(f, "Detector error: {}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::UnknownBackend(name) => write!(f, "Unknown backend: {}", name),
            CameraError::NoBackendAvailable => write!(f, "No camera backend could be opened"),
            CameraError::OpenFailed { backend, reason } => {
                write!(f, "Failed to open {} camera: {}", backend, reason)
            }
            CameraError::NotInitialized => write!(f, "Camera not initialized"),
            CameraError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            CameraError::UnsupportedFormat(msg) => write!(f, "Unsupported pixel format: {}", msg),
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioError::SpawnFailed { program, reason } => {
                write!(f, "Failed to run {}: {}", program, reason)
            }
            AudioError::PlaybackFailed(stderr) => write!(f, "Playback failed: {}", stderr),
            AudioError::RecordingFailed(stderr) => write!(f, "Recording failed: {}", stderr),
        }
    }
}

impl fmt::Display for DetectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectorError::ModelNotFound(path) => write!(f, "Landmark model not found: {}", path),
            DetectorError::LoadFailed(msg) => write!(f, "Failed to load landmark model: {}", msg),
            DetectorError::InferenceFailed(msg) => write!(f, "Inference failed: {}", msg),
            DetectorError::UnexpectedOutput(msg) => write!(f, "Unexpected model output: {}", msg),
            DetectorError::Unavailable => {
                write!(f, "Built without an inference runtime (enable the `onnx` feature)")
            }
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for AudioError {}
impl std::error::Error for DetectorError {}

// Conversions from sub-errors to AppError
impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<AudioError> for AppError {
    fn from(err: AudioError) -> Self {
        AppError::Audio(err)
    }
}

impl From<DetectorError> for AppError {
    fn from(err: DetectorError) -> Self {
        AppError::Detector(err)
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<image::ImageError> for AppError {
    fn from(err: image::ImageError) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
