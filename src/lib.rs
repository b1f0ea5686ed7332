// SPDX-License-Identifier: GPL-3.0-only

//! Robot Brain - gesture-driven camera and audio demo for RDK X3 class boards
//!
//! A camera feeds a hand landmark detector; two gestures trigger canned audio
//! responses through the board's sound card.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera (MIPI / V4L2) and audio (`tinyalsa`) access
//! - [`detection`]: Hand landmark detector and gesture predicates
//! - [`brain`]: The per-frame control loop
//! - [`config`]: User configuration handling
//! - [`selftest`]: Hardware smoke test behind `robot-brain selftest`
//!
//! # Example
//!
//! ```ignore
//! use robot_brain::{Config, RobotBrain, StopSignal};
//!
//! let config = Config::load()?;
//! let mut brain = RobotBrain::new(&config)?;
//! brain.run(Some(std::time::Duration::from_secs(60)), &StopSignal::install_ctrlc()?)?;
//! ```

pub mod backends;
pub mod brain;
pub mod config;
pub mod constants;
pub mod detection;
pub mod errors;
pub mod selftest;
pub mod storage;

// Re-export commonly used types
pub use backends::audio::{Audio, AudioBackend};
pub use backends::camera::{BgrFrame, Camera, CameraBackend, CameraBackendType, CameraFormat};
pub use brain::{RobotBrain, RunSummary, StopSignal};
pub use config::Config;
pub use detection::{Gesture, GestureClassifier, HandLandmarks, LandmarkDetector};
pub use errors::{AppError, AppResult};
