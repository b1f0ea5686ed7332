// SPDX-License-Identifier: GPL-3.0-only

//! Hand landmark detection and gesture recognition
//!
//! Frames go through a [`LandmarkDetector`] that returns normalized hand
//! keypoints; [`gestures::GestureClassifier`] turns those into gestures.

pub mod gestures;
pub mod tasks;
pub mod types;

pub use gestures::{Gesture, GestureClassifier, distance};
pub use tasks::{HandLandmarker, LandmarkerOptions};
pub use types::{Finger, HandLandmarks, Landmark};

use crate::backends::camera::types::RgbFrame;
use crate::config::Config;
use crate::constants;
use crate::errors::DetectorError;

/// Anything that finds hands in an RGB frame
pub trait LandmarkDetector {
    /// Hands found in `frame`, possibly none
    fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<HandLandmarks>, DetectorError>;
}

impl<D: LandmarkDetector + ?Sized> LandmarkDetector for Box<D> {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<HandLandmarks>, DetectorError> {
        (**self).detect(frame)
    }
}

/// Load the hand landmarker the configuration points at
pub fn load_default_detector(config: &Config) -> Result<HandLandmarker, DetectorError> {
    HandLandmarker::load(
        &config.brain.model_path,
        LandmarkerOptions {
            min_detection_confidence: config.gesture.min_detection_confidence,
            min_tracking_confidence: config.gesture.min_tracking_confidence,
            max_hands: constants::gesture::MAX_NUM_HANDS,
        },
    )
}
