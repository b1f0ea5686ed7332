// SPDX-License-Identifier: GPL-3.0-only

//! Detector implementations

pub mod hand_landmarker;
pub mod hand_tracker;

pub use hand_landmarker::{HandLandmarker, LandmarkerOptions};
pub use hand_tracker::HandTracker;
