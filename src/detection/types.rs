// SPDX-License-Identifier: GPL-3.0-only

//! Hand landmark types
//!
//! Landmarks follow the MediaPipe hand topology: 21 keypoints, index 0 at the
//! wrist, then four points per finger from the base out to the tip.
//! Coordinates are normalized (0.0 to 1.0) relative to the frame dimensions,
//! so the gesture thresholds do not depend on the capture size.

use std::fmt;

/// Number of keypoints per hand
pub const NUM_LANDMARKS: usize = 21;

/// Keypoint indices
pub mod landmark {
    pub const WRIST: usize = 0;
    pub const THUMB_MCP: usize = 2;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// One keypoint
///
/// `x` and `y` are normalized to the frame; `z` is relative depth with the
/// wrist as origin (smaller is closer to the camera) and is not used by the
/// gesture predicates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }
}

/// The five fingers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Finger {
    Thumb,
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 5] = [
        Finger::Thumb,
        Finger::Index,
        Finger::Middle,
        Finger::Ring,
        Finger::Pinky,
    ];

    /// Fingertip keypoint
    pub fn tip(&self) -> usize {
        match self {
            Finger::Thumb => landmark::THUMB_TIP,
            Finger::Index => landmark::INDEX_TIP,
            Finger::Middle => landmark::MIDDLE_TIP,
            Finger::Ring => landmark::RING_TIP,
            Finger::Pinky => landmark::PINKY_TIP,
        }
    }

    /// Joint the tip is compared against to decide extension
    ///
    /// The thumb has no PIP joint; its MCP plays that role.
    pub fn joint(&self) -> usize {
        match self {
            Finger::Thumb => landmark::THUMB_MCP,
            Finger::Index => landmark::INDEX_PIP,
            Finger::Middle => landmark::MIDDLE_PIP,
            Finger::Ring => landmark::RING_PIP,
            Finger::Pinky => landmark::PINKY_PIP,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Finger::Thumb => "thumb",
            Finger::Index => "index",
            Finger::Middle => "middle",
            Finger::Ring => "ring",
            Finger::Pinky => "pinky",
        }
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// All keypoints of one detected hand
#[derive(Debug, Clone, PartialEq)]
pub struct HandLandmarks {
    pub points: [Landmark; NUM_LANDMARKS],
    /// Hand presence score from the detector, 0.0 to 1.0
    pub score: f32,
}

impl HandLandmarks {
    pub fn new(points: [Landmark; NUM_LANDMARKS], score: f32) -> Self {
        Self { points, score }
    }

    /// Build from a flat `[x0, y0, z0, x1, ...]` list in model input pixels
    ///
    /// `x` and `y` are divided by the input size to normalize them; `z` is
    /// scaled the same way as `x`. Returns `None` when fewer than 63 values
    /// are given.
    pub fn from_flat_pixels(values: &[f32], input_width: f32, input_height: f32, score: f32) -> Option<Self> {
        if values.len() < NUM_LANDMARKS * 3 {
            return None;
        }

        let mut points = [Landmark::default(); NUM_LANDMARKS];
        for (point, xyz) in points.iter_mut().zip(values.chunks_exact(3)) {
            *point = Landmark {
                x: xyz[0] / input_width,
                y: xyz[1] / input_height,
                z: xyz[2] / input_width,
            };
        }

        Some(Self { points, score })
    }

    /// Keypoint by index; panics on an index above 20
    pub fn point(&self, index: usize) -> Landmark {
        self.points[index]
    }

    pub fn wrist(&self) -> Landmark {
        self.points[landmark::WRIST]
    }
}
