// SPDX-License-Identifier: GPL-3.0-only

//! Region-of-interest tracking between frames
//!
//! Once a hand is found, the next frame is cropped to a square around it and
//! only that crop is fed to the landmark model. A hand filling the crop gives
//! far better landmarks than the same hand squashed out of the whole frame.
//! When the crop scores below the tracking threshold the tracker drops it and
//! searches the full frame again.

use crate::backends::camera::types::RgbFrame;
use crate::detection::types::{HandLandmarks, Landmark};
use crate::errors::DetectorError;
use image::imageops;
use image::{ImageBuffer, Rgb};
use tracing::{debug, trace};

/// Crop edge relative to the larger side of the landmark bounding box
pub const ROI_SCALE: f32 = 2.0;

/// Smallest crop edge in pixels
pub const MIN_ROI_SIZE: u32 = 32;

/// Square crop in frame pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Roi {
    /// Square around a hand, clamped to the frame
    ///
    /// `hand` is normalized to the frame. The square is centred on the
    /// landmark bounding box, [`ROI_SCALE`] times its larger side, at least
    /// [`MIN_ROI_SIZE`] and at most the shorter frame edge.
    pub fn around(hand: &HandLandmarks, frame_width: u32, frame_height: u32) -> Option<Self> {
        if frame_width == 0 || frame_height == 0 {
            return None;
        }

        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for p in &hand.points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        if !(min_x.is_finite() && min_y.is_finite() && max_x.is_finite() && max_y.is_finite()) {
            return None;
        }

        let fw = frame_width as f32;
        let fh = frame_height as f32;
        let center_x = (min_x + max_x) / 2.0 * fw;
        let center_y = (min_y + max_y) / 2.0 * fh;
        let box_side = ((max_x - min_x) * fw).max((max_y - min_y) * fh);

        let limit = frame_width.min(frame_height);
        let side = ((box_side * ROI_SCALE).round() as u32)
            .max(MIN_ROI_SIZE)
            .min(limit);

        let x = clamp_origin(center_x, side, frame_width);
        let y = clamp_origin(center_y, side, frame_height);

        Some(Self {
            x,
            y,
            width: side,
            height: side,
        })
    }
}

/// Top-left coordinate that centres `side` on `center` without leaving `0..extent`
fn clamp_origin(center: f32, side: u32, extent: u32) -> u32 {
    let origin = (center - side as f32 / 2.0).round().max(0.0) as u32;
    origin.min(extent.saturating_sub(side))
}

/// Cut `roi` out of `frame`
pub fn crop_rgb(frame: &RgbFrame, roi: Roi) -> Result<RgbFrame, DetectorError> {
    // `SubImage::to_image` requires an owned (`'static`) backing buffer
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(|| {
            DetectorError::InferenceFailed(format!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        })?;

    let cropped = imageops::crop_imm(&image, roi.x, roi.y, roi.width, roi.height).to_image();
    Ok(RgbFrame {
        width: cropped.width(),
        height: cropped.height(),
        data: cropped.into_raw(),
        captured_at: frame.captured_at,
    })
}

/// Map a hand normalized to `roi` back to coordinates normalized to the frame
pub fn map_to_frame(hand: &HandLandmarks, roi: Roi, frame_width: u32, frame_height: u32) -> HandLandmarks {
    let fw = frame_width as f32;
    let fh = frame_height as f32;
    let rw = roi.width as f32;
    let rh = roi.height as f32;

    let points = hand.points.map(|p| Landmark {
        x: (roi.x as f32 + p.x * rw) / fw,
        y: (roi.y as f32 + p.y * rh) / fh,
        z: p.z * rw / fw,
    });
    HandLandmarks::new(points, hand.score)
}

/// Follows one hand from frame to frame
#[derive(Debug, Clone)]
pub struct HandTracker {
    roi: Option<Roi>,
    min_detection_confidence: f32,
    min_tracking_confidence: f32,
}

impl HandTracker {
    pub fn new(min_detection_confidence: f32, min_tracking_confidence: f32) -> Self {
        Self {
            roi: None,
            min_detection_confidence,
            min_tracking_confidence,
        }
    }

    /// Crop the next frame is searched in, `None` when searching the full frame
    pub fn roi(&self) -> Option<Roi> {
        self.roi
    }

    /// Find hands in `frame`
    ///
    /// `detect` runs the landmark model on the image it is given with the
    /// given presence threshold and returns hands normalized to that image.
    /// The returned hands are normalized to `frame`.
    pub fn track<F>(&mut self, frame: &RgbFrame, mut detect: F) -> Result<Vec<HandLandmarks>, DetectorError>
    where
        F: FnMut(&RgbFrame, f32) -> Result<Vec<HandLandmarks>, DetectorError>,
    {
        if let Some(roi) = self.roi.take() {
            let crop = crop_rgb(frame, roi)?;
            let hands = detect(&crop, self.min_tracking_confidence)?;
            if !hands.is_empty() {
                let hands: Vec<_> = hands
                    .iter()
                    .map(|hand| map_to_frame(hand, roi, frame.width, frame.height))
                    .collect();
                self.roi = Roi::around(&hands[0], frame.width, frame.height);
                trace!(?roi, next = ?self.roi, "Hand tracked");
                return Ok(hands);
            }
            debug!(?roi, "Lost tracked hand, searching full frame");
        }

        let hands = detect(frame, self.min_detection_confidence)?;
        self.roi = hands
            .first()
            .and_then(|hand| Roi::around(hand, frame.width, frame.height));
        if let Some(roi) = self.roi {
            debug!(?roi, "Hand found, tracking");
        }
        Ok(hands)
    }
}
