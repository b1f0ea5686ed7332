// SPDX-License-Identifier: GPL-3.0-only

//! Hand landmark detection with an ONNX model
//!
//! Expects the MediaPipe hand landmark network exported to ONNX:
//! - input: `[1, 224, 224, 3]` float RGB in `[0, 1]` (NHWC)
//! - output 0: 63 values, `(x, y, z)` for 21 keypoints in input pixels
//! - output 1: hand presence score
//!
//! The model sees either the whole frame or, once a hand has been found, a
//! square crop around it (see [`HandTracker`]). Coordinates are normalized to
//! whichever image it was given and mapped back onto the camera frame.

use super::hand_tracker::HandTracker;
use crate::backends::camera::types::RgbFrame;
use crate::detection::LandmarkDetector;
use crate::detection::types::{HandLandmarks, NUM_LANDMARKS};
use crate::errors::DetectorError;
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Rgb};
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace};

/// Model input edge length in pixels
pub const INPUT_SIZE: u32 = 224;

/// Scale an RGB frame to the model input and normalize to `[0, 1]`
///
/// Returns `INPUT_SIZE * INPUT_SIZE * 3` floats in HWC order.
pub fn preprocess(frame: &RgbFrame) -> Result<Vec<f32>, DetectorError> {
    let image: ImageBuffer<Rgb<u8>, &[u8]> =
        ImageBuffer::from_raw(frame.width, frame.height, frame.data.as_slice()).ok_or_else(|| {
            DetectorError::InferenceFailed(format!(
                "frame buffer of {} bytes does not match {}x{}",
                frame.data.len(),
                frame.width,
                frame.height
            ))
        })?;

    if frame.width == INPUT_SIZE && frame.height == INPUT_SIZE {
        return Ok(image.as_raw().iter().map(|&v| v as f32 / 255.0).collect());
    }

    let resized = imageops::resize(&image, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);
    Ok(resized.as_raw().iter().map(|&v| v as f32 / 255.0).collect())
}

/// Map a raw presence output to a probability
///
/// Some exports keep the final sigmoid, some leave a logit.
pub fn presence_probability(raw: f32) -> f32 {
    if (0.0..=1.0).contains(&raw) {
        raw
    } else {
        1.0 / (1.0 + (-raw).exp())
    }
}

/// Turn the two model outputs into at most `max_hands` hands
pub fn postprocess(
    landmarks: &[f32],
    presence: &[f32],
    min_confidence: f32,
    max_hands: usize,
) -> Result<Vec<HandLandmarks>, DetectorError> {
    let values_per_hand = NUM_LANDMARKS * 3;
    if landmarks.len() < values_per_hand {
        return Err(DetectorError::UnexpectedOutput(format!(
            "expected at least {} landmark values, got {}",
            values_per_hand,
            landmarks.len()
        )));
    }
    if presence.is_empty() {
        return Err(DetectorError::UnexpectedOutput(
            "missing hand presence score".to_string(),
        ));
    }

    let size = INPUT_SIZE as f32;
    let hands = landmarks
        .chunks_exact(values_per_hand)
        .zip(presence.iter())
        .filter_map(|(values, &raw)| {
            let score = presence_probability(raw);
            if score < min_confidence {
                trace!(score, "Hand below confidence threshold");
                return None;
            }
            HandLandmarks::from_flat_pixels(values, size, size, score)
        })
        .take(max_hands)
        .collect();

    Ok(hands)
}

/// Presence thresholds and hand count for [`HandLandmarker`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LandmarkerOptions {
    /// Presence needed to report a hand found in the full frame
    pub min_detection_confidence: f32,
    /// Presence needed to keep following a hand in its crop
    pub min_tracking_confidence: f32,
    pub max_hands: usize,
}

/// The ONNX session and what is needed to read its outputs
struct LandmarkModel {
    max_hands: usize,
    #[cfg(feature = "onnx")]
    session: ort::session::Session,
}

impl LandmarkModel {
    /// Hands in `image`, normalized to it
    fn detect(&mut self, image: &RgbFrame, min_confidence: f32) -> Result<Vec<HandLandmarks>, DetectorError> {
        let input = preprocess(image)?;
        let (landmarks, presence) = self.infer(input)?;
        postprocess(&landmarks, &presence, min_confidence, self.max_hands)
    }

    #[cfg(feature = "onnx")]
    fn infer(&mut self, input: Vec<f32>) -> Result<(Vec<f32>, Vec<f32>), DetectorError> {
        let size = INPUT_SIZE as usize;
        let tensor = ort::value::Tensor::from_array(([1usize, size, size, 3], input))
            .map_err(|e| DetectorError::InferenceFailed(e.to_string()))?;

        let outputs = self
            .session
            .run(ort::inputs![tensor])
            .map_err(|e| DetectorError::InferenceFailed(e.to_string()))?;

        if outputs.len() < 2 {
            return Err(DetectorError::UnexpectedOutput(format!(
                "expected 2 outputs, got {}",
                outputs.len()
            )));
        }

        let (_, landmarks) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::UnexpectedOutput(e.to_string()))?;
        let (_, presence) = outputs[1]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::UnexpectedOutput(e.to_string()))?;

        Ok((landmarks.to_vec(), presence.to_vec()))
    }

    #[cfg(not(feature = "onnx"))]
    fn infer(&mut self, _input: Vec<f32>) -> Result<(Vec<f32>, Vec<f32>), DetectorError> {
        Err(DetectorError::Unavailable)
    }
}

/// Landmark detector backed by ONNX Runtime
pub struct HandLandmarker {
    model_path: PathBuf,
    model: LandmarkModel,
    tracker: HandTracker,
}

impl HandLandmarker {
    /// Load the model
    ///
    /// Fails with [`DetectorError::ModelNotFound`] when the file is missing
    /// and [`DetectorError::Unavailable`] when built without the `onnx`
    /// feature.
    pub fn load(model_path: &Path, options: LandmarkerOptions) -> Result<Self, DetectorError> {
        if !model_path.is_file() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let model = Self::load_model(model_path, options.max_hands)?;
        info!(
            model = %model_path.display(),
            min_detection_confidence = options.min_detection_confidence,
            min_tracking_confidence = options.min_tracking_confidence,
            max_hands = options.max_hands,
            "Hand landmark model loaded"
        );
        Ok(Self {
            model_path: model_path.to_path_buf(),
            model,
            tracker: HandTracker::new(
                options.min_detection_confidence,
                options.min_tracking_confidence,
            ),
        })
    }

    #[cfg(feature = "onnx")]
    fn load_model(model_path: &Path, max_hands: usize) -> Result<LandmarkModel, DetectorError> {
        let builder = ort::session::Session::builder()
            .map_err(|e| DetectorError::LoadFailed(e.to_string()))?;
        let builder = builder
            .with_intra_threads(2)
            .map_err(|e| DetectorError::LoadFailed(e.to_string()))?;
        let session = builder
            .commit_from_file(model_path)
            .map_err(|e| DetectorError::LoadFailed(e.to_string()))?;

        Ok(LandmarkModel { max_hands, session })
    }

    #[cfg(not(feature = "onnx"))]
    fn load_model(_model_path: &Path, _max_hands: usize) -> Result<LandmarkModel, DetectorError> {
        Err(DetectorError::Unavailable)
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl LandmarkDetector for HandLandmarker {
    fn detect(&mut self, frame: &RgbFrame) -> Result<Vec<HandLandmarks>, DetectorError> {
        let start = std::time::Instant::now();

        let model = &mut self.model;
        let hands = self
            .tracker
            .track(frame, |image, min_confidence| model.detect(image, min_confidence))?;

        debug!(
            hands = hands.len(),
            tracking = self.tracker.roi().is_some(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Landmark inference complete"
        );
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn rgb(width: u32, height: u32, value: u8) -> RgbFrame {
        RgbFrame {
            width,
            height,
            data: vec![value; (width * height * 3) as usize],
            captured_at: Instant::now(),
        }
    }

    #[test]
    fn test_preprocess_shape_and_range() {
        let input = preprocess(&rgb(320, 240, 255)).unwrap();
        assert_eq!(input.len(), (INPUT_SIZE * INPUT_SIZE * 3) as usize);
        assert!(input.iter().all(|&v| (v - 1.0).abs() < 0.01));

        let black = preprocess(&rgb(320, 240, 0)).unwrap();
        assert!(black.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_preprocess_rejects_bad_buffer() {
        let mut frame = rgb(4, 4, 0);
        frame.data.truncate(10);
        assert!(matches!(
            preprocess(&frame),
            Err(DetectorError::InferenceFailed(_))
        ));
    }

    #[test]
    fn test_presence_probability() {
        assert_eq!(presence_probability(0.7), 0.7);
        assert!((presence_probability(0.0) - 0.0).abs() < 1e-6);
        // Logits get squashed
        assert!(presence_probability(5.0) > 0.99);
        assert!(presence_probability(-5.0) < 0.01);
    }

    #[test]
    fn test_postprocess_filters_by_confidence() {
        let landmarks = vec![112.0f32; 63];

        let hands = postprocess(&landmarks, &[0.9], 0.5, 1).unwrap();
        assert_eq!(hands.len(), 1);
        assert_eq!(hands[0].wrist().x, 0.5);

        let hands = postprocess(&landmarks, &[0.2], 0.5, 1).unwrap();
        assert!(hands.is_empty());
    }

    #[test]
    fn test_postprocess_rejects_short_output() {
        assert!(matches!(
            postprocess(&[0.0; 10], &[0.9], 0.5, 1),
            Err(DetectorError::UnexpectedOutput(_))
        ));
        assert!(matches!(
            postprocess(&[0.0; 63], &[], 0.5, 1),
            Err(DetectorError::UnexpectedOutput(_))
        ));
    }

    #[test]
    fn test_missing_model() {
        let options = LandmarkerOptions {
            min_detection_confidence: 0.5,
            min_tracking_confidence: 0.5,
            max_hands: 1,
        };
        let err = HandLandmarker::load(Path::new("/nonexistent/hand_landmark.onnx"), options)
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ModelNotFound(_)));
    }
}
