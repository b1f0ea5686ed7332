// SPDX-License-Identifier: GPL-3.0-only

//! Gesture predicates over hand landmarks
//!
//! Two gestures are recognised:
//! - **Pinch**: thumb tip and index tip (almost) touching
//! - **Open palm**: at least four of five fingers extended
//!
//! A finger counts as extended when its tip is further from the wrist than
//! its joint by more than a margin. Pinch takes precedence, so a hand yields
//! at most one gesture per frame.

use super::types::{Finger, HandLandmarks, Landmark, landmark};
use crate::config::GestureConfig;
use std::fmt;

/// Euclidean distance in the image plane (`z` ignored)
pub fn distance(p1: Landmark, p2: Landmark) -> f32 {
    ((p1.x - p2.x).powi(2) + (p1.y - p2.y).powi(2)).sqrt()
}

/// Recognised gesture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gesture {
    Pinch,
    OpenPalm,
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Gesture::Pinch => write!(f, "pinch"),
            Gesture::OpenPalm => write!(f, "open palm"),
        }
    }
}

/// Threshold set used to evaluate the predicates
#[derive(Debug, Clone, PartialEq)]
pub struct GestureClassifier {
    config: GestureConfig,
}

impl Default for GestureClassifier {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

impl GestureClassifier {
    pub fn new(config: GestureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Tip further from the wrist than the joint by more than the margin
    pub fn is_finger_extended(&self, hand: &HandLandmarks, finger: Finger) -> bool {
        let wrist = hand.wrist();
        let dist_tip = distance(wrist, hand.point(finger.tip()));
        let dist_joint = distance(wrist, hand.point(finger.joint()));
        dist_tip - dist_joint > self.config.finger_extend_threshold
    }

    /// Number of extended fingers
    pub fn extended_count(&self, hand: &HandLandmarks) -> usize {
        Finger::ALL
            .iter()
            .filter(|&&finger| self.is_finger_extended(hand, finger))
            .count()
    }

    pub fn detect_pinch(&self, hand: &HandLandmarks) -> bool {
        let d = distance(hand.point(landmark::THUMB_TIP), hand.point(landmark::INDEX_TIP));
        d < self.config.pinch_threshold
    }

    pub fn detect_open_palm(&self, hand: &HandLandmarks) -> bool {
        self.extended_count(hand) >= self.config.palm_min_extended
    }

    /// At most one gesture per hand, pinch checked first
    pub fn classify(&self, hand: &HandLandmarks) -> Option<Gesture> {
        if self.detect_pinch(hand) {
            Some(Gesture::Pinch)
        } else if self.detect_open_palm(hand) {
            Some(Gesture::OpenPalm)
        } else {
            None
        }
    }
}

/// Synthetic hand poses shared by the unit and integration tests
#[doc(hidden)]
pub mod poses {
    use super::*;
    use crate::detection::types::NUM_LANDMARKS;

    /// Wrist at the bottom centre; every finger straight up with the tip
    /// 0.3 above the wrist and the joint 0.15 above it
    pub fn open_palm() -> HandLandmarks {
        let mut points = [Landmark::new(0.5, 0.9); NUM_LANDMARKS];
        for (i, finger) in Finger::ALL.iter().enumerate() {
            let x = 0.3 + 0.1 * i as f32;
            points[finger.joint()] = Landmark::new(x, 0.75);
            points[finger.tip()] = Landmark::new(x, 0.6);
        }
        HandLandmarks::new(points, 1.0)
    }

    /// Every fingertip folded back onto its joint
    pub fn fist() -> HandLandmarks {
        let mut hand = open_palm();
        for finger in Finger::ALL {
            let joint = hand.points[finger.joint()];
            hand.points[finger.tip()] = Landmark::new(joint.x, joint.y + 0.02);
        }
        hand
    }

    /// Open palm with thumb and index tips brought together
    pub fn pinch() -> HandLandmarks {
        let mut hand = open_palm();
        let index_tip = hand.points[landmark::INDEX_TIP];
        hand.points[landmark::THUMB_TIP] = Landmark::new(index_tip.x + 0.01, index_tip.y);
        hand
    }
}

#[cfg(test)]
mod tests {
    use super::poses::*;
    use super::*;

    #[test]
    fn test_distance() {
        assert!((distance(Landmark::new(0.0, 0.0), Landmark::new(0.3, 0.4)) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_open_palm_detected() {
        let classifier = GestureClassifier::default();
        let hand = open_palm();
        assert_eq!(classifier.extended_count(&hand), 5);
        assert!(classifier.detect_open_palm(&hand));
        assert!(!classifier.detect_pinch(&hand));
        assert_eq!(classifier.classify(&hand), Some(Gesture::OpenPalm));
    }

    #[test]
    fn test_four_fingers_is_still_palm() {
        let classifier = GestureClassifier::default();
        let mut hand = open_palm();
        let joint = hand.points[landmark::PINKY_PIP];
        hand.points[landmark::PINKY_TIP] = joint;
        assert_eq!(classifier.extended_count(&hand), 4);
        assert!(classifier.detect_open_palm(&hand));

        let joint = hand.points[landmark::RING_PIP];
        hand.points[landmark::RING_TIP] = joint;
        assert!(!classifier.detect_open_palm(&hand));
    }

    #[test]
    fn test_fist_is_nothing() {
        let classifier = GestureClassifier::default();
        assert_eq!(classifier.extended_count(&fist()), 0);
        assert_eq!(classifier.classify(&fist()), None);
    }

    #[test]
    fn test_pinch_wins_over_palm() {
        let classifier = GestureClassifier::default();
        let hand = pinch();
        assert!(classifier.detect_pinch(&hand));
        assert!(classifier.detect_open_palm(&hand));
        assert_eq!(classifier.classify(&hand), Some(Gesture::Pinch));
    }

    #[test]
    fn test_pinch_threshold_is_strict() {
        let classifier = GestureClassifier::default();
        let mut hand = fist();
        hand.points[landmark::THUMB_TIP] = Landmark::new(0.0, 0.0);
        hand.points[landmark::INDEX_TIP] = Landmark::new(0.06, 0.0);
        assert!(!classifier.detect_pinch(&hand));

        hand.points[landmark::INDEX_TIP] = Landmark::new(0.04, 0.0);
        assert!(classifier.detect_pinch(&hand));
    }

    #[test]
    fn test_thresholds_come_from_config() {
        let classifier = GestureClassifier::new(GestureConfig {
            palm_min_extended: 6,
            ..Default::default()
        });
        assert!(!classifier.detect_open_palm(&open_palm()));
    }
}
