// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the gesture control loop
//!
//! The camera, detector and sound card are replaced with in-memory fakes so
//! the loop can run without hardware.

use robot_brain::backends::camera::types::RgbFrame;
use robot_brain::detection::gestures::poses;
use robot_brain::errors::{AppError, AudioError, CameraError, DetectorError};
use robot_brain::{
    AudioBackend, BgrFrame, Camera, CameraBackend, CameraBackendType, CameraFormat, Config, Gesture,
    HandLandmarks, LandmarkDetector, RobotBrain, StopSignal,
};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Camera that always has a frame, except every `gap`-th call
struct FakeBackend {
    open: bool,
    calls: usize,
    gap: Option<usize>,
    closes: Arc<AtomicUsize>,
}

impl CameraBackend for FakeBackend {
    fn open(&mut self, _format: &CameraFormat) -> Result<(), CameraError> {
        self.open = true;
        Ok(())
    }

    fn capture_frame(&mut self) -> Option<BgrFrame> {
        self.calls += 1;
        match self.gap {
            Some(gap) if self.calls % gap == 0 => None,
            _ => Some(BgrFrame::black(8, 6)),
        }
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        true
    }
}

fn open_camera(gap: Option<usize>, closes: &Arc<AtomicUsize>) -> Camera {
    let backend: Box<dyn CameraBackend> = Box::new(FakeBackend {
        open: false,
        calls: 0,
        gap,
        closes: Arc::clone(closes),
    });
    Camera::open_with(
        CameraBackendType::V4l2,
        vec![backend],
        CameraFormat::new(8, 6, 30),
    )
    .unwrap()
}

/// Detector that replays a script, then sees nothing
#[derive(Default)]
struct ScriptedDetector {
    script: VecDeque<Result<Vec<HandLandmarks>, DetectorError>>,
    calls: usize,
}

impl ScriptedDetector {
    fn new(script: Vec<Result<Vec<HandLandmarks>, DetectorError>>) -> Self {
        Self {
            script: script.into(),
            calls: 0,
        }
    }
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &RgbFrame) -> Result<Vec<HandLandmarks>, DetectorError> {
        self.calls += 1;
        self.script.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }
}

#[derive(Debug, Clone, PartialEq)]
enum AudioCall {
    Play(PathBuf),
    Record(PathBuf, u32),
}

/// Sound card that remembers every call
#[derive(Default)]
struct RecordingAudio {
    calls: Vec<AudioCall>,
    failing: Vec<PathBuf>,
}

impl AudioBackend for RecordingAudio {
    fn play(&mut self, path: &Path) -> Result<(), AudioError> {
        self.calls.push(AudioCall::Play(path.to_path_buf()));
        if self.failing.iter().any(|p| p == path) {
            return Err(AudioError::PlaybackFailed("device busy".to_string()));
        }
        Ok(())
    }

    fn record(&mut self, path: &Path, duration_secs: u32) -> Result<(), AudioError> {
        self.calls.push(AudioCall::Record(path.to_path_buf(), duration_secs));
        if self.failing.iter().any(|p| p == path) {
            return Err(AudioError::RecordingFailed("device busy".to_string()));
        }
        Ok(())
    }
}

fn config_with_cooldown(secs: f64) -> Config {
    let mut config = Config::default();
    config.brain.cooldown_secs = secs;
    config
}

fn brain(
    script: Vec<Result<Vec<HandLandmarks>, DetectorError>>,
    audio: RecordingAudio,
    config: &Config,
) -> RobotBrain<ScriptedDetector, RecordingAudio> {
    let closes = Arc::new(AtomicUsize::new(0));
    RobotBrain::with_parts(
        open_camera(None, &closes),
        ScriptedDetector::new(script),
        audio,
        config,
    )
}

#[test]
fn test_pinch_plays_beep() {
    let config = config_with_cooldown(10.0);
    let mut brain = brain(vec![Ok(vec![poses::pinch()])], RecordingAudio::default(), &config);

    let fired = brain.process_frame(&BgrFrame::black(8, 6));

    assert_eq!(fired, vec![Gesture::Pinch]);
    assert_eq!(
        brain.audio().calls,
        vec![AudioCall::Play(config.brain.beep_file.clone())]
    );
}

#[test]
fn test_pinch_falls_back_to_welcome() {
    let config = config_with_cooldown(10.0);
    let audio = RecordingAudio {
        failing: vec![config.brain.beep_file.clone()],
        ..Default::default()
    };
    let mut brain = brain(vec![Ok(vec![poses::pinch()])], audio, &config);

    let fired = brain.process_frame(&BgrFrame::black(8, 6));

    // A failed beep still counts as a triggered action
    assert_eq!(fired, vec![Gesture::Pinch]);
    assert_eq!(
        brain.audio().calls,
        vec![
            AudioCall::Play(config.brain.beep_file.clone()),
            AudioCall::Play(config.brain.welcome_file.clone()),
        ]
    );
}

#[test]
fn test_open_palm_records() {
    let config = config_with_cooldown(10.0);
    let mut brain = brain(vec![Ok(vec![poses::open_palm()])], RecordingAudio::default(), &config);

    let fired = brain.process_frame(&BgrFrame::black(8, 6));

    assert_eq!(fired, vec![Gesture::OpenPalm]);
    assert_eq!(
        brain.audio().calls,
        vec![AudioCall::Record(
            config.brain.recording_file.clone(),
            config.brain.record_secs
        )]
    );
}

#[test]
fn test_fist_triggers_nothing() {
    let config = config_with_cooldown(10.0);
    let mut brain = brain(vec![Ok(vec![poses::fist()])], RecordingAudio::default(), &config);

    assert!(brain.process_frame(&BgrFrame::black(8, 6)).is_empty());
    assert!(brain.audio().calls.is_empty());
}

#[test]
fn test_cooldown_suppresses_repeats() {
    let config = config_with_cooldown(10.0);
    let script = vec![Ok(vec![poses::pinch()]); 3];
    let mut brain = brain(script, RecordingAudio::default(), &config);

    let frame = BgrFrame::black(8, 6);
    assert_eq!(brain.process_frame(&frame), vec![Gesture::Pinch]);
    assert!(brain.process_frame(&frame).is_empty());
    assert!(brain.process_frame(&frame).is_empty());

    assert_eq!(brain.audio().calls.len(), 1);
    assert_eq!(brain.frame_count(), 3);
}

#[test]
fn test_cooldowns_are_independent() {
    let config = config_with_cooldown(10.0);
    let script = vec![
        Ok(vec![poses::pinch()]),
        Ok(vec![poses::open_palm()]),
        Ok(vec![poses::pinch()]),
    ];
    let mut brain = brain(script, RecordingAudio::default(), &config);

    let frame = BgrFrame::black(8, 6);
    assert_eq!(brain.process_frame(&frame), vec![Gesture::Pinch]);
    assert_eq!(brain.process_frame(&frame), vec![Gesture::OpenPalm]);
    assert!(brain.process_frame(&frame).is_empty());
}

#[test]
fn test_zero_cooldown_fires_every_frame() {
    let config = config_with_cooldown(0.0);
    let script = vec![Ok(vec![poses::pinch()]); 2];
    let mut brain = brain(script, RecordingAudio::default(), &config);

    let frame = BgrFrame::black(8, 6);
    assert_eq!(brain.process_frame(&frame), vec![Gesture::Pinch]);
    assert_eq!(brain.process_frame(&frame), vec![Gesture::Pinch]);
}

#[test]
fn test_huge_cooldown_from_config() {
    let config = config_with_cooldown(1e30);
    let script = vec![Ok(vec![poses::pinch()]); 2];
    let mut brain = brain(script, RecordingAudio::default(), &config);

    let frame = BgrFrame::black(8, 6);
    assert_eq!(brain.process_frame(&frame), vec![Gesture::Pinch]);
    assert!(brain.process_frame(&frame).is_empty());
}

#[test]
fn test_detector_error_keeps_counting() {
    let config = config_with_cooldown(10.0);
    let script = vec![
        Err(DetectorError::InferenceFailed("bad tensor".to_string())),
        Ok(vec![poses::open_palm()]),
    ];
    let mut brain = brain(script, RecordingAudio::default(), &config);

    let frame = BgrFrame::black(8, 6);
    assert!(brain.process_frame(&frame).is_empty());
    assert_eq!(brain.process_frame(&frame), vec![Gesture::OpenPalm]);
    assert_eq!(brain.frame_count(), 2);
}

#[test]
fn test_run_until_deadline_closes_camera() {
    let closes = Arc::new(AtomicUsize::new(0));
    let config = config_with_cooldown(10.0);
    let mut brain = RobotBrain::with_parts(
        open_camera(Some(4), &closes),
        ScriptedDetector::default(),
        RecordingAudio::default(),
        &config,
    );

    let summary = brain
        .run(Some(Duration::from_millis(30)), &StopSignal::new())
        .unwrap();

    assert!(!summary.interrupted);
    assert!(summary.frames > 0);
    assert!(summary.empty_frames > 0);
    assert_eq!(brain.detector().calls as u64, summary.frames);
    assert!(!brain.camera().is_open());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_run_stops_on_signal() {
    let closes = Arc::new(AtomicUsize::new(0));
    let config = Config::default();
    let mut brain = RobotBrain::with_parts(
        open_camera(None, &closes),
        ScriptedDetector::default(),
        RecordingAudio::default(),
        &config,
    );

    let stop = StopSignal::new();
    stop.request_stop();
    let summary = brain.run(None, &stop).unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.frames, 0);
    assert!(!brain.camera().is_open());
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}

#[test]
fn test_run_on_closed_camera_fails() {
    let closes = Arc::new(AtomicUsize::new(0));
    let config = Config::default();
    let mut brain = RobotBrain::with_parts(
        open_camera(None, &closes),
        ScriptedDetector::default(),
        RecordingAudio::default(),
        &config,
    );

    brain
        .run(Some(Duration::from_millis(5)), &StopSignal::new())
        .unwrap();
    let err = brain
        .run(Some(Duration::from_secs(5)), &StopSignal::new())
        .unwrap_err();

    assert!(matches!(err, AppError::Camera(CameraError::NotInitialized)));
    // Second close is a no-op
    assert_eq!(closes.load(Ordering::SeqCst), 1);
}
